#[derive(Debug, Default, Clone, Copy)]
pub struct PackMetricsSnapshot {
    pub pack_calls: u64,

    pub committed_adds: u64,
    pub committed_mutations: u64,
    pub committed_removals: u64,

    pub replaced_slots: u64,
    pub appended_slots: u64,
    pub moved_entities: u64, // tail entities pulled down to refill vacated slots
    pub cascade_mutations: u64, // re-emissions forced purely by a referenced entity moving

    pub emitted_values: u64,
    pub emitted_slices: u64,

    // gauges captured at snapshot time
    pub committed_len: usize,
    pub ref_edges: usize,
}
