//! DHAT heap profiler for packkit.
//!
//! Run with: cargo run --bin dhat_profile --release --features dhat-heap
//! View results: Open dhat-heap.json in <https://nnethercote.github.io/dh_view/dh_view.html>

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use packkit::cache::packed::{PackedCache, RefExtractor};
use packkit::ds::id_gen::EntityId;

/// Simple XorShift64 RNG for deterministic workloads.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    fn next_f64(&mut self) -> f64 {
        const SCALE: f64 = 1.0 / (u64::MAX as f64);
        (self.next_u64() as f64) * SCALE
    }
}

#[derive(Clone)]
struct Record {
    _payload: [f32; 8],
    target: Option<EntityId>,
}

fn record(target: Option<EntityId>) -> Record {
    Record {
        _payload: [0.0; 8],
        target,
    }
}

/// Run a churn workload: a stable committed set with a rolling fraction
/// replaced and mutated every tick, packed once per tick.
fn churn_workload(cache: &mut PackedCache<Record>, ticks: usize, batch: usize, seed: u64) {
    let mut rng = XorShift64::new(seed);
    let mut alive: Vec<EntityId> = Vec::new();

    for _ in 0..ticks {
        for _ in 0..batch {
            if rng.next_f64() < 0.5 || alive.is_empty() {
                let target = if rng.next_f64() < 0.3 && !alive.is_empty() {
                    let idx = (rng.next_u64() as usize) % alive.len();
                    Some(alive[idx].clone())
                } else {
                    None
                };
                alive.push(cache.add(record(target)));
            } else {
                let idx = (rng.next_u64() as usize) % alive.len();
                let id = alive.swap_remove(idx);
                cache.remove(&id).expect("live id");
            }
        }
        let update = cache.pack();
        std::hint::black_box(update);
    }
}

fn profile_plain() {
    println!("=== Profiling plain cache ===");
    let mut cache = PackedCache::new(true);

    // Warm up to a steady committed set.
    for _ in 0..8_192 {
        cache.add(record(None));
    }
    cache.pack();

    churn_workload(&mut cache, 500, 128, 42);
    println!("  Final size: {}", cache.len());
}

fn profile_referenced() {
    println!("=== Profiling reference-tracking cache ===");
    let extractors: Vec<RefExtractor<Record>> =
        vec![Box::new(|rec: &Record| rec.target.clone())];
    let mut cache = PackedCache::with_extractors(true, extractors);

    for _ in 0..8_192 {
        cache.add(record(None));
    }
    cache.pack();

    churn_workload(&mut cache, 500, 128, 42);
    println!("  Final size: {}", cache.len());
}

fn main() {
    let _profiler = dhat::Profiler::new_heap();

    profile_plain();
    profile_referenced();

    println!("Profile written to dhat-heap.json");
}
