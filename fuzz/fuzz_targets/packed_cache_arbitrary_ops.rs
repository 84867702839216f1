#![no_main]

use libfuzzer_sys::fuzz_target;
use packkit::cache::packed::PackedCache;
use packkit::ds::id_gen::EntityId;

// Fuzz arbitrary operation sequences on PackedCache
//
// Tests random sequences of add, mutate, remove, misuse calls, and pack
// to find edge cases and invariant violations.
fuzz_target!(|data: &[u8]| {
    let mut cache: PackedCache<u8> = PackedCache::new(true);
    let mut alive: Vec<EntityId> = Vec::new();

    let mut idx = 0;
    while idx + 1 < data.len() {
        let op = data[idx] % 5;
        let arg = data[idx + 1];
        idx += 2;

        match op {
            0 => alive.push(cache.add(arg)),
            1 => {
                if !alive.is_empty() {
                    let id = alive[arg as usize % alive.len()].clone();
                    cache.mutate(&id, arg).expect("live id must be mutable");
                }
            }
            2 => {
                if !alive.is_empty() {
                    let id = alive.swap_remove(arg as usize % alive.len());
                    cache.remove(&id).expect("live id must be removable");
                }
            }
            3 => {
                // Misuse must fail without corrupting state.
                let foreign = EntityId::from("foreign");
                assert!(cache.remove(&foreign).is_err());
                assert!(cache.mutate(&foreign, arg).is_err());
            }
            4 => {
                cache.pack();
                assert!(!cache.is_dirty());
                cache
                    .check_invariants()
                    .expect("invariants must hold after pack");
            }
            _ => unreachable!(),
        }
    }

    cache.pack();
    cache
        .check_invariants()
        .expect("invariants must hold after the final pack");
    // Every id we added and never removed must be committed now.
    assert_eq!(cache.len(), alive.len());
    for id in &alive {
        assert!(cache.index_of(id).is_some());
    }
});
