#![no_main]

use libfuzzer_sys::fuzz_target;
use packkit::cache::packed::{PackedCache, RefExtractor};
use packkit::ds::id_gen::EntityId;
use packkit::traits::{MirrorBuffer, SliceSink};

// Fuzz property-based tests for PackedCache
//
// Tests specific invariants:
// - Replay equivalence: the copy program reproduces committed state
// - Bijection density after every pack
// - Add-then-remove invisibility
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let test_type = data[0] % 3;

    match test_type {
        0 => test_replay_equivalence(&data[1..]),
        1 => test_bijection_density(&data[1..]),
        2 => test_add_remove_invisibility(&data[1..]),
        _ => unreachable!(),
    }
});

#[derive(Debug, Clone, PartialEq, Eq)]
struct Body {
    payload: u8,
    target: Option<EntityId>,
}

fn ref_cache() -> PackedCache<Body> {
    let extractors: Vec<RefExtractor<Body>> = vec![Box::new(|body: &Body| body.target.clone())];
    PackedCache::with_extractors(true, extractors)
}

// Property: replaying every copy program leaves the mirror equal to the
// committed state, slot for slot.
fn test_replay_equivalence(data: &[u8]) {
    let mut cache = ref_cache();
    let mut mirror = MirrorBuffer::new();
    let mut alive: Vec<EntityId> = Vec::new();

    for chunk in data.chunks(2) {
        let op = chunk[0] % 4;
        let arg = *chunk.get(1).unwrap_or(&0);

        match op {
            0 => {
                let target = if arg % 3 == 0 && !alive.is_empty() {
                    Some(alive[arg as usize % alive.len()].clone())
                } else {
                    None
                };
                alive.push(cache.add(Body {
                    payload: arg,
                    target,
                }));
            }
            1 => {
                if !alive.is_empty() {
                    let id = alive[arg as usize % alive.len()].clone();
                    let target = alive.first().cloned();
                    let _ = cache.mutate(
                        &id,
                        Body {
                            payload: arg,
                            target,
                        },
                    );
                }
            }
            2 => {
                if !alive.is_empty() {
                    let id = alive.swap_remove(arg as usize % alive.len());
                    let _ = cache.remove(&id);
                }
            }
            _ => {
                let update = cache.pack();
                mirror.apply(&update);
                mirror.truncate(cache.len());

                for slot in 0..cache.len() {
                    let id = cache.id_of(slot).expect("dense slot unmapped");
                    assert_eq!(mirror.get(slot), cache.get(id));
                }
            }
        }
    }

    let update = cache.pack();
    mirror.apply(&update);
    mirror.truncate(cache.len());
    for slot in 0..cache.len() {
        let id = cache.id_of(slot).expect("dense slot unmapped");
        assert_eq!(mirror.get(slot), cache.get(id));
    }
}

// Property: after every pack, index_of/id_of form a bijection over
// exactly [0, len).
fn test_bijection_density(data: &[u8]) {
    let mut cache: PackedCache<u8> = PackedCache::new(true);
    let mut alive: Vec<EntityId> = Vec::new();

    for chunk in data.chunks(2) {
        let op = chunk[0] % 3;
        let arg = *chunk.get(1).unwrap_or(&0);

        match op {
            0 => alive.push(cache.add(arg)),
            1 => {
                if !alive.is_empty() {
                    let id = alive.swap_remove(arg as usize % alive.len());
                    let _ = cache.remove(&id);
                }
            }
            _ => {
                cache.pack();
                for slot in 0..cache.len() {
                    let id = cache.id_of(slot).expect("gap inside dense range");
                    assert_eq!(cache.index_of(id), Some(slot));
                }
                assert!(cache.id_of(cache.len()).is_none());
            }
        }
    }
}

// Property: an entity added and removed between the same two packs never
// becomes visible anywhere.
fn test_add_remove_invisibility(data: &[u8]) {
    let mut cache: PackedCache<u8> = PackedCache::new(true);
    let mut ghosts: Vec<EntityId> = Vec::new();

    for &byte in data {
        let keeper = cache.add(byte);
        let ghost = cache.add(byte.wrapping_add(1));
        cache.remove(&ghost).expect("pending id must be removable");
        ghosts.push(ghost);

        if byte % 4 == 0 {
            let update = cache.pack();
            for ghost in &ghosts {
                assert_eq!(cache.index_of(ghost), None);
            }
            assert!(cache.index_of(&keeper).is_some());
            assert!(update.values.len() <= cache.len());
        }
    }

    cache.pack();
    for ghost in &ghosts {
        assert_eq!(cache.index_of(ghost), None);
        assert!(cache.remove(ghost).is_err());
    }
}
