// ==============================================
// RANDOMIZED CHURN TESTS (integration)
// ==============================================
//
// Drives the packed cache through seeded random add/mutate/remove/pack
// cycles while replaying every copy program into a mirror, the way a
// buffer writer would. After each pack the mirror must equal the
// committed state slot for slot, and every encoded reference index in the
// mirror must still point at its target's current slot. The second check
// is what catches a missed reference cascade: a stale dependent would
// keep its old encoded index in the mirror.

use packkit::cache::packed::{PackedCache, RefExtractor, ValueSlices};
use packkit::ds::id_gen::EntityId;
use packkit::traits::{MirrorBuffer, SliceSink};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Body {
    payload: u64,
    target: Option<EntityId>,
}

/// Downstream encoding of a `Body`: payload plus the slot index its
/// reference resolves to at write time.
type Encoded = (u64, Option<usize>);

fn encode(cache: &PackedCache<Body>, body: &Body) -> Encoded {
    let slot = body.target.as_ref().and_then(|id| cache.index_of(id));
    (body.payload, slot)
}

/// Applies `update` the way a stride-aware buffer writer would: raw values
/// into `mirror`, encoded records into `encoded`.
fn apply_update(
    cache: &PackedCache<Body>,
    update: &ValueSlices<Body>,
    mirror: &mut MirrorBuffer<Body>,
    encoded: &mut MirrorBuffer<Encoded>,
) {
    mirror.apply(update);
    for slice in &update.copy_slices {
        let run: Vec<Encoded> = update.values[slice.min..slice.min + slice.length]
            .iter()
            .map(|body| encode(cache, body))
            .collect();
        encoded.write_run(slice.to_index, &run);
    }
    mirror.truncate(cache.len());
    encoded.truncate(cache.len());
}

fn check_round(
    cache: &PackedCache<Body>,
    mirror: &MirrorBuffer<Body>,
    encoded: &MirrorBuffer<Encoded>,
    round: usize,
) {
    cache
        .check_invariants()
        .unwrap_or_else(|err| panic!("round {round}: {err}"));

    for slot in 0..cache.len() {
        let id = cache
            .id_of(slot)
            .unwrap_or_else(|| panic!("round {round}: slot {slot} unmapped"));
        let body = cache.get(id).expect("mapped id must be committed");

        assert_eq!(
            mirror.get(slot),
            Some(body),
            "round {round}: mirror diverged at slot {slot}"
        );
        assert_eq!(
            encoded.get(slot),
            Some(&encode(cache, body)),
            "round {round}: stale encoded reference at slot {slot}"
        );
    }
}

fn churn(seed: u64, rounds: usize, ops_per_round: usize) {
    let extractors: Vec<RefExtractor<Body>> = vec![Box::new(|body: &Body| body.target.clone())];
    let mut cache = PackedCache::with_extractors(true, extractors);
    let mut mirror = MirrorBuffer::new();
    let mut encoded = MirrorBuffer::new();
    let mut rng = SmallRng::seed_from_u64(seed);

    // Ids we have added and not yet removed (pending or committed).
    let mut alive: Vec<EntityId> = Vec::new();
    let mut next_payload = 0u64;

    for round in 0..rounds {
        for _ in 0..ops_per_round {
            let roll: f64 = rng.random();
            if roll < 0.45 || alive.is_empty() {
                let target = pick_target(&mut rng, &alive);
                let id = cache.add(Body {
                    payload: next_payload,
                    target,
                });
                next_payload += 1;
                alive.push(id);
            } else if roll < 0.75 {
                let idx = rng.random_range(0..alive.len());
                let target = pick_target(&mut rng, &alive);
                let id = alive[idx].clone();
                cache
                    .mutate(
                        &id,
                        Body {
                            payload: next_payload,
                            target,
                        },
                    )
                    .expect("mutating a live id must succeed");
                next_payload += 1;
            } else {
                let idx = rng.random_range(0..alive.len());
                let id = alive.swap_remove(idx);
                cache.remove(&id).expect("removing a live id must succeed");
            }
        }

        let update = cache.pack();
        apply_update(&cache, &update, &mut mirror, &mut encoded);
        check_round(&cache, &mirror, &encoded, round);
        assert!(!cache.is_dirty(), "round {round}: pack left queues dirty");
    }
}

/// Picks a reference target: usually a live id, sometimes none, and
/// sometimes an id that will never resolve.
fn pick_target(rng: &mut SmallRng, alive: &[EntityId]) -> Option<EntityId> {
    let roll: f64 = rng.random();
    if roll < 0.5 && !alive.is_empty() {
        Some(alive[rng.random_range(0..alive.len())].clone())
    } else if roll < 0.6 {
        Some(EntityId::from("dangling"))
    } else {
        None
    }
}

#[test]
fn churn_small_batches() {
    churn(0x5eed_0001, 150, 6);
}

#[test]
fn churn_large_batches() {
    churn(0x5eed_0002, 60, 40);
}

#[test]
fn churn_without_references() {
    let mut cache: PackedCache<u64> = PackedCache::new(true);
    let mut mirror = MirrorBuffer::new();
    let mut rng = SmallRng::seed_from_u64(0x5eed_0003);
    let mut alive: Vec<EntityId> = Vec::new();

    for round in 0..200 {
        for _ in 0..8 {
            let roll: f64 = rng.random();
            if roll < 0.5 || alive.is_empty() {
                alive.push(cache.add(rng.random()));
            } else if roll < 0.7 {
                let idx = rng.random_range(0..alive.len());
                cache.mutate(&alive[idx], rng.random()).unwrap();
            } else {
                let idx = rng.random_range(0..alive.len());
                let id = alive.swap_remove(idx);
                cache.remove(&id).unwrap();
            }
        }

        let update = cache.pack();
        mirror.apply(&update);
        mirror.truncate(cache.len());

        cache
            .check_invariants()
            .unwrap_or_else(|err| panic!("round {round}: {err}"));
        for slot in 0..cache.len() {
            let id = cache.id_of(slot).expect("dense slot unmapped");
            assert_eq!(mirror.get(slot), cache.get(id), "round {round} slot {slot}");
        }
    }
}
