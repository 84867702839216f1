use packkit::builder::PackedCacheBuilder;
use packkit::ds::id_gen::EntityId;
use packkit::traits::{MirrorBuffer, SliceSink};

#[derive(Debug, Clone)]
struct Sprite {
    name: &'static str,
    atlas: Option<EntityId>,
}

fn sprite(name: &'static str, atlas: Option<EntityId>) -> Sprite {
    Sprite { name, atlas }
}

fn main() {
    // A cache whose sprites may reference an atlas entity.
    let mut cache = PackedCacheBuilder::new()
        .mutable(true)
        .extractor(|s: &Sprite| s.atlas.clone())
        .build();

    // The mirror plays the role of the GPU instance buffer.
    let mut buffer = MirrorBuffer::new();

    let player = cache.add(sprite("player", None));
    let filler = cache.add(sprite("filler", None));
    let atlas = cache.add(sprite("atlas", None));
    cache.mutate(&player, sprite("player", Some(atlas.clone()))).unwrap();

    let update = cache.pack();
    println!(
        "first pack: {} values, {:?}",
        update.values.len(),
        update.copy_slices
    );
    buffer.apply(&update);

    // Removing the filler pulls the atlas down a slot. The player's own
    // fields never changed, but it re-emits in the same pack so the encoded
    // atlas slot can be refreshed.
    cache.remove(&filler).unwrap();
    let update = cache.pack();
    println!(
        "after removal: {} values, {:?}",
        update.values.len(),
        update.copy_slices
    );
    buffer.apply(&update);
    buffer.truncate(cache.len());

    for slot in 0..cache.len() {
        let s = buffer.get(slot).unwrap();
        let encoded = s.atlas.as_ref().and_then(|id| cache.index_of(id));
        println!("slot {slot}: {} (atlas slot: {encoded:?})", s.name);
    }
}
