//! serialization and linearization round trips
mod common;

use common::{init_logging, particle, pid, ColinearShower, TreeRecipe};
use mctree::codec::{self, Payload, CHUNK_SLOTS};
use mctree::{linearize, Particle, ParticleKind, Tree, POSITION_TOLERANCE};
use quickcheck_macros::quickcheck;

fn round_trip(tree: &Tree<Particle>) -> Tree<Particle> {
    let mut buf = Vec::new();
    codec::save(tree, &mut buf, codec::CURRENT_VERSION).unwrap();
    codec::load(&mut buf.as_slice()).unwrap()
}

#[test]
fn empty_and_single_item_round_trip() {
    init_logging();
    let empty: Tree<Particle> = Tree::new();
    assert_eq!(round_trip(&empty), empty);
    let single = Tree::from(particle(1));
    assert_eq!(round_trip(&single), single);
}

#[quickcheck]
fn arbitrary_forests_round_trip(recipe: TreeRecipe) -> bool {
    let tree = recipe.build();
    let loaded = round_trip(&tree);
    loaded.assert_invariants();
    loaded == tree
}

#[test]
fn multi_chunk_forest_round_trips() {
    init_logging();
    // a wide forest crossing the chunk boundary: n items walk as 2n+1 slots
    let n = CHUNK_SLOTS + 20_000;
    let mut tree = Tree::from(particle(0));
    tree.append_children(
        pid(0),
        (1..n as i32).map(|i| particle(i).with_time(i as f64)),
    );
    assert_eq!(tree.size(), n);
    let loaded = round_trip(&tree);
    loaded.assert_invariants();
    assert_eq!(loaded, tree);
}

#[test]
fn deep_chain_round_trips() {
    let mut tree = Tree::from(particle(0));
    for i in 1..2_000 {
        tree.append_child(pid(i - 1), particle(i));
    }
    let loaded = round_trip(&tree);
    loaded.assert_invariants();
    assert_eq!(loaded, tree);
}

#[test]
fn legacy_particle_archive_loads() {
    // hand-built version 0 image of 1 -> [2, 3 -> [4]]
    let mut buf = Vec::new();
    {
        use byteorder::{LittleEndian, WriteBytesExt};
        buf.write_u32::<LittleEndian>(codec::LEGACY_VERSION).unwrap();
        buf.write_u64::<LittleEndian>(4).unwrap();
        for &(minor, children) in [(1, 2u32), (2, 0), (3, 1), (4, 0)].iter() {
            particle(minor).encode(&mut buf).unwrap();
            buf.write_u32::<LittleEndian>(children).unwrap();
        }
    }
    let loaded: Tree<Particle> = codec::load(&mut buf.as_slice()).unwrap();
    loaded.assert_invariants();
    let mut expected = Tree::from(particle(1));
    expected.append_children(pid(1), vec![particle(2), particle(3)]);
    expected.append_child(pid(3), particle(4));
    assert_eq!(loaded, expected);
}

#[quickcheck]
fn linearized_round_trip_is_bounded(shower: ColinearShower) -> bool {
    let tree = shower.build();
    let mut buf = Vec::new();
    linearize::save(&tree, &mut buf, linearize::CURRENT_VERSION).unwrap();
    let loaded = linearize::load(&mut buf.as_slice()).unwrap();
    loaded.assert_invariants();
    if loaded.size() != tree.size() {
        return false;
    }
    tree.pre_order().all(|original| {
        match loaded.at(original.id) {
            Some(rebuilt) => {
                let dp = {
                    let dx = rebuilt.pos[0] - original.pos[0];
                    let dy = rebuilt.pos[1] - original.pos[1];
                    let dz = rebuilt.pos[2] - original.pos[2];
                    (dx * dx + dy * dy + dz * dz).sqrt()
                };
                rebuilt.kind == original.kind
                    && rebuilt.shape == original.shape
                    && loaded.parent_key(rebuilt.id) == tree.parent_key(original.id)
                    && dp <= POSITION_TOLERANCE
                    && (rebuilt.time - original.time).abs() <= 1e-3
                    && (rebuilt.energy - original.energy).abs() <= 1e-2
            }
            None => false,
        }
    })
}

#[quickcheck]
fn linearized_and_plain_agree_when_nothing_compresses(recipe: TreeRecipe) -> bool {
    // recipe trees carry no cascades, so the layer strips nothing
    let tree = recipe.build();
    let mut linearized = Vec::new();
    linearize::save(&tree, &mut linearized, linearize::CURRENT_VERSION).unwrap();
    let mut plain = Vec::new();
    codec::save(&tree, &mut plain, codec::CURRENT_VERSION).unwrap();
    linearized[12..] == plain[..]
}

#[test]
fn linearized_shower_archive_is_smaller() {
    let shower = ColinearShower((0..200).collect()).build();
    let mut linearized = Vec::new();
    linearize::save(&shower, &mut linearized, linearize::CURRENT_VERSION).unwrap();
    let mut plain = Vec::new();
    codec::save(&shower, &mut plain, codec::CURRENT_VERSION).unwrap();
    assert!(linearized.len() < plain.len());
    // and it still loads back to the full shower
    let loaded = linearize::load(&mut linearized.as_slice()).unwrap();
    assert_eq!(loaded.size(), shower.size());
}

#[test]
fn version_tags_gate_both_layers() {
    let tree = Tree::from(particle(1));
    let mut buf = Vec::new();
    assert!(codec::save(&tree, &mut buf, 99).is_err());
    assert!(linearize::save(&tree, &mut buf, 99).is_err());
    assert!(codec::save(&tree, &mut buf, codec::LEGACY_VERSION).is_err());
}

#[test]
fn kind_codes_survive_via_other() {
    // an archive from a newer writer may carry unknown species codes
    let exotic = Particle::new(pid(1), ParticleKind::Other(4_332)).with_energy(1.0);
    let tree = Tree::from(exotic);
    let loaded = round_trip(&tree);
    assert_eq!(
        loaded.at(pid(1)).unwrap().kind,
        ParticleKind::Other(4_332)
    );
}
