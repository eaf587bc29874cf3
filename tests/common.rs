#![allow(dead_code)]
//! helper methods for the tests
use mctree::{Particle, ParticleId, ParticleKind, Shape, Tree};
use quickcheck::{Arbitrary, Gen};

pub fn pid(minor: i32) -> ParticleId {
    ParticleId::new(7, minor)
}

pub fn particle(minor: i32) -> Particle {
    Particle::new(pid(minor), ParticleKind::EMinus).with_energy(minor as f64)
}

/// Opt-in log output for test runs, driven by RUST_LOG.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// A recipe for an arbitrary forest, built through the public API.
///
/// Each byte picks where the next particle goes: slot 0 makes it a new last
/// root, slot k > 0 appends it as a child of the (k-1 mod inserted)-th
/// particle. Every forest shape is reachable this way, including multi-root
/// ones and irregular branching.
#[derive(Debug, Clone)]
pub struct TreeRecipe(pub Vec<u8>);

impl Arbitrary for TreeRecipe {
    fn arbitrary(g: &mut Gen) -> Self {
        TreeRecipe(Arbitrary::arbitrary(g))
    }
}

impl TreeRecipe {
    pub fn build(&self) -> Tree<Particle> {
        let mut tree: Tree<Particle> = Tree::new();
        let mut inserted: Vec<ParticleId> = Vec::new();
        for (i, &slot) in self.0.iter().enumerate() {
            let p = particle(i as i32).with_time(i as f64);
            let choice = slot as usize % (inserted.len() + 1);
            if choice == 0 {
                tree.insert_last(p.clone());
            } else {
                tree.append_child(inserted[choice - 1], p.clone());
            }
            inserted.push(p.id);
        }
        tree
    }

    pub fn keys(&self) -> Vec<ParticleId> {
        (0..self.0.len()).map(|i| pid(i as i32)).collect()
    }
}

/// A recipe for a track with a fringe of compressible colinear deposits.
///
/// Offsets are sorted and deduplicated so the children are appended in
/// ascending time order, which is also the order the linearization layer
/// re-inserts them in on load.
#[derive(Debug, Clone)]
pub struct ColinearShower(pub Vec<u8>);

impl Arbitrary for ColinearShower {
    fn arbitrary(g: &mut Gen) -> Self {
        ColinearShower(Arbitrary::arbitrary(g))
    }
}

impl ColinearShower {
    pub fn track() -> Particle {
        Particle::new(pid(0), ParticleKind::MuMinus)
            .with_shape(Shape::Track)
            .with_pos([1.5, -2.0, 30.0])
            .with_dir([0.6, 0.0, 0.8])
            .with_time(50.0)
            .with_energy(500.0)
            .with_length(100.0)
    }

    pub fn build(&self) -> Tree<Particle> {
        let track = Self::track();
        let mut tree = Tree::from(track.clone());
        let mut dts: Vec<u8> = self.0.clone();
        dts.sort_unstable();
        dts.dedup();
        for (i, &dt) in dts.iter().enumerate() {
            let dt = dt as f64 * 0.5;
            let deposit = Particle::new(pid(i as i32 + 1), ParticleKind::EMinus)
                .with_shape(Shape::Cascade)
                .with_dir(track.dir)
                .with_pos(track.propagated(dt))
                .with_time(track.time + dt)
                .with_energy(1.0 + i as f64);
            tree.append_child(track.id, deposit);
        }
        tree
    }
}
