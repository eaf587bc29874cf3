//! # Decay trees
//!
//! Particle decays form trees: a primary interacts, its secondaries decay in
//! turn, and a simulated or reconstructed event ends up holding one tree per
//! primary. This library stores such decays as a **keyed forest**: a mapping
//! from particle ids to nodes, where each node links to its parent, its
//! first child and its next sibling by key. Multiple roots are first class,
//! so one [Tree] value holds a whole event.
//!
//! The same storage supports five traversal strategies with distinct
//! ordering and cost contracts: pre-order (the default, and the order
//! equality and serialization are defined over), post-order, sibling-chain,
//! and the unordered fast and leaf scans over the backing map. See [iter].
//!
//! ## Persistence
//!
//! Trees serialize to any byte stream through a versioned binary codec. The
//! current schema walks the tree pre-order in fixed-size chunks, writing one
//! presence bit per slot: replaying the bitmask on load reconstructs every
//! link without storing a pointer or index on disk. A legacy flat pre-order
//! schema stays loadable. See [codec].
//!
//! On top of the codec, the [linearize] layer elides childless energy
//! deposits that travel rigidly along their parent's direction and rebuilds
//! them on load, trading a bounded position/precision loss for considerably
//! smaller archives.
//!
//! ## Queries
//!
//! Generic best-match and filter searches over the fast traversal live in
//! [query]; ready-made domain selections such as the most energetic particle
//! of a species live in [particle].
//!
//! [Tree]: tree/struct.Tree.html
//! [iter]: iter/index.html
//! [codec]: codec/index.html
//! [linearize]: linearize/index.html
//! [query]: query/index.html
//! [particle]: particle/index.html
pub mod codec;
pub mod error;
pub mod iter;
pub mod linearize;
pub mod particle;
pub mod query;
pub mod tree;

pub use crate::error::Error;
pub use crate::iter::{Cursor, FastIter, LeafIter, PostOrderIter, PreOrderIter, SiblingIter};
pub use crate::particle::{
    FitStatus, Particle, ParticleId, ParticleKind, Shape, C_LIGHT, POSITION_TOLERANCE,
};
pub use crate::tree::{Tree, TreeItem};

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;
