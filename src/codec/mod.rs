//! versioned binary serialization of decay forests
//!
//! Two on-disk schemas, selected by a version tag at the head of the stream:
//!
//! - **version 1 (current)**: chunked, bitmask-driven. The forest is walked
//!   in pre-order in fixed-size chunks of [CHUNK_SLOTS] slots. Each slot is
//!   one presence bit; a set bit is followed (in the chunk's payload
//!   section, in slot order) by one encoded item, a clear bit closes the
//!   current child list and carries no payload. Replaying the mask while
//!   consuming items rebuilds every parent/first-child/next-sibling link
//!   without a single pointer or index on disk. Chunking bounds the buffer:
//!   arbitrarily large forests stream without one giant bitmask.
//! - **version 0 (legacy, read-only)**: a flat pre-order list of items, each
//!   followed by its child count; links are re-derived from a stack of
//!   pending counts. Kept so old archives stay loadable; never written.
//!
//! Encoding is deterministic: the same forest at the same version always
//! produces the same chunk boundaries and the same bitmask. A version tag
//! above [CURRENT_VERSION] is a fatal error on both ends; the layout of a
//! newer writer is never guessed.
//!
//! The codec neither opens files nor retries: it consumes and produces an
//! already open byte stream, and stream errors propagate untouched.
//!
//! [CHUNK_SLOTS]: constant.CHUNK_SLOTS.html
//! [CURRENT_VERSION]: constant.CURRENT_VERSION.html
mod read;
mod write;

use crate::{
    error::Error,
    tree::{Tree, TreeItem},
};
use anyhow::Result;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io;

/// Newest schema this codec writes and reads.
pub const CURRENT_VERSION: u32 = 1;

/// Flat pre-order schema of old archives; loadable, never written.
pub const LEGACY_VERSION: u32 = 0;

/// Slots per chunk of the current schema.
pub const CHUNK_SLOTS: usize = 65_535;

/// Wire form of a tree item.
///
/// Mirrors the shape of the tree's in-memory contract: the key is intrinsic
/// to the encoded value, so decoding an item recovers its key via
/// [TreeItem::key].
///
/// [TreeItem::key]: ../tree/trait.TreeItem.html#tymethod.key
pub trait Payload: TreeItem {
    fn encode<W: io::Write>(&self, w: &mut W) -> Result<()>;

    fn decode<R: io::Read>(r: &mut R) -> Result<Self>;
}

/// Serialize `tree` to `w` using the given schema version.
///
/// Version 0 archives are read-only and refused here; versions above
/// [CURRENT_VERSION] do not exist yet and are refused as well.
///
/// [CURRENT_VERSION]: constant.CURRENT_VERSION.html
pub fn save<T: Payload, W: io::Write>(tree: &Tree<T>, w: &mut W, version: u32) -> Result<()> {
    match version {
        CURRENT_VERSION => write::save_current(tree, w),
        LEGACY_VERSION => Err(Error::ReadOnlyVersion(version).into()),
        found => Err(Error::UnsupportedVersion {
            found,
            current: CURRENT_VERSION,
        }
        .into()),
    }
}

/// Deserialize a tree from `r`, dispatching on the stream's version tag.
pub fn load<T: Payload, R: io::Read>(r: &mut R) -> Result<Tree<T>> {
    let version = r.read_u32::<LittleEndian>()?;
    match version {
        LEGACY_VERSION => read::load_legacy(r),
        CURRENT_VERSION => read::load_current(r),
        found => Err(Error::UnsupportedVersion {
            found,
            current: CURRENT_VERSION,
        }
        .into()),
    }
}
