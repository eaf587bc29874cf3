//! readers for the current and the legacy schema
use super::{Payload, CHUNK_SLOTS};
use crate::{error::Error, tree::Tree};
use anyhow::Result;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io;
use tracing::debug;

/// Attach `item` under `parent` (None for the root level), after `prev` if
/// one was already attached at this level. Every case is O(1): the running
/// last-child pointer avoids rescanning sibling chains.
fn attach<T: Payload>(
    tree: &mut Tree<T>,
    parent: Option<T::Key>,
    prev: Option<T::Key>,
    item: T,
) -> Result<()> {
    if tree.contains(item.key()) {
        return Err(Error::DuplicateKey.into());
    }
    match (parent, prev) {
        (_, Some(prev)) => tree.insert_after(prev, item),
        (Some(parent), None) => tree.append_child(parent, item),
        (None, None) => tree.insert(item),
    }
    Ok(())
}

/// Replay the chunked bitmask, consuming one item per set bit.
pub(super) fn load_current<T: Payload, R: io::Read>(r: &mut R) -> Result<Tree<T>> {
    let expected = r.read_u64::<LittleEndian>()?;
    let mut tree = Tree::new();
    // levels opened and not yet closed: (node, last attached child);
    // the bottom entry is the virtual root owning the root list
    let mut stack: Vec<(Option<T::Key>, Option<T::Key>)> = vec![(None, None)];
    let mut count = 0u64;
    let mut chunks = 0u64;
    'chunks: loop {
        let slots = r.read_u16::<LittleEndian>()? as usize;
        if slots == 0 || slots > CHUNK_SLOTS {
            return Err(Error::Truncated("bad chunk slot count").into());
        }
        let mut mask = vec![0u8; (slots + 7) / 8];
        r.read_exact(&mut mask)?;
        chunks += 1;
        for slot in 0..slots {
            if mask[slot / 8] & (1 << (slot % 8)) != 0 {
                let item = T::decode(r)?;
                let key = item.key();
                let top = *stack.last().unwrap();
                attach(&mut tree, top.0, top.1, item)?;
                stack.last_mut().unwrap().1 = Some(key);
                stack.push((Some(key), None));
                count += 1;
            } else {
                stack.pop();
                if stack.is_empty() {
                    // the virtual root closes on the very last slot
                    if slot + 1 != slots {
                        return Err(Error::Truncated("slots after final close").into());
                    }
                    break 'chunks;
                }
            }
        }
    }
    if count != expected {
        return Err(Error::CountMismatch {
            expected,
            found: count,
        }
        .into());
    }
    debug!("loaded tree: items={} chunks={}", count, chunks);
    Ok(tree)
}

/// Flat pre-order list with child counts; links re-derived from a stack of
/// pending counts.
pub(super) fn load_legacy<T: Payload, R: io::Read>(r: &mut R) -> Result<Tree<T>> {
    let expected = r.read_u64::<LittleEndian>()?;
    let mut tree = Tree::new();
    // (node, children still owed, last attached child)
    let mut stack: Vec<(T::Key, u32, Option<T::Key>)> = Vec::new();
    let mut last_root: Option<T::Key> = None;
    for _ in 0..expected {
        let item = T::decode(r)?;
        let n_children = r.read_u32::<LittleEndian>()?;
        let key = item.key();
        match stack.last_mut() {
            Some(top) => {
                attach(&mut tree, Some(top.0), top.2, item)?;
                top.1 -= 1;
                top.2 = Some(key);
            }
            None => {
                attach(&mut tree, None, last_root, item)?;
                last_root = Some(key);
            }
        }
        while let Some(&(_, remaining, _)) = stack.last() {
            if remaining == 0 {
                stack.pop();
            } else {
                break;
            }
        }
        if n_children > 0 {
            stack.push((key, n_children, None));
        }
    }
    if !stack.is_empty() {
        return Err(Error::Truncated("children owed at end of stream").into());
    }
    debug!("loaded legacy tree: items={}", expected);
    Ok(tree)
}
