//! the chunked bitmask writer of the current schema
use super::{Payload, CHUNK_SLOTS, CURRENT_VERSION};
use crate::tree::Tree;
use anyhow::Result;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io;
use tracing::debug;

/// One step of the explicit-stack pre-order walk: visit a node, or close
/// the child list opened by the nearest unclosed visit.
enum Step<K> {
    Node(K),
    Close,
}

pub(super) fn save_current<T: Payload, W: io::Write>(tree: &Tree<T>, w: &mut W) -> Result<()> {
    w.write_u32::<LittleEndian>(CURRENT_VERSION)?;
    w.write_u64::<LittleEndian>(tree.size() as u64)?;

    // the root list is the child list of a virtual root, closed last
    let mut stack: Vec<Step<T::Key>> = vec![Step::Close];
    let mut roots = Vec::new();
    let mut cur = tree.head_key();
    while let Some(k) = cur {
        roots.push(k);
        cur = tree.next_sibling_key(k);
    }
    for &r in roots.iter().rev() {
        stack.push(Step::Node(r));
    }

    let mut chunk = Chunk::new();
    let mut chunks = 0u64;
    while let Some(step) = stack.pop() {
        if chunk.slots == CHUNK_SLOTS {
            chunk.flush(w)?;
            chunks += 1;
        }
        match step {
            Step::Node(k) => {
                chunk.push_present(tree.at(k).unwrap())?;
                stack.push(Step::Close);
                let children = tree.child_keys(k);
                for &c in children.iter().rev() {
                    stack.push(Step::Node(c));
                }
            }
            Step::Close => chunk.push_close(),
        }
    }
    // the final close of the virtual root guarantees a non-empty tail chunk
    chunk.flush(w)?;
    chunks += 1;
    debug!(
        "saved tree: items={} chunks={} version={}",
        tree.size(),
        chunks,
        CURRENT_VERSION
    );
    Ok(())
}

/// Bitmask and payload buffer for one chunk in flight.
struct Chunk {
    mask: Vec<u8>,
    payload: Vec<u8>,
    slots: usize,
}

impl Chunk {
    fn new() -> Self {
        Self {
            mask: Vec::new(),
            payload: Vec::new(),
            slots: 0,
        }
    }

    fn grow(&mut self) -> usize {
        let slot = self.slots;
        if slot % 8 == 0 {
            self.mask.push(0);
        }
        self.slots += 1;
        slot
    }

    fn push_present<T: Payload>(&mut self, item: &T) -> Result<()> {
        let slot = self.grow();
        self.mask[slot / 8] |= 1 << (slot % 8);
        item.encode(&mut self.payload)
    }

    fn push_close(&mut self) {
        self.grow();
    }

    fn flush<W: io::Write>(&mut self, w: &mut W) -> Result<()> {
        w.write_u16::<LittleEndian>(self.slots as u16)?;
        w.write_all(&self.mask)?;
        w.write_all(&self.payload)?;
        self.mask.clear();
        self.payload.clear();
        self.slots = 0;
        Ok(())
    }
}
