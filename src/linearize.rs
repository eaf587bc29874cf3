//! linearized compression of decay forests
//!
//! A save/load transform layered on the codec, not a different storage
//! structure. Many simulated decays end in long fringes of childless energy
//! deposits that travel rigidly along their parent's direction; those carry
//! no information beyond a time offset, an energy and a species, so the full
//! record is elided on save and rebuilt from the parent on load.
//!
//! A childless item is a *compression candidate* when it is a cascade with
//! default fit status and zero extent, moves at the reference speed exactly
//! along its parent's direction, and rigidly back-propagating it to the
//! parent's time lands on the parent's position within
//! [POSITION_TOLERANCE]. Candidates are judged against the original shape
//! only: one level of stripping per pass, so a record that was stripped is
//! never itself a candidate source.
//!
//! The round trip is lossy within stated bounds, by design: positions agree
//! to the tolerance, times and energies to single precision. Everything
//! else is exact.
//!
//! [POSITION_TOLERANCE]: ../particle/constant.POSITION_TOLERANCE.html
use crate::{
    codec,
    error::Error,
    particle::{
        distance, FitStatus, Particle, ParticleId, ParticleKind, Shape, C_LIGHT,
        POSITION_TOLERANCE,
    },
    Tree,
};
use anyhow::Result;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use fnv::FnvHashMap;
use std::io;
use tracing::debug;

/// Newest layer schema this module writes and reads.
pub const CURRENT_VERSION: u32 = 1;

/// Old layer schema addressing parents by flat pre-order index; loadable,
/// never written.
pub const LEGACY_VERSION: u32 = 0;

/// Compact stand-in for one stripped record.
struct Record {
    dt: f32,
    energy: f32,
    kind: i32,
    id: ParticleId,
}

fn compressible(parent: &Particle, p: &Particle) -> bool {
    p.shape == Shape::Cascade
        && p.status == FitStatus::NotSet
        && p.length == 0.0
        && p.speed == C_LIGHT
        && p.dir == parent.dir
        && {
            let dt = p.time - parent.time;
            let back = [
                p.pos[0] - p.speed * dt * p.dir[0],
                p.pos[1] - p.speed * dt * p.dir[1],
                p.pos[2] - p.speed * dt * p.dir[2],
            ];
            distance(&back, &parent.pos) <= POSITION_TOLERANCE
        }
}

/// Rebuild a stripped record from its parent by rigid propagation.
fn reconstruct(parent: &Particle, dt: f64, energy: f64, kind: ParticleKind, id: ParticleId) -> Particle {
    Particle {
        id,
        kind,
        shape: Shape::Cascade,
        status: FitStatus::NotSet,
        pos: [
            parent.pos[0] + C_LIGHT * dt * parent.dir[0],
            parent.pos[1] + C_LIGHT * dt * parent.dir[1],
            parent.pos[2] + C_LIGHT * dt * parent.dir[2],
        ],
        dir: parent.dir,
        time: parent.time + dt,
        energy,
        length: 0.0,
        speed: C_LIGHT,
    }
}

/// Re-insert a rebuilt record among the parent's surviving children in
/// ascending time order, by linear scan-and-insert.
fn insert_by_time(tree: &mut Tree<Particle>, parent: ParticleId, p: Particle) {
    let mut anchor = None;
    let mut cur = tree.first_child_key(parent);
    while let Some(k) = cur {
        if tree.at(k).unwrap().time > p.time {
            anchor = Some(k);
            break;
        }
        cur = tree.next_sibling_key(k);
    }
    match anchor {
        Some(k) => tree.insert_before(k, p),
        None => tree.append_child(parent, p),
    }
}

/// Serialize `tree` with compression candidates elided.
///
/// Walks the tree post-order, records every candidate grouped by parent
/// key, erases them from a working copy and hands the stripped tree to the
/// codec. A tree with no candidates embeds a byte-identical codec stream.
pub fn save<W: io::Write>(tree: &Tree<Particle>, w: &mut W, version: u32) -> Result<()> {
    match version {
        CURRENT_VERSION => {}
        LEGACY_VERSION => return Err(Error::ReadOnlyVersion(version).into()),
        found => {
            return Err(Error::UnsupportedVersion {
                found,
                current: CURRENT_VERSION,
            }
            .into())
        }
    }
    let mut stripped = tree.clone();
    let mut groups: Vec<(ParticleId, Vec<Record>)> = Vec::new();
    let mut group_of: FnvHashMap<ParticleId, usize> = FnvHashMap::default();
    let mut n_stripped = 0u64;
    for p in tree.post_order() {
        if tree.number_of_children(p.id) != 0 {
            continue;
        }
        let parent = match tree.parent(p.id) {
            Some(parent) => parent,
            None => continue,
        };
        if !compressible(parent, p) {
            continue;
        }
        let record = Record {
            dt: (p.time - parent.time) as f32,
            energy: p.energy as f32,
            kind: p.kind.code(),
            id: p.id,
        };
        let slot = match group_of.get(&parent.id) {
            Some(&slot) => slot,
            None => {
                groups.push((parent.id, Vec::new()));
                group_of.insert(parent.id, groups.len() - 1);
                groups.len() - 1
            }
        };
        groups[slot].1.push(record);
        stripped.erase(p.id);
        n_stripped += 1;
    }
    debug!(
        "linearized {} of {} items into {} groups",
        n_stripped,
        tree.size(),
        groups.len()
    );

    w.write_u32::<LittleEndian>(CURRENT_VERSION)?;
    w.write_u64::<LittleEndian>(groups.len() as u64)?;
    for (parent, records) in groups.iter() {
        w.write_u64::<LittleEndian>(parent.major)?;
        w.write_i32::<LittleEndian>(parent.minor)?;
        w.write_u32::<LittleEndian>(records.len() as u32)?;
        for r in records.iter() {
            w.write_f32::<LittleEndian>(r.dt)?;
            w.write_f32::<LittleEndian>(r.energy)?;
            w.write_i32::<LittleEndian>(r.kind)?;
            w.write_u64::<LittleEndian>(r.id.major)?;
            w.write_i32::<LittleEndian>(r.id.minor)?;
        }
    }
    codec::save(&stripped, w, codec::CURRENT_VERSION)
}

/// Deserialize a linearized tree, rebuilding every stripped record.
pub fn load<R: io::Read>(r: &mut R) -> Result<Tree<Particle>> {
    let version = r.read_u32::<LittleEndian>()?;
    match version {
        CURRENT_VERSION => load_current(r),
        LEGACY_VERSION => load_legacy(r),
        found => Err(Error::UnsupportedVersion {
            found,
            current: CURRENT_VERSION,
        }
        .into()),
    }
}

fn load_current<R: io::Read>(r: &mut R) -> Result<Tree<Particle>> {
    let n_groups = r.read_u64::<LittleEndian>()?;
    let mut groups: Vec<(ParticleId, Vec<Record>)> = Vec::new();
    for _ in 0..n_groups {
        let parent = ParticleId::new(
            r.read_u64::<LittleEndian>()?,
            r.read_i32::<LittleEndian>()?,
        );
        let n_records = r.read_u32::<LittleEndian>()?;
        let mut records = Vec::with_capacity(n_records as usize);
        for _ in 0..n_records {
            records.push(Record {
                dt: r.read_f32::<LittleEndian>()?,
                energy: r.read_f32::<LittleEndian>()?,
                kind: r.read_i32::<LittleEndian>()?,
                id: ParticleId::new(
                    r.read_u64::<LittleEndian>()?,
                    r.read_i32::<LittleEndian>()?,
                ),
            });
        }
        groups.push((parent, records));
    }
    let mut tree = codec::load::<Particle, _>(r)?;
    let mut n_rebuilt = 0u64;
    for (parent_key, records) in groups.iter() {
        if !tree.contains(*parent_key) {
            return Err(Error::UnknownParent.into());
        }
        for rec in records.iter() {
            if tree.contains(rec.id) {
                return Err(Error::DuplicateKey.into());
            }
            let parent = tree.at(*parent_key).unwrap().clone();
            let p = reconstruct(
                &parent,
                rec.dt as f64,
                rec.energy as f64,
                ParticleKind::from_code(rec.kind),
                rec.id,
            );
            insert_by_time(&mut tree, *parent_key, p);
            n_rebuilt += 1;
        }
    }
    debug!("rebuilt {} stripped records", n_rebuilt);
    Ok(tree)
}

/// Old layer schema: groups address their parent by flat pre-order index
/// into the stripped tree, records carry only the minor id and inherit the
/// major id from the parent.
fn load_legacy<R: io::Read>(r: &mut R) -> Result<Tree<Particle>> {
    struct LegacyRecord {
        dt: f32,
        energy: f32,
        kind: i32,
        minor: i32,
    }
    let n_groups = r.read_u64::<LittleEndian>()?;
    let mut groups: Vec<(u32, Vec<LegacyRecord>)> = Vec::new();
    for _ in 0..n_groups {
        let parent_index = r.read_u32::<LittleEndian>()?;
        let n_records = r.read_u32::<LittleEndian>()?;
        let mut records = Vec::with_capacity(n_records as usize);
        for _ in 0..n_records {
            records.push(LegacyRecord {
                dt: r.read_f32::<LittleEndian>()?,
                energy: r.read_f32::<LittleEndian>()?,
                kind: r.read_i32::<LittleEndian>()?,
                minor: r.read_i32::<LittleEndian>()?,
            });
        }
        groups.push((parent_index, records));
    }
    let mut tree = codec::load::<Particle, _>(r)?;
    let pre_order_keys: Vec<ParticleId> = tree.pre_order().map(|p| p.id).collect();
    for (parent_index, records) in groups.iter() {
        let parent_key = *pre_order_keys
            .get(*parent_index as usize)
            .ok_or(Error::UnknownParent)?;
        for rec in records.iter() {
            let parent = tree.at(parent_key).unwrap().clone();
            let id = ParticleId::new(parent.id.major, rec.minor);
            if tree.contains(id) {
                return Err(Error::DuplicateKey.into());
            }
            let p = reconstruct(
                &parent,
                rec.dt as f64,
                rec.energy as f64,
                ParticleKind::from_code(rec.kind),
                id,
            );
            insert_by_time(&mut tree, parent_key, p);
        }
    }
    Ok(tree)
}
