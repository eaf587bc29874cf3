//! particle records stored in decay forests
//!
//! A [Particle] is one record of a simulated or reconstructed decay: an
//! identity, a species code, a geometric shape class, and the kinematic state
//! (vertex position, unit direction, time, energy, track length, speed).
//! Particles carry their own [ParticleId]; the tree never synthesizes keys.
//!
//! [Particle]: struct.Particle.html
//! [ParticleId]: struct.ParticleId.html
use crate::{codec::Payload, error::Error, query, tree::TreeItem, Tree};
use anyhow::Result;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use derive_more::{Display, From};
use std::{fmt, io};

/// Vacuum speed of light in length units per time unit (m/ns).
pub const C_LIGHT: f64 = 0.299_792_458;

/// Position tolerance for linearized compression, in length units.
///
/// Fixed rather than configurable: changing it would silently change which
/// archives round-trip.
pub const POSITION_TOLERANCE: f64 = 0.5;

/// Unique identity of a particle within one tree.
///
/// The major id identifies the generating run/event context, the minor id the
/// particle within it. Identity is value equality of the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Display)]
#[display(fmt = "{}/{}", major, minor)]
pub struct ParticleId {
    pub major: u64,
    pub minor: i32,
}

impl ParticleId {
    pub fn new(major: u64, minor: i32) -> Self {
        Self { major, minor }
    }
}

/// Particle species, following the PDG numbering scheme.
///
/// Codes not in the known set survive round trips as [ParticleKind::Other];
/// archives written by newer code must stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleKind {
    Unknown,
    Gamma,
    EPlus,
    EMinus,
    MuPlus,
    MuMinus,
    TauPlus,
    TauMinus,
    NuE,
    NuEBar,
    NuMu,
    NuMuBar,
    NuTau,
    NuTauBar,
    Pi0,
    PiPlus,
    PiMinus,
    KPlus,
    KMinus,
    Proton,
    Neutron,
    Other(i32),
}

impl ParticleKind {
    /// PDG code of this species.
    pub fn code(self) -> i32 {
        use ParticleKind::*;
        match self {
            Unknown => 0,
            Gamma => 22,
            EPlus => -11,
            EMinus => 11,
            MuPlus => -13,
            MuMinus => 13,
            TauPlus => -15,
            TauMinus => 15,
            NuE => 12,
            NuEBar => -12,
            NuMu => 14,
            NuMuBar => -14,
            NuTau => 16,
            NuTauBar => -16,
            Pi0 => 111,
            PiPlus => 211,
            PiMinus => -211,
            KPlus => 321,
            KMinus => -321,
            Proton => 2212,
            Neutron => 2112,
            Other(code) => code,
        }
    }

    /// Species for a PDG code. Never produces `Other` for a known code, so
    /// round-tripped values compare equal.
    pub fn from_code(code: i32) -> Self {
        use ParticleKind::*;
        match code {
            0 => Unknown,
            22 => Gamma,
            -11 => EPlus,
            11 => EMinus,
            -13 => MuPlus,
            13 => MuMinus,
            -15 => TauPlus,
            15 => TauMinus,
            12 => NuE,
            -12 => NuEBar,
            14 => NuMu,
            -14 => NuMuBar,
            16 => NuTau,
            -16 => NuTauBar,
            111 => Pi0,
            211 => PiPlus,
            -211 => PiMinus,
            321 => KPlus,
            -321 => KMinus,
            2212 => Proton,
            2112 => Neutron,
            other => Other(other),
        }
    }
}

/// Geometric shape class of a particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// no shape assigned yet
    Default,
    /// a primary, i.e. the root of a decay
    Primary,
    /// a localized energy deposit
    Cascade,
    /// an extended track
    Track,
    /// present in the record but invisible to detection
    Dark,
}

impl Shape {
    pub fn code(self) -> i32 {
        match self {
            Shape::Default => 0,
            Shape::Primary => 10,
            Shape::Cascade => 20,
            Shape::Track => 30,
            Shape::Dark => 40,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Shape::Default),
            10 => Some(Shape::Primary),
            20 => Some(Shape::Cascade),
            30 => Some(Shape::Track),
            40 => Some(Shape::Dark),
            _ => None,
        }
    }
}

/// Outcome of the fit that produced a particle, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStatus {
    /// not a fit result
    NotSet,
    Ok,
    InsufficientQuality,
    FailedToConverge,
}

impl FitStatus {
    pub fn code(self) -> i32 {
        match self {
            FitStatus::NotSet => -1,
            FitStatus::Ok => 0,
            FitStatus::InsufficientQuality => 10,
            FitStatus::FailedToConverge => 20,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(FitStatus::NotSet),
            0 => Some(FitStatus::Ok),
            10 => Some(FitStatus::InsufficientQuality),
            20 => Some(FitStatus::FailedToConverge),
            _ => None,
        }
    }
}

/// One record of a decay: identity, species, shape and kinematic state.
///
/// `dir` is a unit vector. `speed` defaults to [C_LIGHT]; `time` is measured
/// at the vertex `pos`.
///
/// [C_LIGHT]: constant.C_LIGHT.html
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub id: ParticleId,
    pub kind: ParticleKind,
    pub shape: Shape,
    pub status: FitStatus,
    pub pos: [f64; 3],
    pub dir: [f64; 3],
    pub time: f64,
    pub energy: f64,
    pub length: f64,
    pub speed: f64,
}

impl Particle {
    pub fn new(id: ParticleId, kind: ParticleKind) -> Self {
        Self {
            id,
            kind,
            shape: Shape::Default,
            status: FitStatus::NotSet,
            pos: [0.0; 3],
            dir: [0.0, 0.0, 1.0],
            time: 0.0,
            energy: 0.0,
            length: 0.0,
            speed: C_LIGHT,
        }
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_status(mut self, status: FitStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_pos(mut self, pos: [f64; 3]) -> Self {
        self.pos = pos;
        self
    }

    pub fn with_dir(mut self, dir: [f64; 3]) -> Self {
        self.dir = dir;
        self
    }

    pub fn with_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    pub fn with_energy(mut self, energy: f64) -> Self {
        self.energy = energy;
        self
    }

    pub fn with_length(mut self, length: f64) -> Self {
        self.length = length;
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Vertex position after rigid propagation along `dir` for `dt` time
    /// units at this particle's speed.
    pub fn propagated(&self, dt: f64) -> [f64; 3] {
        [
            self.pos[0] + self.speed * dt * self.dir[0],
            self.pos[1] + self.speed * dt * self.dir[1],
            self.pos[2] + self.speed * dt * self.dir[2],
        ]
    }
}

impl fmt::Display for Particle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} {:?} E={} t={}",
            self.id, self.kind, self.shape, self.energy, self.time
        )
    }
}

impl TreeItem for Particle {
    type Key = ParticleId;

    fn key(&self) -> ParticleId {
        self.id
    }
}

impl Payload for Particle {
    fn encode<W: io::Write>(&self, w: &mut W) -> Result<()> {
        w.write_u64::<LittleEndian>(self.id.major)?;
        w.write_i32::<LittleEndian>(self.id.minor)?;
        w.write_i32::<LittleEndian>(self.kind.code())?;
        w.write_i32::<LittleEndian>(self.shape.code())?;
        w.write_i32::<LittleEndian>(self.status.code())?;
        for x in self.pos.iter().chain(self.dir.iter()) {
            w.write_f64::<LittleEndian>(*x)?;
        }
        w.write_f64::<LittleEndian>(self.time)?;
        w.write_f64::<LittleEndian>(self.energy)?;
        w.write_f64::<LittleEndian>(self.length)?;
        w.write_f64::<LittleEndian>(self.speed)?;
        Ok(())
    }

    fn decode<R: io::Read>(r: &mut R) -> Result<Self> {
        let major = r.read_u64::<LittleEndian>()?;
        let minor = r.read_i32::<LittleEndian>()?;
        let kind = ParticleKind::from_code(r.read_i32::<LittleEndian>()?);
        let shape_code = r.read_i32::<LittleEndian>()?;
        let shape = Shape::from_code(shape_code).ok_or(Error::InvalidCode {
            what: "shape",
            code: shape_code,
        })?;
        let status_code = r.read_i32::<LittleEndian>()?;
        let status = FitStatus::from_code(status_code).ok_or(Error::InvalidCode {
            what: "fit status",
            code: status_code,
        })?;
        let mut pos = [0.0; 3];
        let mut dir = [0.0; 3];
        for x in pos.iter_mut().chain(dir.iter_mut()) {
            *x = r.read_f64::<LittleEndian>()?;
        }
        Ok(Particle {
            id: ParticleId::new(major, minor),
            kind,
            shape,
            status,
            pos,
            dir,
            time: r.read_f64::<LittleEndian>()?,
            energy: r.read_f64::<LittleEndian>()?,
            length: r.read_f64::<LittleEndian>()?,
            speed: r.read_f64::<LittleEndian>()?,
        })
    }
}

/// Euclidean distance between two vertex positions.
pub(crate) fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// The single most energetic particle of the tree, if any.
pub fn most_energetic(tree: &Tree<Particle>) -> Option<&Particle> {
    query::best(tree, |a, b| a.energy > b.energy)
}

/// The most energetic particle of the given species.
pub fn most_energetic_of(tree: &Tree<Particle>, kind: ParticleKind) -> Option<&Particle> {
    query::best_filter(tree, |p| p.kind == kind, |a, b| a.energy > b.energy)
}

/// The most energetic cascade of the tree.
pub fn most_energetic_cascade(tree: &Tree<Particle>) -> Option<&Particle> {
    query::best_filter(tree, |p| p.shape == Shape::Cascade, |a, b| a.energy > b.energy)
}

/// The most energetic primary, i.e. considering only the roots.
pub fn most_energetic_primary(tree: &Tree<Particle>) -> Option<&Particle> {
    let mut best: Option<&Particle> = None;
    for p in tree.get_heads() {
        match best {
            Some(b) if p.energy > b.energy => best = Some(p),
            None => best = Some(p),
            _ => {}
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_round_trip() {
        for kind in [
            ParticleKind::Unknown,
            ParticleKind::Gamma,
            ParticleKind::MuMinus,
            ParticleKind::NuTauBar,
            ParticleKind::Proton,
            ParticleKind::Other(9999),
        ]
        .iter()
        {
            assert_eq!(ParticleKind::from_code(kind.code()), *kind);
        }
        // a known code never decodes to Other
        assert_eq!(ParticleKind::from_code(22), ParticleKind::Gamma);
    }

    #[test]
    fn propagation_is_rigid() {
        let p = Particle::new(ParticleId::new(1, 1), ParticleKind::Gamma)
            .with_pos([1.0, 2.0, 3.0])
            .with_dir([0.0, 1.0, 0.0])
            .with_speed(2.0);
        assert_eq!(p.propagated(3.0), [1.0, 8.0, 3.0]);
    }
}
