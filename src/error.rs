//! data errors raised by the serialization layers
//!
//! Contract violations by in-process callers (duplicate-key inserts, missing
//! anchors, key collisions on subtree copies) panic instead. Only external
//! input, i.e. a byte stream, produces these values.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported format version {}, current is {}", .found, .current)]
    UnsupportedVersion { found: u32, current: u32 },

    #[error("version {} archives are read-only", .0)]
    ReadOnlyVersion(u32),

    #[error("duplicate key in stream")]
    DuplicateKey,

    #[error("truncated stream: {}", .0)]
    Truncated(&'static str),

    #[error("item count mismatch: header says {}, stream holds {}", .expected, .found)]
    CountMismatch { expected: u64, found: u64 },

    #[error("stripped record group references an unknown parent")]
    UnknownParent,

    #[error("invalid {} code {} in stream", .what, .code)]
    InvalidCode { what: &'static str, code: i32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
