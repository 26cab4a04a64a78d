use thiserror::Error;

/// Error taxonomy for KAS store operations.
///
/// Kinds are stable across versions: callers may match on variants, but
/// the `Display` text is a developer-facing diagnostic, not curated
/// end-user copy (that rendering is an external collaborator, see the
/// crate's top-level docs).
#[derive(Error, Debug)]
pub enum KasError {
    #[error("internal error")]
    Generic,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid open mode or flags")]
    BadMode,

    #[error("allocation failed")]
    NoMemory,

    #[error("malformed KAS file: {0}")]
    BadFileFormat(String),

    #[error("file major version {found} is older than the supported major {supported}")]
    VersionTooOld { found: u16, supported: u16 },

    #[error("file major version {found} is newer than the supported major {supported}")]
    VersionTooNew { found: u16, supported: u16 },

    #[error("invalid element type code {0}")]
    BadType(u8),

    #[error("duplicate key")]
    DuplicateKey,

    #[error("key not found")]
    KeyNotFound,

    #[error("empty key")]
    EmptyKey,

    #[error("array is {actual} bytes, expected {expected} ({array_len} elements of width {width})")]
    ArrayLengthMismatch {
        expected: u64,
        actual: u64,
        array_len: u64,
        width: u64,
    },
}

pub type Result<T> = std::result::Result<T, KasError>;
