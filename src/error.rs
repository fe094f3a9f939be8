//! Typed error taxonomy for the volume codec.
//!
//! Library code returns `Result<T, VolumeError>` so the force-decrypt downgrade logic and the
//! retry-repair loop can match on a specific kind instead of downcasting a string. The CLI binary
//! converts these into `anyhow::Error` at the boundary, which is the conventional place for a tool
//! in this shape to stop being type-specific about errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("access denied opening {path} for {op}")]
    AccessDenied { path: String, op: AccessOp },

    #[error("insufficient space writing {path}")]
    InsufficientSpace { path: String },

    #[error("header damaged: {field} failed Reed-Solomon decode")]
    HeaderDamaged { field: &'static str },

    #[error("incorrect password")]
    BadPassword,

    #[error("incorrect or missing keyfile(s)")]
    BadKeyfile { ordering_sensitive: bool },

    #[error("duplicate keyfiles cancel out to an all-zero composite")]
    DuplicateKeyfiles,

    #[error("volume was modified: authentication tag mismatch")]
    Modified,

    #[error("irrecoverable: Reed-Solomon repair decode failed")]
    Irrecoverable,

    #[error("operation cancelled")]
    Cancelled,

    #[error("random number generator returned an all-zero output")]
    RngFailure,

    #[error("key derivation function returned an all-zero output")]
    KdfFailure,

    #[error("archive entry {entry} would escape the extraction directory")]
    PathEscape { entry: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOp {
    Read,
    Write,
}

impl std::fmt::Display for AccessOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessOp::Read => f.write_str("read"),
            AccessOp::Write => f.write_str("write"),
        }
    }
}

impl VolumeError {
    /// Kinds that force-decrypt ("keep") downgrades from fatal to a warning with best-effort
    /// output, per the error handling design.
    pub fn is_downgradable(&self) -> bool {
        matches!(
            self,
            VolumeError::HeaderDamaged { .. }
                | VolumeError::BadPassword
                | VolumeError::BadKeyfile { .. }
                | VolumeError::Modified
                | VolumeError::Irrecoverable
        )
    }
}
