use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RigbyError>;

/// Fatal restore errors. The first one raised during the parallel phase
/// aborts the run; files already committed stay on disk.
#[derive(Error, Debug)]
pub enum RigbyError {
    #[error("manifest {source_name}: {reason}")]
    Manifest { source_name: String, reason: String },

    #[error("unsupported manifest format in {source_name}: {found} (expected {expected})")]
    UnsupportedFormat {
        source_name: String,
        found: String,
        expected: String,
    },

    #[error("manifest path escapes output directory: {path}")]
    PathSafety { path: String },

    #[error("chunk unavailable: {rel}: {reason}")]
    ChunkUnavailable { rel: String, reason: String },

    #[error("chunk hash mismatch: {rel}")]
    ChunkIntegrity { rel: String },

    #[error("codec {codec}: {reason}")]
    Codec { codec: String, reason: String },

    #[error("file {what} mismatch: {path}")]
    FileIntegrity { path: PathBuf, what: String },

    #[error("invalid chunk range for file: {path}")]
    InvalidChunkRange { path: String },

    #[error("scheduler: {reason}")]
    Scheduler { reason: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl RigbyError {
    pub fn manifest(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        RigbyError::Manifest { source_name: source_name.into(), reason: reason.into() }
    }

    pub fn codec(codec: impl Into<String>, reason: impl Into<String>) -> Self {
        RigbyError::Codec { codec: codec.into(), reason: reason.into() }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RigbyError::Io { path: path.into(), source }
    }
}
