pub mod chunk_store;
pub mod error;
pub mod hashing;
pub mod layout;
pub mod manifest;
pub mod progress;
pub mod restore;
pub mod scheduler;
pub mod stats;

pub use error::{Result, RigbyError};

/// Manifest format understood by this engine. Anything else is rejected
/// before any restore work starts.
pub const FORMAT_VERSION: &str = "rigby-v1";
