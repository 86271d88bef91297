//! Error taxonomy (§7).
//!
//! Detected-by-caller errors surface through [`CoreError`]; detected-by-worker
//! errors are stored in the container's poison cell (see [`crate::container`])
//! instead of terminating the process, per the redesign note in §9.

use thiserror::Error;

/// Unified error type returned by every public `braidstream` entry point.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("short transfer: expected {expected} bytes, moved {moved} before giving up")]
    ShortTransfer { expected: u64, moved: u64 },

    #[error("codec error: {0}")]
    Codec(String),

    #[error("format error: {0}")]
    Format(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("resource error: {0}")]
    Resource(String),

    #[error("container poisoned by a prior worker failure: {0}")]
    Poisoned(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
