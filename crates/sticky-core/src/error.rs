//! Error taxonomy shared by every Sticky crate.
//!
//! Expected business conditions (a lost race, an exhausted pool, an already
//! unlocked unit) are *outcomes* and never show up here. These variants cover
//! lookups that fail, malformed arguments, storage failures and corrupted
//! invariants.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StickyError {
    /// Unknown id, name or key.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed unit index, unknown category, non-forward delay, bad time.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Stored state contradicts an invariant (e.g. an occupied party without
    /// an unfinished visit).
    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StickyError>;

impl StickyError {
    pub fn not_found(what: &str, key: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{what} '{key}'"))
    }
}
