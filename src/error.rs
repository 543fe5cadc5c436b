//! Error types for backflow.
//!
//! Only construction can fail. Panics raised by user callbacks are not
//! errors of this crate and travel to the caller unchanged.

use thiserror::Error;

/// Misuse detected while building a store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// An origin list or derivation was given no stores at all.
    #[error("at least one origin store is required")]
    NoOrigins,

    /// A property path store was given no keys.
    #[error("property path must contain at least one key")]
    EmptyPath,
}

/// Result alias for fallible constructors.
pub type Result<T> = std::result::Result<T, StoreError>;
