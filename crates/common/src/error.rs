//! Common error types for the mirror node crates.
//!
//! This module provides the unified error type [`enum@Error`] and the
//! convenience alias [`Result`] used by the shared types in this crate.
//! Crates with richer failure modes define their own error enums and wrap
//! this one where needed.
//!
//! # Example
//!
//! ```rust
//! use mirror_common::{Error, Result};
//!
//! fn validate_data(data: &[u8]) -> Result<()> {
//!     if data.is_empty() {
//!         return Err(Error::InvalidData("data cannot be empty".to_string()));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// A type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for shared mirror node types.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    ///
    /// Occurs when configuration is invalid or cannot be parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid data error.
    ///
    /// Occurs when data fails validation (wrong format, out of range, etc.).
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Invalid entity identifier.
    #[error("Invalid entity id: {0}")]
    InvalidEntityId(String),

    /// Invalid timestamp.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Resource not found error.
    #[error("Not found: {0}")]
    NotFound(String),
}
