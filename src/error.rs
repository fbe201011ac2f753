//! Error types for lockout.
//!
//! Limiter operations themselves cannot fail; these errors come from the
//! configuration layer around them.

use thiserror::Error;

/// Main error type for lockout operations.
#[derive(Error, Debug)]
pub enum LockoutError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for lockout operations.
pub type Result<T> = std::result::Result<T, LockoutError>;
