//! Error types for the DNS mirror
//!
//! This module defines all error types used throughout the crate.
//!
//! The variants fall into the failure classes the sync pass reacts to:
//!
//! - [`Error::Fetch`] / [`Error::Read`]: zone-level, abort the zone before any write
//! - [`Error::Write`]: record-level, recorded and skipped
//! - [`Error::Config`]: fatal before any zone is processed
//!
//! The remaining variants describe transport problems and are wrapped into one
//! of the classes above by the layer that observes them.

use thiserror::Error;

/// Result type alias for mirror operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DNS mirror
#[derive(Error, Debug)]
pub enum Error {
    /// Authoritative snapshot could not be fetched
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Local mirror snapshot could not be read
    #[error("Read failed: {0}")]
    Read(String),

    /// A single row could not be written
    #[error("Write failed: {0}")]
    Write(String),

    /// Mirror store errors outside of the read/write path (connect, schema check)
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (from authority APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Record or row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authority-specific error
    #[error("Authority error ({authority}): {message}")]
    Authority {
        /// Authority name
        authority: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create a fetch error
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create a read error
    pub fn read(msg: impl Into<String>) -> Self {
        Self::Read(msg.into())
    }

    /// Create a write error
    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an authority-specific error
    pub fn authority(authority: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Authority {
            authority: authority.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_display() {
        assert_eq!(Error::fetch("timeout").to_string(), "Fetch failed: timeout");
        assert_eq!(Error::read("reset").to_string(), "Read failed: reset");
        assert_eq!(Error::write("duplicate key").to_string(), "Write failed: duplicate key");
    }

    #[test]
    fn test_authority_error_display() {
        let err = Error::authority("aliyun", "InvalidAccessKeyId.NotFound");
        assert_eq!(
            err.to_string(),
            "Authority error (aliyun): InvalidAccessKeyId.NotFound"
        );
    }
}
