//! Shared error type across scopewatch crates.
//!
//! Scope operations themselves never fail; these errors only surface while
//! wiring a tracer or loading configuration.

use thiserror::Error;

/// Stable error codes (safe to match on or log).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Missing collaborator or invalid tracer options.
    Config,
    /// Malformed or out-of-range configuration document.
    InvalidConfig,
    /// Unsupported configuration version.
    UnsupportedVersion,
    /// Internal failure (I/O, serialization).
    Internal,
}

impl ErrorCode {
    /// String representation used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Config => "CONFIG",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, ScopeError>;

/// Unified error type used by core and the http layer.
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl ScopeError {
    /// Map to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            ScopeError::Config(_) => ErrorCode::Config,
            ScopeError::InvalidConfig(_) => ErrorCode::InvalidConfig,
            ScopeError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            ScopeError::Internal(_) => ErrorCode::Internal,
        }
    }
}
