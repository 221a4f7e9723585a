//! Error types for price_refresher

use std::fmt;

/// Unified error type for refresher operations
#[derive(Debug)]
pub enum RefreshError {
    /// File I/O error
    Io(std::io::Error),
    /// HTTP request failed (network error, timeout, etc.)
    Network(reqwest::Error),
    /// Failed to parse JSON
    Parse(serde_json::Error),
    /// Catalog or input file failed schema validation (exit code 2)
    Schema(String),
    /// Configuration invalid or missing (exit code 2)
    Config(String),
    /// Another instance holds the single-instance lock
    LockHeld(String),
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshError::Io(e) => write!(f, "I/O error: {}", e),
            RefreshError::Network(e) => write!(f, "Network error: {}", e),
            RefreshError::Parse(e) => write!(f, "Parse error: {}", e),
            RefreshError::Schema(msg) => write!(f, "Schema error: {}", msg),
            RefreshError::Config(msg) => write!(f, "Config error: {}", msg),
            RefreshError::LockHeld(path) => {
                write!(f, "Another instance is already running (lock held): {}", path)
            }
        }
    }
}

impl std::error::Error for RefreshError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RefreshError::Io(e) => Some(e),
            RefreshError::Network(e) => Some(e),
            RefreshError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RefreshError {
    fn from(err: std::io::Error) -> Self {
        RefreshError::Io(err)
    }
}

impl From<reqwest::Error> for RefreshError {
    fn from(err: reqwest::Error) -> Self {
        RefreshError::Network(err)
    }
}

impl From<serde_json::Error> for RefreshError {
    fn from(err: serde_json::Error) -> Self {
        RefreshError::Parse(err)
    }
}

impl RefreshError {
    /// Process exit code for this error per the CLI contract:
    /// 2 for configuration/schema problems, 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            RefreshError::Schema(_) | RefreshError::Config(_) => 2,
            _ => 1,
        }
    }
}

/// Result alias for refresher operations
pub type Result<T> = std::result::Result<T, RefreshError>;
