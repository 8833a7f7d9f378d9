//! Global error handling for archive-audit
//!
//! One error type covers every failure the batch engine can surface. Fatal
//! variants abort the run, local ones are recorded and the run continues.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Global error type for archive-audit operations
#[derive(Error, Debug)]
pub enum AuditError {
    /// Scan root is missing or not a directory
    #[error("Invalid root directory: {}", .0.display())]
    InvalidRoot(PathBuf),

    /// The lookup service rejected a request
    #[error("Request error (HTTP {status}): {body}")]
    Request {
        /// HTTP status returned by the server
        status: u16,
        /// Response body, verbatim
        body: String,
    },

    /// Network failure talking to the lookup service
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A single file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Filesystem {
        /// Offending path
        path: PathBuf,
        /// Underlying IO error
        source: io::Error,
    },

    /// Results could not be written
    #[error("Export error: {0}")]
    Export(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// User-facing grouping of errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Some files could not be checked because the server rejected a request
    Server,
    /// Some files could not be checked because the service was unreachable
    Network,
    /// Some files could not be read locally
    Local,
    /// Results could not be saved to disk
    Save,
    /// The run could not start
    Setup,
}

impl AuditError {
    /// Whether this error aborts the remaining batch
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Request { .. } | Self::Transport(_))
    }

    /// Category used to phrase the message shown to the user
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Request { .. } => ErrorCategory::Server,
            Self::Transport(_) => ErrorCategory::Network,
            Self::Filesystem { .. } => ErrorCategory::Local,
            Self::Export(_) => ErrorCategory::Save,
            Self::InvalidRoot(_) | Self::Config(_) => ErrorCategory::Setup,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Server => "some files could not be checked because the server rejected a request",
            Self::Network => "some files could not be checked because the server could not be reached",
            Self::Local => "some files could not be read locally",
            Self::Save => "results could not be saved to disk",
            Self::Setup => "the audit could not be started",
        };
        f.write_str(text)
    }
}

/// Specialized Result type for archive-audit operations
pub type Result<T> = std::result::Result<T, AuditError>;

/// Creates an AuditError with a formatted message
#[macro_export]
macro_rules! error {
    ($error_type:ident, $($arg:tt)*) => {
        $crate::error::AuditError::$error_type(format!($($arg)*))
    };
}

/// Returns an error result with a formatted message
#[macro_export]
macro_rules! bail {
    ($error_type:ident, $($arg:tt)*) => {
        return Err($crate::error!($error_type, $($arg)*))
    };
}

/// Ensures a condition is true, otherwise returns an error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $error_type:ident, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($error_type, $($arg)*)
        }
    };
}

// Allow converting AuditError to io::Error for callers working in io::Result
impl From<AuditError> for io::Error {
    fn from(err: AuditError) -> Self {
        io::Error::new(io::ErrorKind::Other, err.to_string())
    }
}
