//! Error types for tw
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown task, uninitialized tracker)
//! - 3: Conflict (session exclusivity would be violated)
//! - 4: Operation failed (storage, locking)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the tw CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const CONFLICT: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for tw operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("{0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No time tracker found from {0}")]
    NotInitialized(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Conflicts (exit code 3)
    #[error("{0}")]
    Conflict(String),

    // Operation failures (exit code 4)
    //
    // UniqueViolation is raised by the record store when the open-session
    // constraint would be broken. The session ledger translates it into
    // Conflict before it can reach a caller.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::NotFound(_)
            | Error::InvalidArgument(_)
            | Error::NotInitialized(_)
            | Error::InvalidConfig(_) => exit_codes::USER_ERROR,

            // Conflicts
            Error::Conflict(_) => exit_codes::CONFLICT,

            // Operation failures
            Error::UniqueViolation(_)
            | Error::LockFailed(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Stable kind string for JSON output; callers branch on this
    /// rather than parsing messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::NotInitialized(_) => "not_initialized",
            Error::InvalidConfig(_) => "invalid_config",
            _ => "operation_failed",
        }
    }
}

/// Result type alias for tw operations
pub type Result<T> = std::result::Result<T, Error>;
