//! Error types for the front-end core.

use thiserror::Error;

/// Errors that can occur while dispatching, resolving or persisting.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{reason}")]
    Fetch { url: String, reason: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Persistence not supported")]
    Unsupported,

    #[error("No machine attached")]
    NoMachine,

    #[error("Lock poisoned")]
    LockPoisoned,

    #[error("Invalid drive: {0}")]
    InvalidDrive(usize),

    /// The snapshot and the live configuration disagree on the F18A.
    /// `required` is the value the setting must have before restoring.
    #[error("Please {} F18A before restoring the state", toggle_verb(.required))]
    F18aMismatch { required: bool },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn toggle_verb(required: &bool) -> &'static str {
    if *required {
        "enable"
    } else {
        "disable"
    }
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
