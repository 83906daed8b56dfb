//! Error types module
//!
//! Two families live here. `RejectionKind` is the closed taxonomy of terminal upload
//! rejections handed back to callers; every kind is safe to surface to the uploading user.
//! `AppError` covers internal faults (configuration, policy records, I/O). The validator never
//! returns one: staging and scanner faults surface as `RejectionKind::ScanUnavailable`.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected rejections like a wrong extension
    Debug,
    /// Warning level - for hostile or suspicious payloads
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
/// This trait allows errors to self-describe their HTTP response characteristics
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "TOO_LARGE")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Why an upload was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionKind {
    /// Neither a file nor an image payload was supplied.
    Empty,
    /// The declared extension is not on the allow-list.
    DisallowedExtension,
    /// The selected file type does not match the declared extension.
    TypeMismatch,
    /// The payload exceeds the size limit.
    TooLarge,
    /// The declared content type is not on the allow-list.
    DisallowedContentType,
    /// The scanner reported the payload as infected.
    MalwareDetected,
    /// The scan could not produce a verdict (engine missing, timeout, I/O failure).
    ScanUnavailable,
}

impl RejectionKind {
    pub const ALL: [RejectionKind; 7] = [
        RejectionKind::Empty,
        RejectionKind::DisallowedExtension,
        RejectionKind::TypeMismatch,
        RejectionKind::TooLarge,
        RejectionKind::DisallowedContentType,
        RejectionKind::MalwareDetected,
        RejectionKind::ScanUnavailable,
    ];
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.error_code())
    }
}

/// Static metadata for each kind: (http_status, error_code, recoverable, suggested_action, log_level).
fn rejection_static_metadata(
    kind: &RejectionKind,
) -> (u16, &'static str, bool, Option<&'static str>, LogLevel) {
    match kind {
        RejectionKind::Empty => (
            400,
            "EMPTY",
            false,
            Some("Attach a file or an image"),
            LogLevel::Debug,
        ),
        RejectionKind::DisallowedExtension => (
            400,
            "DISALLOWED_EXTENSION",
            false,
            Some("Upload a file with a permitted extension"),
            LogLevel::Debug,
        ),
        RejectionKind::TypeMismatch => (
            400,
            "TYPE_MISMATCH",
            false,
            Some("Select the file type that matches the uploaded file"),
            LogLevel::Debug,
        ),
        RejectionKind::TooLarge => (
            413,
            "TOO_LARGE",
            false,
            Some("Reduce the file size and try again"),
            LogLevel::Debug,
        ),
        RejectionKind::DisallowedContentType => (
            400,
            "DISALLOWED_CONTENT_TYPE",
            false,
            Some("Upload a file of a permitted type"),
            LogLevel::Debug,
        ),
        RejectionKind::MalwareDetected => (422, "MALWARE_DETECTED", false, None, LogLevel::Warn),
        RejectionKind::ScanUnavailable => (
            503,
            "SCAN_UNAVAILABLE",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
    }
}

impl ErrorMetadata for RejectionKind {
    fn http_status_code(&self) -> u16 {
        rejection_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        rejection_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        rejection_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        rejection_static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            RejectionKind::Empty => "You must upload a file or image.",
            RejectionKind::DisallowedExtension => "This file type is not allowed.",
            RejectionKind::TypeMismatch => "Selected file type does not match the file extension.",
            RejectionKind::TooLarge => "The file exceeds the maximum allowed size.",
            RejectionKind::DisallowedContentType => "This file format is not allowed.",
            RejectionKind::MalwareDetected => "The file was rejected by the security scan.",
            RejectionKind::ScanUnavailable => {
                "The file could not be checked right now. Please try again later."
            }
        }
        .to_string()
    }

    // Rejections never carry engine output; the diagnostic text travels separately.
    fn is_sensitive(&self) -> bool {
        false
    }

    fn log_level(&self) -> LogLevel {
        rejection_static_metadata(self).4
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidPolicy(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidPolicy(format!("Validation error: {}", err))
    }
}
