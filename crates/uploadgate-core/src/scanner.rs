//! Content scanner abstraction
//!
//! Implementations wrap an external engine. They must never report `Clean` unless the engine
//! said so unambiguously; anything else is `Infected` or `ScanError`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::models::ScanVerdict;

/// Default cap on engine output kept as diagnostic text.
pub const DEFAULT_MAX_DIAGNOSTIC_BYTES: usize = 64 * 1024;

const TRUNCATION_MARKER: &str = "... [output truncated]";

#[async_trait]
pub trait ScannerAdapter: Send + Sync {
    /// Scan the file at `path`, giving up after `timeout`.
    ///
    /// Does not delete the file.
    async fn scan(&self, path: &Path, timeout: Duration) -> ScanVerdict;

    /// Short engine name for logs.
    fn name(&self) -> &'static str;

    /// Whether the engine looks reachable. Informational only; a failing check does not
    /// change how verdicts are produced.
    async fn health_check(&self) -> bool;
}

/// Decode engine output lossily and cap it at `limit` bytes on a char boundary.
pub fn bounded_diagnostic(raw: &[u8], limit: usize) -> String {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if trimmed.len() <= limit {
        return trimmed.to_string();
    }

    let mut end = limit;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &trimmed[..end], TRUNCATION_MARKER)
}
