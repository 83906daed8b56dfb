use clamav_client::{clean, Tcp};
use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use uploadgate_core::scanner::DEFAULT_MAX_DIAGNOSTIC_BYTES;
use uploadgate_core::{bounded_diagnostic, ScanOutcome, ScanVerdict, ScannerAdapter};

/// Scans through a clamd daemon over TCP.
///
/// Always fail-closed: connection errors, unparsable replies and timeouts are `ScanError`.
#[derive(Clone)]
pub struct ClamdService {
    host: String,
    port: u16,
    max_output_bytes: usize,
}

impl ClamdService {
    /// Create a new ClamdService.
    ///
    /// # Arguments
    /// * `host` - ClamAV daemon hostname
    /// * `port` - ClamAV daemon port (typically 3310)
    pub fn new(host: String, port: u16) -> Self {
        Self::with_output_limit(host, port, DEFAULT_MAX_DIAGNOSTIC_BYTES)
    }

    pub fn with_output_limit(host: String, port: u16, max_output_bytes: usize) -> Self {
        Self {
            host,
            port,
            max_output_bytes,
        }
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[async_trait]
impl ScannerAdapter for ClamdService {
    /// Sends the file with the sync API inside spawn_blocking to avoid !Send tokio futures.
    ///
    /// A timed out request cannot be interrupted mid-flight; its blocking thread finishes on
    /// its own and the reply is discarded.
    async fn scan(&self, path: &Path, timeout: Duration) -> ScanVerdict {
        let start = Instant::now();
        tracing::debug!(host = %self.host, port = %self.port, "Starting clamd scan");

        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) => {
                let error_msg = format!("Failed to read file for clamd scan: {}", e);
                tracing::error!(error = %error_msg, "clamd scan failed");
                return ScanVerdict::error(error_msg);
            }
        };

        let address = self.address();
        let limit = self.max_output_bytes;
        let result = tokio::time::timeout(
            timeout,
            tokio::task::spawn_blocking(move || {
                let connection = Tcp {
                    host_address: address.as_str(),
                };
                match clamav_client::scan_buffer(data.as_slice(), connection, None) {
                    Ok(response_bytes) => {
                        let response = bounded_diagnostic(&response_bytes, limit);
                        match clean(&response_bytes) {
                            Ok(true) => ScanVerdict::clean(response),
                            Ok(false) if response.contains("FOUND") => {
                                ScanVerdict::infected(response)
                            }
                            Ok(false) => ScanVerdict::error(format!(
                                "Unexpected clamd response: {}",
                                response
                            )),
                            Err(e) => ScanVerdict::error(format!(
                                "Failed to parse clamd response: {}",
                                e
                            )),
                        }
                    }
                    Err(e) => ScanVerdict::error(format!("clamd scan error: {}", e)),
                }
            }),
        )
        .await;

        let verdict = match result {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => ScanVerdict::error(format!("clamd scan task join error: {}", e)),
            Err(_) => ScanVerdict::error(format!(
                "clamd scan timeout (exceeded {} ms)",
                timeout.as_millis()
            )),
        };

        match verdict.outcome {
            ScanOutcome::Clean => tracing::info!(
                duration_ms = start.elapsed().as_millis(),
                "File scan completed: clean"
            ),
            ScanOutcome::Infected => {
                let virus_name = verdict
                    .diagnostic_text
                    .split(':')
                    .nth(1)
                    .and_then(|s| s.split_whitespace().next())
                    .unwrap_or("unknown");
                tracing::warn!(
                    duration_ms = start.elapsed().as_millis(),
                    virus = %virus_name,
                    "File scan detected virus"
                );
            }
            ScanOutcome::ScanError => tracing::error!(
                duration_ms = start.elapsed().as_millis(),
                error = %verdict.diagnostic_text,
                "clamd scan failed"
            ),
        }

        verdict
    }

    fn name(&self) -> &'static str {
        "clamd"
    }

    async fn health_check(&self) -> bool {
        let address = self.address();
        let ping = tokio::task::spawn_blocking(move || {
            clamav_client::ping(Tcp {
                host_address: address.as_str(),
            })
        });
        matches!(
            tokio::time::timeout(Duration::from_secs(5), ping).await,
            Ok(Ok(Ok(ref reply))) if reply == clamav_client::PONG
        )
    }
}
