use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use uploadgate_core::scanner::DEFAULT_MAX_DIAGNOSTIC_BYTES;
use uploadgate_core::{bounded_diagnostic, ScanOutcome, ScanVerdict, ScannerAdapter};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the `clamscan` command-line engine once per scan.
#[derive(Clone, Debug)]
pub struct ClamScanService {
    binary: PathBuf,
    /// Cap on stdout and stderr each; the rest is drained and discarded.
    max_output_bytes: usize,
}

impl ClamScanService {
    /// Create a new ClamScanService.
    ///
    /// # Arguments
    /// * `binary` - Path or name of the `clamscan` executable
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self::with_output_limit(binary, DEFAULT_MAX_DIAGNOSTIC_BYTES)
    }

    /// Create with a custom output cap (for engines that print very verbose warnings).
    pub fn with_output_limit(binary: impl Into<PathBuf>, max_output_bytes: usize) -> Self {
        Self {
            binary: binary.into(),
            max_output_bytes,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

/// Read at most `limit` bytes, then keep draining so the child never blocks on a full pipe.
/// Returns the kept bytes and whether anything was dropped.
async fn read_capped<R>(reader: Option<R>, limit: usize) -> std::io::Result<(Vec<u8>, bool)>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok((Vec::new(), false));
    };

    let mut kept = Vec::new();
    let mut truncated = false;
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(kept.len());
        kept.extend_from_slice(&chunk[..n.min(room)]);
        if n > room {
            truncated = true;
        }
    }
    Ok((kept, truncated))
}

/// Classify clamscan output.
///
/// `Infected` when any line reports a signature. `Clean` only when the process exited 0,
/// a line reports `OK`, `FOUND` appears nowhere, no line reports an error and nothing was
/// truncated. Everything else is `ScanError`.
pub fn parse_clamscan_output(output: &str, exit_code: Option<i32>, truncated: bool) -> ScanOutcome {
    let lines: Vec<&str> = output.lines().map(str::trim).collect();

    if lines.iter().any(|line| line.ends_with(" FOUND")) {
        return ScanOutcome::Infected;
    }

    let has_ok = lines.iter().any(|line| line.ends_with(": OK"));
    let has_error = lines
        .iter()
        .any(|line| line.ends_with(" ERROR") || line.starts_with("ERROR"));

    let mentions_found = output.contains("FOUND");

    if exit_code == Some(0) && has_ok && !mentions_found && !has_error && !truncated {
        ScanOutcome::Clean
    } else {
        ScanOutcome::ScanError
    }
}

/// Signature name from a `path: Signature FOUND` line.
fn signature_name(output: &str) -> &str {
    output
        .lines()
        .map(str::trim)
        .find(|line| line.ends_with(" FOUND"))
        .and_then(|line| line.rsplit_once(": "))
        .map(|(_, rest)| rest.trim_end_matches(" FOUND").trim())
        .unwrap_or("unknown")
}

#[async_trait]
impl ScannerAdapter for ClamScanService {
    async fn scan(&self, path: &Path, timeout: Duration) -> ScanVerdict {
        let start = Instant::now();
        tracing::debug!(binary = %self.binary.display(), "Starting clamscan");

        let mut child = match Command::new(&self.binary)
            .arg("--no-summary")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                let error_msg = format!("Failed to run {}: {}", self.binary.display(), e);
                tracing::error!(error = %error_msg, "clamscan could not be started");
                return ScanVerdict::error(error_msg);
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let limit = self.max_output_bytes;

        let run = async {
            let (out, err) = tokio::join!(read_capped(stdout, limit), read_capped(stderr, limit));
            let status = child.wait().await;
            (out, err, status)
        };
        let finished = tokio::time::timeout(timeout, run).await;

        let (out, err, status) = match finished {
            Ok(parts) => parts,
            Err(_) => {
                if let Err(e) = child.start_kill() {
                    tracing::debug!(error = %e, "clamscan already exited before kill");
                }
                if let Err(e) = child.wait().await {
                    tracing::warn!(error = %e, "Failed to reap timed out clamscan process");
                }
                let error_msg = format!(
                    "clamscan timeout (exceeded {} ms)",
                    timeout.as_millis()
                );
                tracing::error!(error = %error_msg, "clamscan timeout");
                return ScanVerdict::error(error_msg);
            }
        };

        let (status, (stdout, out_truncated), (stderr, err_truncated)) = match (status, out, err) {
            (Ok(status), Ok(out), Ok(err)) => (status, out, err),
            (status, out, err) => {
                let error_msg = format!(
                    "Failed to collect clamscan result: {}",
                    [
                        status.err().map(|e| e.to_string()),
                        out.err().map(|e| e.to_string()),
                        err.err().map(|e| e.to_string()),
                    ]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join("; ")
                );
                tracing::error!(error = %error_msg, "clamscan I/O failure");
                return ScanVerdict::error(error_msg);
            }
        };

        let mut raw = stdout;
        if !stderr.is_empty() {
            raw.push(b'\n');
            raw.extend_from_slice(&stderr);
        }
        let diagnostic = bounded_diagnostic(&raw, self.max_output_bytes);
        let outcome = parse_clamscan_output(
            &diagnostic,
            status.code(),
            out_truncated || err_truncated || diagnostic.len() > self.max_output_bytes,
        );

        match outcome {
            ScanOutcome::Clean => {
                tracing::info!(
                    duration_ms = start.elapsed().as_millis(),
                    "File scan completed: clean"
                );
                ScanVerdict::clean(diagnostic)
            }
            ScanOutcome::Infected => {
                tracing::warn!(
                    duration_ms = start.elapsed().as_millis(),
                    signature = %signature_name(&diagnostic),
                    "File scan detected malware"
                );
                ScanVerdict::infected(diagnostic)
            }
            ScanOutcome::ScanError => {
                tracing::error!(
                    duration_ms = start.elapsed().as_millis(),
                    exit_code = ?status.code(),
                    "clamscan did not produce a usable verdict"
                );
                ScanVerdict::error(format!(
                    "clamscan exited with {}: {}",
                    status, diagnostic
                ))
            }
        }
    }

    fn name(&self) -> &'static str {
        "clamscan"
    }

    async fn health_check(&self) -> bool {
        let version = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, version).await {
            Ok(Ok(output)) => output.status.success(),
            _ => false,
        }
    }
}
