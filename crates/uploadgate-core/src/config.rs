//! Configuration module
//!
//! Settings are read from the environment (after loading an optional `.env`). The seed policy
//! comes from `MAX_FILE_SIZE_MB` / `ALLOWED_EXTENSIONS` / `ALLOWED_CONTENT_TYPES`, or from the
//! JSON record named by `POLICY_FILE` when that is set.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::{
    load_policy_file, PolicySettings, ValidationPolicy, DEFAULT_ALLOWED_CONTENT_TYPES,
    DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_MAX_FILE_SIZE_MB,
};
use crate::scanner::DEFAULT_MAX_DIAGNOSTIC_BYTES;
use crate::scanner_types::ScannerBackend;

const SCAN_TIMEOUT_SECS: u64 = 60;
const CLAMAV_PORT: u16 = 3310;

/// Log output format for binaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug)]
pub struct GateConfig {
    pub environment: String,
    pub scanner_backend: ScannerBackend,
    // clamscan configuration
    pub clamscan_path: String,
    // clamd configuration
    pub clamav_host: String,
    pub clamav_port: u16,
    pub scan_timeout_secs: u64,
    /// Directory for scan temp files; the OS temp dir when unset.
    pub scan_temp_dir: Option<PathBuf>,
    pub scanner_max_output_bytes: usize,
    /// Reject uploads that carry no declared content type.
    pub require_content_type: bool,
    /// Accept uploads that carry no selected file type.
    pub allow_missing_file_type: bool,
    pub policy: ValidationPolicy,
    pub policy_file: Option<PathBuf>,
    pub log_format: LogFormat,
}

/// Security switches must be spelled out; anything but `true`/`false` is an error.
fn parse_flag(key: &str, value: &str) -> Result<bool, anyhow::Error> {
    match value.trim().to_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(anyhow::anyhow!("{} must be true or false", key)),
    }
}

impl GateConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let environment = var("ENVIRONMENT", "development");
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";

        let scanner_backend: ScannerBackend = var("SCANNER_BACKEND", "clamscan").parse()?;

        let policy_file = lookup("POLICY_FILE")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let policy = match policy_file {
            Some(ref path) => load_policy_file(path)?,
            None => PolicySettings {
                max_file_size_mb: var("MAX_FILE_SIZE_MB", &DEFAULT_MAX_FILE_SIZE_MB.to_string())
                    .parse()
                    .map_err(|_| anyhow::anyhow!("MAX_FILE_SIZE_MB must be a valid number"))?,
                allowed_extensions: var(
                    "ALLOWED_EXTENSIONS",
                    &DEFAULT_ALLOWED_EXTENSIONS.join(","),
                ),
                allowed_content_types: var(
                    "ALLOWED_CONTENT_TYPES",
                    &DEFAULT_ALLOWED_CONTENT_TYPES.join(","),
                ),
            }
            .into_policy()?,
        };

        let default_log_format = if is_production { "json" } else { "text" };
        let log_format = match var("LOG_FORMAT", default_log_format).to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(GateConfig {
            environment,
            scanner_backend,
            clamscan_path: var("CLAMSCAN_PATH", "clamscan"),
            clamav_host: var("CLAMAV_HOST", "localhost"),
            clamav_port: var("CLAMAV_PORT", &CLAMAV_PORT.to_string())
                .parse()
                .unwrap_or(CLAMAV_PORT),
            scan_timeout_secs: var("SCAN_TIMEOUT_SECS", &SCAN_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(SCAN_TIMEOUT_SECS),
            scan_temp_dir: lookup("SCAN_TEMP_DIR")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            scanner_max_output_bytes: var(
                "SCANNER_MAX_OUTPUT_BYTES",
                &DEFAULT_MAX_DIAGNOSTIC_BYTES.to_string(),
            )
            .parse()
            .unwrap_or(DEFAULT_MAX_DIAGNOSTIC_BYTES),
            require_content_type: parse_flag(
                "REQUIRE_CONTENT_TYPE",
                &var("REQUIRE_CONTENT_TYPE", "false"),
            )?,
            allow_missing_file_type: parse_flag(
                "ALLOW_MISSING_FILE_TYPE",
                &var("ALLOW_MISSING_FILE_TYPE", "false"),
            )?,
            policy,
            policy_file,
            log_format,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.scan_timeout_secs == 0 {
            return Err(anyhow::anyhow!("SCAN_TIMEOUT_SECS must be greater than 0"));
        }
        if self.scanner_max_output_bytes == 0 {
            return Err(anyhow::anyhow!(
                "SCANNER_MAX_OUTPUT_BYTES must be greater than 0"
            ));
        }
        if self.scanner_backend == ScannerBackend::ClamScan && self.clamscan_path.trim().is_empty()
        {
            return Err(anyhow::anyhow!("CLAMSCAN_PATH must not be empty"));
        }
        if self.scanner_backend == ScannerBackend::Clamd && self.clamav_host.trim().is_empty() {
            return Err(anyhow::anyhow!("CLAMAV_HOST must not be empty"));
        }
        if !self.policy.is_enforceable() {
            return Err(anyhow::anyhow!(
                "Configured upload policy would reject every upload"
            ));
        }
        if let Some(ref dir) = self.scan_temp_dir {
            if !dir.is_dir() {
                return Err(anyhow::anyhow!(
                    "SCAN_TEMP_DIR {} is not a directory",
                    dir.display()
                ));
            }
        }
        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }
}
