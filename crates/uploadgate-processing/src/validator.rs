use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;
use uploadgate_core::models::normalize_extension;
use uploadgate_core::{
    ErrorMetadata, GateConfig, LogLevel, PolicyStore, RejectionKind, ScanOutcome,
    ScannerAdapter, UploadArtifact, UploadDescriptor, UploadSlot, ValidationPolicy,
    ValidationResult,
};
use uuid::Uuid;

use crate::materialize::{materialize, MaterializeError};

const AUDIT_TARGET: &str = "uploadgate::audit";
const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(60);

/// Reasons a single artifact fails the gate
#[derive(Debug, thiserror::Error)]
enum CheckError {
    #[error("no file or image was submitted")]
    NothingSubmitted,

    #[error("{slot} is empty")]
    EmptyPayload { slot: UploadSlot },

    #[error("{slot} extension '{extension}' is not allowed")]
    InvalidExtension { slot: UploadSlot, extension: String },

    #[error("selected file type '{asserted}' does not match {slot} extension '{extension}'")]
    TypeMismatch {
        slot: UploadSlot,
        asserted: String,
        extension: String,
    },

    #[error("no file type selected for {slot} extension '{extension}'")]
    MissingFileType { slot: UploadSlot, extension: String },

    #[error("{slot} too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { slot: UploadSlot, size: u64, max: u64 },

    #[error("{slot} content type '{content_type}' is not allowed")]
    InvalidContentType {
        slot: UploadSlot,
        content_type: String,
    },

    #[error("{slot} has no declared content type")]
    MissingContentType { slot: UploadSlot },

    #[error("{slot} could not be staged for scanning: {source}")]
    Staging {
        slot: UploadSlot,
        source: std::io::Error,
    },

    #[error("{slot} rejected by scanner: {diagnostic}")]
    Infected { slot: UploadSlot, diagnostic: String },

    #[error("{slot} scan failed: {diagnostic}")]
    ScanFailed { slot: UploadSlot, diagnostic: String },
}

impl CheckError {
    fn kind(&self) -> RejectionKind {
        match self {
            CheckError::NothingSubmitted | CheckError::EmptyPayload { .. } => RejectionKind::Empty,
            CheckError::InvalidExtension { .. } => RejectionKind::DisallowedExtension,
            CheckError::TypeMismatch { .. } | CheckError::MissingFileType { .. } => {
                RejectionKind::TypeMismatch
            }
            CheckError::FileTooLarge { .. } => RejectionKind::TooLarge,
            CheckError::InvalidContentType { .. } | CheckError::MissingContentType { .. } => {
                RejectionKind::DisallowedContentType
            }
            CheckError::Infected { .. } => RejectionKind::MalwareDetected,
            CheckError::Staging { .. } | CheckError::ScanFailed { .. } => {
                RejectionKind::ScanUnavailable
            }
        }
    }

    fn into_result(self) -> ValidationResult {
        ValidationResult::rejected(self.kind(), self.to_string())
    }
}

/// Tunables that are not part of the administrator policy.
#[derive(Debug, Clone)]
pub struct ValidatorOptions {
    pub scan_timeout: Duration,
    /// Where scan files are created; the OS temp dir when `None`.
    pub scan_dir: Option<PathBuf>,
    /// Treat a missing declared content type as `DisallowedContentType`.
    pub require_declared_content_type: bool,
    /// Skip the file type consistency check when the caller sends no selected type.
    pub allow_missing_file_type: bool,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            scan_dir: None,
            require_declared_content_type: false,
            allow_missing_file_type: false,
        }
    }
}

impl ValidatorOptions {
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            scan_timeout: config.scan_timeout(),
            scan_dir: config.scan_temp_dir.clone(),
            require_declared_content_type: config.require_content_type,
            allow_missing_file_type: config.allow_missing_file_type,
        }
    }
}

/// Upload gate
///
/// Holds no per-call state; one instance can serve any number of concurrent validations.
#[derive(Clone)]
pub struct UploadValidator {
    policy_store: Arc<dyn PolicyStore>,
    scanner: Arc<dyn ScannerAdapter>,
    options: ValidatorOptions,
}

impl UploadValidator {
    pub fn new(policy_store: Arc<dyn PolicyStore>, scanner: Arc<dyn ScannerAdapter>) -> Self {
        Self::with_options(policy_store, scanner, ValidatorOptions::default())
    }

    pub fn with_options(
        policy_store: Arc<dyn PolicyStore>,
        scanner: Arc<dyn ScannerAdapter>,
        options: ValidatorOptions,
    ) -> Self {
        Self {
            policy_store,
            scanner,
            options,
        }
    }

    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    /// Decide whether a submission may be persisted.
    ///
    /// Never fails: internal faults come back as `ScanUnavailable` rejections. Dropping the
    /// returned future kills any running scan and removes the staged file.
    pub async fn validate(&self, descriptor: UploadDescriptor) -> ValidationResult {
        let validation_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "validate_upload",
            validation_id = %validation_id,
            scanner = self.scanner.name()
        );

        let result = match self.run(descriptor).instrument(span.clone()).await {
            Ok(diagnostic) => ValidationResult::accepted(diagnostic),
            Err(error) => error.into_result(),
        };

        span.in_scope(|| log_result(&result));
        result
    }

    async fn run(&self, descriptor: UploadDescriptor) -> Result<Option<String>, CheckError> {
        if descriptor.is_empty() {
            return Err(CheckError::NothingSubmitted);
        }

        let policy = self.policy_store.get_active_policy().await;
        let asserted = descriptor.asserted_file_type.clone();
        let artifacts = descriptor.into_artifacts();

        for (slot, artifact) in &artifacts {
            check_presence(*slot, artifact)?;
        }
        for (slot, artifact) in &artifacts {
            self.check_static(&policy, asserted.as_deref(), *slot, artifact)?;
        }

        let mut diagnostics = Vec::with_capacity(artifacts.len());
        for (slot, artifact) in artifacts {
            let diagnostic = self.scan_artifact(&policy, slot, artifact).await?;
            if !diagnostic.is_empty() {
                diagnostics.push(diagnostic);
            }
        }

        Ok(if diagnostics.is_empty() {
            None
        } else {
            Some(diagnostics.join("\n"))
        })
    }

    /// Extension, consistency, size and content type, in that order.
    fn check_static(
        &self,
        policy: &ValidationPolicy,
        asserted_file_type: Option<&str>,
        slot: UploadSlot,
        artifact: &UploadArtifact,
    ) -> Result<(), CheckError> {
        let extension = artifact.declared_extension();
        if !policy.allows_extension(&extension) {
            return Err(CheckError::InvalidExtension { slot, extension });
        }

        match asserted_file_type {
            Some(asserted) if normalize_extension(asserted) != extension => {
                return Err(CheckError::TypeMismatch {
                    slot,
                    asserted: asserted.to_string(),
                    extension,
                });
            }
            Some(_) => {}
            None if self.options.allow_missing_file_type => {
                tracing::debug!(%slot, "No selected file type; consistency check skipped");
            }
            None => return Err(CheckError::MissingFileType { slot, extension }),
        }

        let size = artifact
            .byte_size
            .max(artifact.source.known_len().unwrap_or(0));
        if size > policy.max_file_size_bytes() {
            return Err(CheckError::FileTooLarge {
                slot,
                size,
                max: policy.max_file_size_bytes(),
            });
        }

        match artifact.declared_content_type.as_deref() {
            Some(content_type) if !policy.allows_content_type(content_type) => {
                Err(CheckError::InvalidContentType {
                    slot,
                    content_type: content_type.to_string(),
                })
            }
            Some(_) => Ok(()),
            None if self.options.require_declared_content_type => {
                Err(CheckError::MissingContentType { slot })
            }
            None => {
                tracing::debug!(%slot, "No declared content type; content type check skipped");
                Ok(())
            }
        }
    }

    async fn scan_artifact(
        &self,
        policy: &ValidationPolicy,
        slot: UploadSlot,
        artifact: UploadArtifact,
    ) -> Result<String, CheckError> {
        let UploadArtifact {
            byte_size, source, ..
        } = artifact;
        let limit = policy.max_file_size_bytes();

        let staged = match materialize(source, self.options.scan_dir.as_deref(), limit).await {
            Ok(staged) => staged,
            Err(MaterializeError::TooLarge { limit }) => {
                return Err(CheckError::FileTooLarge {
                    slot,
                    size: limit.saturating_add(1),
                    max: limit,
                })
            }
            Err(MaterializeError::Io(source)) => {
                return Err(CheckError::Staging { slot, source })
            }
        };

        if staged.bytes_written() == 0 {
            return Err(CheckError::EmptyPayload { slot });
        }
        if staged.bytes_written() != byte_size {
            tracing::warn!(
                %slot,
                declared = byte_size,
                received = staged.bytes_written(),
                "Upload size differs from the size reported by the caller"
            );
        }

        let verdict = self
            .scanner
            .scan(staged.path(), self.options.scan_timeout)
            .await;

        if let Err(e) = staged.remove() {
            tracing::warn!(%slot, error = %e, "Failed to remove scan file");
        }

        match verdict.outcome {
            ScanOutcome::Clean => {
                tracing::info!(
                    target: AUDIT_TARGET,
                    %slot,
                    diagnostic = %verdict.diagnostic_text,
                    "Scan clean"
                );
                Ok(verdict.diagnostic_text)
            }
            ScanOutcome::Infected => {
                tracing::warn!(
                    target: AUDIT_TARGET,
                    %slot,
                    diagnostic = %verdict.diagnostic_text,
                    "Malware detected in upload"
                );
                Err(CheckError::Infected {
                    slot,
                    diagnostic: verdict.diagnostic_text,
                })
            }
            ScanOutcome::ScanError => {
                tracing::error!(
                    target: AUDIT_TARGET,
                    %slot,
                    diagnostic = %verdict.diagnostic_text,
                    "Scanner returned no verdict"
                );
                Err(CheckError::ScanFailed {
                    slot,
                    diagnostic: verdict.diagnostic_text,
                })
            }
        }
    }
}

/// A buffered artifact with nothing in it counts as not submitted. Files and streams are
/// judged by the staged byte count instead.
fn check_presence(slot: UploadSlot, artifact: &UploadArtifact) -> Result<(), CheckError> {
    if artifact.source.known_len() == Some(0) {
        return Err(CheckError::EmptyPayload { slot });
    }
    Ok(())
}

fn log_result(result: &ValidationResult) {
    let Some(kind) = result.rejection_reason else {
        tracing::info!("Upload accepted");
        return;
    };
    match kind.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error_code = kind.error_code(), "Upload rejected")
        }
        LogLevel::Warn => tracing::warn!(error_code = kind.error_code(), "Upload rejected"),
        LogLevel::Error => {
            tracing::error!(error_code = kind.error_code(), "Upload rejected")
        }
    }
}
