//! Shared plumbing for the `uploadgate` binary.
//!
//! The binary stands in for a form handler: it builds an `UploadDescriptor` from a local file,
//! runs it through the gate and reports the decision.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use uploadgate_core::config::LogFormat;
use uploadgate_core::{
    load_policy_file, ByteSource, GateConfig, InMemoryPolicyStore, ScanVerdict, UploadArtifact,
    UploadDescriptor, ValidationPolicy, ValidationResult,
};
use uploadgate_processing::{UploadValidator, ValidatorOptions};
use uploadgate_services::create_scanner;

/// Exit code for a rejected upload or an unclean scan. Other failures exit with 1.
pub const EXIT_REJECTED: u8 = 2;

const DEFAULT_LOG_FILTER: &str = "uploadgate=info";

/// Initialize tracing for the CLI. Logs go to stderr so stdout stays machine-readable.
pub fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Arguments of `uploadgate check`.
#[derive(Debug, Clone, Default)]
pub struct CheckRequest {
    pub path: PathBuf,
    /// Submit through the image field instead of the file field.
    pub as_image: bool,
    pub file_type: Option<String>,
    pub content_type: Option<String>,
    pub policy_file: Option<PathBuf>,
}

/// Policy from `--policy` when given, otherwise the one configured through the environment.
pub fn resolve_policy(
    config: &GateConfig,
    policy_file: Option<&Path>,
) -> anyhow::Result<ValidationPolicy> {
    match policy_file {
        Some(path) => load_policy_file(path)
            .with_context(|| format!("Failed to load policy from {}", path.display())),
        None => Ok(config.policy.clone()),
    }
}

/// Describe a local file the way a form handler would after receiving it.
pub fn descriptor_for_path(request: &CheckRequest) -> anyhow::Result<UploadDescriptor> {
    let metadata = std::fs::metadata(&request.path)
        .with_context(|| format!("Failed to stat {}", request.path.display()))?;
    if !metadata.is_file() {
        anyhow::bail!("{} is not a regular file", request.path.display());
    }

    let filename = request
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let artifact = UploadArtifact::new(
        filename,
        request.content_type.clone(),
        metadata.len(),
        ByteSource::File(request.path.clone()),
    );

    let descriptor = if request.as_image {
        UploadDescriptor::with_image(artifact)
    } else {
        UploadDescriptor::with_file(artifact)
    };
    Ok(match request.file_type {
        Some(ref file_type) => descriptor.asserting_file_type(file_type.clone()),
        None => descriptor,
    })
}

/// Run a local file through the full gate.
pub async fn run_check(
    config: &GateConfig,
    request: &CheckRequest,
) -> anyhow::Result<ValidationResult> {
    let policy = resolve_policy(config, request.policy_file.as_deref())?;
    let descriptor = descriptor_for_path(request)?;
    let scanner = create_scanner(config).context("Failed to create scanner")?;

    let validator = UploadValidator::with_options(
        Arc::new(InMemoryPolicyStore::with_policy(policy)),
        scanner,
        ValidatorOptions::from_config(config),
    );
    Ok(validator.validate(descriptor).await)
}

/// Scan a file in place with the configured engine, skipping every policy check.
pub async fn run_scan(config: &GateConfig, path: &Path) -> anyhow::Result<ScanVerdict> {
    if !path.is_file() {
        anyhow::bail!("{} is not a regular file", path.display());
    }
    let scanner = create_scanner(config).context("Failed to create scanner")?;
    Ok(scanner.scan(path, config.scan_timeout()).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use uploadgate_core::UploadSlot;

    fn config() -> GateConfig {
        GateConfig::from_lookup(|_| None).unwrap()
    }

    #[test]
    fn descriptor_uses_real_size_and_name() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("Bracket.STL");
        std::fs::write(&path, vec![0u8; 300]).unwrap();

        let descriptor = descriptor_for_path(&CheckRequest {
            path,
            file_type: Some("stl".to_string()),
            content_type: Some("application/sla".to_string()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(descriptor.asserted_file_type.as_deref(), Some("stl"));
        let artifacts = descriptor.into_artifacts();
        assert_eq!(artifacts.len(), 1);
        let (slot, artifact) = &artifacts[0];
        assert_eq!(*slot, UploadSlot::File);
        assert_eq!(artifact.byte_size, 300);
        assert_eq!(artifact.declared_extension(), "stl");
        assert_eq!(
            artifact.declared_content_type.as_deref(),
            Some("application/sla")
        );
    }

    #[test]
    fn descriptor_as_image() {
        let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        std::fs::write(file.path(), b"png").unwrap();

        let descriptor = descriptor_for_path(&CheckRequest {
            path: file.path().to_path_buf(),
            as_image: true,
            ..Default::default()
        })
        .unwrap();

        assert!(descriptor.file.is_none());
        assert!(descriptor.image.is_some());
        assert!(descriptor.asserted_file_type.is_none());
    }

    #[test]
    fn descriptor_rejects_directories_and_missing_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let request = |path: PathBuf| CheckRequest {
            path,
            ..Default::default()
        };
        assert!(descriptor_for_path(&request(dir.path().to_path_buf())).is_err());
        assert!(descriptor_for_path(&request(dir.path().join("missing.stl"))).is_err());
    }

    #[test]
    fn policy_flag_overrides_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"max_file_size_mb":2,"allowed_extensions":"obj","allowed_content_types":"model/obj"}}"#
        )
        .unwrap();

        let config = config();
        let policy = resolve_policy(&config, Some(file.path())).unwrap();
        assert!(policy.allows_extension("obj"));
        assert!(!policy.allows_extension("stl"));

        assert_eq!(resolve_policy(&config, None).unwrap(), config.policy);
    }

    #[test]
    fn broken_policy_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = resolve_policy(&config(), Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("Failed to load policy"));
    }
}
