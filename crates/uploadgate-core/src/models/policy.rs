//! Upload validation policy
//!
//! `ValidationPolicy` is the enforced form: normalised sets plus a byte limit.
//! `PolicySettings` is the administrator-facing record (megabytes and comma-separated lists)
//! that is parsed into a policy.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;

/// Default maximum upload size in megabytes
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 20;

/// Default allowed extensions (3D model formats and preview images)
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] =
    &["stl", "obj", "3mf", "zip", "step", "iges", "jpg", "jpeg", "png"];

/// Default allowed declared content types
pub const DEFAULT_ALLOWED_CONTENT_TYPES: &[&str] = &[
    "application/sla",
    "application/vnd.ms-pki.stl",
    "application/octet-stream",
    "image/jpeg",
    "image/png",
];

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Normalise an extension token: trim, drop leading dots, lowercase.
pub fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_lowercase()
}

/// Normalise a MIME type by stripping parameters (e.g. "image/jpeg; charset=utf-8" -> "image/jpeg")
/// and lowercasing.
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_lowercase()
}

/// Enforced upload policy.
///
/// Empty allow-lists reject everything: membership checks simply find nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPolicy")]
pub struct ValidationPolicy {
    max_file_size_bytes: u64,
    allowed_extensions: BTreeSet<String>,
    allowed_content_types: BTreeSet<String>,
}

#[derive(Deserialize)]
struct RawPolicy {
    max_file_size_bytes: u64,
    allowed_extensions: Vec<String>,
    allowed_content_types: Vec<String>,
}

impl From<RawPolicy> for ValidationPolicy {
    fn from(raw: RawPolicy) -> Self {
        ValidationPolicy::new(
            raw.max_file_size_bytes,
            raw.allowed_extensions,
            raw.allowed_content_types,
        )
    }
}

impl ValidationPolicy {
    pub fn new<E, C>(max_file_size_bytes: u64, allowed_extensions: E, allowed_content_types: C) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        Self {
            max_file_size_bytes,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|e| normalize_extension(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
            allowed_content_types: allowed_content_types
                .into_iter()
                .map(|c| normalize_content_type(c.as_ref()))
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_bytes
    }

    pub fn allowed_extensions(&self) -> &BTreeSet<String> {
        &self.allowed_extensions
    }

    pub fn allowed_content_types(&self) -> &BTreeSet<String> {
        &self.allowed_content_types
    }

    pub fn allows_extension(&self, extension: &str) -> bool {
        self.allowed_extensions
            .contains(&normalize_extension(extension))
    }

    pub fn allows_content_type(&self, content_type: &str) -> bool {
        self.allowed_content_types
            .contains(&normalize_content_type(content_type))
    }

    /// True when the policy can accept at least one upload.
    pub fn is_enforceable(&self) -> bool {
        self.max_file_size_bytes > 0
            && !self.allowed_extensions.is_empty()
            && !self.allowed_content_types.is_empty()
    }
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        ValidationPolicy::new(
            DEFAULT_MAX_FILE_SIZE_MB * BYTES_PER_MB,
            DEFAULT_ALLOWED_EXTENSIONS.iter().copied(),
            DEFAULT_ALLOWED_CONTENT_TYPES.iter().copied(),
        )
    }
}

/// Administrator-editable security settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PolicySettings {
    /// Maximum upload file size in MB
    #[validate(range(min = 1, message = "Maximum file size must be at least 1 MB"))]
    pub max_file_size_mb: u64,
    /// Comma-separated list of allowed extensions
    #[validate(length(min = 1, message = "At least one extension must be allowed"))]
    pub allowed_extensions: String,
    /// Comma-separated list of allowed MIME types
    #[validate(length(min = 1, message = "At least one MIME type must be allowed"))]
    pub allowed_content_types: String,
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

impl PolicySettings {
    pub fn into_policy(self) -> Result<ValidationPolicy, AppError> {
        self.validate()?;

        let max_file_size_bytes = self
            .max_file_size_mb
            .checked_mul(BYTES_PER_MB)
            .ok_or_else(|| {
                AppError::InvalidPolicy(format!(
                    "Maximum file size of {} MB is out of range",
                    self.max_file_size_mb
                ))
            })?;

        let policy = ValidationPolicy::new(
            max_file_size_bytes,
            split_list(&self.allowed_extensions),
            split_list(&self.allowed_content_types),
        );

        if policy.allowed_extensions().is_empty() {
            return Err(AppError::InvalidPolicy(
                "allowed_extensions contains no usable entries".to_string(),
            ));
        }
        if policy.allowed_content_types().is_empty() {
            return Err(AppError::InvalidPolicy(
                "allowed_content_types contains no usable entries".to_string(),
            ));
        }

        Ok(policy)
    }
}

impl From<&ValidationPolicy> for PolicySettings {
    fn from(policy: &ValidationPolicy) -> Self {
        let join = |set: &BTreeSet<String>| set.iter().cloned().collect::<Vec<_>>().join(",");
        Self {
            max_file_size_mb: policy.max_file_size_bytes().div_ceil(BYTES_PER_MB),
            allowed_extensions: join(policy.allowed_extensions()),
            allowed_content_types: join(policy.allowed_content_types()),
        }
    }
}

/// Read a JSON `PolicySettings` record and parse it into a policy.
pub fn load_policy_file(path: impl AsRef<Path>) -> Result<ValidationPolicy, AppError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("Failed to read policy file {}: {}", path.display(), e))
    })?;
    let settings: PolicySettings = serde_json::from_str(&raw)?;
    settings.into_policy()
}
