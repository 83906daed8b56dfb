//! Uploadgate Core Library
//!
//! This crate provides the data model, rejection taxonomy, configuration, policy store and
//! scanner abstraction shared by every uploadgate component.

pub mod config;
pub mod error;
pub mod models;
pub mod policy_store;
pub mod scanner;
pub mod scanner_types;

// Re-export commonly used types
pub use config::GateConfig;
pub use error::{AppError, ErrorMetadata, LogLevel, RejectionKind};
pub use models::{
    load_policy_file, ByteSource, PolicySettings, ScanOutcome, ScanVerdict, UploadArtifact,
    UploadDescriptor, UploadSlot, ValidationPolicy, ValidationResult,
};
pub use policy_store::{InMemoryPolicyStore, PolicyStore};
pub use scanner::{bounded_diagnostic, ScannerAdapter};
pub use scanner_types::ScannerBackend;
