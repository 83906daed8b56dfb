pub mod policy;
pub mod result;
pub mod upload;
pub mod verdict;

pub use policy::{
    load_policy_file, normalize_content_type, normalize_extension, PolicySettings,
    ValidationPolicy, DEFAULT_ALLOWED_CONTENT_TYPES, DEFAULT_ALLOWED_EXTENSIONS,
    DEFAULT_MAX_FILE_SIZE_MB,
};
pub use result::ValidationResult;
pub use upload::{declared_extension, ByteSource, UploadArtifact, UploadDescriptor, UploadSlot};
pub use verdict::{ScanOutcome, ScanVerdict};
