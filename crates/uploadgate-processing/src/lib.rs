//! Upload validation pipeline
//!
//! `UploadValidator` runs the ordered static checks against the active policy, stages the
//! payload in a private temp file and asks the scanner for a verdict. Callers persist an upload
//! only when the returned `ValidationResult` is accepted.

pub mod materialize;
pub mod validator;

pub use materialize::{materialize, MaterializeError, ScanFile};
pub use validator::{UploadValidator, ValidatorOptions};
