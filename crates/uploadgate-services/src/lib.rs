//! Uploadgate Services Layer
//!
//! Concrete scanner adapters behind the `ScannerAdapter` trait from uploadgate-core, plus the
//! factory that picks one from configuration. The validator only ever sees the trait.

pub mod factory;
pub mod services;

pub use factory::create_scanner;
#[cfg(feature = "clamd")]
pub use services::clamav::ClamdService;
pub use services::clamscan::{parse_clamscan_output, ClamScanService};
