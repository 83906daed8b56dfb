#[cfg(feature = "clamd")]
pub mod clamav;
pub mod clamscan;

#[cfg(feature = "clamd")]
pub use clamav::ClamdService;
pub use clamscan::ClamScanService;
