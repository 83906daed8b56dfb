#[cfg(feature = "clamd")]
use crate::ClamdService;
use crate::ClamScanService;
use std::sync::Arc;
use uploadgate_core::{AppError, GateConfig, ScannerAdapter, ScannerBackend};

/// Create a scanner adapter based on configuration
pub fn create_scanner(config: &GateConfig) -> Result<Arc<dyn ScannerAdapter>, AppError> {
    match config.scanner_backend {
        ScannerBackend::ClamScan => {
            if config.clamscan_path.trim().is_empty() {
                return Err(AppError::Config("CLAMSCAN_PATH not configured".to_string()));
            }
            Ok(Arc::new(ClamScanService::with_output_limit(
                config.clamscan_path.clone(),
                config.scanner_max_output_bytes,
            )))
        }

        #[cfg(feature = "clamd")]
        ScannerBackend::Clamd => {
            if config.clamav_host.trim().is_empty() {
                return Err(AppError::Config("CLAMAV_HOST not configured".to_string()));
            }
            Ok(Arc::new(ClamdService::with_output_limit(
                config.clamav_host.clone(),
                config.clamav_port,
                config.scanner_max_output_bytes,
            )))
        }

        #[cfg(not(feature = "clamd"))]
        ScannerBackend::Clamd => Err(AppError::Config(
            "clamd scanner backend not available (clamd feature not enabled)".to_string(),
        )),
    }
}
