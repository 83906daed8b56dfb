use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Scanner backend types
///
/// Defined in core because configuration selects it and the services crate builds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerBackend {
    /// `clamscan` command-line engine, one process per scan.
    ClamScan,
    /// `clamd` daemon reached over TCP.
    Clamd,
}

impl FromStr for ScannerBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "clamscan" => Ok(ScannerBackend::ClamScan),
            "clamd" => Ok(ScannerBackend::Clamd),
            _ => Err(anyhow::anyhow!("Invalid scanner backend: {}", s)),
        }
    }
}

impl Display for ScannerBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ScannerBackend::ClamScan => write!(f, "clamscan"),
            ScannerBackend::Clamd => write!(f, "clamd"),
        }
    }
}
