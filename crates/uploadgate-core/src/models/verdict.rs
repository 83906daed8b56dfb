use serde::{Deserialize, Serialize};

/// Classification produced by a scanner adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    Clean,
    Infected,
    ScanError,
}

/// Outcome of one scan plus the raw engine output.
///
/// `diagnostic_text` may name internal paths or signatures; it is for operator audit logs only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanVerdict {
    pub outcome: ScanOutcome,
    pub diagnostic_text: String,
}

impl ScanVerdict {
    pub fn clean(diagnostic_text: impl Into<String>) -> Self {
        Self {
            outcome: ScanOutcome::Clean,
            diagnostic_text: diagnostic_text.into(),
        }
    }

    pub fn infected(diagnostic_text: impl Into<String>) -> Self {
        Self {
            outcome: ScanOutcome::Infected,
            diagnostic_text: diagnostic_text.into(),
        }
    }

    pub fn error(diagnostic_text: impl Into<String>) -> Self {
        Self {
            outcome: ScanOutcome::ScanError,
            diagnostic_text: diagnostic_text.into(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.outcome == ScanOutcome::Clean
    }
}
