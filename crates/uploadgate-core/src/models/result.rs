use serde::{Deserialize, Serialize};

use crate::error::{ErrorMetadata, RejectionKind};

/// Final decision returned to the caller. The caller persists the upload only when
/// `accepted` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<RejectionKind>,
    /// Operator-facing detail. Never show this to the uploading user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic_text: Option<String>,
}

impl ValidationResult {
    pub fn accepted(diagnostic_text: Option<String>) -> Self {
        Self {
            accepted: true,
            rejection_reason: None,
            diagnostic_text,
        }
    }

    pub fn rejected(reason: RejectionKind, diagnostic_text: impl Into<String>) -> Self {
        Self {
            accepted: false,
            rejection_reason: Some(reason),
            diagnostic_text: Some(diagnostic_text.into()),
        }
    }

    /// Message safe to show the uploading user.
    pub fn user_message(&self) -> Option<String> {
        self.rejection_reason.map(|kind| kind.client_message())
    }
}
