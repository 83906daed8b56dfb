//! Active upload policy storage
//!
//! The store hands out `Arc` snapshots. A validation call reads the policy once and keeps that
//! snapshot for its whole run, so an administrator edit never produces a half-updated view.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::ValidationPolicy;

/// Source of the policy enforced on every upload.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Current policy, or the built-in safe default if none was ever set.
    async fn get_active_policy(&self) -> Arc<ValidationPolicy>;

    /// Replace the policy wholesale.
    async fn set_active_policy(&self, policy: ValidationPolicy);
}

struct ActivePolicy {
    policy: Arc<ValidationPolicy>,
    revision: u64,
}

/// Process-local policy store.
///
/// Readers hold the lock only long enough to clone an `Arc`; writers swap the whole value.
pub struct InMemoryPolicyStore {
    active: RwLock<ActivePolicy>,
}

impl InMemoryPolicyStore {
    /// Store seeded with `ValidationPolicy::default()`.
    pub fn new() -> Self {
        Self::with_policy(ValidationPolicy::default())
    }

    pub fn with_policy(policy: ValidationPolicy) -> Self {
        Self {
            active: RwLock::new(ActivePolicy {
                policy: Arc::new(policy),
                revision: 0,
            }),
        }
    }

    /// Number of times the policy has been replaced.
    pub async fn revision(&self) -> u64 {
        self.active.read().await.revision
    }
}

impl Default for InMemoryPolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn get_active_policy(&self) -> Arc<ValidationPolicy> {
        self.active.read().await.policy.clone()
    }

    async fn set_active_policy(&self, policy: ValidationPolicy) {
        if !policy.is_enforceable() {
            tracing::warn!(
                max_file_size_bytes = policy.max_file_size_bytes(),
                extensions = policy.allowed_extensions().len(),
                content_types = policy.allowed_content_types().len(),
                "Installing a policy that rejects every upload"
            );
        }

        let policy = Arc::new(policy);
        let mut active = self.active.write().await;
        active.policy = policy;
        active.revision += 1;
        tracing::info!(revision = active.revision, "Upload policy updated");
    }
}
