//! Shared fixtures for validator tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use uploadgate_core::{
    InMemoryPolicyStore, ScanVerdict, ScannerAdapter, UploadArtifact, UploadDescriptor,
    ValidationPolicy,
};
use uploadgate_processing::{UploadValidator, ValidatorOptions};

pub const STL_CONTENT_TYPE: &str = "application/sla";

/// Scanner stub that records every call and what the staged file looked like at scan time.
pub struct MockScanner {
    verdict: ScanVerdict,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen_paths: Mutex<Vec<PathBuf>>,
    seen_contents: Mutex<Vec<Vec<u8>>>,
}

impl MockScanner {
    pub fn returning(verdict: ScanVerdict) -> Arc<Self> {
        Arc::new(Self {
            verdict,
            delay: None,
            calls: AtomicUsize::new(0),
            seen_paths: Mutex::new(Vec::new()),
            seen_contents: Mutex::new(Vec::new()),
        })
    }

    pub fn clean() -> Arc<Self> {
        Self::returning(ScanVerdict::clean("stream: OK"))
    }

    /// Sleeps for `delay` before answering; with a short scan timeout this behaves like a
    /// real engine that times out.
    pub fn slow(delay: Duration, verdict: ScanVerdict) -> Arc<Self> {
        Arc::new(Self {
            verdict,
            delay: Some(delay),
            calls: AtomicUsize::new(0),
            seen_paths: Mutex::new(Vec::new()),
            seen_contents: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_paths(&self) -> Vec<PathBuf> {
        self.seen_paths.lock().unwrap().clone()
    }

    pub fn seen_contents(&self) -> Vec<Vec<u8>> {
        self.seen_contents.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScannerAdapter for MockScanner {
    async fn scan(&self, path: &Path, timeout: Duration) -> ScanVerdict {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_paths.lock().unwrap().push(path.to_path_buf());
        let contents = std::fs::read(path).expect("staged file must exist during the scan");
        self.seen_contents.lock().unwrap().push(contents);

        if let Some(delay) = self.delay {
            if tokio::time::timeout(timeout, tokio::time::sleep(delay))
                .await
                .is_err()
            {
                return ScanVerdict::error(format!(
                    "mock timeout (exceeded {} ms)",
                    timeout.as_millis()
                ));
            }
        }
        self.verdict.clone()
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// `{stl}` / `{application/sla}` with a 1 MiB limit.
pub fn stl_policy() -> ValidationPolicy {
    ValidationPolicy::new(1024 * 1024, ["stl"], [STL_CONTENT_TYPE])
}

pub struct TestGate {
    pub validator: UploadValidator,
    pub scanner: Arc<MockScanner>,
    pub policy_store: Arc<InMemoryPolicyStore>,
    pub scan_dir: TempDir,
}

impl TestGate {
    pub fn new(policy: ValidationPolicy, scanner: Arc<MockScanner>) -> Self {
        Self::with_options(policy, scanner, ValidatorOptions::default())
    }

    pub fn with_options(
        policy: ValidationPolicy,
        scanner: Arc<MockScanner>,
        options: ValidatorOptions,
    ) -> Self {
        let scan_dir = TempDir::new().expect("create scan dir");
        let policy_store = Arc::new(InMemoryPolicyStore::with_policy(policy));
        let validator = UploadValidator::with_options(
            policy_store.clone(),
            scanner.clone(),
            ValidatorOptions {
                scan_dir: Some(scan_dir.path().to_path_buf()),
                ..options
            },
        );
        Self {
            validator,
            scanner,
            policy_store,
            scan_dir,
        }
    }

    /// Files left behind in the scan directory.
    pub fn leftovers(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.scan_dir.path())
            .expect("read scan dir")
            .map(|entry| entry.expect("dir entry").path())
            .collect()
    }
}

pub fn stl_artifact(size: usize) -> UploadArtifact {
    UploadArtifact::from_bytes(
        "model.stl",
        Some(STL_CONTENT_TYPE.to_string()),
        vec![b's'; size],
    )
}

/// A file-field upload with "stl" selected as its type.
pub fn stl_upload(artifact: UploadArtifact) -> UploadDescriptor {
    UploadDescriptor::with_file(artifact).asserting_file_type("stl")
}
