//! Exercises `ClamScanService` against shell scripts standing in for the real engine.
//! The scripts receive `--no-summary <path>`, so `$2` is the scanned file.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serial_test::serial;
use tempfile::TempDir;
use uploadgate_core::{ScanOutcome, ScannerAdapter};
use uploadgate_services::ClamScanService;

fn fake_engine(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-clamscan");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write fake engine");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake engine");
    path
}

fn sample_file(dir: &Path) -> PathBuf {
    let path = dir.join("sample.scan");
    std::fs::write(&path, b"solid model\n").expect("write sample");
    path
}

#[tokio::test]
#[serial]
async fn test_ok_line_and_zero_exit_is_clean() {
    let dir = TempDir::new().unwrap();
    let engine = fake_engine(dir.path(), r#"echo "$2: OK"; exit 0"#);
    let target = sample_file(dir.path());

    let verdict = ClamScanService::new(engine)
        .scan(&target, Duration::from_secs(10))
        .await;

    assert_eq!(verdict.outcome, ScanOutcome::Clean);
    assert!(verdict.diagnostic_text.ends_with(": OK"));
}

#[tokio::test]
#[serial]
async fn test_found_line_is_infected() {
    let dir = TempDir::new().unwrap();
    let engine = fake_engine(
        dir.path(),
        r#"echo "$2: Eicar-Test-Signature FOUND"; exit 1"#,
    );
    let target = sample_file(dir.path());

    let verdict = ClamScanService::new(engine)
        .scan(&target, Duration::from_secs(10))
        .await;

    assert_eq!(verdict.outcome, ScanOutcome::Infected);
    assert!(verdict.diagnostic_text.contains("Eicar-Test-Signature"));
}

#[tokio::test]
#[serial]
async fn test_engine_error_is_scan_error() {
    let dir = TempDir::new().unwrap();
    let engine = fake_engine(
        dir.path(),
        r#"echo "ERROR: Can't open database" >&2; exit 2"#,
    );
    let target = sample_file(dir.path());

    let verdict = ClamScanService::new(engine)
        .scan(&target, Duration::from_secs(10))
        .await;

    assert_eq!(verdict.outcome, ScanOutcome::ScanError);
    assert!(verdict.diagnostic_text.contains("database"));
}

#[tokio::test]
#[serial]
async fn test_ok_with_nonzero_exit_is_scan_error() {
    let dir = TempDir::new().unwrap();
    let engine = fake_engine(dir.path(), r#"echo "$2: OK"; exit 2"#);
    let target = sample_file(dir.path());

    let verdict = ClamScanService::new(engine)
        .scan(&target, Duration::from_secs(10))
        .await;

    assert_eq!(verdict.outcome, ScanOutcome::ScanError);
}

#[tokio::test]
#[serial]
async fn test_missing_binary_is_scan_error() {
    let dir = TempDir::new().unwrap();
    let target = sample_file(dir.path());

    let verdict = ClamScanService::new(dir.path().join("no-such-clamscan"))
        .scan(&target, Duration::from_secs(10))
        .await;

    assert_eq!(verdict.outcome, ScanOutcome::ScanError);
    assert!(verdict.diagnostic_text.contains("Failed to run"));
}

#[tokio::test]
#[serial]
async fn test_timeout_kills_and_reaps_engine() {
    let dir = TempDir::new().unwrap();
    let pid_file = dir.path().join("engine.pid");
    let engine = fake_engine(
        dir.path(),
        &format!("echo $$ > '{}'\nexec sleep 30", pid_file.display()),
    );
    let target = sample_file(dir.path());

    let start = Instant::now();
    let verdict = ClamScanService::new(engine)
        .scan(&target, Duration::from_millis(500))
        .await;

    assert_eq!(verdict.outcome, ScanOutcome::ScanError);
    assert!(verdict.diagnostic_text.contains("timeout"));
    assert!(start.elapsed() < Duration::from_secs(10));

    let pid = std::fs::read_to_string(&pid_file).unwrap();
    let alive = std::process::Command::new("kill")
        .arg("-0")
        .arg(pid.trim())
        .stderr(std::process::Stdio::null())
        .status()
        .unwrap();
    assert!(!alive.success(), "engine process {} outlived the scan", pid.trim());
}

#[tokio::test]
#[serial]
async fn test_oversized_output_is_truncated_and_not_clean() {
    let dir = TempDir::new().unwrap();
    let engine = fake_engine(
        dir.path(),
        r#"head -c 200000 /dev/zero | tr '\0' 'a'; echo; echo "$2: OK"; exit 0"#,
    );
    let target = sample_file(dir.path());

    let verdict = ClamScanService::with_output_limit(engine, 1024)
        .scan(&target, Duration::from_secs(10))
        .await;

    assert_eq!(verdict.outcome, ScanOutcome::ScanError);
    assert!(verdict.diagnostic_text.len() < 4096);
}

#[tokio::test]
#[serial]
async fn test_non_utf8_output_is_tolerated() {
    let dir = TempDir::new().unwrap();
    let engine = fake_engine(
        dir.path(),
        r#"printf 'LibClamAV Warning: \377\376\n' >&2; echo "$2: OK"; exit 0"#,
    );
    let target = sample_file(dir.path());

    let verdict = ClamScanService::new(engine)
        .scan(&target, Duration::from_secs(10))
        .await;

    assert_eq!(verdict.outcome, ScanOutcome::Clean);
    assert!(verdict.diagnostic_text.contains('\u{FFFD}'));
}

#[tokio::test]
#[serial]
async fn test_health_check() {
    let dir = TempDir::new().unwrap();
    let engine = fake_engine(dir.path(), r#"echo "ClamAV 1.3.0"; exit 0"#);
    assert!(ClamScanService::new(engine).health_check().await);
    assert!(
        !ClamScanService::new(dir.path().join("missing"))
            .health_check()
            .await
    );
}
