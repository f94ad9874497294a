use std::path::Path;
use std::process::{Command, Output};

const ALPHA_BETA_HASH: &str = "4046f7bc3f9a38fd1e7e35d93e85245ece9bee9359c133e4d11b80f531034301";

fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir(&data).unwrap();
    std::fs::write(data.join("a.txt"), "alpha").unwrap();
    std::fs::write(data.join("b.txt"), "beta").unwrap();
    dir
}

fn docqa(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_docqa"))
        .args(args)
        .current_dir(cwd)
        .env_remove("API_KEY")
        .env_remove("OPENAI_API_KEY")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn status_json(cwd: &Path, extra: &[&str]) -> serde_json::Value {
    let mut args = vec!["status", "--format", "json"];
    args.extend_from_slice(extra);
    let output = docqa(cwd, &args);
    assert!(
        output.status.success(),
        "docqa status failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn status_reports_fingerprint_without_index() {
    let dir = workspace();
    let status = status_json(dir.path(), &[]);

    assert_eq!(status["dataHash"], ALPHA_BETA_HASH);
    assert_eq!(status["status"], "no index built yet");
    assert_eq!(status["reusable"], false);
    assert!(!dir.path().join("persist").exists(), "status must not create the cache");
}

#[test]
fn status_detects_fresh_and_stale_marker() {
    let dir = workspace();
    let persist = dir.path().join("persist");
    std::fs::create_dir(&persist).unwrap();

    std::fs::write(persist.join("data_hash"), ALPHA_BETA_HASH).unwrap();
    let fresh = status_json(dir.path(), &[]);
    assert_eq!(fresh["status"], "up to date");
    assert_eq!(fresh["reusable"], true);
    assert!(fresh["stats"].is_null(), "no index.db was written");

    std::fs::write(dir.path().join("data/a.txt"), "alpha, revised").unwrap();
    let stale = status_json(dir.path(), &[]);
    assert_eq!(stale["status"], "data has changed (will be rebuilt)");
    assert_eq!(stale["storedHash"], ALPHA_BETA_HASH);
    assert!(persist.join("data_hash").exists(), "status must not delete the cache");
}

#[test]
fn status_honors_directory_flags() {
    let dir = workspace();
    std::fs::rename(dir.path().join("data"), dir.path().join("docs")).unwrap();

    let status = status_json(dir.path(), &["--data-dir", "docs", "--no-persist"]);
    assert_eq!(status["dataHash"], ALPHA_BETA_HASH);
    assert_eq!(status["status"], "persistence disabled");
}

#[test]
fn missing_data_dir_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = docqa(dir.path(), &["status"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not exist"), "unexpected stderr: {stderr}");
}

#[test]
fn chat_without_api_key_fails_before_indexing() {
    let dir = workspace();
    let output = docqa(dir.path(), &["what is in a.txt?"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("API key"), "unexpected stderr: {stderr}");
    assert!(!dir.path().join("persist").exists());
}
