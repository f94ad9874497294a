use std::path::Path;
use std::process::{Command, Output};

fn workspace(dotenv: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("data")).unwrap();
    std::fs::write(dir.path().join("data/a.txt"), "alpha").unwrap();
    std::fs::write(dir.path().join(".env"), dotenv).unwrap();
    dir
}

fn docqa_status(cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_docqa"))
        .arg("status")
        .current_dir(cwd)
        .env_remove("API_KEY")
        .env_remove("OPENAI_API_KEY")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn malformed_dotenv_is_reported_not_swallowed() {
    let dir = workspace("API_KEY=\"unterminated\n");
    let output = docqa_status(dir.path());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "status failed: {stderr}");
    assert!(stderr.contains("failed to load .env"), "stderr: {stderr}");
}

#[test]
fn well_formed_dotenv_loads_quietly() {
    let dir = workspace("DOCQA_EXAMPLE=1\n");
    let output = docqa_status(dir.path());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "status failed: {stderr}");
    assert!(!stderr.contains("failed to load .env"), "stderr: {stderr}");
}
