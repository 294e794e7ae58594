use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docrag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docrag");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(files_dir.join("short.txt"), "S1. S2. S3. S4. S5.").unwrap();
    fs::write(
        files_dir.join("notes.md"),
        "Rust has no garbage collector. Ownership decides when memory is freed.\n\
         Borrowing lets code read data without taking ownership.",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/docrag.sqlite"

[chunking]
target_size = 600
overlap_size = 150

[chunking.update]
target_size = 1000
overlap_size = 200

[retrieval]
default_limit = 5

[embedding]
provider = "disabled"
"#,
        root.display()
    );

    let config_path = config_dir.join("docrag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_docrag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docrag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docrag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn file_arg(config_path: &Path, name: &str) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("files")
        .join(name)
        .to_string_lossy()
        .to_string()
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_docrag(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/docrag.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_docrag(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_docrag(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");

    let (_, stderr, success) = run_docrag(&missing, &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_chunk_preview_with_overrides() {
    let (_tmp, config_path) = setup_test_env();
    let file = file_arg(&config_path, "short.txt");

    let (stdout, stderr, success) = run_docrag(
        &config_path,
        &["chunk", "--file", &file, "--target", "10", "--overlap", "5"],
    );
    assert!(success, "chunk failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("4 chunks (create profile, target 10, overlap 5)"));
    assert!(stdout.contains("[chunk 0] 7 chars"));
    assert!(stdout.contains("S3. S4. S5."));
}

#[test]
fn test_chunk_preview_update_profile() {
    let (_tmp, config_path) = setup_test_env();
    let file = file_arg(&config_path, "notes.md");

    let (stdout, _, success) = run_docrag(&config_path, &["chunk", "--file", &file, "--update"]);
    assert!(success);
    assert!(stdout.contains("1 chunks (update profile, target 1000, overlap 200)"));
}

#[test]
fn test_chunk_rejects_overlap_not_below_target() {
    let (_tmp, config_path) = setup_test_env();
    let file = file_arg(&config_path, "short.txt");

    let (_, stderr, success) = run_docrag(
        &config_path,
        &["chunk", "--file", &file, "--target", "10", "--overlap", "10"],
    );
    assert!(!success);
    assert!(stderr.contains("invalid chunk parameters"));
}

#[test]
fn test_add_with_disabled_provider_writes_nothing() {
    let (_tmp, config_path) = setup_test_env();
    let file = file_arg(&config_path, "notes.md");

    run_docrag(&config_path, &["init"]);
    let (_, stderr, success) = run_docrag(
        &config_path,
        &["add", "--owner", "alice", "--title", "Notes", "--file", &file],
    );
    assert!(!success, "add should fail without an embedding provider");
    assert!(stderr.contains("disabled"), "stderr={}", stderr);

    let (stdout, _, success) = run_docrag(&config_path, &["list", "--owner", "alice"]);
    assert!(success);
    assert!(stdout.contains("No documents."));
}

#[test]
fn test_search_empty_store_has_no_results() {
    let (_tmp, config_path) = setup_test_env();

    run_docrag(&config_path, &["init"]);
    let (stdout, stderr, success) =
        run_docrag(&config_path, &["search", "ownership", "--owner", "alice"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_zero_limit_rejected() {
    let (_tmp, config_path) = setup_test_env();

    run_docrag(&config_path, &["init"]);
    let (_, stderr, success) = run_docrag(
        &config_path,
        &["search", "ownership", "--owner", "alice", "--limit", "0"],
    );
    assert!(!success);
    assert!(stderr.contains("search limit must be at least 1"));
}

#[test]
fn test_get_and_delete_unknown_document() {
    let (_tmp, config_path) = setup_test_env();

    run_docrag(&config_path, &["init"]);
    let (_, stderr, success) = run_docrag(&config_path, &["get", "missing-id"]);
    assert!(!success);
    assert!(stderr.contains("document not found: missing-id"));

    let (_, stderr, success) = run_docrag(&config_path, &["delete", "missing-id"]);
    assert!(!success);
    assert!(stderr.contains("document not found: missing-id"));
}
