use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ragsync_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ragsync");
    path
}

const ALPHA: &str = "# Alpha Document\n\nThis is the alpha document about Rust programming.\n\nIt contains information about cargo and crates.";

fn write_config(root: &Path, identity: &str) -> PathBuf {
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[index]
path = "{root}/vector_db"
identity = "{identity}"

[embedding]
provider = "hashed"
dims = 256

[data]
path = "{root}/files"
loader = "text"
include_globs = ["**/*.md", "**/*.txt"]

[sessions]
dir = "{root}/snapshots"
"#,
        root = root.display(),
        identity = identity,
    );

    let config_path = config_dir.join("ragsync.toml");
    fs::write(&config_path, config_content).unwrap();
    config_path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(files_dir.join("alpha.md"), ALPHA).unwrap();
    fs::write(
        files_dir.join("beta.md"),
        "# Beta Document\n\nThis document discusses Python and machine learning.\n\nDeep learning frameworks like PyTorch are covered.",
    ).unwrap();
    fs::write(
        files_dir.join("gamma.txt"),
        "Gamma plain text file.\n\nContains notes about deployment and infrastructure.\n\nKubernetes and Docker are mentioned here.",
    ).unwrap();

    let config_path = write_config(&root, "content");
    (tmp, config_path)
}

fn run_ragsync(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ragsync_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ragsync binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_update_creates_index() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ragsync(&config_path, &["update"]);
    assert!(success, "update failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("added: 3"), "got: {}", stdout);
    assert!(tmp.path().join("vector_db/index.sqlite").exists());
}

#[test]
fn test_update_twice_is_up_to_date() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout1, _, success1) = run_ragsync(&config_path, &["update"]);
    assert!(success1);
    assert!(stdout1.contains("added: 3"));

    let (stdout2, _, success2) = run_ragsync(&config_path, &["update"]);
    assert!(success2);
    assert!(
        stdout2.contains("already up to date"),
        "Expected no-op second run, got: {}",
        stdout2
    );
}

#[test]
fn test_update_after_edit_adds_only_changed_chunk() {
    let (tmp, config_path) = setup_test_env();
    run_ragsync(&config_path, &["update"]);

    fs::write(
        tmp.path().join("files/alpha.md"),
        "# Alpha Document Updated\n\nThis file was modified.",
    )
    .unwrap();

    let (stdout, _, success) = run_ragsync(&config_path, &["update"]);
    assert!(success);
    assert!(stdout.contains("added: 1"), "got: {}", stdout);
    assert!(stdout.contains("skipped: 2"), "got: {}", stdout);
}

#[test]
fn test_duplicate_text_stored_once() {
    let (tmp, config_path) = setup_test_env();
    fs::write(tmp.path().join("files/alpha-copy.md"), ALPHA).unwrap();

    let (stdout, _, success) = run_ragsync(&config_path, &["update"]);
    assert!(success);
    assert!(stdout.contains("chunks: 4"), "got: {}", stdout);
    assert!(stdout.contains("added: 3"), "got: {}", stdout);

    let (status, _, _) = run_ragsync(&config_path, &["status"]);
    assert!(status.contains("entries: 3"), "got: {}", status);
}

#[test]
fn test_dry_run_writes_nothing() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_ragsync(&config_path, &["update", "--dry-run"]);
    assert!(success);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("would add: 3"));
    assert!(!tmp.path().join("vector_db").exists());
}

#[test]
fn test_status_before_and_after_update() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_ragsync(&config_path, &["status"]);
    assert!(success);
    assert!(stdout.contains("present: no"));
    assert!(stdout.contains("entries: 0"));

    run_ragsync(&config_path, &["update"]);
    let (stdout, _, _) = run_ragsync(&config_path, &["status"]);
    assert!(stdout.contains("present: yes"));
    assert!(stdout.contains("identity: content"));
    assert!(stdout.contains("model: hashed-256"));
    assert!(stdout.contains("entries: 3"));
}

#[test]
fn test_delete_twice() {
    let (tmp, config_path) = setup_test_env();
    run_ragsync(&config_path, &["update"]);

    let (stdout, _, success) = run_ragsync(&config_path, &["delete"]);
    assert!(success);
    assert!(stdout.contains("Deleted"));
    assert!(!tmp.path().join("vector_db").exists());

    let (stdout, stderr, success) = run_ragsync(&config_path, &["delete"]);
    assert!(success, "deleting a missing index must succeed");
    assert!(stdout.contains("No vector index"));
    assert!(stderr.contains("nothing to delete"), "stderr: {}", stderr);
}

#[test]
fn test_query_ranks_relevant_file_first() {
    let (_tmp, config_path) = setup_test_env();
    run_ragsync(&config_path, &["update"]);

    let (stdout, stderr, success) =
        run_ragsync(&config_path, &["query", "Rust programming cargo crates"]);
    assert!(success, "query failed: {}", stderr);
    let first = stdout.lines().next().unwrap_or_default();
    assert!(first.starts_with("1."), "got: {}", stdout);
    assert!(first.contains("alpha.md"), "got: {}", stdout);
}

#[test]
fn test_query_respects_k() {
    let (_tmp, config_path) = setup_test_env();
    run_ragsync(&config_path, &["update"]);

    let (stdout, _, success) = run_ragsync(&config_path, &["query", "document", "--k", "1"]);
    assert!(success);
    assert!(stdout.contains("1. ["));
    assert!(!stdout.contains("2. ["));
}

#[test]
fn test_query_empty_index() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_ragsync(&config_path, &["query", "anything"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_identity_policy_change_requires_reset() {
    let (tmp, config_path) = setup_test_env();
    run_ragsync(&config_path, &["update"]);

    let config_path = write_config(tmp.path(), "positional");
    let (_, stderr, success) = run_ragsync(&config_path, &["update"]);
    assert!(!success);
    assert!(stderr.contains("identity policy"), "stderr: {}", stderr);

    let (stdout, stderr, success) = run_ragsync(&config_path, &["update", "--reset"]);
    assert!(success, "reset failed: {}", stderr);
    assert!(stdout.contains("added: 3"));
}

#[test]
fn test_non_directory_index_path_fails() {
    let (tmp, config_path) = setup_test_env();
    fs::write(tmp.path().join("vector_db"), "not an index").unwrap();

    let (_, stderr, success) = run_ragsync(&config_path, &["update"]);
    assert!(!success);
    assert!(stderr.contains("unavailable"), "stderr: {}", stderr);
    assert!(stderr.contains("ragsync update --reset"), "stderr: {}", stderr);

    let (stdout, stderr, success) = run_ragsync(&config_path, &["update", "--reset"]);
    assert!(success, "reset failed: {}", stderr);
    assert!(stdout.contains("added: 3"), "got: {}", stdout);
    assert!(tmp.path().join("vector_db/index.sqlite").exists());
}

#[test]
fn test_corrupt_index_suggests_reset() {
    let (tmp, config_path) = setup_test_env();
    fs::create_dir_all(tmp.path().join("vector_db")).unwrap();
    fs::write(tmp.path().join("vector_db/index.sqlite"), "garbage bytes").unwrap();

    let (_, stderr, success) = run_ragsync(&config_path, &["status"]);
    assert!(!success);
    assert!(stderr.contains("ragsync update --reset"), "stderr: {}", stderr);
}

#[test]
fn test_sessions_round_trip() {
    let (_tmp, config_path) = setup_test_env();
    run_ragsync(&config_path, &["update"]);

    let (stdout, _, success) = run_ragsync(&config_path, &["sessions", "new", "--alias", "demo"]);
    assert!(success);
    assert!(stdout.contains("Started session"));

    let (stdout, stderr, success) = run_ragsync(
        &config_path,
        &["query", "kubernetes deployment", "--session", "demo"],
    );
    assert!(success, "query failed: {}", stderr);
    assert!(stdout.contains("Recorded in session"));

    let (stdout, _, success) = run_ragsync(&config_path, &["sessions", "list"]);
    assert!(success);
    assert!(stdout.contains("demo"));
    assert!(stdout.contains("kubernetes deployment"));

    let (stdout, _, success) = run_ragsync(&config_path, &["sessions", "show", "demo"]);
    assert!(success);
    assert!(stdout.contains("Q: kubernetes deployment"));
    assert!(stdout.contains("gamma.txt"));
}

fn started_session_id(stdout: &str) -> String {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix("Started session "))
        .unwrap_or_else(|| panic!("no session id in: {}", stdout))
        .trim()
        .to_string()
}

#[test]
fn test_sessions_show_latest_picks_newer() {
    let (tmp, config_path) = setup_test_env();
    run_ragsync(&config_path, &["update"]);

    let (stdout, _, success) = run_ragsync(&config_path, &["sessions", "new", "--alias", "first"]);
    assert!(success);
    let older = started_session_id(&stdout);
    let (stdout, _, success) = run_ragsync(&config_path, &["sessions", "new"]);
    assert!(success);
    let newer = started_session_id(&stdout);

    let past = std::time::SystemTime::now() - std::time::Duration::from_secs(3600);
    fs::File::options()
        .write(true)
        .open(tmp.path().join(format!("snapshots/{}.json", older)))
        .unwrap()
        .set_modified(past)
        .unwrap();

    let (stdout, stderr, success) = run_ragsync(&config_path, &["sessions", "show", "latest"]);
    assert!(success, "show latest failed: {}", stderr);
    assert!(stdout.contains(&format!("Session {}", newer)), "got: {}", stdout);

    let (stdout, stderr, success) = run_ragsync(
        &config_path,
        &["query", "kubernetes deployment", "--session", "latest"],
    );
    assert!(success, "query failed: {}", stderr);
    assert!(stdout.contains(&format!("Recorded in session {}", newer)), "got: {}", stdout);

    let (_, stderr, success) =
        run_ragsync(&config_path, &["sessions", "new", "--alias", "latest"]);
    assert!(!success);
    assert!(stderr.contains("reserved"), "stderr: {}", stderr);
}

#[test]
fn test_unknown_session_is_error() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_ragsync(&config_path, &["sessions", "show", "missing"]);
    assert!(!success);
    assert!(stderr.contains("No session"));
}

#[test]
fn test_missing_config_fails() {
    let (stdout, stderr, success) = run_ragsync(Path::new("/nonexistent/ragsync.toml"), &["status"]);
    assert!(!success, "stdout={}", stdout);
    assert!(stderr.contains("Failed to read config file"));
}
