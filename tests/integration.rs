use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const REFERENCE_TEXT: &str = "The industrial revolution transformed the economies of Europe \
and North America during the eighteenth and nineteenth centuries. Factories replaced small \
workshops, railways connected distant cities, and millions of people moved from farms into \
growing towns in search of work and better wages.";

const UNRELATED_TEXT: &str = "Photosynthesis allows green plants to convert sunlight, water \
and carbon dioxide into glucose and oxygen. Chlorophyll inside the leaves absorbs light energy, \
which drives a long chain of chemical reactions within the chloroplasts of every cell.";

fn antiplag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("antiplag");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let corpus_dir = root.join("corpus");
    fs::create_dir_all(&corpus_dir).unwrap();
    fs::write(corpus_dir.join("reference.txt"), REFERENCE_TEXT).unwrap();

    let upload_dir = root.join("upload");
    fs::create_dir_all(&upload_dir).unwrap();
    fs::write(upload_dir.join("essay.txt"), REFERENCE_TEXT).unwrap();
    fs::write(upload_dir.join("biology.txt"), UNRELATED_TEXT).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/antiplag.sqlite"

[comparison]
threshold = 0.5

[server]
bind = "127.0.0.1:7341"
"#,
        root.display()
    );

    let config_path = config_dir.join("antiplag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_antiplag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = antiplag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run antiplag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn run_json(config_path: &Path, args: &[&str]) -> serde_json::Value {
    let (stdout, stderr, success) = run_antiplag(config_path, args);
    assert!(success, "{:?} failed: stdout={}, stderr={}", args, stdout, stderr);
    serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("{:?} printed invalid JSON ({}): {}", args, e, stdout))
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_antiplag(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/antiplag.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_antiplag(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_antiplag(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_antiplag(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_corpus_add_deduplicates() {
    let (tmp, config_path) = setup_test_env();
    run_antiplag(&config_path, &["init"]);

    let corpus = tmp.path().join("corpus");
    let first = run_json(&config_path, &["corpus", "add", corpus.to_str().unwrap()]);
    assert_eq!(first["added"], 1);
    assert_eq!(first["duplicates"], 0);

    let second = run_json(&config_path, &["corpus", "add", corpus.to_str().unwrap()]);
    assert_eq!(second["added"], 0);
    assert_eq!(second["duplicates"], 1);
}

#[test]
fn test_submit_and_run_finds_corpus_match() {
    let (tmp, config_path) = setup_test_env();
    run_antiplag(&config_path, &["init"]);
    let corpus = tmp.path().join("corpus");
    run_json(&config_path, &["corpus", "add", corpus.to_str().unwrap()]);

    let essay = tmp.path().join("upload/essay.txt");
    let view = run_json(
        &config_path,
        &["submit", essay.to_str().unwrap(), "--run"],
    );
    assert_eq!(view["status"], "PROCESSED");
    let doc = &view["documents"][0];
    assert_eq!(doc["type"], "FILE");
    assert_eq!(doc["language"], "eng");
    assert_eq!(doc["total_percentage"], 1.0);

    let doc_id = doc["id"].as_str().unwrap();
    let results = run_json(&config_path, &["results", doc_id]);
    let list = results["results"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["match_type"], "CORPUS");
    assert_eq!(list[0]["match_name"], "reference.txt");
    assert_eq!(list[0]["percentage"], 1.0);
    assert!(!list[0]["run_id"].as_str().unwrap().is_empty());
}

#[test]
fn test_unrelated_document_scores_zero() {
    let (tmp, config_path) = setup_test_env();
    run_antiplag(&config_path, &["init"]);
    let corpus = tmp.path().join("corpus");
    run_json(&config_path, &["corpus", "add", corpus.to_str().unwrap()]);

    let bio = tmp.path().join("upload/biology.txt");
    let view = run_json(&config_path, &["submit", bio.to_str().unwrap(), "--run"]);
    let doc = &view["documents"][0];
    assert_eq!(doc["total_percentage"], 0.0);

    let results = run_json(&config_path, &["results", doc["id"].as_str().unwrap()]);
    assert!(results["results"].as_array().unwrap().is_empty());
}

#[test]
fn test_submit_pending_then_run_then_requeue() {
    let (_tmp, config_path) = setup_test_env();
    run_antiplag(&config_path, &["init"]);

    let view = run_json(
        &config_path,
        &["submit", "--text", UNRELATED_TEXT, "--email", "student@example.com"],
    );
    assert_eq!(view["status"], "PENDING");
    assert_eq!(view["documents"][0]["type"], "TEXT");
    let id = view["id"].as_str().unwrap().to_string();

    let first = run_json(&config_path, &["run", &id]);
    assert_eq!(first["outcome"], "completed");
    assert_eq!(first["documents"], 1);

    // A second run is a no-op.
    let second = run_json(&config_path, &["run", &id]);
    assert_eq!(second["outcome"], "already_claimed");
    assert_eq!(second["status"], "PROCESSED");

    let requeued = run_json(&config_path, &["requeue", &id]);
    assert_eq!(requeued["requeued"], true);
    let status = run_json(&config_path, &["status", &id]);
    assert_eq!(status["status"], "PENDING");

    let third = run_json(&config_path, &["run", &id]);
    assert_eq!(third["outcome"], "completed");
    assert_ne!(third["run_id"], first["run_id"]);
}

#[test]
fn test_run_unknown_submission_is_noop() {
    let (_tmp, config_path) = setup_test_env();
    run_antiplag(&config_path, &["init"]);

    let outcome = run_json(&config_path, &["run", "does-not-exist"]);
    assert_eq!(outcome["outcome"], "not_found");
}

#[test]
fn test_submit_requires_input() {
    let (_tmp, config_path) = setup_test_env();
    run_antiplag(&config_path, &["init"]);

    let (_, stderr, success) = run_antiplag(&config_path, &["submit"]);
    assert!(!success);
    assert!(stderr.contains("nothing to submit"));
}

#[test]
fn test_completions_without_config() {
    let tmp = TempDir::new().unwrap();
    let (stdout, _, success) =
        run_antiplag(&tmp.path().join("missing.toml"), &["completions", "bash"]);
    assert!(success);
    assert!(stdout.contains("antiplag"));
}
