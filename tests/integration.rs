use mockito::{Matcher, Server, ServerGuard};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docsift_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docsift");
    path
}

/// Temp workspace with three text files and a config pointing the model
/// client at `llm_url`.
fn setup_test_env(llm_url: &str) -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(files_dir.join("nested")).unwrap();
    fs::write(
        files_dir.join("alpha.txt"),
        "Alpha document about Rust programming.\n\nIt covers cargo and crates.",
    )
    .unwrap();
    fs::write(
        files_dir.join("beta.txt"),
        "Beta notes on deployment.\n\n\n\nKubernetes   and Docker are mentioned here.",
    )
    .unwrap();
    fs::write(
        files_dir.join("nested").join("gamma.txt"),
        "Gamma is a nested file about budgets.",
    )
    .unwrap();
    fs::write(files_dir.join("ignored.md"), "# Not a supported type").unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/docsift.sqlite"

[chunking]
max_chunk_size = 4000

[llm]
base_url = "{}"
model = "llama3.1:8b"
timeout_secs = 5
probe_timeout_secs = 2

[logging]
level = "warn"
"#,
        root.display(),
        llm_url
    );

    let config_path = config_dir.join("docsift.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path, files_dir)
}

fn run_docsift(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docsift_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docsift binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Ollama stand-in answering each analysis prompt by its leading words.
fn fake_ollama() -> ServerGuard {
    let mut server = Server::new();

    server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"models":[{"name":"llama3.1:8b"},{"name":"phi3"}]}"#)
        .create();

    let replies = [
        ("Summarize the following", "A short note."),
        ("Extract the 10", "Rust, deployment, rust, Docker"),
        ("Categorize the following", "Technology, Education"),
        ("Rate the emotional tone", "Sentiment: 0.4"),
        ("Hello!", "Hello!"),
    ];
    for (prefix, reply) in replies {
        server
            .mock("POST", "/api/generate")
            .match_body(Matcher::Regex(prefix.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(serde_json::json!({ "response": reply, "done": true }).to_string())
            .create();
    }

    server
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path, _) = setup_test_env("http://127.0.0.1:1");

    let (stdout, stderr, success) = run_docsift(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data").join("docsift.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path, _) = setup_test_env("http://127.0.0.1:1");

    let (_, _, success1) = run_docsift(&config_path, &["init"]);
    assert!(success1, "First init failed");
    let (_, _, success2) = run_docsift(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_scan_with_unreachable_model_fails_documents_but_keeps_chunks() {
    let (_tmp, config_path, files_dir) = setup_test_env("http://127.0.0.1:1");
    run_docsift(&config_path, &["init"]);

    let (stdout, stderr, success) = run_docsift(
        &config_path,
        &["scan", files_dir.to_str().unwrap(), "--progress", "off"],
    );
    assert!(success, "scan failed: stdout={}, stderr={}", stdout, stderr);
    assert!(
        stdout.contains("3 discovered, 3 processed, 0 completed, 3 failed"),
        "unexpected summary: {}",
        stdout
    );

    let (stdout, _, success) = run_docsift(&config_path, &["list", "--status", "failed"]);
    assert!(success);
    assert!(stdout.contains("alpha.txt"));
    assert!(stdout.contains("unreachable"), "missing diagnostic: {}", stdout);
    assert!(!stdout.contains("ignored.md"));

    // Extraction ran before the probe, so chunks are stored.
    let (stdout, _, success) = run_docsift(&config_path, &["get", "1"]);
    assert!(success);
    assert!(stdout.contains("status:       failed"));
    assert!(stdout.contains("--- Chunks (1) ---"));
    assert!(stdout.contains("Alpha document about Rust programming.\n\nIt covers cargo and crates."));

    let (stdout, _, success) = run_docsift(&config_path, &["status", "1"]);
    assert!(success);
    assert!(stdout.contains("document 1: failed"));
    assert!(stdout.contains("analysis:   none"));
    assert!(stdout.contains("unreachable"));

    let (_, stderr, success) = run_docsift(&config_path, &["status", "77"]);
    assert!(!success);
    assert!(stderr.contains("document 77 not found"));
}

#[test]
fn test_scan_and_browse_with_model() {
    let server = fake_ollama();
    let (_tmp, config_path, files_dir) = setup_test_env(&server.url());
    run_docsift(&config_path, &["init"]);

    let (stdout, _, success) = run_docsift(&config_path, &["probe"]);
    assert!(success, "probe failed: {}", stdout);
    assert!(stdout.contains("llama3.1:8b is loaded"));

    let (stdout, stderr, success) = run_docsift(
        &config_path,
        &["scan", files_dir.to_str().unwrap(), "--progress", "json"],
    );
    assert!(success, "scan failed: stdout={}, stderr={}", stdout, stderr);
    assert!(
        stdout.contains("3 completed, 0 failed"),
        "unexpected summary: {}",
        stdout
    );
    assert!(stderr.contains(r#""phase":"processing""#));

    let (stdout, _, success) = run_docsift(&config_path, &["get", "2"]);
    assert!(success);
    assert!(stdout.contains("name:         beta.txt"));
    assert!(stdout.contains("status:       completed"));
    assert!(stdout.contains("keywords:     Rust, deployment, Docker"));
    assert!(stdout.contains("categories:   Technology, Education"));
    assert!(stdout.contains("sentiment:    0.40"));
    assert!(stdout.contains("confidence:   100%"));
    assert!(stdout.contains("A short note."));
    assert!(stdout.contains("Beta notes on deployment.\n\nKubernetes and Docker are mentioned here."));

    let (stdout, _, success) = run_docsift(&config_path, &["status", "2"]);
    assert!(success);
    assert!(stdout.contains("document 2: completed"));
    assert!(stdout.contains("confidence: 100%"));

    let (stdout, _, success) = run_docsift(&config_path, &["search", "budgets"]);
    assert!(success);
    assert!(stdout.contains("gamma.txt"));
    assert!(!stdout.contains("alpha.txt"));

    let (stdout, _, success) = run_docsift(&config_path, &["reanalyze", "1", "--detailed"]);
    assert!(success, "reanalyze failed: {}", stdout);
    assert!(stdout.contains("re-analyzed"));

    let (stdout, _, success) = run_docsift(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Documents:   3"));
    assert!(stdout.contains("Analyses:    4"));
    assert!(stdout.contains("completed"));
}

#[test]
fn test_scan_respects_limit_and_recursion() {
    let (_tmp, config_path, files_dir) = setup_test_env("http://127.0.0.1:1");
    run_docsift(&config_path, &["init"]);

    let (stdout, _, success) = run_docsift(
        &config_path,
        &[
            "scan",
            files_dir.to_str().unwrap(),
            "--no-recursive",
            "--types",
            "txt,pdf",
            "--progress",
            "off",
        ],
    );
    assert!(success);
    assert!(stdout.contains("2 discovered"), "got: {}", stdout);

    let (stdout, _, success) = run_docsift(
        &config_path,
        &["scan", files_dir.to_str().unwrap(), "--limit", "1", "--progress", "off"],
    );
    assert!(success);
    assert!(stdout.contains("1 discovered"), "got: {}", stdout);
}

#[test]
fn test_reanalyze_unknown_document_fails() {
    let (_tmp, config_path, _) = setup_test_env("http://127.0.0.1:1");
    run_docsift(&config_path, &["init"]);

    let (_, stderr, success) = run_docsift(&config_path, &["reanalyze", "42"]);
    assert!(!success);
    assert!(stderr.contains("document 42 not found"), "got: {}", stderr);
}

#[test]
fn test_scan_missing_folder_fails() {
    let (tmp, config_path, _) = setup_test_env("http://127.0.0.1:1");
    let missing = tmp.path().join("nope");

    let (_, stderr, success) = run_docsift(
        &config_path,
        &["scan", missing.to_str().unwrap(), "--progress", "off"],
    );
    assert!(!success);
    assert!(stderr.contains("does not exist"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (tmp, config_path, _) = setup_test_env("http://127.0.0.1:1");
    fs::write(
        &config_path,
        format!(
            "[db]\npath = \"{}/x.sqlite\"\n[analysis]\nfailure_threshold = 9\n",
            tmp.path().display()
        ),
    )
    .unwrap();

    let (_, stderr, success) = run_docsift(&config_path, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("failure_threshold"));
}

#[test]
fn test_get_unknown_document_fails() {
    let (_tmp, config_path, _) = setup_test_env("http://127.0.0.1:1");
    run_docsift(&config_path, &["init"]);

    let (_, stderr, success) = run_docsift(&config_path, &["get", "99"]);
    assert!(!success);
    assert!(stderr.contains("document not found: 99"));
}
