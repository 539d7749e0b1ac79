mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

use common::{seed_repo, REPO_URL};

fn analyzer_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("repo-analyzer");
    path
}

/// Temp workspace with a config pointing the cache and database inside it,
/// and the demo repository already in the clone cache.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let cache_dir = root.join("cache");
    let config_path = config_dir.join("analyzer.toml");
    fs::write(
        &config_path,
        format!(
            r#"[cache]
dir = "{cache}"
db_path = "{db}"

[chunking]
chunk_size = 200
overlap = 20
"#,
            cache = cache_dir.display(),
            db = cache_dir.join("analyzer.sqlite").display(),
        ),
    )
    .unwrap();

    seed_repo(&cache_dir, REPO_URL);
    (tmp, config_path)
}

fn run_analyzer(config_path: &Path, args: &[&str]) -> Output {
    Command::new(analyzer_binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run repo-analyzer")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn test_init_writes_default_config() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("config").join("analyzer.toml");

    // Run from the temp dir so the default relative cache lands there.
    let output = Command::new(analyzer_binary())
        .current_dir(tmp.path())
        .arg("--config")
        .arg(&config_path)
        .arg("init")
        .output()
        .unwrap();
    assert!(output.status.success(), "init failed: {}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("Wrote default config"));
    assert!(out.contains("Database initialized"));
    assert!(config_path.exists());
    assert!(tmp.path().join("cached_repos/analyzer.sqlite").exists());

    // A second run keeps the existing config.
    let output = Command::new(analyzer_binary())
        .current_dir(tmp.path())
        .arg("--config")
        .arg(&config_path)
        .arg("init")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(!stdout(&output).contains("Wrote default config"));
}

#[test]
fn test_init_with_existing_config() {
    let (tmp, config_path) = setup_test_env();
    let output = run_analyzer(&config_path, &["init"]);
    assert!(output.status.success(), "init failed: {}", stderr(&output));
    assert!(tmp.path().join("cache/analyzer.sqlite").exists());
}

#[test]
fn test_analyze_prints_summary() {
    let (_tmp, config_path) = setup_test_env();
    let output = run_analyzer(&config_path, &["analyze", REPO_URL]);
    assert!(output.status.success(), "analyze failed: {}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("Repository Overview (Basic Analysis)"));
    assert!(out.contains("This appears to be a mixed project"));
    assert!(out.contains("files indexed: 2"));
    assert!(out.contains("classes: 1"));
}

#[test]
fn test_analyze_json() {
    let (_tmp, config_path) = setup_test_env();
    let output = run_analyzer(&config_path, &["analyze", REPO_URL, "--json"]);
    assert!(output.status.success(), "analyze failed: {}", stderr(&output));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["repo_id"].as_str().unwrap().len(), 16);
    assert_eq!(json["stats"]["python_files"], 1);
    assert_eq!(json["files"][0], "app.py");
}

#[test]
fn test_ask_summary_question() {
    let (_tmp, config_path) = setup_test_env();
    let output = run_analyzer(&config_path, &["ask", REPO_URL, "What is this repo about?"]);
    assert!(output.status.success(), "ask failed: {}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("Basic Analysis"));
    assert!(!out.contains("Sources:"));
}

#[test]
fn test_ask_without_llm_fails() {
    let (_tmp, config_path) = setup_test_env();
    let output = run_analyzer(&config_path, &["ask", REPO_URL, "How is config loaded?"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("no LLM provider is configured"));
}

#[test]
fn test_explain_file() {
    let (_tmp, config_path) = setup_test_env();
    let output = run_analyzer(&config_path, &["explain", REPO_URL, "app.py"]);
    assert!(output.status.success(), "explain failed: {}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("## File Analysis: app.py"));
    assert!(out.contains("- **load_config** (line 6)"));
    assert!(out.contains("Has documentation strings"));
}

#[test]
fn test_explain_missing_file_fails() {
    let (_tmp, config_path) = setup_test_env();
    let output = run_analyzer(&config_path, &["explain", REPO_URL, "missing.py"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("File not found in codebase: missing.py"));
}

#[test]
fn test_invalid_url_fails() {
    let (_tmp, config_path) = setup_test_env();
    let output = run_analyzer(&config_path, &["analyze", "https://example.com/x/y"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("URL must be a GitHub repository URL"));
}

#[test]
fn test_reanalyze_uses_stored_index() {
    let (_tmp, config_path) = setup_test_env();
    let first = run_analyzer(&config_path, &["analyze", REPO_URL]);
    let second = run_analyzer(&config_path, &["analyze", REPO_URL]);
    assert!(first.status.success());
    assert!(second.status.success());
    assert_eq!(stdout(&first), stdout(&second));
}
