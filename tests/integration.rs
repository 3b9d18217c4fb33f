mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use common::{page, StubServer};

fn fedsearch_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("fedsearch");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    // Port 1 on loopback refuses connections, so searches fail fast.
    setup_test_env_with("http://127.0.0.1:1/api", "http://127.0.0.1:1/archive")
}

fn setup_test_env_with(prod: &str, archive: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[search]
window_size = 10
timeout_secs = 5

[history]
path = "{}/data/history.sqlite"

[sources.prod]
address = "{}"
display_name = "Production"

[sources.archive]
address = "{}"
display_name = "Archive"
selected = false
"#,
        root.display(),
        prod,
        archive
    );

    let config_path = config_dir.join("fedsearch.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_fedsearch(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = fedsearch_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("NO_PROXY", "*")
        .env_remove("HTTP_PROXY")
        .env_remove("HTTPS_PROXY")
        .env_remove("http_proxy")
        .env_remove("https_proxy")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run fedsearch binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_fedsearch(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/history.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_fedsearch(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_fedsearch(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_sources_lists_configured_sources() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_fedsearch(&config_path, &["sources"]);
    assert!(success, "sources failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("prod"));
    assert!(stdout.contains("Production"));
    assert!(stdout.contains("archive"));
    assert!(stdout.contains("no"));
}

#[test]
fn test_sources_without_config_file() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("missing.toml");

    let (stdout, _, success) = run_fedsearch(&missing, &["sources"]);
    assert!(success);
    assert!(stdout.contains("No sources configured."));
}

#[test]
fn test_history_empty_after_init() {
    let (_tmp, config_path) = setup_test_env();

    run_fedsearch(&config_path, &["init"]);
    let (stdout, _, success) = run_fedsearch(&config_path, &["history"]);
    assert!(success);
    assert!(stdout.contains("No searches recorded."));
}

#[test]
fn test_blank_search_has_no_results() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) =
        run_fedsearch(&config_path, &["search", "  ", "--progress", "off"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_with_every_source_down_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_fedsearch(
        &config_path,
        &["search", "budget", "--source", "prod", "--source", "archive", "--progress", "off"],
    );
    assert!(!success);
    assert!(!stdout.contains("Showing"), "stdout={}", stdout);
    assert!(
        stderr.contains("all 2 search sources failed"),
        "stderr={}",
        stderr
    );

    // Failed searches are not recorded.
    let (stdout, _, _) = run_fedsearch(&config_path, &["history"]);
    assert!(stdout.contains("No searches recorded."));
}

#[test]
fn test_search_unknown_source_rejected() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) =
        run_fedsearch(&config_path, &["search", "budget", "--source", "nope"]);
    assert!(!success);
    assert!(stderr.contains("Unknown source: 'nope'"));
}

#[test]
fn test_invalid_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("bad.toml");
    fs::write(&config_path, "[sources.prod]\naddress = \"ftp://nowhere\"\n").unwrap();

    let (_, stderr, success) = run_fedsearch(&config_path, &["sources"]);
    assert!(!success);
    assert!(stderr.contains("must start with http://"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_search_merges_sources_and_records_history() {
    let server = StubServer::start(|request, _| {
        let body = if request.path.starts_with("/archive") {
            page(&[("a1", "budget archive.pdf", "2024-06-01T08:00:00Z")], false, Some(1))
        } else {
            page(
                &[
                    ("p1", "Q3 budget.xlsx", "2024-05-01T10:00:00.000+0000"),
                    ("p2", "budget notes.txt", "2024-07-01T09:30:00Z"),
                ],
                false,
                Some(2),
            )
        };
        (200, body)
    })
    .await;

    let prod = format!("{}/prod", server.address);
    let archive = format!("{}/archive", server.address);
    let (_tmp, config_path) = setup_test_env_with(&prod, &archive);

    let search_config = config_path.clone();
    let (stdout, stderr, success) = tokio::task::spawn_blocking(move || {
        run_fedsearch(
            &search_config,
            &["search", "budget", "--source", "prod", "--source", "archive", "--progress", "off"],
        )
    })
    .await
    .unwrap();
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);

    // Newest first across both sources.
    let notes = stdout.find("budget notes.txt").expect("prod item shown");
    let archived = stdout.find("budget archive.pdf").expect("archive item shown");
    let sheet = stdout.find("Q3 budget.xlsx").expect("prod item shown");
    assert!(notes < archived && archived < sheet, "stdout={}", stdout);
    assert!(stdout.contains("[Archive]"));
    assert!(stdout.contains("Showing 3 of 3 results"));
    assert_eq!(server.requests().len(), 2);

    let (stdout, _, success) =
        tokio::task::spawn_blocking(move || run_fedsearch(&config_path, &["history"]))
            .await
            .unwrap();
    assert!(success);
    assert!(stdout.contains("3 results  budget"), "stdout={}", stdout);
}
