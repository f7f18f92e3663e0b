//! Integration tests for CLI argument handling
//!
//! Runs the built binary against a throwaway cache directory so nothing
//! touches the real cache or the network.

use std::fs;
use std::path::Path;
use std::process::Command;

use leadsync::cache::{FileStore, Identity, JsonStore, LeadCache};
use leadsync::clock;
use leadsync::data::{Lead, LeadStatus};
use tempfile::TempDir;

/// Writes a config pointing the cache at `dir` and the webhooks at a closed port
fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("leadsync.yaml");
    let yaml = format!(
        "endpoints:\n  leads_url: http://127.0.0.1:9/leads\n  client_url: http://127.0.0.1:9/client\ncache:\n  dir: {}\n",
        dir.join("cache").display()
    );
    fs::write(&path, yaml).expect("Failed to write config");
    path
}

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_leadsync"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute leadsync")
}

fn run_with_config(config: &Path, args: &[&str]) -> std::process::Output {
    let config = config.to_str().expect("utf-8 path");
    let mut full = vec!["--config", config];
    full.extend_from_slice(args);
    run_cli(&full)
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(
        output.status.success(),
        "Expected --help to exit successfully"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("leadsync"), "Help should mention leadsync");
    assert!(stdout.contains("leads"), "Help should list the leads command");
    assert!(stdout.contains("watch"), "Help should list the watch command");
}

#[test]
fn test_missing_subcommand_fails() {
    let output = run_cli(&[]);
    assert!(!output.status.success());
}

#[test]
fn test_watch_rejects_out_of_range_interval() {
    let output = run_cli(&["watch", "--interval", "30"]);
    assert!(!output.status.success(), "Expected interval 30 to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("between 60 and 900"),
        "Should explain the interval bounds: {}",
        stderr
    );
}

#[test]
fn test_invalid_status_prints_error_and_exits() {
    let output = run_cli(&["leads", "--status", "hot"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Invalid status"),
        "Should print error message about invalid status: {}",
        stderr
    );
}

#[test]
fn test_missing_config_file_fails() {
    let output = run_cli(&["--config", "/definitely/not/here.yaml", "cache", "info"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("NotFound"), "stderr: {}", stderr);
}

#[test]
fn test_cache_info_on_empty_cache() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    let output = run_with_config(&config, &["cache", "info"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Lead list:    empty"), "stdout: {}", stdout);
}

#[test]
fn test_leads_without_session_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    let output = run_with_config(&config, &["leads"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("NotSignedIn"), "stderr: {}", stderr);
}

#[test]
fn test_leads_served_from_fresh_cache() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    let identity = Identity::new("EMP1", "emp1@example.com");
    let cache = LeadCache::with_defaults(
        JsonStore::new(FileStore::with_dir(dir.path().join("cache"))),
        clock::system(),
    );
    let leads = vec![
        Lead {
            id: "CRM-LEAD-1".to_string(),
            name: "Ananya Rao".to_string(),
            status: LeadStatus::Qualified,
            created_at: "2024-05-01 10:00:00".to_string(),
            ..Default::default()
        },
        Lead {
            id: "CRM-LEAD-2".to_string(),
            name: "Vikram Shah".to_string(),
            created_at: "2024-05-02 10:00:00".to_string(),
            ..Default::default()
        },
    ];
    cache.save_list(&leads, &identity);

    let output = run_with_config(
        &config,
        &[
            "--employee-id",
            "EMP1",
            "--email",
            "emp1@example.com",
            "leads",
            "--status",
            "qualified",
        ],
    );

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Ananya Rao"));
    assert!(!stdout.contains("Vikram Shah"));
    assert!(stdout.contains("Showing 1-1 of 1 leads"));
}

#[test]
fn test_cached_list_is_scoped_to_identity() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    let cache = LeadCache::with_defaults(
        JsonStore::new(FileStore::with_dir(dir.path().join("cache"))),
        clock::system(),
    );
    cache.save_list(
        &[Lead {
            id: "CRM-LEAD-1".to_string(),
            ..Default::default()
        }],
        &Identity::new("EMP1", "emp1@example.com"),
    );

    // Another user misses the cache and the fetch to a closed port fails
    let output = run_with_config(
        &config,
        &["--employee-id", "EMP2", "--email", "emp2@example.com", "leads"],
    );

    assert!(!output.status.success());
}

#[test]
fn test_cache_clear() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    let cache = LeadCache::with_defaults(
        JsonStore::new(FileStore::with_dir(dir.path().join("cache"))),
        clock::system(),
    );
    cache.save_list(
        &[Lead {
            id: "CRM-LEAD-1".to_string(),
            ..Default::default()
        }],
        &Identity::new("EMP1", "emp1@example.com"),
    );

    let output = run_with_config(&config, &["cache", "clear"]);

    assert!(output.status.success());
    assert!(!cache.info().has_list);
}
