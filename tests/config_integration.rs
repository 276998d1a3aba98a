use koc_support_chat::config::{AppConfig, Command, Cli};
use serial_test::serial;
use std::env;
use std::fs;
use std::time::Duration;

use clap::Parser;

// Helper to clear environment variables that might interfere with tests
fn clear_env_vars() {
    unsafe {
        env::remove_var("KOC_SERVER__PORT");
        env::remove_var("KOC_COMPLETION__STREAMING");
        env::remove_var("KOC_UI__STATS_REFRESH_SECS");
        env::remove_var("KOC_UI__MAX_ENTRIES");
        env::remove_var("KOC_API_BASE");
        env::remove_var("KOC_MODEL");
        env::remove_var("CONFIG_FILE");
        env::remove_var("PORT");
    }
}

#[test]
#[serial]
fn test_default_config() {
    clear_env_vars();

    let config = AppConfig::load_from_args(["koc-chat"]).expect("Failed to load config");
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.completion.base_url, "http://localhost:8000");
    assert!(config.completion.streaming);
    assert_eq!(config.ui.toast_ttl_ms, 3000);
    assert_eq!(config.ui.quick_questions.len(), 3);
    assert_eq!(config.ui.max_entries, 200);
    assert_eq!(
        config.ui.stats_refresh_interval(),
        Some(Duration::from_secs(60))
    );
    assert_eq!(config.listen_addr(), "127.0.0.1:3000");
}

#[test]
#[serial]
fn test_env_override() {
    clear_env_vars();
    unsafe {
        env::set_var("KOC_SERVER__PORT", "9090");
        env::set_var("KOC_COMPLETION__STREAMING", "false");
        env::set_var("KOC_UI__STATS_REFRESH_SECS", "0");
        env::set_var("KOC_UI__MAX_ENTRIES", "50");
    }

    let config = AppConfig::load_from_args(["koc-chat"]).expect("Failed to load config");
    assert_eq!(config.server.port, 9090);
    assert!(!config.completion.streaming);
    assert_eq!(config.ui.stats_refresh_interval(), None);
    assert!(!config.controller_options().streaming);
    assert_eq!(config.controller_options().max_entries, 50);

    clear_env_vars();
}

#[test]
#[serial]
fn test_file_load() {
    clear_env_vars();

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let file_path = dir.path().join("koc.yaml");
    fs::write(
        &file_path,
        r#"
server:
  port: 7070
ui:
  title: "Support"
  toast_ttl_ms: 1500
  quick_questions:
    - "Where is my order?"
    "#,
    )
    .expect("Failed to write temp config");

    let path = file_path.to_string_lossy().to_string();
    let config =
        AppConfig::load_from_args(["koc-chat", "--config", path.as_str()]).expect("Failed to load config from file");
    assert_eq!(config.server.port, 7070);
    assert_eq!(config.ui.title, "Support");
    assert_eq!(config.ui.quick_questions, vec!["Where is my order?".to_string()]);
    assert_eq!(
        config.controller_options().toast_ttl,
        Duration::from_millis(1500)
    );
}

#[test]
#[serial]
fn test_missing_explicit_file_is_error() {
    clear_env_vars();

    let result = AppConfig::load_from_args(["koc-chat", "--config", "/nonexistent/koc.yaml"]);
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_cwd_config_fallback() {
    clear_env_vars();

    let cwd_path = "config.yaml";
    fs::write(
        cwd_path,
        r#"
server:
  port: 6060
    "#,
    )
    .expect("Failed to write ./config.yaml");

    let config = AppConfig::load_from_args(["koc-chat"]);

    fs::remove_file(cwd_path).unwrap();

    assert_eq!(config.expect("Failed to load config").server.port, 6060);
}

#[test]
#[serial]
fn test_cli_overrides_env() {
    clear_env_vars();
    unsafe {
        env::set_var("KOC_SERVER__PORT", "9090");
    }

    let config = AppConfig::load_from_args([
        "koc-chat",
        "--port",
        "4000",
        "--api-base",
        "http://10.0.0.5:9000/v1",
        "--model",
        "koc-small",
    ])
    .expect("Failed to load config");
    assert_eq!(config.server.port, 4000);
    assert_eq!(config.completion.base_url, "http://10.0.0.5:9000/v1");
    assert_eq!(config.completion.model, "koc-small");

    clear_env_vars();
}

#[test]
#[serial]
fn test_subcommands_parse() {
    clear_env_vars();

    let cli = Cli::parse_from(["koc-chat", "ask", "How do I pay?", "--no-stream"]);
    assert_eq!(
        cli.command,
        Some(Command::Ask {
            message: "How do I pay?".to_string(),
            no_stream: true,
        })
    );

    let cli = Cli::parse_from(["koc-chat"]);
    assert_eq!(cli.command, None);

    let cli = Cli::parse_from(["koc-chat", "diagnose"]);
    assert_eq!(cli.command, Some(Command::Diagnose));
}
