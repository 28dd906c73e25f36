//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use tempfile::TempDir;

use crate::cli::{Cli, Commands, PromptsAction};
use crate::commands::{self, truncate, SearchArgs};

const CRASH_LOG: &str = "boot ok
E/AndroidRuntime: FATAL EXCEPTION: main
E/AndroidRuntime: java.lang.NullPointerException
I/ActivityManager: restarting
";

const CRASH_DEF: &str = "metadata: { id: crashes, name: Crashes }
filters: { line_pattern: 'FATAL EXCEPTION', context_lines_after: 1 }
";

struct Workspace {
    dir: TempDir,
    config: PathBuf,
    insights: PathBuf,
    log: PathBuf,
}

/// Temp dir with a config that skips the external search utility
fn setup_workspace() -> Workspace {
    let dir = TempDir::new().unwrap();
    let insights = dir.path().join("insights");
    fs::create_dir_all(&insights).unwrap();
    fs::write(insights.join("crashes.yaml"), CRASH_DEF).unwrap();

    let config = dir.path().join("loglens.toml");
    fs::write(
        &config,
        format!(
            "[insights]\ndirectories = [{:?}]\n\n[search]\nexternal = false\n",
            insights.display().to_string()
        ),
    )
    .unwrap();

    let log = dir.path().join("app.log");
    fs::write(&log, CRASH_LOG).unwrap();

    Workspace {
        dir,
        config,
        insights,
        log,
    }
}

// ========== Argument Parsing Tests ==========

#[test]
fn test_parse_run() {
    let cli = Cli::try_parse_from(["loglens", "run", "def.yaml", "a.log", "b.log", "--ai"]).unwrap();
    match cli.command {
        Commands::Run {
            definition,
            files,
            ai,
        } => {
            assert_eq!(definition, PathBuf::from("def.yaml"));
            assert_eq!(files, vec![PathBuf::from("a.log"), PathBuf::from("b.log")]);
            assert!(ai);
        }
        _ => panic!("expected run"),
    }
}

#[test]
fn test_parse_run_requires_files() {
    assert!(Cli::try_parse_from(["loglens", "run", "def.yaml"]).is_err());
}

#[test]
fn test_parse_search_and_globals() {
    let cli = Cli::try_parse_from([
        "loglens", "search", "-p", "FATAL", "-A", "3", "--direct", "x.log", "--config", "c.toml",
        "-v",
    ])
    .unwrap();
    assert!(cli.verbose);
    assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
    match cli.command {
        Commands::Search {
            pattern,
            context,
            case_sensitive,
            direct,
            json,
            files,
        } => {
            assert_eq!(pattern, "FATAL");
            assert_eq!(context, 3);
            assert!(!case_sensitive);
            assert!(direct);
            assert!(!json);
            assert_eq!(files, vec![PathBuf::from("x.log")]);
        }
        _ => panic!("expected search"),
    }
}

#[test]
fn test_parse_prompts_default_action() {
    let cli = Cli::try_parse_from(["loglens", "prompts"]).unwrap();
    assert!(matches!(cli.command, Commands::Prompts { action: None }));

    let cli = Cli::try_parse_from(["loglens", "prompts", "show", "explain"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Prompts {
            action: Some(PromptsAction::Show { .. })
        }
    ));
}

// ========== Run Command Tests ==========

#[tokio::test]
async fn test_cmd_run_success() {
    let ws = setup_workspace();
    let code = commands::cmd_run(
        Some(&ws.config),
        &ws.insights.join("crashes.yaml"),
        &[ws.log.clone()],
        false,
    )
    .await
    .unwrap();
    assert_eq!(code, 0);
}

#[tokio::test]
async fn test_cmd_run_load_error() {
    let ws = setup_workspace();
    let broken = ws.dir.path().join("broken.yaml");
    fs::write(&broken, "metadata: { id: x }\n").unwrap();

    let code = commands::cmd_run(Some(&ws.config), &broken, &[ws.log.clone()], false)
        .await
        .unwrap();
    assert_eq!(code, 1);
}

#[tokio::test]
async fn test_cmd_run_analysis_error() {
    let ws = setup_workspace();
    let bad = ws.dir.path().join("bad.yaml");
    fs::write(
        &bad,
        "metadata: { id: bad, name: Bad }\nfilters: { line_pattern: '(unclosed' }\n",
    )
    .unwrap();

    let code = commands::cmd_run(Some(&ws.config), &bad, &[ws.log.clone()], false)
        .await
        .unwrap();
    assert_eq!(code, 2);
}

#[tokio::test]
async fn test_cmd_run_missing_config() {
    let ws = setup_workspace();
    let result = commands::cmd_run(
        Some(&ws.dir.path().join("nope.toml")),
        &ws.insights.join("crashes.yaml"),
        &[ws.log.clone()],
        false,
    )
    .await;
    assert!(result.is_err());
}

// ========== Registry Command Tests ==========

#[test]
fn test_cmd_list() {
    let ws = setup_workspace();
    fs::write(ws.insights.join("broken.yaml"), "filters: [").unwrap();

    assert!(commands::cmd_list(Some(&ws.config), &[], false).is_ok());
    assert!(commands::cmd_list(Some(&ws.config), &[], true).is_ok());
}

#[test]
fn test_cmd_list_dir_override() {
    let ws = setup_workspace();
    let other = ws.dir.path().join("other");
    assert!(commands::cmd_list(Some(&ws.config), &[other], false).is_ok());
}

#[test]
fn test_resolve_dirs() {
    let ws = setup_workspace();
    let config = commands::load_config(Some(&ws.config)).unwrap();

    assert_eq!(commands::resolve_dirs(&config, &[]), vec![ws.insights.clone()]);
    let explicit = vec![PathBuf::from("/srv/insights")];
    assert_eq!(commands::resolve_dirs(&config, &explicit), explicit);
}

// ========== Search Command Tests ==========

fn search_args(pattern: &str) -> SearchArgs {
    SearchArgs {
        pattern: pattern.to_string(),
        context: 1,
        case_sensitive: false,
        direct: true,
        json: false,
    }
}

#[test]
fn test_cmd_search() {
    let ws = setup_workspace();
    let args = search_args("fatal exception");
    assert!(commands::cmd_search(Some(&ws.config), &args, &[ws.log.clone()]).is_ok());

    let json = SearchArgs {
        json: true,
        ..args
    };
    assert!(commands::cmd_search(Some(&ws.config), &json, &[ws.log.clone()]).is_ok());
}

#[test]
fn test_cmd_search_invalid_pattern() {
    let ws = setup_workspace();
    let result = commands::cmd_search(Some(&ws.config), &search_args("[oops"), &[ws.log.clone()]);
    assert!(result.is_err());
}

#[test]
fn test_cmd_search_missing_file_is_not_fatal() {
    let ws = setup_workspace();
    let missing = ws.dir.path().join("missing.log");
    assert!(commands::cmd_search(Some(&ws.config), &search_args("FATAL"), &[missing]).is_ok());
}

// ========== Prompts Command Tests ==========

#[test]
fn test_cmd_prompts() {
    assert!(commands::cmd_prompts_list().is_ok());
    assert!(commands::cmd_prompts_show("explain").is_ok());
    assert!(commands::cmd_prompts_show("recommend").is_ok());
}

#[test]
fn test_cmd_prompts_show_unknown_id_fails() {
    let err = commands::cmd_prompts_show("does_not_exist").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("does_not_exist"));
    assert!(message.contains("explain"));
    assert!(message.contains("recommend"));
}

#[test]
fn test_override_files() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("explain.md"), "---\nid: explain\n---\n{result_content}\n").unwrap();

    let files = commands::override_files(dir.path());
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].1, dir.path().join("explain.md"));
    assert!(files[0].2);
    assert_eq!(files[1].1, dir.path().join("recommend.md"));
    assert!(!files[1].2);
}

// ========== Helpers ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a_very_long_insight_id", 10), "a_very_...");
}
