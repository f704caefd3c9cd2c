//! Argument parsing and command integration tests.

#![allow(clippy::unwrap_used)]

use clap::Parser;
use tabingest_cli::{Cli, Command, DataFormat, commands};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("tabingest").chain(args.iter().copied())).unwrap()
}

// =============================================================================
// Argument Parsing
// =============================================================================

#[test]
fn test_schema_arguments_build_file_config() {
    let cli = parse(&[
        "schema",
        "txt",
        "--file",
        "report.txt",
        "--delimiter",
        "auto",
        "--encoding",
        "latin1",
        "--no-header",
    ]);

    let Command::Schema(args) = cli.command else {
        panic!("expected schema command");
    };
    let config = args.source.to_config();
    assert_eq!(config.source_kind, "txt");
    assert_eq!(config.file_path.as_deref(), Some(std::path::Path::new("report.txt")));
    assert_eq!(config.declared_encoding.as_deref(), Some("latin1"));
    assert!(config.wants_delimiter_detection());
    assert_eq!(config.has_header, Some(false));
    assert!(config.connection_string.is_none());
}

#[test]
fn test_database_url_only_kept_for_database_kinds() {
    let cli = parse(&[
        "data",
        "postgresql",
        "--database-url",
        "postgres://reader:secret@db/app",
        "--table",
        "users",
        "--limit",
        "5",
        "--format",
        "frame",
    ]);
    let Command::Data(args) = cli.command else {
        panic!("expected data command");
    };
    assert_eq!(args.limit, Some(5));
    assert_eq!(args.format, DataFormat::Frame);
    let config = args.source.to_config();
    assert!(config.connection_string.is_some());
    assert_eq!(config.table.as_deref(), Some("users"));

    let cli = parse(&["data", "csv", "-f", "a.csv", "--database-url", "postgres://db/app"]);
    let Command::Data(args) = cli.command else {
        panic!("expected data command");
    };
    assert!(args.source.to_config().connection_string.is_none());
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = parse(&["kinds", "-vv"]);
    assert_eq!(cli.global.verbose, 2);
    assert!(!cli.global.quiet);

    let cli = parse(&["-q", "kinds"]);
    assert!(cli.global.quiet);
}

#[test]
fn test_sync_arguments_and_overrides() {
    let cli = parse(&[
        "sync",
        "--registry",
        "sources.json",
        "--redaction-threshold",
        "2048",
        "--row-limit",
        "50",
        "3",
        "4",
    ]);
    let Command::Sync(args) = cli.command else {
        panic!("expected sync command");
    };
    assert_eq!(args.source_ids, vec![3, 4]);
    assert_eq!(args.rows_dir, std::path::PathBuf::from("rows"));

    let config = args.sync_config();
    assert_eq!(config.redaction_threshold_bytes, 2048);
    assert_eq!(config.database_row_limit, 50);
    assert_eq!(config.redaction_sample_size, 10);
}

#[test]
fn test_missing_subcommand_is_rejected() {
    assert!(Cli::try_parse_from(["tabingest"]).is_err());
    assert!(Cli::try_parse_from(["tabingest", "sync"]).is_err());
}

// =============================================================================
// Command Integration
// =============================================================================

#[tokio::test]
async fn test_integration_data_command_writes_records() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("people.csv");
    let out = dir.path().join("people.json");
    std::fs::write(&csv, "name,age\nann,31\nbob,27\n").unwrap();

    let cli = parse(&[
        "data",
        "csv",
        "--file",
        csv.to_str().unwrap(),
        "--limit",
        "1",
        "--output",
        out.to_str().unwrap(),
    ]);
    commands::run(&cli).await.unwrap();

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written, serde_json::json!([{"name": "ann", "age": "31"}]));
}

#[tokio::test]
async fn test_integration_per_table_requires_sql() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("a.csv");
    std::fs::write(&csv, "x\n1\n").unwrap();

    let cli = parse(&["data", "csv", "--file", csv.to_str().unwrap(), "--per-table"]);
    assert!(commands::run(&cli).await.is_err());
}

#[tokio::test]
async fn test_integration_register_then_sync() {
    let dir = tempfile::tempdir().unwrap();
    let registry = dir.path().join("sources.json");
    let rows = dir.path().join("rows");
    let dump = dir.path().join("shop.sql");
    let outcomes = dir.path().join("outcomes.json");
    std::fs::write(
        &dump,
        "CREATE TABLE items (id INT);\nINSERT INTO items VALUES (1),(2),(3);\n",
    )
    .unwrap();

    let register = parse(&[
        "register",
        "--registry",
        registry.to_str().unwrap(),
        "--id",
        "9",
        "sql",
        "--file",
        dump.to_str().unwrap(),
    ]);
    commands::run(&register).await.unwrap();

    let sync = parse(&[
        "sync",
        "--registry",
        registry.to_str().unwrap(),
        "--rows-dir",
        rows.to_str().unwrap(),
        "--output",
        outcomes.to_str().unwrap(),
    ]);
    commands::run(&sync).await.unwrap();

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&outcomes).unwrap()).unwrap();
    assert_eq!(written[0]["source_id"], 9);
    assert_eq!(written[0]["success"], true);
    assert_eq!(written[0]["rows_updated"], 3);
    assert!(rows.join("source_9.json").exists());
}

#[tokio::test]
async fn test_integration_sync_unknown_source_fails() {
    let dir = tempfile::tempdir().unwrap();
    let registry = dir.path().join("sources.json");
    let outcomes = dir.path().join("outcomes.json");

    let cli = parse(&[
        "sync",
        "--registry",
        registry.to_str().unwrap(),
        "--rows-dir",
        dir.path().join("rows").to_str().unwrap(),
        "--output",
        outcomes.to_str().unwrap(),
        "42",
    ]);
    assert!(commands::run(&cli).await.is_err());

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&outcomes).unwrap()).unwrap();
    assert_eq!(written[0]["success"], false);
}
