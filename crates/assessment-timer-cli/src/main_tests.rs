// crates/assessment-timer-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing and bounded reads.
// Purpose: Ensure commands parse as documented and inputs fail closed.
// Dependencies: assessment-timer-cli main helpers, clap, tempfile
// ============================================================================

//! ## Overview
//! Validates clap wiring for every subcommand, the config requirement of
//! each command, and `read_bytes_with_limit` size enforcement.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use tempfile::TempDir;

use super::Cli;
use super::Commands;
use super::FormatArg;
use super::ReadLimitError;
use super::StateCommand;
use super::TargetArg;
use super::read_bytes_with_limit;
use super::read_text_file;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn parse(args: &[&str]) -> Cli {
    let mut argv = vec!["assessment-timer"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

// ============================================================================
// SECTION: Argument Parsing
// ============================================================================

#[test]
fn version_flag_is_global() {
    let cli = parse(&["state", "show", "--input", "state.json", "--version"]);
    assert!(cli.show_version);
}

#[test]
fn config_path_is_global() {
    let cli = parse(&["config", "validate", "--config", "timer.toml"]);
    assert_eq!(cli.config, Some(PathBuf::from("timer.toml")));
    assert!(cli.command.unwrap().needs_config());
}

#[test]
fn convert_parses_target_format() {
    let cli = parse(&["state", "convert", "--input", "state.json", "--to", "packed"]);
    let Some(Commands::State {
        command: StateCommand::Convert(command),
    }) = cli.command
    else {
        panic!("expected state convert");
    };
    assert_eq!(command.to, FormatArg::Packed);
    assert!(command.output.is_none());
    assert_eq!(command.source.input, Some(PathBuf::from("state.json")));
}

#[test]
fn constraints_default_to_server_clock() {
    let cli = parse(&["constraints", "--input", "state.json"]);
    let Some(Commands::Constraints(command)) = cli.command else {
        panic!("expected constraints");
    };
    assert_eq!(command.target, TargetArg::Server);
    assert!(Commands::Constraints(command).needs_config());
}

#[test]
fn file_sources_do_not_need_config() {
    let cli = parse(&["state", "durations", "--input", "state.json"]);
    assert!(!cli.command.unwrap().needs_config());
}

#[test]
fn store_sources_need_config() {
    let cli = parse(&["state", "show", "--owner", "taker", "--key", "session"]);
    assert!(cli.command.unwrap().needs_config());
    let cli = parse(&["state", "list", "--owner", "taker"]);
    assert!(cli.command.unwrap().needs_config());
}

#[test]
fn owner_requires_key() {
    let result = Cli::try_parse_from(["assessment-timer", "state", "show", "--owner", "taker"]);
    assert!(result.is_err());
}

#[test]
fn input_conflicts_with_store_source() {
    let result = Cli::try_parse_from([
        "assessment-timer",
        "state",
        "show",
        "--input",
        "state.json",
        "--owner",
        "taker",
        "--key",
        "session",
    ]);
    assert!(result.is_err());
}

#[test]
fn unknown_format_is_rejected() {
    let result = Cli::try_parse_from([
        "assessment-timer",
        "state",
        "convert",
        "--input",
        "state.json",
        "--to",
        "yaml",
    ]);
    assert!(result.is_err());
}

// ============================================================================
// SECTION: Bounded Reads
// ============================================================================

#[test]
fn read_bytes_with_limit_accepts_small_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("small.json");
    fs::write(&path, b"{}").unwrap();
    let bytes = read_bytes_with_limit(&path, 16).unwrap();
    assert_eq!(bytes, b"{}");
}

#[test]
fn read_bytes_with_limit_rejects_oversized_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("large.json");
    fs::write(&path, vec![b'a'; 32]).unwrap();
    let Err(ReadLimitError::TooLarge {
        size,
        limit,
    }) = read_bytes_with_limit(&path, 16)
    else {
        panic!("expected size limit failure");
    };
    assert_eq!(size, 32);
    assert_eq!(limit, 16);
}

#[test]
fn read_bytes_with_limit_reports_missing_file() {
    let temp = TempDir::new().unwrap();
    let result = read_bytes_with_limit(&temp.path().join("missing.json"), 16);
    assert!(matches!(result, Err(ReadLimitError::Io(_))));
}

#[test]
fn read_text_file_rejects_invalid_utf8() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("binary.json");
    fs::write(&path, [0xff_u8, 0xfe, 0xfd]).unwrap();
    let err = read_text_file(&path, "timer state").unwrap_err();
    assert!(err.to_string().contains("not valid UTF-8"));
}
