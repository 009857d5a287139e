//! Config load validation tests for assessment-timer-config.
// crates/assessment-timer-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards and semantic checks.
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use assessment_timer_config::AssessmentTimerConfig;
use assessment_timer_config::ConfigError;
use assessment_timer_config::StorageFormatKind;
use assessment_timer_config::StoreType;
use assessment_timer_core::ScopeKind;
use tempfile::NamedTempFile;

type TestResult = Result<(), String>;

const FULL_CONFIG: &str = r#"
[timer]
storage_format = "packed"
extra_time = "10m"

[store]
type = "sqlite"
path = "var/timer.sqlite"
busy_timeout_ms = 2500
journal_mode = "delete"
sync_mode = "normal"

[logging]
level = "debug"

[[scopes]]
identifier = "section-1"
kind = "assessmentSection"
label = "Section 1"
tags = ["test-1", "part-1", "section-1"]
min_time = "5m"
max_time = "30m"

[[scopes]]
identifier = "item-1"
kind = "assessmentItemRef"
max_time = "90s"
allow_late_submission = true
"#;

fn assert_invalid(result: Result<AssessmentTimerConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config load".to_string()),
    }
}

fn write_config(content: &[u8]) -> Result<NamedTempFile, String> {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(content).map_err(|err| err.to_string())?;
    Ok(file)
}

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    assert_invalid(
        AssessmentTimerConfig::load(Some(Path::new(&long_path))),
        "config path exceeds max length",
    )
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    assert_invalid(
        AssessmentTimerConfig::load(Some(Path::new(&long_component))),
        "config path component too long",
    )
}

#[test]
fn load_rejects_missing_file() -> TestResult {
    assert_invalid(
        AssessmentTimerConfig::load(Some(Path::new("does-not-exist/assessment-timer.toml"))),
        "config io error",
    )
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let file = write_config(&vec![b'#'; 1_048_577])?;
    assert_invalid(AssessmentTimerConfig::load(Some(file.path())), "config file exceeds size limit")
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let file = write_config(&[0xFF, 0xFE, 0xFF])?;
    assert_invalid(AssessmentTimerConfig::load(Some(file.path())), "config file must be utf-8")
}

#[test]
fn load_reads_full_config() -> TestResult {
    let file = write_config(FULL_CONFIG.as_bytes())?;
    let config = AssessmentTimerConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    if config.timer.storage_format != StorageFormatKind::Packed {
        return Err("storage format should be packed".to_string());
    }
    if config.timer.format().name() != "packed" {
        return Err("codec should be packed".to_string());
    }
    if config.timer.extra_time != Some(Duration::from_secs(600)) {
        return Err("extra time should be ten minutes".to_string());
    }
    if config.store.store_type != StoreType::Sqlite {
        return Err("store should be sqlite".to_string());
    }
    let sqlite = config.store.sqlite_config().ok_or("missing sqlite config")?;
    if sqlite.busy_timeout_ms != 2_500 {
        return Err("busy timeout not applied".to_string());
    }
    let section = config.scope("section-1").ok_or("missing section scope")?;
    let node = section.node();
    if node.kind != ScopeKind::AssessmentSection || node.label.as_deref() != Some("Section 1") {
        return Err("section node mismatch".to_string());
    }
    if section.limits().max_time != Some(Duration::from_secs(1_800)) {
        return Err("section max time mismatch".to_string());
    }
    let item = config.scope("item-1").ok_or("missing item scope")?;
    if item.node().filter_tags() != vec!["item-1".to_string()] || !item.limits().allow_late_submission {
        return Err("item scope defaults mismatch".to_string());
    }
    Ok(())
}

#[test]
fn empty_config_uses_defaults() -> TestResult {
    let config = AssessmentTimerConfig::from_toml("").map_err(|err| err.to_string())?;
    if config.timer.format().name() != "json" || config.store.store_type != StoreType::Memory {
        return Err("unexpected defaults".to_string());
    }
    if config.logging.level != "info" || config.timer.extra_time_seconds() != 0.0 {
        return Err("unexpected logging or extra time defaults".to_string());
    }
    Ok(())
}

#[test]
fn sqlite_store_requires_path() -> TestResult {
    assert_invalid(AssessmentTimerConfig::from_toml("[store]\ntype = \"sqlite\"\n"), "requires path")
}

#[test]
fn memory_store_rejects_path() -> TestResult {
    assert_invalid(
        AssessmentTimerConfig::from_toml("[store]\ntype = \"memory\"\npath = \"x.sqlite\"\n"),
        "must not set path",
    )
}

#[test]
fn unknown_log_level_is_rejected() -> TestResult {
    assert_invalid(AssessmentTimerConfig::from_toml("[logging]\nlevel = \"loud\"\n"), "logging.level")
}

#[test]
fn min_time_above_max_time_is_rejected() -> TestResult {
    let content = r#"
[[scopes]]
identifier = "section-1"
kind = "assessmentSection"
min_time = "20m"
max_time = "10m"
"#;
    assert_invalid(AssessmentTimerConfig::from_toml(content), "exceeds max_time")
}

#[test]
fn duplicate_scope_is_rejected() -> TestResult {
    let content = r#"
[[scopes]]
identifier = "item-1"
kind = "assessmentItemRef"

[[scopes]]
identifier = "item-1"
kind = "assessmentItemRef"
"#;
    assert_invalid(AssessmentTimerConfig::from_toml(content), "duplicate scope identifier")
}

#[test]
fn empty_scope_tag_is_rejected() -> TestResult {
    let content = r#"
[[scopes]]
identifier = "item-1"
kind = "assessmentItemRef"
tags = ["test-1", " "]
"#;
    assert_invalid(AssessmentTimerConfig::from_toml(content), "empty tag")
}

#[test]
fn malformed_duration_is_a_parse_error() -> TestResult {
    let content = r#"
[timer]
extra_time = "ten minutes"
"#;
    assert_invalid(AssessmentTimerConfig::from_toml(content), "config parse error")
}

#[test]
fn unknown_scope_kind_is_a_parse_error() -> TestResult {
    let content = r#"
[[scopes]]
identifier = "item-1"
kind = "rubricBlock"
"#;
    assert_invalid(AssessmentTimerConfig::from_toml(content), "config parse error")
}
