//! Config load validation tests for stratus-config.
// crates/stratus-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards and section validation.
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

use std::io::Write;
use std::path::Path;

use stratus_config::ConfigError;
use stratus_config::StoreType;
use stratus_config::StratusConfig;
use stratus_config::config_toml_example;
use tempfile::NamedTempFile;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<StratusConfig, ConfigError>, needle: &str) -> TestResult {
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

fn load_text(text: &str) -> Result<StratusConfig, ConfigError> {
    StratusConfig::from_bytes(text.as_bytes())
}

// ============================================================================
// SECTION: File Guards
// ============================================================================

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    assert_invalid(
        StratusConfig::load(Some(Path::new(&long_path))),
        "config path exceeds max length",
    )
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    assert_invalid(
        StratusConfig::load(Some(Path::new(&long_component))),
        "config path component too long",
    )
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&vec![b'#'; 1_048_577]).map_err(|err| err.to_string())?;
    assert_invalid(StratusConfig::load(Some(file.path())), "config file exceeds size limit")
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(StratusConfig::load(Some(file.path())), "config file must be utf-8")
}

#[test]
fn load_reads_file_from_disk() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(b"[namespace]\ndefault = \"shared\"\n").map_err(|err| err.to_string())?;
    let config = StratusConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    if config.namespace.default != "shared" {
        return Err(format!("unexpected default namespace {}", config.namespace.default));
    }
    Ok(())
}

#[test]
fn unknown_fields_are_parse_errors() -> TestResult {
    assert_invalid(load_text("[server]\nbogus = 1\n"), "config parse error")
}

#[test]
fn example_config_is_valid() -> TestResult {
    let config = load_text(&config_toml_example()).map_err(|err| err.to_string())?;
    if config.store.store_type != StoreType::Sqlite {
        return Err("example should use the sqlite store".to_string());
    }
    Ok(())
}

// ============================================================================
// SECTION: Section Validation
// ============================================================================

#[test]
fn zero_body_limit_is_rejected() -> TestResult {
    assert_invalid(load_text("[server]\nmax_body_bytes = 0\n"), "max_body_bytes must be greater")
}

#[test]
fn non_loopback_bind_requires_opt_in() -> TestResult {
    assert_invalid(load_text("[server]\nbind = \"0.0.0.0:4566\"\n"), "allow_non_loopback")?;
    load_text("[server]\nbind = \"0.0.0.0:4566\"\nallow_non_loopback = true\n")
        .map(|_| ())
        .map_err(|err| err.to_string())
}

#[test]
fn malformed_bind_is_rejected() -> TestResult {
    assert_invalid(load_text("[server]\nbind = \"localhost\"\n"), "invalid bind address")
}

#[test]
fn namespace_marker_must_not_contain_whitespace() -> TestResult {
    assert_invalid(load_text("[namespace]\nmarker = \"a b\"\n"), "must not contain whitespace")
}

#[test]
fn account_id_must_be_twelve_digits() -> TestResult {
    assert_invalid(load_text("[identity]\naccount_id = \"12345\"\n"), "12 digits")
}

#[test]
fn sqlite_store_requires_path() -> TestResult {
    assert_invalid(load_text("[store]\ntype = \"sqlite\"\n"), "sqlite store requires path")
}

#[test]
fn memory_store_rejects_path() -> TestResult {
    assert_invalid(
        load_text("[store]\ntype = \"memory\"\npath = \"x.db\"\n"),
        "memory store must not set path",
    )
}

#[test]
fn read_retry_bounds_are_enforced() -> TestResult {
    assert_invalid(load_text("[read_retry]\nmax_attempts = 0\n"), "read_retry.max_attempts")?;
    assert_invalid(load_text("[read_retry]\ndelay_ms = 60000\n"), "read_retry.delay_ms")
}

#[test]
fn audit_path_must_be_non_empty() -> TestResult {
    assert_invalid(load_text("[audit]\npath = \"  \"\n"), "audit.path must be non-empty")
}
