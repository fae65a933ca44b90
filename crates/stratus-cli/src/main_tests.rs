// crates/stratus-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing and config overrides.
// Purpose: Ensure overrides are revalidated and defaults apply only when unset.
// Dependencies: stratus-cli main helpers
// ============================================================================

//! ## Overview
//! Exercises the pure helpers behind `serve` and `config validate`.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use clap::Parser;
use stratus_config::StoreType;
use stratus_config::StratusConfig;

use super::Cli;
use super::Commands;
use super::StoreCommand;
use super::apply_serve_overrides;
use super::config_summary;
use super::uses_builtin_defaults;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn bind_override_is_applied_and_revalidated() {
    let mut config = StratusConfig::default();
    apply_serve_overrides(&mut config, Some(" 127.0.0.1:9000 "), false).unwrap();
    assert_eq!(config.server.bind, "127.0.0.1:9000");

    let err = apply_serve_overrides(&mut config, Some("0.0.0.0:4566"), false).unwrap_err();
    assert!(err.to_string().contains("allow_non_loopback"));

    apply_serve_overrides(&mut config, Some("0.0.0.0:4566"), true).unwrap();
    assert!(config.server.allow_non_loopback);
}

#[test]
fn builtin_defaults_apply_only_without_any_config_source() {
    assert!(uses_builtin_defaults(None, None, false));
    assert!(!uses_builtin_defaults(None, None, true));
    assert!(!uses_builtin_defaults(None, Some("custom.toml"), false));
    assert!(!uses_builtin_defaults(Some(Path::new("stratus.toml")), None, false));
}

#[test]
fn summary_names_store_backend() {
    let mut config = StratusConfig::default();
    assert!(config_summary(&config).contains("store=memory"));
    config.store.store_type = StoreType::Sqlite;
    config.store.path = Some("data/stratus.sqlite".into());
    let summary = config_summary(&config);
    assert!(summary.contains("store=sqlite:data/stratus.sqlite"));
    assert!(summary.contains("account=000000000000"));
}

#[test]
fn store_list_defaults_to_default_namespace() {
    let cli = Cli::try_parse_from([
        "stratus", "store", "list", "--db", "s.sqlite", "--service", "sqs", "--type", "queue",
    ])
    .unwrap();
    let Commands::Store {
        command: StoreCommand::List(list),
    } = cli.command
    else {
        panic!("expected store list");
    };
    assert_eq!(list.namespace, "default");
    assert_eq!(list.resource_type, "queue");
}

#[test]
fn store_list_requires_service_and_type() {
    assert!(Cli::try_parse_from(["stratus", "store", "list", "--db", "s.sqlite"]).is_err());
}
