// crates/stratus-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic example for docs and the CLI.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The example below is parsed and validated by the crate tests, so it stays
//! in sync with the model.

/// Returns a canonical example `stratus.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[server]
bind = "127.0.0.1:4566"
max_body_bytes = 1048576
server_name = "Stratus"
public_endpoint = "http://localhost:4566"

[namespace]
marker = "custom-"
default = "default"

[identity]
partition = "aws"
region = "us-east-1"
account_id = "000000000000"

[store]
type = "sqlite"
path = "stratus.sqlite"
journal_mode = "wal"
sync_mode = "full"
busy_timeout_ms = 5000

[read_retry]
max_attempts = 3
delay_ms = 50

[audit]
enabled = true
# path = "stratus-audit.jsonl"
"#,
    )
}
