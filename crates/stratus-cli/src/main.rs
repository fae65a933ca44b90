// crates/stratus-cli/src/main.rs
// ============================================================================
// Module: Stratus CLI Entry Point
// Description: Command dispatcher for the emulator server and store tooling.
// Purpose: Start the gateway, validate configuration, and inspect stores.
// Dependencies: clap, stratus-config, stratus-gateway, stratus-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! `stratus serve` runs the HTTP gateway. `stratus config` validates or
//! prints configuration, and `stratus store list` dumps rows from a `SQLite`
//! store as canonical JSON lines for offline inspection.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use stratus_config::CONFIG_ENV_VAR;
use stratus_config::DEFAULT_CONFIG_NAME;
use stratus_config::StoreType;
use stratus_config::StratusConfig;
use stratus_config::config_toml_example;
use stratus_core::ResourceScope;
use stratus_core::ResourceStore;
use stratus_core::namespace::DEFAULT_NAMESPACE;
use stratus_gateway::GatewayServer;
use stratus_store_sqlite::SqliteResourceStore;
use stratus_store_sqlite::SqliteStoreConfig;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "stratus", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the emulator gateway.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Resource store inspection utilities.
    Store {
        /// Selected store subcommand.
        #[command(subcommand)]
        command: StoreCommand,
    },
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to stratus.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Override the bind address from the config file.
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
    /// Allow binding to non-loopback addresses.
    #[arg(long, action = ArgAction::SetTrue)]
    allow_non_loopback: bool,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a Stratus configuration file.
    Validate(ConfigValidateCommand),
    /// Print a complete example configuration.
    Example,
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to stratus.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Store subcommands.
#[derive(Subcommand, Debug)]
enum StoreCommand {
    /// List stored resources of one type.
    List(StoreListCommand),
}

/// Arguments for `store list`.
#[derive(Args, Debug)]
struct StoreListCommand {
    /// Path to the `SQLite` store file.
    #[arg(long, value_name = "PATH")]
    db: PathBuf,
    /// Namespace to list.
    #[arg(long, value_name = "NS", default_value = DEFAULT_NAMESPACE)]
    namespace: String,
    /// Owning service name.
    #[arg(long, value_name = "SERVICE")]
    service: String,
    /// Resource type within the service.
    #[arg(long = "type", value_name = "TYPE")]
    resource_type: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command,
        } => command_config(command),
        Commands::Store {
            command,
        } => command_store(command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let mut config = load_config(command.config.as_deref())?;
    apply_serve_overrides(&mut config, command.bind.as_deref(), command.allow_non_loopback)?;
    let bind = config.server.bind.clone();

    let server = tokio::task::spawn_blocking(move || GatewayServer::from_config(config))
        .await
        .map_err(|err| CliError::new(format!("server init failed: init join failed: {err}")))?
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    write_stderr_line(&format!("stratus listening on {bind}"))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    server.serve().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;

    Ok(ExitCode::SUCCESS)
}

/// Applies command-line overrides and revalidates the result.
fn apply_serve_overrides(
    config: &mut StratusConfig,
    bind: Option<&str>,
    allow_non_loopback: bool,
) -> CliResult<()> {
    if let Some(bind) = bind {
        config.server.bind = bind.trim().to_string();
    }
    if allow_non_loopback {
        config.server.allow_non_loopback = true;
    }
    config.validate().map_err(|err| CliError::new(format!("config load failed: {err}")))
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(&command),
        ConfigCommand::Example => {
            write_stdout_line(config_toml_example().trim_end())
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    write_stdout_line(&config_summary(&config))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Renders a one-line summary of a validated configuration.
fn config_summary(config: &StratusConfig) -> String {
    let store = match config.store.store_type {
        StoreType::Memory => "memory".to_string(),
        StoreType::Sqlite => {
            let path = config
                .store
                .path
                .as_ref()
                .map_or_else(String::new, |path| path.display().to_string());
            format!("sqlite:{path}")
        }
    };
    format!(
        "config ok: bind={} store={} region={} account={} default_namespace={}",
        config.server.bind,
        store,
        config.identity.region,
        config.identity.account_id,
        config.namespace.default,
    )
}

// ============================================================================
// SECTION: Store Commands
// ============================================================================

/// Dispatches store subcommands.
fn command_store(command: StoreCommand) -> CliResult<ExitCode> {
    match command {
        StoreCommand::List(command) => command_store_list(&command),
    }
}

/// Executes `store list`.
fn command_store_list(command: &StoreListCommand) -> CliResult<ExitCode> {
    let store = open_sqlite_store(&command.db)?;
    let scope = ResourceScope::new(
        command.namespace.as_str(),
        command.service.as_str(),
        command.resource_type.as_str(),
    );
    let resources =
        store.list(&scope).map_err(|err| CliError::new(format!("store list failed: {err}")))?;
    for resource in &resources {
        let mut bytes = serde_jcs::to_vec(resource)
            .map_err(|err| CliError::new(format!("store list failed: {err}")))?;
        bytes.push(b'\n');
        write_stdout_bytes(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Opens an existing `SQLite` store without creating a new file.
fn open_sqlite_store(path: &Path) -> CliResult<SqliteResourceStore> {
    if !path.is_file() {
        return Err(CliError::new(format!("store not found: {}", path.display())));
    }
    SqliteResourceStore::new(&SqliteStoreConfig::at(path))
        .map_err(|err| CliError::new(format!("store open failed: {err}")))
}

// ============================================================================
// SECTION: Config Loading
// ============================================================================

/// Loads configuration, falling back to built-in defaults when no file is named.
fn load_config(path: Option<&Path>) -> CliResult<StratusConfig> {
    let env_override = env::var(CONFIG_ENV_VAR).ok();
    let default_exists = Path::new(DEFAULT_CONFIG_NAME).is_file();
    if uses_builtin_defaults(path, env_override.as_deref(), default_exists) {
        let mut config = StratusConfig::default();
        config
            .validate()
            .map_err(|err| CliError::new(format!("config load failed: {err}")))?;
        return Ok(config);
    }
    StratusConfig::load(path).map_err(|err| CliError::new(format!("config load failed: {err}")))
}

/// Returns true when no config source was given and no default file exists.
const fn uses_builtin_defaults(
    path: Option<&Path>,
    env_override: Option<&str>,
    default_exists: bool,
) -> bool {
    path.is_none() && env_override.is_none() && !default_exists
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
