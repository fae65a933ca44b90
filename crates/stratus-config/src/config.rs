// crates/stratus-config/src/config.rs
// ============================================================================
// Module: Stratus Configuration
// Description: Configuration loading and validation for the emulator.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: stratus-core, stratus-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has serde defaults, so an empty file yields a loopback
//! emulator with an in-memory store. Each section validates itself and the
//! first failure aborts the load.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use stratus_core::NamespaceResolver;
use stratus_core::ProviderIdentity;
use stratus_core::ReadRetryPolicy;
use stratus_core::identity::DEFAULT_ACCOUNT_ID;
use stratus_core::identity::DEFAULT_ENDPOINT;
use stratus_core::identity::DEFAULT_PARTITION;
use stratus_core::identity::DEFAULT_REGION;
use stratus_core::namespace::DEFAULT_NAMESPACE;
use stratus_core::namespace::DEFAULT_NAMESPACE_MARKER;
use stratus_core::namespace::MAX_NAMESPACE_LENGTH;
use stratus_store_sqlite::SqliteStoreConfig;
use stratus_store_sqlite::SqliteStoreMode;
use stratus_store_sqlite::SqliteSyncMode;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "stratus.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "STRATUS_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default bind address.
const DEFAULT_BIND: &str = "127.0.0.1:4566";
/// Default maximum request body size.
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Hard ceiling for request body size.
const MAX_BODY_BYTES_CEILING: usize = 64 * 1024 * 1024;
/// Default `Server` header value.
const DEFAULT_SERVER_NAME: &str = "Stratus";
/// Default busy timeout for sqlite stores.
const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Upper bound on read retry attempts.
const MAX_READ_ATTEMPTS: u32 = 20;
/// Upper bound on read retry delay.
const MAX_READ_DELAY_MS: u64 = 5_000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Stratus emulator configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StratusConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Namespace resolution configuration.
    #[serde(default)]
    pub namespace: NamespaceConfig,
    /// Provider identity used in ARNs.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Resource store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Read-after-write retry policy.
    #[serde(default)]
    pub read_retry: ReadRetryConfig,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl StratusConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Parses and validates configuration from raw file bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.namespace.validate()?;
        self.identity.validate()?;
        self.store.validate()?;
        self.read_retry.validate()?;
        self.audit.validate()?;
        Ok(())
    }

    /// Returns the provider identity including the public endpoint.
    #[must_use]
    pub fn provider_identity(&self) -> ProviderIdentity {
        ProviderIdentity {
            partition: self.identity.partition.clone(),
            region: self.identity.region.clone(),
            account_id: self.identity.account_id.clone(),
            endpoint: self.server.public_endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// Returns the configured namespace resolver.
    #[must_use]
    pub fn namespace_resolver(&self) -> NamespaceResolver {
        NamespaceResolver::new(self.namespace.marker.clone(), self.namespace.default.clone())
    }

    /// Returns the configured read retry policy.
    #[must_use]
    pub const fn read_retry_policy(&self) -> ReadRetryPolicy {
        ReadRetryPolicy {
            max_attempts: self.read_retry.max_attempts,
            delay: Duration::from_millis(self.read_retry.delay_ms),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Value of the `Server` response header.
    #[serde(default = "default_server_name")]
    pub server_name: String,
    /// Base URL embedded in URL-shaped identifiers (queue URLs).
    #[serde(default = "default_public_endpoint")]
    pub public_endpoint: String,
    /// Explicit opt-in for binding a non-loopback address.
    #[serde(default)]
    pub allow_non_loopback: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            server_name: default_server_name(),
            public_endpoint: default_public_endpoint(),
            allow_non_loopback: false,
        }
    }
}

impl ServerConfig {
    /// Parses the bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid("invalid bind address".to_string()))
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_body_bytes must be greater than zero".to_string(),
            ));
        }
        if self.max_body_bytes > MAX_BODY_BYTES_CEILING {
            return Err(ConfigError::Invalid("max_body_bytes exceeds ceiling".to_string()));
        }
        let addr = self.bind_addr()?;
        if !addr.ip().is_loopback() && !self.allow_non_loopback {
            return Err(ConfigError::Invalid(
                "non-loopback bind requires allow_non_loopback".to_string(),
            ));
        }
        if self.server_name.trim().is_empty() {
            return Err(ConfigError::Invalid("server_name must be non-empty".to_string()));
        }
        let endpoint = self.public_endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ConfigError::Invalid(
                "public_endpoint must be an http(s) url".to_string(),
            ));
        }
        Ok(())
    }
}

/// Namespace resolution configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamespaceConfig {
    /// Marker prefix on the last user-agent token.
    #[serde(default = "default_namespace_marker")]
    pub marker: String,
    /// Namespace used when no marker is present.
    #[serde(default = "default_namespace")]
    pub default: String,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            marker: default_namespace_marker(),
            default: default_namespace(),
        }
    }
}

impl NamespaceConfig {
    /// Validates namespace configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_token("namespace.marker", &self.marker)?;
        validate_token("namespace.default", &self.default)?;
        if self.default.len() > MAX_NAMESPACE_LENGTH {
            return Err(ConfigError::Invalid("namespace.default exceeds max length".to_string()));
        }
        Ok(())
    }
}

/// Provider identity configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// ARN partition.
    #[serde(default = "default_partition")]
    pub partition: String,
    /// Region name.
    #[serde(default = "default_region")]
    pub region: String,
    /// Twelve-digit account id.
    #[serde(default = "default_account_id")]
    pub account_id: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            partition: default_partition(),
            region: default_region(),
            account_id: default_account_id(),
        }
    }
}

impl IdentityConfig {
    /// Validates identity configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_token("identity.partition", &self.partition)?;
        validate_token("identity.region", &self.region)?;
        if self.account_id.len() != 12 || !self.account_id.bytes().all(|byte| byte.is_ascii_digit())
        {
            return Err(ConfigError::Invalid(
                "identity.account_id must be 12 digits".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resource store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// Use the in-memory store.
    #[default]
    Memory,
    /// Use the `SQLite`-backed durable store.
    Sqlite,
}

/// Resource store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Returns the sqlite store config when the sqlite backend is selected.
    #[must_use]
    pub fn sqlite(&self) -> Option<SqliteStoreConfig> {
        match (self.store_type, &self.path) {
            (StoreType::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
            }),
            _ => None,
        }
    }

    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("memory store must not set path".to_string()));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires path".to_string())
                })?;
                validate_store_path(path)
            }
        }
    }
}

/// Read-after-write retry configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadRetryConfig {
    /// Total read attempts before not-found is surfaced.
    #[serde(default = "default_read_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds.
    #[serde(default = "default_read_delay_ms")]
    pub delay_ms: u64,
}

impl Default for ReadRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_read_attempts(),
            delay_ms: default_read_delay_ms(),
        }
    }
}

impl ReadRetryConfig {
    /// Validates retry bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_READ_ATTEMPTS).contains(&self.max_attempts) {
            return Err(ConfigError::Invalid(format!(
                "read_retry.max_attempts must be between 1 and {MAX_READ_ATTEMPTS}"
            )));
        }
        if self.delay_ms > MAX_READ_DELAY_MS {
            return Err(ConfigError::Invalid(format!(
                "read_retry.delay_ms must be at most {MAX_READ_DELAY_MS}"
            )));
        }
        Ok(())
    }
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Enable structured audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines); stderr when absent.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    if path
        .components()
        .any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(ConfigError::Invalid("config path component too long".to_string()));
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    if Path::new(trimmed)
        .components()
        .any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(ConfigError::Invalid(format!("{field} path component too long")));
    }
    Ok(())
}

/// Validates sqlite store paths against length limits.
fn validate_store_path(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("store path must be non-empty".to_string()));
    }
    if path.as_os_str().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("store path exceeds max length".to_string()));
    }
    if path
        .components()
        .any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(ConfigError::Invalid("store path component too long".to_string()));
    }
    Ok(())
}

/// Validates a short token field: non-empty, no whitespace.
fn validate_token(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(ConfigError::Invalid(format!("{field} must not contain whitespace")));
    }
    Ok(())
}

/// Default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default request body limit.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default `Server` header.
fn default_server_name() -> String {
    DEFAULT_SERVER_NAME.to_string()
}

/// Default public endpoint.
fn default_public_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

/// Default namespace marker.
fn default_namespace_marker() -> String {
    DEFAULT_NAMESPACE_MARKER.to_string()
}

/// Default shared namespace.
fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// Default partition.
fn default_partition() -> String {
    DEFAULT_PARTITION.to_string()
}

/// Default region.
fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

/// Default account id.
fn default_account_id() -> String {
    DEFAULT_ACCOUNT_ID.to_string()
}

/// Default sqlite busy timeout.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

/// Default read attempts.
const fn default_read_attempts() -> u32 {
    stratus_core::runtime::store::DEFAULT_READ_ATTEMPTS
}

/// Default read delay.
const fn default_read_delay_ms() -> u64 {
    50
}

/// Audit logging is on unless disabled.
const fn default_audit_enabled() -> bool {
    true
}

// ============================================================================
// SECTION: Tests
// ============================================================================
