// crates/stratus-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Resource Store
// Description: Durable ResourceStore backed by a single SQLite table.
// Purpose: Persist resource rows with canonical encoding and integrity checks.
// Dependencies: stratus-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Every resource is one row of the `resources` table. The primary key is
//! `(namespace, identifier)`, matching the store-wide uniqueness rule; reads,
//! lists, updates, and deletes additionally filter on service and type.
//! Attributes are written as RFC 8785 canonical JSON alongside their SHA-256
//! digest. Reads recompute the digest and fail closed on mismatch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use serde::Deserialize;
use stratus_core::Resource;
use stratus_core::ResourceKey;
use stratus_core::ResourceScope;
use stratus_core::ResourceStore;
use stratus_core::StoreError;
use stratus_core::Timestamp;
use stratus_core::hashing::canonical_json_bytes;
use stratus_core::hashing::sha256_hex;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum canonical attribute blob size accepted by the store.
pub const MAX_ATTRIBUTE_BYTES: usize = 4 * 1024 * 1024;
/// Column list shared by every row-reading query.
const ROW_COLUMNS: &str =
    "identifier, namespace, service, resource_type, attributes, attributes_hash, created_at";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode.
    #[default]
    Wal,
    /// Delete journal mode.
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode.
    #[default]
    Full,
    /// Normal synchronous mode.
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` resource store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Builds a config for `path` with default tuning.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// No row matched the requested key.
    #[error("sqlite store row not found: {0}")]
    NotFound(String),
    /// The `(namespace, identifier)` slot is taken.
    #[error("sqlite store row exists: {0}")]
    AlreadyExists(String),
    /// Attribute payload exceeded the size limit.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) | SqliteStoreError::VersionMismatch(message) => {
                Self::Corrupt(message)
            }
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::NotFound(message) => Self::NotFound(message),
            SqliteStoreError::AlreadyExists(message) => Self::AlreadyExists(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "attributes exceed size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

/// Maps an engine error into the store error space.
fn db_err(err: rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed resource store.
#[derive(Clone)]
pub struct SqliteResourceStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteResourceStore {
    /// Opens an `SQLite`-backed resource store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }

    /// Inserts a new row unless the slot is taken.
    fn insert_row(&self, resource: &Resource) -> Result<(), SqliteStoreError> {
        let (bytes, digest) = encode_attributes(resource)?;
        let guard = self.lock()?;
        let changed = guard
            .execute(
                "INSERT INTO resources (namespace, identifier, service, resource_type, \
                 attributes, attributes_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
                 ON CONFLICT(namespace, identifier) DO NOTHING",
                params![
                    resource.namespace.as_str(),
                    resource.identifier.as_str(),
                    resource.service.as_str(),
                    resource.resource_type.as_str(),
                    bytes,
                    digest,
                    resource.created_at.as_unix_millis()
                ],
            )
            .map_err(db_err)?;
        drop(guard);
        if changed == 0 {
            return Err(SqliteStoreError::AlreadyExists(resource.identifier.to_string()));
        }
        Ok(())
    }

    /// Loads one row by its full key.
    fn load_row(&self, key: &ResourceKey) -> Result<Resource, SqliteStoreError> {
        let guard = self.lock()?;
        let row = guard
            .query_row(
                &format!(
                    "SELECT {ROW_COLUMNS} FROM resources WHERE namespace = ?1 AND identifier = \
                     ?2 AND service = ?3 AND resource_type = ?4"
                ),
                params![
                    key.namespace.as_str(),
                    key.identifier.as_str(),
                    key.service.as_str(),
                    key.resource_type.as_str()
                ],
                read_row,
            )
            .optional()
            .map_err(db_err)?;
        drop(guard);
        row.ok_or_else(|| SqliteStoreError::NotFound(key.identifier.to_string()))?.into_resource()
    }

    /// Loads every row in a scope ordered by identifier.
    fn load_scope(&self, scope: &ResourceScope) -> Result<Vec<Resource>, SqliteStoreError> {
        let rows = {
            let guard = self.lock()?;
            let mut statement = guard
                .prepare(&format!(
                    "SELECT {ROW_COLUMNS} FROM resources WHERE namespace = ?1 AND service = ?2 \
                     AND resource_type = ?3 ORDER BY identifier"
                ))
                .map_err(db_err)?;
            let rows = statement
                .query_map(
                    params![
                        scope.namespace.as_str(),
                        scope.service.as_str(),
                        scope.resource_type.as_str()
                    ],
                    read_row,
                )
                .map_err(db_err)?
                .collect::<Result<Vec<RawRow>, rusqlite::Error>>()
                .map_err(db_err)?;
            drop(statement);
            drop(guard);
            rows
        };
        rows.into_iter().map(RawRow::into_resource).collect()
    }

    /// Replaces the attributes of an existing row.
    fn replace_row(&self, resource: &Resource) -> Result<(), SqliteStoreError> {
        let (bytes, digest) = encode_attributes(resource)?;
        let guard = self.lock()?;
        let changed = guard
            .execute(
                "UPDATE resources SET attributes = ?5, attributes_hash = ?6 WHERE namespace = ?1 \
                 AND identifier = ?2 AND service = ?3 AND resource_type = ?4",
                params![
                    resource.namespace.as_str(),
                    resource.identifier.as_str(),
                    resource.service.as_str(),
                    resource.resource_type.as_str(),
                    bytes,
                    digest
                ],
            )
            .map_err(db_err)?;
        drop(guard);
        if changed == 0 {
            return Err(SqliteStoreError::NotFound(resource.identifier.to_string()));
        }
        Ok(())
    }

    /// Deletes one row by its full key.
    fn remove_row(&self, key: &ResourceKey) -> Result<(), SqliteStoreError> {
        let guard = self.lock()?;
        let changed = guard
            .execute(
                "DELETE FROM resources WHERE namespace = ?1 AND identifier = ?2 AND service = ?3 \
                 AND resource_type = ?4",
                params![
                    key.namespace.as_str(),
                    key.identifier.as_str(),
                    key.service.as_str(),
                    key.resource_type.as_str()
                ],
            )
            .map_err(db_err)?;
        drop(guard);
        if changed == 0 {
            return Err(SqliteStoreError::NotFound(key.identifier.to_string()));
        }
        Ok(())
    }
}

impl ResourceStore for SqliteResourceStore {
    fn create(&self, resource: &Resource) -> Result<(), StoreError> {
        self.insert_row(resource).map_err(StoreError::from)
    }

    fn get(&self, key: &ResourceKey) -> Result<Resource, StoreError> {
        self.load_row(key).map_err(StoreError::from)
    }

    fn list(&self, scope: &ResourceScope) -> Result<Vec<Resource>, StoreError> {
        self.load_scope(scope).map_err(StoreError::from)
    }

    fn update(&self, resource: &Resource) -> Result<(), StoreError> {
        self.replace_row(resource).map_err(StoreError::from)
    }

    fn delete(&self, key: &ResourceKey) -> Result<(), StoreError> {
        self.remove_row(key).map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Row Codec
// ============================================================================

/// Undecoded row as read from `SQLite`.
struct RawRow {
    /// Resource identifier.
    identifier: String,
    /// Owning namespace.
    namespace: String,
    /// Owning service.
    service: String,
    /// Resource kind.
    resource_type: String,
    /// Canonical JSON attribute bytes.
    attributes: Vec<u8>,
    /// Stored SHA-256 digest of `attributes`.
    attributes_hash: String,
    /// Creation time in unix milliseconds.
    created_at: i64,
}

impl RawRow {
    /// Verifies the digest and decodes the attribute blob.
    fn into_resource(self) -> Result<Resource, SqliteStoreError> {
        if self.attributes.len() > MAX_ATTRIBUTE_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_ATTRIBUTE_BYTES,
                actual_bytes: self.attributes.len(),
            });
        }
        if sha256_hex(&self.attributes) != self.attributes_hash {
            return Err(SqliteStoreError::Corrupt(format!(
                "hash mismatch for resource {}",
                self.identifier
            )));
        }
        let attributes = serde_json::from_slice(&self.attributes)
            .map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?;
        Ok(Resource::new(
            ResourceKey::new(self.identifier, self.namespace, self.service, self.resource_type),
            attributes,
            Timestamp::from_unix_millis(self.created_at),
        ))
    }
}

/// Reads a [`RawRow`] in [`ROW_COLUMNS`] order.
fn read_row(row: &Row<'_>) -> Result<RawRow, rusqlite::Error> {
    Ok(RawRow {
        identifier: row.get(0)?,
        namespace: row.get(1)?,
        service: row.get(2)?,
        resource_type: row.get(3)?,
        attributes: row.get(4)?,
        attributes_hash: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Encodes attributes canonically and returns them with their digest.
fn encode_attributes(resource: &Resource) -> Result<(Vec<u8>, String), SqliteStoreError> {
    let bytes = canonical_json_bytes(&resource.attributes)
        .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    if bytes.len() > MAX_ATTRIBUTE_BYTES {
        return Err(SqliteStoreError::TooLarge {
            max_bytes: MAX_ATTRIBUTE_BYTES,
            actual_bytes: bytes.len(),
        });
    }
    let digest = sha256_hex(&bytes);
    Ok((bytes, digest))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    if path
        .components()
        .any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(SqliteStoreError::Invalid(
            "store path contains an overlong component".to_string(),
        ));
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection and applies pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_err)?;
    connection
        .execute_batch(&format!(
            "PRAGMA journal_mode = {}; PRAGMA synchronous = {};",
            config.journal_mode.pragma_value(),
            config.sync_mode.pragma_value()
        ))
        .map_err(db_err)?;
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms)).map_err(db_err)?;
    Ok(connection)
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(db_err)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(db_err)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_err)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db_err)?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS resources (
                    namespace TEXT NOT NULL,
                    identifier TEXT NOT NULL,
                    service TEXT NOT NULL,
                    resource_type TEXT NOT NULL,
                    attributes BLOB NOT NULL,
                    attributes_hash TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    PRIMARY KEY (namespace, identifier)
                );
                CREATE INDEX IF NOT EXISTS idx_resources_scope
                    ON resources (namespace, service, resource_type, identifier);",
            )
            .map_err(db_err)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(db_err)?;
    Ok(())
}
