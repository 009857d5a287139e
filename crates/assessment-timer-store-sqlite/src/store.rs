// crates/assessment-timer-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Timer Storage
// Description: Durable TimerStorage backed by SQLite WAL.
// Purpose: Persist encoded timer states with integrity verification.
// Dependencies: assessment-timer-core, rusqlite, serde, sha2, thiserror, tracing
// ============================================================================

//! ## Overview
//! This module implements a durable [`TimerStorage`] using `SQLite`. Each
//! `(owner_id, key)` pair holds the latest encoded timer state together with
//! its SHA-256 digest. Loads verify the digest before handing the value back
//! and fail closed on corruption. Stored contents are untrusted input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use assessment_timer_core::StoreError;
use assessment_timer_core::TimerStorage;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

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
/// Maximum encoded timer state size accepted by the store.
pub const MAX_STATE_BYTES: usize = 8 * 1024 * 1024;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
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
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
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

/// Configuration for the `SQLite` timer storage.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
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
    /// Returns a configuration with default settings for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }

    /// Validates the configuration without opening the database.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Invalid`] when the path breaks the limits.
    pub fn validate(&self) -> Result<(), SqliteStoreError> {
        validate_store_path(&self.path)
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
///
/// # Invariants
/// - Error messages avoid embedding raw timer state payloads.
#[derive(Debug, Error, Clone)]
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
    /// Store payload exceeded the size limit.
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
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "timer state exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed timer storage with WAL support.
///
/// # Invariants
/// - Loads verify stored hashes before returning a value.
/// - `SQLite` connection access is serialized through a mutex.
#[derive(Clone)]
pub struct SqliteTimerStorage {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

/// Summary metadata for a stored timer state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredStateSummary {
    /// Storage key of the state.
    pub key: String,
    /// Encoded size in bytes.
    pub size_bytes: u64,
    /// Unix milliseconds of the last save.
    pub saved_at: i64,
}

impl std::fmt::Debug for SqliteTimerStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTimerStorage").field("config", &self.config).finish_non_exhaustive()
    }
}

impl SqliteTimerStorage {
    /// Opens an `SQLite`-backed timer storage.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        debug!(path = %config.path.display(), "opened sqlite timer store");
        Ok(Self {
            config,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Returns the database path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Verifies the store can execute a simple SQL statement.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] if the mutex is poisoned or the query fails.
    pub fn readiness(&self) -> Result<(), SqliteStoreError> {
        let guard = self.lock()?;
        guard.execute_batch("SELECT 1").map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    /// Loads the verified value stored for `(owner_id, key)`.
    ///
    /// # Errors
    ///
    /// - [`SqliteStoreError::Corrupt`] when the stored hash does not match.
    /// - [`SqliteStoreError::TooLarge`] when the stored value exceeds the limit.
    /// - [`SqliteStoreError::Invalid`] when the value is not UTF-8.
    pub fn load_value(&self, owner_id: &str, key: &str) -> Result<Option<String>, SqliteStoreError> {
        let guard = self.lock()?;
        let metadata = guard
            .query_row(
                "SELECT length(state_value), value_hash FROM timer_states WHERE owner_id = ?1 AND \
                 state_key = ?2",
                params![owner_id, key],
                |row| {
                    let length: i64 = row.get(0)?;
                    let hash: String = row.get(1)?;
                    Ok((length, hash))
                },
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let Some((length, expected_hash)) = metadata else {
            return Ok(None);
        };
        let length = usize::try_from(length).map_err(|_| {
            SqliteStoreError::Invalid(format!("negative state length for key {key}"))
        })?;
        if length > MAX_STATE_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_STATE_BYTES,
                actual_bytes: length,
            });
        }
        let bytes: Vec<u8> = guard
            .query_row(
                "SELECT state_value FROM timer_states WHERE owner_id = ?1 AND state_key = ?2",
                params![owner_id, key],
                |row| row.get(0),
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        drop(guard);
        if sha256_hex(&bytes) != expected_hash {
            return Err(SqliteStoreError::Corrupt(format!("hash mismatch for key {key}")));
        }
        let value = String::from_utf8(bytes)
            .map_err(|_| SqliteStoreError::Invalid(format!("non utf-8 value for key {key}")))?;
        debug!(owner_id, key, bytes = value.len(), "loaded timer state");
        Ok(Some(value))
    }

    /// Stores `value` for `(owner_id, key)`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// - [`SqliteStoreError::TooLarge`] when the value exceeds the limit.
    /// - [`SqliteStoreError::Db`] when the write fails.
    pub fn save_value(&self, owner_id: &str, key: &str, value: &str) -> Result<(), SqliteStoreError> {
        if value.len() > MAX_STATE_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_STATE_BYTES,
                actual_bytes: value.len(),
            });
        }
        let hash = sha256_hex(value.as_bytes());
        let saved_at = unix_millis();
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO timer_states (owner_id, state_key, state_value, value_hash, \
                     saved_at) VALUES (?1, ?2, ?3, ?4, ?5) ON CONFLICT(owner_id, state_key) DO \
                     UPDATE SET state_value = excluded.state_value, value_hash = \
                     excluded.value_hash, saved_at = excluded.saved_at",
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            stmt.execute(params![owner_id, key, value.as_bytes(), hash, saved_at])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        drop(guard);
        debug!(owner_id, key, bytes = value.len(), "saved timer state");
        Ok(())
    }

    /// Lists the stored states of an owner, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] if the query fails.
    pub fn list_states(&self, owner_id: &str) -> Result<Vec<StoredStateSummary>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT state_key, length(state_value), saved_at FROM timer_states WHERE owner_id \
                 = ?1 ORDER BY state_key",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = stmt
            .query_map(params![owner_id], |row| {
                let key: String = row.get(0)?;
                let length: i64 = row.get(1)?;
                let saved_at: i64 = row.get(2)?;
                Ok((key, length, saved_at))
            })
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut summaries = Vec::new();
        for row in rows {
            let (key, length, saved_at) = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let size_bytes = u64::try_from(length)
                .map_err(|_| SqliteStoreError::Invalid(format!("negative state length for key {key}")))?;
            summaries.push(StoredStateSummary {
                key,
                size_bytes,
                saved_at,
            });
        }
        Ok(summaries)
    }

    /// Lists the storage keys of an owner, ordered.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] if the query fails.
    pub fn list_keys(&self, owner_id: &str) -> Result<Vec<String>, SqliteStoreError> {
        Ok(self.list_states(owner_id)?.into_iter().map(|summary| summary.key).collect())
    }

    /// Deletes the value stored for `(owner_id, key)`; returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] if the delete fails.
    pub fn remove(&self, owner_id: &str, key: &str) -> Result<bool, SqliteStoreError> {
        let guard = self.lock()?;
        let removed = guard
            .execute(
                "DELETE FROM timer_states WHERE owner_id = ?1 AND state_key = ?2",
                params![owner_id, key],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(removed > 0)
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }
}

impl TimerStorage for SqliteTimerStorage {
    fn get(&self, owner_id: &str, key: &str) -> Result<Option<String>, StoreError> {
        self.load_value(owner_id, key).map_err(StoreError::from)
    }

    fn set(&self, owner_id: &str, key: &str, value: &str) -> Result<(), StoreError> {
        self.save_value(owner_id, key, value).map_err(StoreError::from)
    }
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
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS timer_states (
                    owner_id TEXT NOT NULL,
                    state_key TEXT NOT NULL,
                    state_value BLOB NOT NULL,
                    value_hash TEXT NOT NULL,
                    saved_at INTEGER NOT NULL,
                    PRIMARY KEY (owner_id, state_key)
                );",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Returns the lowercase hex SHA-256 digest of `bytes`.
fn sha256_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}

/// Returns the current unix epoch in milliseconds.
fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
