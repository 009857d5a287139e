// crates/assessment-timer-config/src/config.rs
// ============================================================================
// Module: Assessment Timer Configuration
// Description: Configuration loading and validation for timer tooling.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: assessment-timer-core, assessment-timer-store-sqlite, humantime, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed. Durations are written in
//! `humantime` notation (`"90s"`, `"30m"`, `"1h 15m"`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use assessment_timer_core::ScopeKind;
use assessment_timer_core::ScopeNode;
use assessment_timer_core::TimeLimits;
use assessment_timer_core::TimerFormat;
use assessment_timer_store_sqlite::SqliteStoreConfig;
use assessment_timer_store_sqlite::SqliteStoreMode;
use assessment_timer_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use serde::Deserializer;
use serde::de::Error as _;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "assessment-timer.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "ASSESSMENT_TIMER_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of configured scopes.
pub(crate) const MAX_SCOPES: usize = 4096;
/// Default busy timeout for the `SQLite` store (ms).
const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Log levels accepted by `logging.level`.
const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Assessment timer configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssessmentTimerConfig {
    /// Timer behavior.
    #[serde(default)]
    pub timer: TimerConfig,
    /// Timer state storage backend.
    #[serde(default)]
    pub store: StoreConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Timed scopes of the test.
    #[serde(default)]
    pub scopes: Vec<ScopeConfig>,
}

impl AssessmentTimerConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path is `path` when given, else the `ASSESSMENT_TIMER_CONFIG`
    /// environment variable, else `assessment-timer.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.logging.validate()?;
        if self.scopes.len() > MAX_SCOPES {
            return Err(ConfigError::Invalid(format!("too many scopes (max {MAX_SCOPES})")));
        }
        let mut identifiers = BTreeSet::new();
        for scope in &self.scopes {
            scope.validate()?;
            if !identifiers.insert(scope.identifier.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate scope identifier: {}",
                    scope.identifier
                )));
            }
        }
        Ok(())
    }

    /// Returns the scope configured for `identifier`.
    #[must_use]
    pub fn scope(&self, identifier: &str) -> Option<&ScopeConfig> {
        self.scopes.iter().find(|scope| scope.identifier == identifier)
    }
}

/// Timer behavior configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimerConfig {
    /// Format used when saving timer state.
    #[serde(default)]
    pub storage_format: StorageFormatKind,
    /// Extra time granted to every test taker.
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub extra_time: Option<Duration>,
}

impl TimerConfig {
    /// Returns the codec selected by `storage_format`.
    #[must_use]
    pub const fn format(&self) -> TimerFormat {
        match self.storage_format {
            StorageFormatKind::Json => TimerFormat::json(),
            StorageFormatKind::Packed => TimerFormat::packed(),
        }
    }

    /// Returns the extra time in seconds (zero when unset).
    #[must_use]
    pub fn extra_time_seconds(&self) -> f64 {
        self.extra_time.map_or(0.0, |duration| duration.as_secs_f64())
    }
}

/// Timer state encoding selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageFormatKind {
    /// Self-describing JSON envelope.
    #[default]
    Json,
    /// Compact packed JSON document.
    Packed,
}

/// Timer state store configuration.
#[derive(Debug, Clone, Deserialize)]
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
                validate_store_path(path)?;
                if self.busy_timeout_ms == 0 {
                    return Err(ConfigError::Invalid(
                        "store busy_timeout_ms must be greater than zero".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Returns the `SQLite` store configuration for the sqlite backend.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
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
}

/// Store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// Use the in-memory store.
    #[default]
    Memory,
    /// Use `SQLite`-backed durable store.
    Sqlite,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// Validates the log level.
    fn validate(&self) -> Result<(), ConfigError> {
        let level = self.level.trim().to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "logging.level must be one of {}, got {}",
                LOG_LEVELS.join(", "),
                self.level
            )));
        }
        Ok(())
    }
}

/// Time limits of one scope of the test.
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeConfig {
    /// Scope identifier.
    pub identifier: String,
    /// Scope kind.
    pub kind: ScopeKind,
    /// Optional display label.
    #[serde(default)]
    pub label: Option<String>,
    /// Tags selecting the scope's time points; defaults to the identifier.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Minimum time to spend in the scope.
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub min_time: Option<Duration>,
    /// Maximum time allowed in the scope.
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub max_time: Option<Duration>,
    /// Whether responses are accepted after the maximum time.
    #[serde(default)]
    pub allow_late_submission: bool,
}

impl ScopeConfig {
    /// Validates one scope entry.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.identifier.trim().is_empty() {
            return Err(ConfigError::Invalid("scope identifier must be non-empty".to_string()));
        }
        if self.tags.iter().any(|tag| tag.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "scope {} has an empty tag",
                self.identifier
            )));
        }
        if let (Some(min), Some(max)) = (self.min_time, self.max_time)
            && min > max
        {
            return Err(ConfigError::Invalid(format!(
                "scope {} min_time {} exceeds max_time {}",
                self.identifier,
                humantime::format_duration(min),
                humantime::format_duration(max)
            )));
        }
        Ok(())
    }

    /// Returns the scope node used to build constraints.
    #[must_use]
    pub fn node(&self) -> ScopeNode {
        let node = ScopeNode::new(self.identifier.clone(), self.kind).with_tags(self.tags.clone());
        match &self.label {
            Some(label) => node.with_label(label.clone()),
            None => node,
        }
    }

    /// Returns the configured limits.
    #[must_use]
    pub const fn limits(&self) -> TimeLimits {
        TimeLimits {
            min_time: self.min_time,
            max_time: self.max_time,
            allow_late_submission: self.allow_late_submission,
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

/// Returns the default log level.
fn default_log_level() -> String {
    "info".to_string()
}

/// Parses an optional `humantime` duration.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(text) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    humantime::parse_duration(text.trim())
        .map(Some)
        .map_err(|err| D::Error::custom(format!("invalid duration '{text}': {err}")))
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

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates store paths against security limits.
fn validate_store_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid("store path must be non-empty".to_string()));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("store path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("store path component too long".to_string()));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
