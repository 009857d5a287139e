// crates/assessment-timer-config/src/lib.rs
// ============================================================================
// Module: Assessment Timer Config
// Description: Configuration model, loading, and validation.
// Purpose: Provide the canonical config surface for timer tooling.
// Dependencies: assessment-timer-core, assessment-timer-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is read from a TOML file, parsed into
//! [`AssessmentTimerConfig`], and validated fail-closed before use.

pub mod config;

pub use config::AssessmentTimerConfig;
pub use config::ConfigError;
pub use config::LoggingConfig;
pub use config::ScopeConfig;
pub use config::StorageFormatKind;
pub use config::StoreConfig;
pub use config::StoreType;
pub use config::TimerConfig;
