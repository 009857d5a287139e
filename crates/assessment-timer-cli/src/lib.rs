// crates/assessment-timer-cli/src/lib.rs
// ============================================================================
// Module: Assessment Timer CLI Library
// Description: Shared helpers for the assessment timer command-line interface.
// Purpose: Provide reusable components (i18n, reports) for the binary and tests.
// Dependencies: assessment-timer-core, assessment-timer-config, serde
// ============================================================================

//! ## Overview
//! This library houses the message catalog and the report builders used by
//! the `assessment-timer` binary. The binary entry point (`src/main.rs`)
//! only parses arguments, performs I/O, and renders these reports.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Message catalog and the `t!` macro.
pub mod i18n;
/// Reports derived from decoded timer states.
pub mod report;
