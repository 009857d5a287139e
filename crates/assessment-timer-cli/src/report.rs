// crates/assessment-timer-cli/src/report.rs
// ============================================================================
// Module: Timer State Reports
// Description: Summaries, per-path durations, and constraint projections.
// Purpose: Turn decoded timer states into serializable command output.
// Dependencies: assessment-timer-core, assessment-timer-config, serde
// ============================================================================

//! ## Overview
//! Report builders are pure functions over [`TimerState`] values so the
//! binary only handles argument parsing and I/O. Every report serializes
//! with camelCase keys, matching the stored document conventions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use assessment_timer_config::AssessmentTimerConfig;
use assessment_timer_core::PlainLabelFormatter;
use assessment_timer_core::StorageFormat;
use assessment_timer_core::TagFilter;
use assessment_timer_core::TagPath;
use assessment_timer_core::TargetCriteria;
use assessment_timer_core::TimeConstraint;
use assessment_timer_core::Timer;
use assessment_timer_core::TimerError;
use assessment_timer_core::TimerFormat;
use assessment_timer_core::TimerState;
use assessment_timer_core::constraint_payload;
use assessment_timer_core::format::decode_state;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: State Summary
// ============================================================================

/// Overview of a stored timer state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSummary {
    /// Number of recorded time points.
    pub points: usize,
    /// Number of distinct tag paths.
    pub paths: usize,
    /// Earliest recorded timestamp, if any.
    pub first_timestamp: Option<f64>,
    /// Latest recorded timestamp, if any.
    pub last_timestamp: Option<f64>,
    /// Granted extra time budget.
    pub extra_time: f64,
    /// Granted extension.
    pub extended_time: f64,
    /// Recorded consumed extra time.
    pub consumed_extra_time: f64,
    /// Net adjustment per tag.
    pub adjustments: BTreeMap<String, f64>,
}

/// Builds the summary of a state.
#[must_use]
pub fn summarize(state: &TimerState) -> StateSummary {
    let points = state.timeline.points();
    let first_timestamp = points.iter().map(|point| point.timestamp()).reduce(f64::min);
    let last_timestamp = points.iter().map(|point| point.timestamp()).reduce(f64::max);
    StateSummary {
        points: points.len(),
        paths: unique_paths(state).len(),
        first_timestamp,
        last_timestamp,
        extra_time: state.extra_time,
        extended_time: state.extended_time,
        consumed_extra_time: state.consumed_extra_time,
        adjustments: state
            .adjustment_map
            .iter()
            .map(|(tag, adjustment)| (tag.to_string(), adjustment.net()))
            .collect(),
    }
}

// ============================================================================
// SECTION: Durations
// ============================================================================

/// Durations recorded for one tag path on both clocks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathDurations {
    /// Tag path joined with `/`.
    pub tags: String,
    /// Seconds measured on the server clock.
    pub server: f64,
    /// Seconds measured on the client clock.
    pub client: f64,
}

/// Computes server and client durations for every distinct tag path.
///
/// Paths are reported in first-seen order.
///
/// # Errors
///
/// Returns [`TimerError`] when a path holds inconsistent ranges.
pub fn durations(state: &TimerState) -> Result<Vec<PathDurations>, TimerError> {
    unique_paths(state)
        .into_iter()
        .map(|path| {
            let tags = path.as_slice().join("/");
            let filter = TagFilter::Exact(path);
            let server = state.timeline.compute(&filter, TargetCriteria::Server, None)?;
            let client = state.timeline.compute(&filter, TargetCriteria::Client, None)?;
            Ok(PathDurations {
                tags,
                server,
                client,
            })
        })
        .collect()
}

/// Returns distinct tag paths in first-seen order.
fn unique_paths(state: &TimerState) -> Vec<TagPath> {
    let mut paths: Vec<TagPath> = Vec::new();
    for point in state.timeline.points() {
        if !paths.contains(point.tags()) {
            paths.push(point.tags().clone());
        }
    }
    paths
}

// ============================================================================
// SECTION: Constraints
// ============================================================================

/// Constraint payload for one configured scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeConstraint {
    /// Scope identifier.
    pub scope: String,
    /// Client payload, `false` when the scope has no limits.
    pub constraint: Value,
}

/// Projects every configured scope onto the timer.
///
/// When the state grants no extra time, the configured default budget is
/// applied before projecting.
///
/// # Errors
///
/// Returns [`TimerError`] when a duration cannot be computed for `target`.
pub fn constraints(
    state: TimerState,
    config: &AssessmentTimerConfig,
    target: TargetCriteria,
) -> Result<Vec<ScopeConstraint>, TimerError> {
    let mut timer = Timer::from_state(state);
    let default_extra = config.timer.extra_time_seconds();
    if timer.extra_time() == 0.0 && default_extra > 0.0 {
        timer.set_extra_time(default_extra)?;
    }
    config
        .scopes
        .iter()
        .map(|scope| {
            let constraint = TimeConstraint::from_timer(
                &scope.node(),
                &scope.limits(),
                &timer,
                target,
                &PlainLabelFormatter,
            )?;
            Ok(ScopeConstraint {
                scope: scope.identifier.clone(),
                constraint: constraint_payload(constraint.as_ref())?,
            })
        })
        .collect()
}

// ============================================================================
// SECTION: Conversion
// ============================================================================

/// Decodes a stored document of any known shape and re-encodes it.
///
/// # Errors
///
/// Returns [`TimerError`] when decoding or encoding fails.
pub fn convert(input: &str, format: TimerFormat) -> Result<String, TimerError> {
    let state = decode_state(input)?;
    format.encode(&state)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
