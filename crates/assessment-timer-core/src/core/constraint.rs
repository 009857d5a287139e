// crates/assessment-timer-core/src/core/constraint.rs
// ============================================================================
// Module: Time Constraints
// Description: Read-only projection of limits and spent time for one scope.
// Purpose: Build the structure the delivery client displays as a countdown.
// Dependencies: crate::{core, interfaces, runtime}, serde, serde_json
// ============================================================================

//! ## Overview
//! A [`TimeConstraint`] combines the configured limits of a scope node with
//! the time already spent in it. Nodes without any limit have no constraint;
//! the client payload is then the literal `false`.
//!
//! Unset limits serialize as `false` as well, so the payload shape matches
//! what delivery clients already parse.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde::Serializer;
use serde_json::Value;

use crate::core::error::TimerError;
use crate::core::point::TargetCriteria;
use crate::core::point::round_micros;
use crate::interfaces::LabelFormatter;
use crate::runtime::timer::Timer;

// ============================================================================
// SECTION: Scope Nodes
// ============================================================================

/// Kind of node in the test hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScopeKind {
    /// Whole test.
    AssessmentTest,
    /// Test part.
    TestPart,
    /// Section inside a part.
    AssessmentSection,
    /// Item reference inside a section.
    AssessmentItemRef,
}

/// Scope node a constraint is built for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeNode {
    /// Node identifier, also its scope tag.
    pub identifier: String,
    /// Node kind.
    pub kind: ScopeKind,
    /// Optional display label.
    #[serde(default)]
    pub label: Option<String>,
    /// Tags selecting the node's points; defaults to the identifier alone.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ScopeNode {
    /// Creates a node whose tags are its identifier.
    #[must_use]
    pub fn new(identifier: impl Into<String>, kind: ScopeKind) -> Self {
        Self {
            identifier: identifier.into(),
            kind,
            label: None,
            tags: Vec::new(),
        }
    }

    /// Sets the display label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the tags used to select the node's points.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the tags used to query the timer.
    #[must_use]
    pub fn filter_tags(&self) -> Vec<String> {
        if self.tags.is_empty() { vec![self.identifier.clone()] } else { self.tags.clone() }
    }
}

/// Configured time limits of a scope node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeLimits {
    /// Minimum time the test taker must stay in the scope.
    pub min_time: Option<Duration>,
    /// Maximum time allowed in the scope.
    pub max_time: Option<Duration>,
    /// Whether answers are accepted after the maximum time elapsed.
    pub allow_late_submission: bool,
}

impl TimeLimits {
    /// Returns true when neither limit is configured.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.min_time.is_none() && self.max_time.is_none()
    }
}

/// Formatter returning the node label, or its identifier when unlabeled.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainLabelFormatter;

impl LabelFormatter for PlainLabelFormatter {
    fn format_label(&self, node: &ScopeNode) -> String {
        node.label.clone().unwrap_or_else(|| node.identifier.clone())
    }
}

// ============================================================================
// SECTION: Time Constraint
// ============================================================================

/// Extra time available to a scope with a maximum duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraTimeAllowance {
    /// Extra time granted, in seconds.
    pub total: f64,
    /// Extra time already used, in seconds.
    pub consumed: f64,
    /// Extra time left, in seconds.
    pub remaining: f64,
}

/// Client-displayable time constraint of one scope.
///
/// # Invariants
/// - At least one of `min_time` and `max_time` is set.
/// - Remaining values are never negative.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeConstraint {
    /// Display label.
    label: String,
    /// Scope identifier.
    source: String,
    /// Scope kind.
    qti_class_name: ScopeKind,
    /// Whether late submission is accepted.
    allow_late_submission: bool,
    /// Extra time allowances.
    extra_time: Vec<ExtraTimeAllowance>,
    /// Minimum duration in whole seconds.
    #[serde(serialize_with = "some_or_false")]
    min_time: Option<u64>,
    /// Maximum duration in whole seconds.
    #[serde(serialize_with = "some_or_false")]
    max_time: Option<u64>,
    /// Seconds left before the minimum is reached.
    #[serde(serialize_with = "some_or_false")]
    min_time_remaining: Option<f64>,
    /// Seconds left before the maximum is reached.
    #[serde(serialize_with = "some_or_false")]
    max_time_remaining: Option<f64>,
    /// Seconds already spent.
    #[serde(skip)]
    spent: f64,
    /// Net adjustment applied to the maximum.
    #[serde(skip)]
    adjustment: f64,
}

impl TimeConstraint {
    /// Builds the constraint of a node, or `None` when it has no limit.
    #[must_use]
    pub fn build(
        node: &ScopeNode,
        limits: &TimeLimits,
        spent: f64,
        formatter: &dyn LabelFormatter,
    ) -> Option<Self> {
        if limits.is_unbounded() {
            return None;
        }
        let min_time = limits.min_time.map(|duration| duration.as_secs());
        let max_time = limits.max_time.map(|duration| duration.as_secs());
        let mut constraint = Self {
            label: formatter.format_label(node),
            source: node.identifier.clone(),
            qti_class_name: node.kind,
            allow_late_submission: limits.allow_late_submission,
            extra_time: Vec::new(),
            min_time,
            max_time,
            min_time_remaining: None,
            max_time_remaining: None,
            spent,
            adjustment: 0.0,
        };
        constraint.refresh_remaining();
        Some(constraint)
    }

    /// Builds the constraint of a node from the time recorded by a timer.
    ///
    /// The net adjustment registered for the node identifier is applied to
    /// the maximum. When the timer carries extra time and a maximum is set,
    /// the allowance is reported as well.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError`] when the spent time cannot be computed.
    pub fn from_timer(
        node: &ScopeNode,
        limits: &TimeLimits,
        timer: &Timer,
        target: TargetCriteria,
        formatter: &dyn LabelFormatter,
    ) -> Result<Option<Self>, TimerError> {
        let tags = node.filter_tags();
        let spent = timer.compute(&tags, target)?;
        let Some(constraint) = Self::build(node, limits, spent, formatter) else {
            return Ok(None);
        };
        let mut constraint =
            constraint.with_adjustment(timer.adjustment_map().get(&node.identifier));
        if let Some(max_time) = limits.max_time
            && timer.extra_time() > 0.0
        {
            let max_seconds = max_time.as_secs_f64();
            let consumed = timer.consumed_extra_time(&tags, max_seconds, target)?;
            constraint = constraint.with_extra_time(ExtraTimeAllowance {
                total: timer.extra_time(),
                consumed,
                remaining: round_micros((timer.extra_time() - consumed).max(0.0)),
            });
        }
        Ok(Some(constraint))
    }

    /// Applies a net adjustment, in seconds, to the maximum duration.
    #[must_use]
    pub fn with_adjustment(mut self, seconds: f64) -> Self {
        self.adjustment = seconds;
        self.refresh_remaining();
        self
    }

    /// Adds an extra time allowance.
    #[must_use]
    pub fn with_extra_time(mut self, allowance: ExtraTimeAllowance) -> Self {
        self.extra_time.push(allowance);
        self
    }

    /// Returns the display label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the scope identifier.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the scope kind.
    #[must_use]
    pub const fn kind(&self) -> ScopeKind {
        self.qti_class_name
    }

    /// Returns whether late submission is accepted.
    #[must_use]
    pub const fn allow_late_submission(&self) -> bool {
        self.allow_late_submission
    }

    /// Returns the extra time allowances.
    #[must_use]
    pub fn extra_time(&self) -> &[ExtraTimeAllowance] {
        &self.extra_time
    }

    /// Returns the minimum duration in whole seconds.
    #[must_use]
    pub const fn min_time(&self) -> Option<u64> {
        self.min_time
    }

    /// Returns the maximum duration in whole seconds.
    #[must_use]
    pub const fn max_time(&self) -> Option<u64> {
        self.max_time
    }

    /// Returns the seconds left before the minimum is reached.
    #[must_use]
    pub const fn min_time_remaining(&self) -> Option<f64> {
        self.min_time_remaining
    }

    /// Returns the seconds left before the maximum is reached.
    #[must_use]
    pub const fn max_time_remaining(&self) -> Option<f64> {
        self.max_time_remaining
    }

    /// Returns the seconds already spent.
    #[must_use]
    pub const fn spent(&self) -> f64 {
        self.spent
    }

    /// Recomputes the remaining values from limits, spent time, and adjustment.
    #[allow(clippy::cast_precision_loss, reason = "Limits are far below 2^52 seconds.")]
    fn refresh_remaining(&mut self) {
        self.min_time_remaining =
            self.min_time.map(|min| round_micros((min as f64 - self.spent).max(0.0)));
        self.max_time_remaining = self
            .max_time
            .map(|max| round_micros((max as f64 + self.adjustment - self.spent).max(0.0)));
    }
}

/// Returns the client payload of an optional constraint (`false` when absent).
///
/// # Errors
///
/// Returns [`TimerError::InvalidData`] when the constraint cannot be
/// serialized.
pub fn constraint_payload(constraint: Option<&TimeConstraint>) -> Result<Value, TimerError> {
    match constraint {
        None => Ok(Value::Bool(false)),
        Some(constraint) => serde_json::to_value(constraint)
            .map_err(|err| TimerError::invalid(format!("constraint serialization failed: {err}"))),
    }
}

/// Serializes `Some(value)` as the value and `None` as `false`.
#[allow(
    clippy::ref_option,
    clippy::trivially_copy_pass_by_ref,
    reason = "Signature is dictated by serde's serialize_with."
)]
fn some_or_false<T: Serialize, S: Serializer>(
    value: &Option<T>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(value) => value.serialize(serializer),
        None => serializer.serialize_bool(false),
    }
}
