// crates/assessment-timer-core/src/format/json.rs
// ============================================================================
// Module: Json Storage Format
// Description: Verbose JSON envelope for timer state.
// Purpose: Persist every point with its full tag path.
// Dependencies: crate::{core, format, interfaces}, serde, serde_json
// ============================================================================

//! ## Overview
//! The envelope carries `timeLine` as a list of point records
//! `{ts, type, target, tags}` in recording order, plus `extraTime`,
//! `extendedTime`, `consumedExtraTime`, and `timerAdjustmentMap`.
//!
//! Older deployments stored `timeLine` as a legacy serialized string inside
//! the same envelope; that form still decodes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::adjustment::AdjustmentMap;
use crate::core::error::TimerError;
use crate::core::point::PointType;
use crate::core::point::TimePoint;
use crate::core::point::TimeTarget;
use crate::core::state::TimerState;
use crate::core::tags::TagPath;
use crate::core::timeline::TimeLine;
use crate::format::decode_state;
use crate::format::legacy;
use crate::interfaces::StorageFormat;

// ============================================================================
// SECTION: Point Records
// ============================================================================

/// Wire record of one time point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct PointRecord {
    /// Seconds since the Unix epoch.
    ts: f64,
    /// Point type code.
    #[serde(rename = "type")]
    point_type: u8,
    /// Target clock code.
    target: u8,
    /// Full tag path.
    tags: Vec<String>,
}

impl PointRecord {
    /// Builds the record of a point.
    fn from_point(point: &TimePoint) -> Self {
        Self {
            ts: point.timestamp(),
            point_type: point.point_type().code(),
            target: point.target().code(),
            tags: point.tags().as_slice().to_vec(),
        }
    }

    /// Validates the record into a point.
    fn into_point(self) -> Result<TimePoint, TimerError> {
        TimePoint::new(
            TagPath::try_from(self.tags)?,
            self.ts,
            PointType::from_code(self.point_type)?,
            TimeTarget::from_code(self.target)?,
        )
    }
}

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Envelope written by the encoder.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeOut<'a> {
    /// Points in recording order.
    time_line: Vec<PointRecord>,
    /// Extra time budget.
    extra_time: f64,
    /// Administrator extension.
    extended_time: f64,
    /// Extra time already used.
    consumed_extra_time: f64,
    /// Per-scope adjustments.
    timer_adjustment_map: &'a AdjustmentMap,
}

/// Envelope accepted by the decoder.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeIn {
    /// Point records or a legacy serialized timeline.
    #[serde(default)]
    time_line: Option<serde_json::Value>,
    /// Extra time budget.
    #[serde(default)]
    extra_time: Option<f64>,
    /// Administrator extension.
    #[serde(default)]
    extended_time: Option<f64>,
    /// Extra time already used.
    #[serde(default)]
    consumed_extra_time: Option<f64>,
    /// Per-scope adjustments.
    #[serde(default)]
    timer_adjustment_map: Option<AdjustmentMap>,
}

/// Shapes accepted for the `timeLine` field.
#[derive(Deserialize)]
#[serde(untagged)]
enum TimeLineField {
    /// Point records.
    Points(Vec<PointRecord>),
    /// Legacy serialized timeline.
    Serialized(String),
}

// ============================================================================
// SECTION: Json Format
// ============================================================================

/// Verbose JSON codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonFormat;

impl StorageFormat for JsonFormat {
    fn encode(&self, state: &TimerState) -> Result<String, TimerError> {
        let envelope = EnvelopeOut {
            time_line: state.timeline.points().iter().map(PointRecord::from_point).collect(),
            extra_time: state.extra_time,
            extended_time: state.extended_time,
            consumed_extra_time: state.consumed_extra_time,
            timer_adjustment_map: &state.adjustment_map,
        };
        serde_json::to_string(&envelope)
            .map_err(|err| TimerError::invalid(format!("timer state encoding failed: {err}")))
    }

    fn decode(&self, input: &str) -> Result<TimerState, TimerError> {
        decode_state(input)
    }
}

/// Decodes the verbose envelope.
pub(crate) fn decode_envelope(input: &str) -> Result<TimerState, TimerError> {
    let envelope: EnvelopeIn = serde_json::from_str(input)
        .map_err(|err| TimerError::invalid(format!("malformed timer envelope: {err}")))?;
    let timeline = match envelope.time_line {
        None | Some(serde_json::Value::Null) => TimeLine::new(),
        Some(value) => decode_timeline_field(value)?,
    };
    Ok(TimerState {
        timeline,
        extra_time: non_negative("extraTime", envelope.extra_time)?,
        extended_time: non_negative("extendedTime", envelope.extended_time)?,
        consumed_extra_time: non_negative("consumedExtraTime", envelope.consumed_extra_time)?,
        adjustment_map: envelope.timer_adjustment_map.unwrap_or_default(),
    })
}

/// Decodes the `timeLine` field of an envelope.
fn decode_timeline_field(value: serde_json::Value) -> Result<TimeLine, TimerError> {
    let field: TimeLineField = serde_json::from_value(value)
        .map_err(|_| TimerError::invalid("timeLine is neither a point list nor a serialized timeline"))?;
    match field {
        TimeLineField::Points(records) => {
            records.into_iter().map(PointRecord::into_point).collect::<Result<TimeLine, _>>()
        }
        TimeLineField::Serialized(serialized) => legacy::decode_timeline(&serialized),
    }
}

/// Validates an optional metadata field, defaulting to zero.
pub(crate) fn non_negative(field: &str, value: Option<f64>) -> Result<f64, TimerError> {
    let value = value.unwrap_or(0.0);
    if !value.is_finite() || value < 0.0 {
        return Err(TimerError::invalid(format!("{field} must be a non-negative number, got {value}")));
    }
    Ok(value)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
