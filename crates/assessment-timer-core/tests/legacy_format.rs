// crates/assessment-timer-core/tests/legacy_format.rs
// ============================================================================
// Module: Legacy Format Tests
// Description: Decoding of timer state written by older deployments.
// Purpose: Keep stored sessions readable by both codecs.
// ============================================================================

//! Legacy serialized state decodes to the same state as its JSON encoding.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use assessment_timer_core::AdjustmentMap;
use assessment_timer_core::JsonFormat;
use assessment_timer_core::PackedFormat;
use assessment_timer_core::PointType;
use assessment_timer_core::StorageFormat;
use assessment_timer_core::TagPath;
use assessment_timer_core::TimeLine;
use assessment_timer_core::TimePoint;
use assessment_timer_core::TimeTarget;
use assessment_timer_core::TimerError;
use assessment_timer_core::TimerState;
use assessment_timer_core::format::legacy::MAX_DEPTH;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Full state: a custom-serialized timeline of objects with protected fields.
const LEGACY_STATE: &str = "a:5:{s:8:\"timeLine\";C:8:\"TimeLine\":842:{a:4:{i:0;O:9:\"TimePoint\":4:{s:7:\"\0*\0tags\";a:5:{i:0;s:6:\"test-1\";i:1;s:6:\"part-1\";i:2;s:9:\"section-1\";i:3;s:6:\"item-1\";i:4;s:8:\"item-1#0\";}s:12:\"\0*\0timestamp\";d:1459335000.123456;s:7:\"\0*\0type\";i:1;s:9:\"\0*\0target\";i:2;}i:1;O:9:\"TimePoint\":4:{s:7:\"\0*\0tags\";a:5:{i:0;s:6:\"test-1\";i:1;s:6:\"part-1\";i:2;s:9:\"section-1\";i:3;s:6:\"item-1\";i:4;s:8:\"item-1#0\";}s:12:\"\0*\0timestamp\";d:1459335020.5;s:7:\"\0*\0type\";i:2;s:9:\"\0*\0target\";i:2;}i:2;O:9:\"TimePoint\":4:{s:7:\"\0*\0tags\";a:5:{i:0;s:6:\"test-1\";i:1;s:6:\"part-1\";i:2;s:9:\"section-1\";i:3;s:6:\"item-1\";i:4;s:8:\"item-1#0\";}s:12:\"\0*\0timestamp\";d:1459335005.25;s:7:\"\0*\0type\";i:1;s:9:\"\0*\0target\";i:1;}i:3;O:9:\"TimePoint\":4:{s:7:\"\0*\0tags\";a:5:{i:0;s:6:\"test-1\";i:1;s:6:\"part-1\";i:2;s:9:\"section-1\";i:3;s:6:\"item-1\";i:4;s:8:\"item-1#0\";}s:12:\"\0*\0timestamp\";d:1459335015.375;s:7:\"\0*\0type\";i:2;s:9:\"\0*\0target\";i:1;}}}s:9:\"extraTime\";i:600;s:12:\"extendedTime\";i:0;s:17:\"consumedExtraTime\";d:12.5;s:18:\"timerAdjustmentMap\";a:1:{s:9:\"section-1\";a:2:{s:8:\"increase\";i:60;s:8:\"decrease\";i:0;}}}";

/// Timeline object whose private `points` field holds array-shaped points.
const LEGACY_TIMELINE_OBJECT: &str = "O:8:\"TimeLine\":1:{s:16:\"\0TimeLine\0points\";a:2:{i:0;a:4:{s:4:\"tags\";a:2:{i:0;s:6:\"test-1\";i:1;s:6:\"item-1\";}s:9:\"timestamp\";d:1459335000;s:4:\"type\";i:1;s:6:\"target\";i:2;}i:1;a:4:{s:4:\"tags\";a:2:{i:0;s:6:\"test-1\";i:1;s:6:\"item-1\";}s:9:\"timestamp\";d:1459335020;s:4:\"type\";i:2;s:6:\"target\";i:2;}}}";

/// Envelope whose `timeLine` is still a serialized string.
const ENVELOPE_WITH_SERIALIZED_TIMELINE: &str = concat!(
    r#"{"timeLine":"#,
    r#""a:2:{i:0;a:4:{s:4:\"tags\";a:2:{i:0;s:6:\"test-1\";i:1;s:6:\"item-1\";}s:9:\"timestamp\";d:1459335000;s:4:\"type\";i:1;s:6:\"target\";i:2;}i:1;a:4:{s:4:\"tags\";a:2:{i:0;s:6:\"test-1\";i:1;s:6:\"item-1\";}s:9:\"timestamp\";d:1459335020;s:4:\"type\";i:2;s:6:\"target\";i:2;}}""#,
    r#","extraTime":300,"extendedTime":0,"consumedExtraTime":0,"timerAdjustmentMap":[]}"#
);

const ITEM_TAGS: [&str; 5] = ["test-1", "part-1", "section-1", "item-1", "item-1#0"];

fn point(tags: &[&str], timestamp: f64, point_type: PointType, target: TimeTarget) -> TimePoint {
    TimePoint::new(TagPath::new(tags).unwrap(), timestamp, point_type, target).unwrap()
}

fn expected_state() -> TimerState {
    let mut adjustment_map = AdjustmentMap::new();
    adjustment_map.increase("section-1", 60.0).unwrap();
    adjustment_map.decrease("section-1", 0.0).unwrap();
    TimerState {
        timeline: TimeLine::from_points(vec![
            point(&ITEM_TAGS, 1_459_335_000.123_456, PointType::Start, TimeTarget::Server),
            point(&ITEM_TAGS, 1_459_335_020.5, PointType::End, TimeTarget::Server),
            point(&ITEM_TAGS, 1_459_335_005.25, PointType::Start, TimeTarget::Client),
            point(&ITEM_TAGS, 1_459_335_015.375, PointType::End, TimeTarget::Client),
        ]),
        extra_time: 600.0,
        extended_time: 0.0,
        consumed_extra_time: 12.5,
        adjustment_map,
    }
}

/// Wraps a legacy null in `levels` serialized strings.
fn nested_serialized(levels: usize) -> String {
    (0..levels).fold("N;".to_string(), |inner, _| format!("s:{}:\"{inner}\";", inner.len()))
}

fn item_range() -> TimeLine {
    TimeLine::from_points(vec![
        point(&["test-1", "item-1"], 1_459_335_000.0, PointType::Start, TimeTarget::Server),
        point(&["test-1", "item-1"], 1_459_335_020.0, PointType::End, TimeTarget::Server),
    ])
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Verifies a legacy blob decodes to the state its JSON encoding holds.
#[test]
fn legacy_state_matches_json_encoding() {
    let expected = expected_state();
    let json = JsonFormat.encode(&expected).unwrap();
    let from_json = JsonFormat.decode(&json).unwrap();
    let from_legacy = JsonFormat.decode(LEGACY_STATE).unwrap();
    assert_eq!(from_legacy, expected);
    assert_eq!(from_legacy.timeline, from_json.timeline);
}

/// Verifies the packed codec reads legacy blobs as well.
#[test]
fn packed_codec_reads_legacy_state() {
    let decoded = PackedFormat::new().decode(LEGACY_STATE).unwrap();
    assert_eq!(decoded, expected_state());
}

/// Verifies a timeline object with a private points field decodes.
#[test]
fn legacy_timeline_object_decodes() {
    let decoded = JsonFormat.decode(LEGACY_TIMELINE_OBJECT).unwrap();
    assert_eq!(decoded, TimerState::with_timeline(item_range()));
}

/// Verifies a serialized timeline embedded in a JSON envelope decodes.
#[test]
fn envelope_with_serialized_timeline_decodes() {
    let decoded = JsonFormat.decode(ENVELOPE_WITH_SERIALIZED_TIMELINE).unwrap();
    assert_eq!(decoded.timeline, item_range());
    assert!((decoded.extra_time - 300.0).abs() < f64::EPSILON);
    assert!(decoded.adjustment_map.is_empty());
}

/// Verifies a legacy null decodes to a fresh state.
#[test]
fn legacy_null_is_fresh_state() {
    assert_eq!(JsonFormat.decode("N;").unwrap(), TimerState::new());
}

/// Verifies malformed legacy blobs fail closed.
#[test]
fn malformed_legacy_blob_is_invalid_data() {
    for input in ["a:1:{s:8:\"timeLine\";i:3;}", "a:1:{i:0;a:1:{s:4:\"tags\";N;}}", "garbage"] {
        let err = JsonFormat.decode(input).unwrap_err();
        assert!(matches!(err, TimerError::InvalidData(_)), "{input}: {err}");
    }
}

/// Verifies serialized strings nested up to the depth limit still decode.
#[test]
fn nested_serialized_strings_within_limit_decode() {
    let decoded = JsonFormat.decode(&nested_serialized(MAX_DEPTH)).unwrap();
    assert!(decoded.timeline.is_empty());
}

/// Verifies serialized strings count against the nesting limit.
#[test]
fn nested_serialized_strings_beyond_limit_are_invalid() {
    for levels in [MAX_DEPTH + 1, 40, 6_000] {
        let input = nested_serialized(levels);
        let err = JsonFormat.decode(&input).unwrap_err();
        assert!(matches!(err, TimerError::InvalidData(_)), "{levels} levels: {err}");
        let err = PackedFormat::new().decode(&input).unwrap_err();
        assert!(matches!(err, TimerError::InvalidData(_)), "{levels} levels: {err}");
    }
}

/// Verifies an envelope whose serialized timeline nests too deeply fails closed.
#[test]
fn envelope_with_deeply_nested_timeline_is_invalid() {
    let envelope = serde_json::json!({ "timeLine": nested_serialized(MAX_DEPTH + 2) }).to_string();
    let err = JsonFormat.decode(&envelope).unwrap_err();
    assert!(matches!(err, TimerError::InvalidData(_)), "{err}");
}
