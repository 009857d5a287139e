// crates/assessment-timer-core/tests/storage_format.rs
// ============================================================================
// Module: Storage Format Tests
// Description: Json and Packed codecs, cross-decoding, and persistence.
// Purpose: Validate round-trip equivalence across every encoding.
// ============================================================================

//! Storage codec and persistence round-trip tests.

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

use std::sync::Arc;

use assessment_timer_core::InMemoryTimerStorage;
use assessment_timer_core::JsonFormat;
use assessment_timer_core::PackedFormat;
use assessment_timer_core::StorageFormat;
use assessment_timer_core::StoreError;
use assessment_timer_core::TargetCriteria;
use assessment_timer_core::Timer;
use assessment_timer_core::TimerError;
use assessment_timer_core::TimerFormat;
use assessment_timer_core::TimerState;
use assessment_timer_core::TimerStorage;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const EPOCH: f64 = 1_459_296_000.0;

/// Timer with two items, client adjustments, extra time, and an adjustment.
fn populated_timer() -> Timer {
    let item_1 = ["test-1", "part-1", "section-1", "item-1", "item-1#0"];
    let item_2 = ["test-1", "part-1", "section-1", "item-2", "item-2#0"];
    let mut timer = Timer::new();
    timer.start(&item_1, 1_459_335_000.123_456).unwrap();
    timer.end(&item_1, 1_459_335_020.5).unwrap();
    timer.adjust(&item_1, Some(10.0)).unwrap();
    timer.start(&item_2, 1_459_335_021.0).unwrap();
    timer.start(&item_2, 1_459_335_031.0).unwrap();
    timer.end(&item_2, 1_459_335_040.75).unwrap();
    timer.set_extra_time(600.0).unwrap();
    timer.set_extended_time(120.0).unwrap();
    timer.set_consumed_extra_time(12.5).unwrap();
    timer.adjustment_map_mut().increase("section-1", 60.0).unwrap();
    timer.adjustment_map_mut().decrease("item-2", 15.0).unwrap();
    timer
}

/// Storage failing every call.
struct BrokenStorage;

impl TimerStorage for BrokenStorage {
    fn get(&self, _owner_id: &str, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Io("disk unavailable".to_string()))
    }

    fn set(&self, _owner_id: &str, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Io("disk unavailable".to_string()))
    }
}

// ============================================================================
// SECTION: Round Trips
// ============================================================================

/// Verifies the Json codec round trips the full state.
#[test]
fn json_round_trip() {
    let state = populated_timer().into_state();
    let encoded = JsonFormat.encode(&state).unwrap();
    assert_eq!(JsonFormat.decode(&encoded).unwrap(), state);
}

/// Verifies the Packed codec round trips the full state.
#[test]
fn packed_round_trip() {
    let state = populated_timer().into_state();
    let encoded = PackedFormat::with_epoch(EPOCH).encode(&state).unwrap();
    assert_eq!(PackedFormat::new().decode(&encoded).unwrap(), state);
}

/// Verifies the default epoch still round trips.
#[test]
fn packed_round_trip_with_current_day_epoch() {
    let state = populated_timer().into_state();
    let encoded = PackedFormat::new().encode(&state).unwrap();
    assert_eq!(PackedFormat::new().decode(&encoded).unwrap(), state);
}

/// Verifies each codec decodes what the other encoded.
#[test]
fn cross_decoding_yields_equal_state() {
    let state = populated_timer().into_state();
    let json = JsonFormat.encode(&state).unwrap();
    let packed = PackedFormat::with_epoch(EPOCH).encode(&state).unwrap();
    let packed_from_json = PackedFormat::new().decode(&json).unwrap();
    let json_from_packed = JsonFormat.decode(&packed).unwrap();
    assert_eq!(packed_from_json, state);
    assert_eq!(json_from_packed, state);
    assert_eq!(packed_from_json.timeline, json_from_packed.timeline);
}

/// Verifies empty input and empty state decode to a fresh state.
#[test]
fn empty_inputs_decode_to_fresh_state() {
    for format in [TimerFormat::json(), TimerFormat::Packed(PackedFormat::with_epoch(EPOCH))] {
        assert_eq!(format.decode("").unwrap(), TimerState::new());
        assert_eq!(format.decode("  \n").unwrap(), TimerState::new());
        let encoded = format.encode(&TimerState::new()).unwrap();
        assert_eq!(format.decode(&encoded).unwrap(), TimerState::new());
    }
}

// ============================================================================
// SECTION: Wire Shapes
// ============================================================================

/// Verifies the packed document layout.
#[test]
fn packed_document_shape() {
    let state = populated_timer().into_state();
    let encoded = PackedFormat::with_epoch(EPOCH).encode(&state).unwrap();
    let document: Value = serde_json::from_str(&encoded).unwrap();
    assert_eq!(document["format"], json!("pack"));
    assert_eq!(document["version"], json!(1));
    assert_eq!(document["extraTimeLine"], json!([]));
    assert_eq!(document["timeLine"]["tags"], json!(["test-1", "part-1", "section-1"]));
    assert_eq!(document["timeLine"]["epoch"], json!(EPOCH));
    assert_eq!(document["timeLine"]["index"]["item-1"], json!([0, 1, 2, 3]));
    assert_eq!(document["timeLine"]["index"]["item-1#0"], json!([0, 1, 2, 3]));
    assert_eq!(document["timeLine"]["index"]["item-2"], json!([4, 5, 6, 7]));
    assert_eq!(document["timeLine"]["points"][0], json!([2, 1, 39_000.123_456]));
    assert_eq!(document["timeLine"]["points"][2], json!([1, 1, 39_005.311_728]));
    assert_eq!(document["timerAdjustmentMap"]["section-1"]["increase"], json!(60.0));
}

/// Verifies the index keeps tag order in the raw document.
#[test]
fn packed_index_preserves_tag_order() {
    let mut timer = Timer::new();
    timer.start(&["test", "zeta", "zeta#0"], 10.0).unwrap();
    timer.start(&["test", "alpha", "alpha#0"], 10.0).unwrap();
    let encoded = PackedFormat::with_epoch(0.0).encode(timer.state()).unwrap();
    let zeta = encoded.find("\"zeta\"").unwrap();
    let zeta_occurrence = encoded.find("\"zeta#0\"").unwrap();
    let alpha = encoded.find("\"alpha\"").unwrap();
    assert!(zeta < zeta_occurrence);
    assert!(zeta_occurrence < alpha);
    assert_eq!(PackedFormat::new().decode(&encoded).unwrap(), *timer.state());
}

/// Verifies a packed document from a newer version is rejected.
#[test]
fn packed_newer_version_is_rejected() {
    let input = r#"{"format":"pack","version":2,"timeLine":{"index":[],"tags":[],"points":[],"epoch":0}}"#;
    assert!(matches!(JsonFormat.decode(input), Err(TimerError::InvalidData(_))));
}

/// Verifies a packed document with an empty index list decodes.
#[test]
fn packed_empty_index_list_decodes() {
    let input = r#"{"format":"pack","version":1,"timeLine":{"index":[],"tags":["test"],"points":[[2,1,5.5],[2,2,9.5]],"epoch":100},"extraTime":0,"extendedTime":0,"extraTimeLine":[],"consumedExtraTime":0}"#;
    let timer = Timer::from_state(JsonFormat.decode(input).unwrap());
    assert_eq!(timer.timeline().len(), 2);
    assert!((timer.compute(&["test"], TargetCriteria::Server).unwrap() - 4.0).abs() < 1e-9);
    assert!((timer.first_timestamp(&["test"]).unwrap() - 105.5).abs() < 1e-9);
}

/// Verifies unknown codes and non-object JSON fail closed.
#[test]
fn malformed_documents_are_invalid_data() {
    let inputs = [
        r#"{"timeLine":[{"ts":1.0,"type":3,"target":2,"tags":["t"]}]}"#,
        r#"{"timeLine":[{"ts":1.0,"type":1,"target":2,"tags":[]}]}"#,
        r#"{"timeLine":42}"#,
        r#"{"format":"pack","timeLine":{"tags":[],"points":[[2,1,0]],"epoch":0}}"#,
        r#"{"timeLine":"#,
        "[1, 2, 3]",
    ];
    for input in inputs {
        let err = JsonFormat.decode(input).unwrap_err();
        assert!(matches!(err, TimerError::InvalidData(_)), "{input}: {err}");
    }
}

// ============================================================================
// SECTION: Persistence
// ============================================================================

/// Verifies save then load reproduces the state for both formats.
#[test]
fn save_load_is_idempotent() {
    for format in [TimerFormat::json(), TimerFormat::packed()] {
        let storage = Arc::new(InMemoryTimerStorage::new());
        let timer = populated_timer().with_storage(storage.clone(), "taker-1", "session-1");
        let timer = timer.with_format(format);
        timer.save().unwrap();

        let mut restored = Timer::new().with_storage(storage, "taker-1", "session-1");
        restored.load().unwrap();
        assert_eq!(restored.state(), timer.state());
        assert!((restored.extra_time() - 600.0).abs() < f64::EPSILON);
        assert!((restored.extended_time() - 120.0).abs() < f64::EPSILON);
        assert!((restored.recorded_consumed_extra_time() - 12.5).abs() < f64::EPSILON);
    }
}

/// Verifies keys are scoped per owner.
#[test]
fn storage_is_scoped_by_owner() {
    let storage = Arc::new(InMemoryTimerStorage::new());
    populated_timer().with_storage(storage.clone(), "taker-1", "session-1").save().unwrap();
    let mut other = Timer::new().with_storage(storage.clone(), "taker-2", "session-1");
    other.start(&["test-1"], 5.0).unwrap();
    other.load().unwrap();
    assert!(other.state().is_empty());
    assert_eq!(storage.keys("taker-1").unwrap(), vec!["session-1".to_string()]);
}

/// Verifies save and load require a storage collaborator.
#[test]
fn persistence_requires_storage() {
    let mut timer = populated_timer();
    assert!(matches!(timer.save(), Err(TimerError::InvalidStorage(_))));
    assert!(matches!(timer.load(), Err(TimerError::InvalidStorage(_))));
}

/// Verifies storage failures propagate.
#[test]
fn storage_failures_propagate() {
    let mut timer = populated_timer().with_storage(Arc::new(BrokenStorage), "taker", "key");
    assert!(matches!(timer.save(), Err(TimerError::Store(StoreError::Io(_)))));
    assert!(matches!(timer.load(), Err(TimerError::Store(StoreError::Io(_)))));
}

/// Verifies corrupted stored values surface as invalid data.
#[test]
fn corrupted_stored_value_is_invalid_data() {
    let storage = Arc::new(InMemoryTimerStorage::new());
    storage.set("taker", "key", "{\"timeLine\": true}").unwrap();
    let mut timer = Timer::new().with_storage(storage, "taker", "key");
    assert!(matches!(timer.load(), Err(TimerError::InvalidData(_))));
}

/// Verifies negative adjustments are rejected in every wire form.
#[test]
fn negative_adjustments_are_invalid_data() {
    let documents = [
        json!({"timerAdjustmentMap": {"section-1": {"increase": -30, "decrease": 0}}}),
        json!({"timerAdjustmentMap": {"section-1": {"increase": 0, "decrease": -5}}}),
        json!({"timerAdjustmentMap": [{"source": "section-1", "increase": -30, "decrease": 0}]}),
        json!({"timerAdjustmentMap": [{"source": "section-1", "increase": 10, "decrease": -1}]}),
        json!({"format": "pack", "version": 1, "timerAdjustmentMap": {"section-1": {"increase": -30}}}),
    ];
    for document in documents {
        let input = document.to_string();
        let err = JsonFormat.decode(&input).unwrap_err();
        assert!(matches!(err, TimerError::InvalidData(_)), "{input}: {err}");
        let err = PackedFormat::new().decode(&input).unwrap_err();
        assert!(matches!(err, TimerError::InvalidData(_)), "{input}: {err}");
    }

    let legacy = "a:2:{s:8:\"timeLine\";N;s:18:\"timerAdjustmentMap\";a:1:{s:9:\"section-1\";a:2:{s:8:\"increase\";i:-30;s:8:\"decrease\";i:0;}}}";
    assert!(matches!(JsonFormat.decode(legacy), Err(TimerError::InvalidData(_))));
}

/// Verifies both adjustment wire forms agree on valid entries.
#[test]
fn adjustment_wire_forms_agree() {
    let object = json!({"timerAdjustmentMap": {"section-1": {"increase": 45, "decrease": 15}}});
    let list = json!({"timerAdjustmentMap": [
        {"source": "section-1", "increase": 30, "decrease": 15},
        {"source": "section-1", "increase": 15}
    ]});
    let from_object = JsonFormat.decode(&object.to_string()).unwrap();
    let from_list = JsonFormat.decode(&list.to_string()).unwrap();
    assert_eq!(from_object.adjustment_map, from_list.adjustment_map);
    assert!((from_list.adjustment_map.get("section-1") - 30.0).abs() < 1e-9);
}
