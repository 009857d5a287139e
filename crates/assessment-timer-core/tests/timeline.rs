// crates/assessment-timer-core/tests/timeline.rs
// ============================================================================
// Module: Timeline Tests
// Description: Query and duration behavior of time lines.
// Purpose: Validate filters, ordering, and range pairing.
// ============================================================================

//! Timeline query and duration tests.

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

use assessment_timer_core::PointType;
use assessment_timer_core::TagFilter;
use assessment_timer_core::TagPath;
use assessment_timer_core::TargetCriteria;
use assessment_timer_core::TimeLine;
use assessment_timer_core::TimePoint;
use assessment_timer_core::TimeTarget;
use assessment_timer_core::TimerError;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn point(tags: &[&str], timestamp: f64, point_type: PointType, target: TimeTarget) -> TimePoint {
    TimePoint::new(TagPath::new(tags).unwrap(), timestamp, point_type, target).unwrap()
}

fn sample() -> TimeLine {
    let item_1 = ["test", "part", "section", "item-1"];
    let item_2 = ["test", "part", "section", "item-2"];
    TimeLine::from_points(vec![
        point(&item_1, 100.0, PointType::Start, TimeTarget::Server),
        point(&item_1, 130.0, PointType::End, TimeTarget::Server),
        point(&item_1, 105.0, PointType::Start, TimeTarget::Client),
        point(&item_1, 125.0, PointType::End, TimeTarget::Client),
        point(&item_2, 130.0, PointType::Start, TimeTarget::Server),
        point(&item_2, 145.5, PointType::End, TimeTarget::Server),
    ])
}

fn approx(left: f64, right: f64) -> bool {
    (left - right).abs() < 1e-9
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Verifies find keeps original order and honors both filters.
#[test]
fn find_filters_by_tag_and_target() {
    let timeline = sample();
    let server = timeline.find(&TagFilter::tag("item-1"), TargetCriteria::Server);
    assert_eq!(server.len(), 2);
    assert!(server[0].is_start());
    assert!(server[1].is_end());

    let everything = timeline.find(&TagFilter::Any, TargetCriteria::All);
    assert_eq!(everything.len(), timeline.len());
    assert!(approx(everything[4].timestamp(), 130.0));

    let client = timeline.find(&TagFilter::containing(&["section"]), TargetCriteria::Client);
    assert_eq!(client.len(), 2);
}

/// Verifies exact filters do not match longer or shorter paths.
#[test]
fn exact_filter_matches_whole_path_only() {
    let timeline = sample();
    let exact = TagFilter::Exact(TagPath::new(["test", "part", "section"]).unwrap());
    assert!(timeline.find(&exact, TargetCriteria::All).is_empty());
    let exact = TagFilter::Exact(TagPath::new(["test", "part", "section", "item-2"]).unwrap());
    assert_eq!(timeline.find(&exact, TargetCriteria::All).len(), 2);
}

/// Verifies filter returns an independent timeline.
#[test]
fn filter_returns_independent_copy() {
    let mut timeline = sample();
    let copy = timeline.filter(&TagFilter::tag("item-2"), TargetCriteria::All);
    timeline.clear();
    assert!(timeline.is_empty());
    assert_eq!(copy.len(), 2);
}

/// Verifies remove reports how many points it dropped.
#[test]
fn remove_drops_matching_points() {
    let mut timeline = sample();
    assert_eq!(timeline.remove(&TagFilter::tag("item-1"), TargetCriteria::Client), 2);
    assert_eq!(timeline.len(), 4);
    assert!(timeline.find(&TagFilter::Any, TargetCriteria::Client).is_empty());
}

/// Verifies durations sum per target and per tag containment.
#[test]
fn compute_sums_ranges_per_target() {
    let timeline = sample();
    let server = timeline.compute(&TagFilter::Any, TargetCriteria::Server, None).unwrap();
    assert!(approx(server, 45.5));
    let client = timeline.compute(&TagFilter::Any, TargetCriteria::Client, None).unwrap();
    assert!(approx(client, 20.0));
    let item_2 = timeline.compute(&TagFilter::tag("item-2"), TargetCriteria::Server, None).unwrap();
    assert!(approx(item_2, 15.5));
}

/// Verifies both clocks cannot be summed.
#[test]
fn compute_rejects_all_targets() {
    let err = sample().compute(&TagFilter::Any, TargetCriteria::All, None).unwrap_err();
    assert!(matches!(err, TimerError::InconsistentCriteria(_)));
}

/// Verifies pairing tolerates recording order differing from time order.
#[test]
fn compute_sorts_points_by_timestamp() {
    let tags = ["test", "item"];
    let timeline = TimeLine::from_points(vec![
        point(&tags, 50.0, PointType::End, TimeTarget::Server),
        point(&tags, 10.0, PointType::Start, TimeTarget::Server),
    ]);
    let total = timeline.compute(&TagFilter::Any, TargetCriteria::Server, None).unwrap();
    assert!(approx(total, 40.0));
}

/// Verifies orphan ends are ignored and open ranges need a cut-off.
#[test]
fn compute_handles_orphans_and_open_ranges() {
    let tags = ["test", "item"];
    let timeline = TimeLine::from_points(vec![
        point(&tags, 5.0, PointType::End, TimeTarget::Server),
        point(&tags, 10.0, PointType::Start, TimeTarget::Server),
        point(&tags, 20.0, PointType::End, TimeTarget::Server),
        point(&tags, 30.0, PointType::Start, TimeTarget::Server),
    ]);
    let closed = timeline.compute(&TagFilter::Any, TargetCriteria::Server, None).unwrap();
    assert!(approx(closed, 10.0));
    let live = timeline.compute(&TagFilter::Any, TargetCriteria::Server, Some(42.0)).unwrap();
    assert!(approx(live, 22.0));
    let stale = timeline.compute(&TagFilter::Any, TargetCriteria::Server, Some(25.0)).unwrap();
    assert!(approx(stale, 10.0));
}

/// Verifies a start inside an open range closes it.
#[test]
fn compute_closes_range_on_repeated_start() {
    let tags = ["test", "item"];
    let timeline = TimeLine::from_points(vec![
        point(&tags, 10.0, PointType::Start, TimeTarget::Server),
        point(&tags, 15.0, PointType::Start, TimeTarget::Server),
        point(&tags, 18.0, PointType::End, TimeTarget::Server),
    ]);
    let total = timeline.compute(&TagFilter::Any, TargetCriteria::Server, None).unwrap();
    assert!(approx(total, 8.0));
}

/// Verifies tag paths reject empty input.
#[test]
fn tag_path_rejects_empty_tags() {
    assert!(matches!(TagPath::new(Vec::<String>::new()), Err(TimerError::InvalidData(_))));
    assert!(matches!(TagPath::new(["test", ""]), Err(TimerError::InvalidData(_))));
}

/// Verifies points reject non-finite timestamps and round to microseconds.
#[test]
fn time_point_normalizes_timestamps() {
    let tags = TagPath::new(["test"]).unwrap();
    let err = TimePoint::new(tags.clone(), f64::NAN, PointType::Start, TimeTarget::Server)
        .unwrap_err();
    assert!(matches!(err, TimerError::InvalidData(_)));
    let point = TimePoint::new(tags, 1.000_000_4, PointType::Start, TimeTarget::Server).unwrap();
    assert!(approx(point.timestamp(), 1.0));
}

/// Verifies tag path accessors on a built path.
#[test]
fn tag_path_accessors() {
    let path = TagPath::new(["test-1", "part-1", "item-1"]).unwrap();
    assert!(!path.is_empty());
    assert_eq!(path.len(), 3);
    assert_eq!(path.leaf(), "item-1");
    assert!(path.contains("part-1"));
    assert!(path.contains_all(["test-1", "item-1"].as_slice()));
    assert!(!path.contains_all(["test-1", "item-2"].as_slice()));
}
