// crates/assessment-timer-core/src/core/timeline.rs
// ============================================================================
// Module: Time Line
// Description: Ordered, queryable collection of time points.
// Purpose: Answer filter and duration queries over recorded points.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! A [`TimeLine`] keeps points in recording order. Queries never hand out a
//! live cursor: every lookup returns a fresh list in original order, and
//! durations are computed by pairing starts and ends per exact tag path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::core::error::TimerError;
use crate::core::point::PointType;
use crate::core::point::TargetCriteria;
use crate::core::point::TimePoint;
use crate::core::point::round_micros;
use crate::core::tags::TagFilter;
use crate::core::tags::TagPath;

// ============================================================================
// SECTION: Time Line
// ============================================================================

/// Ordered sequence of time points, in recording order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeLine {
    /// Points in insertion order.
    points: Vec<TimePoint>,
}

impl TimeLine {
    /// Creates an empty timeline.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            points: Vec::new(),
        }
    }

    /// Creates a timeline from already ordered points.
    #[must_use]
    pub const fn from_points(points: Vec<TimePoint>) -> Self {
        Self {
            points,
        }
    }

    /// Appends a point.
    pub fn add(&mut self, point: TimePoint) {
        self.points.push(point);
    }

    /// Returns every point in original order.
    #[must_use]
    pub fn points(&self) -> &[TimePoint] {
        &self.points
    }

    /// Returns the number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true when no point was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Removes every point.
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Returns the points matching both filters, in original order.
    #[must_use]
    pub fn find(&self, filter: &TagFilter, target: TargetCriteria) -> Vec<&TimePoint> {
        self.points.iter().filter(|point| point.matches(filter, target)).collect()
    }

    /// Returns a new timeline holding copies of the matching points.
    #[must_use]
    pub fn filter(&self, filter: &TagFilter, target: TargetCriteria) -> Self {
        Self::from_points(self.find(filter, target).into_iter().cloned().collect())
    }

    /// Removes the matching points and returns how many were removed.
    pub fn remove(&mut self, filter: &TagFilter, target: TargetCriteria) -> usize {
        let before = self.points.len();
        self.points.retain(|point| !point.matches(filter, target));
        before - self.points.len()
    }

    /// Sums the durations of the ranges matching both filters.
    ///
    /// Points are paired per exact tag path in timestamp order. An end with no
    /// open range is ignored, and a start arriving while a range is open
    /// closes that range at its own timestamp. A range left open is counted up
    /// to `last_timestamp` when one is given and it is later than the start.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InconsistentCriteria`] when `target` is
    /// [`TargetCriteria::All`].
    pub fn compute(
        &self,
        filter: &TagFilter,
        target: TargetCriteria,
        last_timestamp: Option<f64>,
    ) -> Result<f64, TimerError> {
        if target == TargetCriteria::All {
            return Err(TimerError::InconsistentCriteria(
                "cannot compute a duration across both server and client clocks".to_string(),
            ));
        }
        let mut total = 0.0;
        for ranges in self.group_by_path(filter, target).values_mut() {
            ranges.sort_by_key(|point| point.micros());
            total += sum_ranges(ranges, last_timestamp);
        }
        Ok(round_micros(total))
    }

    /// Groups the matching points by exact tag path.
    fn group_by_path(
        &self,
        filter: &TagFilter,
        target: TargetCriteria,
    ) -> BTreeMap<&TagPath, Vec<&TimePoint>> {
        let mut groups: BTreeMap<&TagPath, Vec<&TimePoint>> = BTreeMap::new();
        for point in self.find(filter, target) {
            groups.entry(point.tags()).or_default().push(point);
        }
        groups
    }
}

impl FromIterator<TimePoint> for TimeLine {
    fn from_iter<I: IntoIterator<Item = TimePoint>>(iter: I) -> Self {
        Self::from_points(iter.into_iter().collect())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Sums the ranges described by points already sorted by timestamp.
fn sum_ranges(points: &[&TimePoint], last_timestamp: Option<f64>) -> f64 {
    let mut total = 0.0;
    let mut open: Option<f64> = None;
    for point in points {
        match point.point_type() {
            PointType::Start => {
                if let Some(start) = open {
                    total += point.timestamp() - start;
                }
                open = Some(point.timestamp());
            }
            PointType::End => {
                if let Some(start) = open.take() {
                    total += point.timestamp() - start;
                }
            }
        }
    }
    if let (Some(start), Some(last)) = (open, last_timestamp)
        && last > start
    {
        total += last - start;
    }
    total
}
