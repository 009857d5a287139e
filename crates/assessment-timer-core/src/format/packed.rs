// crates/assessment-timer-core/src/format/packed.rs
// ============================================================================
// Module: Packed Storage Format
// Description: Size-optimized JSON document for timer state.
// Purpose: Store shared tag prefixes once and timestamps relative to an epoch.
// Dependencies: crate::{core, format, interfaces}, serde, serde_json
// ============================================================================

//! ## Overview
//! A packed document looks like:
//!
//! ```json
//! {"format":"pack","version":1,
//!  "timeLine":{"index":{"item-1":[0,1]},"tags":["test","part"],
//!              "points":[[2,1,120.5],[2,2,140.5]],"epoch":1459296000},
//!  "extraTime":0,"extendedTime":0,"extraTimeLine":[],"consumedExtraTime":0,
//!  "timerAdjustmentMap":{}}
//! ```
//!
//! `tags` is the leading tag prefix common to every point. Each `index` entry
//! lists the positions of the points whose path contains that tag after the
//! prefix. Entries are ordered so that, for every point, its tags appear in
//! the same relative order as in its original path; decoding appends them in
//! document order to rebuild each path. Points are `[target, type, ts]`
//! triples with `ts` relative to `epoch`, rounded to microseconds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de::IgnoredAny;
use serde::de::MapAccess;
use serde::de::SeqAccess;
use serde::de::Visitor;
use serde::ser::SerializeMap;

use crate::core::adjustment::AdjustmentMap;
use crate::core::error::TimerError;
use crate::core::point::PointType;
use crate::core::point::TimePoint;
use crate::core::point::TimeTarget;
use crate::core::point::round_micros;
use crate::core::state::TimerState;
use crate::core::tags::TagPath;
use crate::core::timeline::TimeLine;
use crate::format::decode_state;
use crate::format::json::non_negative;
use crate::interfaces::StorageFormat;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Value of the `format` marker of packed documents.
pub const PACKED_FORMAT_NAME: &str = "pack";
/// Highest packed document version understood by the decoder.
pub const PACKED_FORMAT_VERSION: u32 = 1;
/// Seconds in one UTC day.
const SECONDS_PER_DAY: u64 = 86_400;

// ============================================================================
// SECTION: Packed Format
// ============================================================================

/// Packed JSON codec.
///
/// The epoch defaults to the start of the current UTC day at encode time.
/// A fixed epoch makes the output reproducible.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PackedFormat {
    /// Fixed epoch in seconds, when set.
    epoch: Option<f64>,
}

impl PackedFormat {
    /// Creates a codec using the current UTC day as epoch.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            epoch: None,
        }
    }

    /// Creates a codec using a fixed epoch.
    #[must_use]
    pub const fn with_epoch(epoch: f64) -> Self {
        Self {
            epoch: Some(epoch),
        }
    }

    /// Returns the fixed epoch, if any.
    #[must_use]
    pub const fn epoch(&self) -> Option<f64> {
        self.epoch
    }

    /// Returns the epoch used for the next encode.
    fn resolve_epoch(&self) -> f64 {
        self.epoch.unwrap_or_else(current_day_epoch)
    }
}

impl StorageFormat for PackedFormat {
    fn encode(&self, state: &TimerState) -> Result<String, TimerError> {
        let epoch = self.resolve_epoch();
        if !epoch.is_finite() {
            return Err(TimerError::invalid(format!("packed epoch must be finite, got {epoch}")));
        }
        let document = DocumentOut {
            format: PACKED_FORMAT_NAME,
            version: PACKED_FORMAT_VERSION,
            time_line: pack_timeline(&state.timeline, epoch)?,
            extra_time: state.extra_time,
            extended_time: state.extended_time,
            extra_time_line: [],
            consumed_extra_time: state.consumed_extra_time,
            timer_adjustment_map: &state.adjustment_map,
        };
        serde_json::to_string(&document)
            .map_err(|err| TimerError::invalid(format!("timer state encoding failed: {err}")))
    }

    fn decode(&self, input: &str) -> Result<TimerState, TimerError> {
        decode_state(input)
    }
}

/// Returns the start of the current UTC day in seconds.
#[allow(clippy::cast_precision_loss, reason = "Day boundaries are far below 2^52 seconds.")]
fn current_day_epoch() -> f64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs());
    (now - now % SECONDS_PER_DAY) as f64
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Document written by the encoder.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentOut<'a> {
    /// Format marker.
    format: &'static str,
    /// Document version.
    version: u32,
    /// Packed timeline.
    time_line: PackedTimeLine,
    /// Extra time budget.
    extra_time: f64,
    /// Administrator extension.
    extended_time: f64,
    /// Always empty; kept for readers expecting the field.
    extra_time_line: [u8; 0],
    /// Extra time already used.
    consumed_extra_time: f64,
    /// Per-scope adjustments.
    timer_adjustment_map: &'a AdjustmentMap,
}

/// Document accepted by the decoder.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentIn {
    /// Packed timeline.
    #[serde(default)]
    time_line: Option<PackedTimeLine>,
    /// Extra time budget.
    #[serde(default)]
    extra_time: Option<f64>,
    /// Administrator extension.
    #[serde(default)]
    extended_time: Option<f64>,
    /// Ignored.
    #[serde(default)]
    #[allow(dead_code, reason = "Accepted for compatibility and discarded.")]
    extra_time_line: Option<IgnoredAny>,
    /// Extra time already used.
    #[serde(default)]
    consumed_extra_time: Option<f64>,
    /// Per-scope adjustments.
    #[serde(default)]
    timer_adjustment_map: Option<AdjustmentMap>,
}

/// Packed timeline body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PackedTimeLine {
    /// Tag to point positions, in path order.
    #[serde(default)]
    index: PackedIndex,
    /// Common leading tags.
    #[serde(default)]
    tags: Vec<String>,
    /// `[target, type, relative ts]` triples.
    #[serde(default)]
    points: Vec<PackedPoint>,
    /// Epoch in seconds.
    #[serde(default)]
    epoch: f64,
}

/// One packed point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct PackedPoint(u8, u8, f64);

/// Ordered tag index.
///
/// Kept as a list so that document order survives; a JSON map in
/// `serde_json` would be re-sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PackedIndex(Vec<(String, Vec<usize>)>);

impl Serialize for PackedIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (tag, positions) in &self.0 {
            map.serialize_entry(tag, positions)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PackedIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PackedIndexVisitor)
    }
}

/// Reads an index object in document order.
///
/// A JSON list is accepted too: an empty index is written as `[]` by older
/// encoders, and purely numeric tags end up as list positions.
struct PackedIndexVisitor;

impl<'de> Visitor<'de> for PackedIndexVisitor {
    type Value = PackedIndex;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a packed tag index")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::new();
        while let Some(entry) = access.next_entry::<String, Vec<usize>>()? {
            entries.push(entry);
        }
        Ok(PackedIndex(entries))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::new();
        while let Some(positions) = access.next_element::<Vec<usize>>()? {
            entries.push((entries.len().to_string(), positions));
        }
        Ok(PackedIndex(entries))
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(PackedIndex::default())
    }
}

// ============================================================================
// SECTION: Encoding
// ============================================================================

/// Packs a timeline relative to `epoch`.
fn pack_timeline(timeline: &TimeLine, epoch: f64) -> Result<PackedTimeLine, TimerError> {
    let points = timeline.points();
    let prefix = common_prefix(points);
    let remainders: Vec<&[String]> =
        points.iter().map(|point| &point.tags().as_slice()[prefix.len()..]).collect();
    let order = index_order(&remainders)?;
    let index = order
        .into_iter()
        .map(|tag| {
            let positions = remainders
                .iter()
                .enumerate()
                .filter(|(_, rest)| rest.iter().any(|candidate| *candidate == tag))
                .map(|(position, _)| position)
                .collect();
            (tag.to_string(), positions)
        })
        .collect();
    let packed_points = points
        .iter()
        .map(|point| {
            PackedPoint(
                point.target().code(),
                point.point_type().code(),
                round_micros(point.timestamp() - epoch),
            )
        })
        .collect();
    Ok(PackedTimeLine {
        index: PackedIndex(index),
        tags: prefix.to_vec(),
        points: packed_points,
        epoch,
    })
}

/// Returns the longest leading tag prefix shared by every point.
fn common_prefix(points: &[TimePoint]) -> &[String] {
    let Some(first) = points.first() else {
        return &[];
    };
    let mut prefix = first.tags().as_slice();
    for point in &points[1..] {
        let shared = prefix
            .iter()
            .zip(point.tags().as_slice())
            .take_while(|(left, right)| left == right)
            .count();
        prefix = &prefix[..shared];
    }
    prefix
}

/// Orders distinct tags so every path keeps its relative order.
///
/// Kahn's algorithm over "appears before" edges; among ready tags the one
/// seen first wins, which keeps the output stable.
fn index_order<'a>(remainders: &[&'a [String]]) -> Result<Vec<&'a str>, TimerError> {
    let mut tags: Vec<&'a str> = Vec::new();
    let mut ids: HashMap<&'a str, usize> = HashMap::new();
    let mut successors: Vec<BTreeSet<usize>> = Vec::new();
    let mut in_degree: Vec<usize> = Vec::new();

    for rest in remainders {
        let mut previous: Option<usize> = None;
        let mut seen = BTreeSet::new();
        for tag in *rest {
            let id = *ids.entry(tag.as_str()).or_insert_with(|| {
                tags.push(tag.as_str());
                successors.push(BTreeSet::new());
                in_degree.push(0);
                tags.len() - 1
            });
            if !seen.insert(id) {
                return Err(TimerError::invalid(format!(
                    "tag {tag} appears twice in one path and cannot be packed"
                )));
            }
            if let Some(previous) = previous
                && successors[previous].insert(id)
            {
                in_degree[id] += 1;
            }
            previous = Some(id);
        }
    }

    let mut ready: BTreeSet<usize> =
        (0..tags.len()).filter(|id| in_degree[*id] == 0).collect();
    let mut order = Vec::with_capacity(tags.len());
    while let Some(id) = ready.pop_first() {
        order.push(tags[id]);
        for next in &successors[id] {
            in_degree[*next] -= 1;
            if in_degree[*next] == 0 {
                ready.insert(*next);
            }
        }
    }
    if order.len() != tags.len() {
        return Err(TimerError::invalid("tag paths order shared tags inconsistently"));
    }
    Ok(order)
}

// ============================================================================
// SECTION: Decoding
// ============================================================================

/// Decodes a packed document.
pub(crate) fn decode_document(input: &str, version: Option<u32>) -> Result<TimerState, TimerError> {
    if let Some(version) = version
        && version > PACKED_FORMAT_VERSION
    {
        return Err(TimerError::invalid(format!("unsupported packed format version {version}")));
    }
    let document: DocumentIn = serde_json::from_str(input)
        .map_err(|err| TimerError::invalid(format!("malformed packed document: {err}")))?;
    let timeline = match document.time_line {
        Some(packed) => unpack_timeline(packed)?,
        None => TimeLine::new(),
    };
    Ok(TimerState {
        timeline,
        extra_time: non_negative("extraTime", document.extra_time)?,
        extended_time: non_negative("extendedTime", document.extended_time)?,
        consumed_extra_time: non_negative("consumedExtraTime", document.consumed_extra_time)?,
        adjustment_map: document.timer_adjustment_map.unwrap_or_default(),
    })
}

/// Rebuilds full points from a packed timeline.
fn unpack_timeline(packed: PackedTimeLine) -> Result<TimeLine, TimerError> {
    if !packed.epoch.is_finite() {
        return Err(TimerError::invalid("packed epoch must be finite"));
    }
    let mut paths: Vec<Vec<String>> = vec![packed.tags.clone(); packed.points.len()];
    for (tag, positions) in packed.index.0 {
        for position in positions {
            let Some(path) = paths.get_mut(position) else {
                return Err(TimerError::invalid(format!(
                    "index entry {tag} points at missing position {position}"
                )));
            };
            path.push(tag.clone());
        }
    }
    packed
        .points
        .into_iter()
        .zip(paths)
        .map(|(PackedPoint(target, point_type, relative), path)| {
            TimePoint::new(
                TagPath::try_from(path)?,
                packed.epoch + relative,
                PointType::from_code(point_type)?,
                TimeTarget::from_code(target)?,
            )
        })
        .collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
