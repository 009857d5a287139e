// crates/assessment-timer-core/src/format/legacy.rs
// ============================================================================
// Module: Legacy Serialized Format
// Description: Decoder for timer state written by older deployments.
// Purpose: Keep previously persisted sessions readable without migration.
// Dependencies: crate::{core, format}
// ============================================================================

//! ## Overview
//! Older deployments persisted timer state with a length-prefixed text
//! serialization. Only decoding is supported. The grammar:
//!
//! | Form | Meaning |
//! |---|---|
//! | `N;` | null |
//! | `b:0;` / `b:1;` | boolean |
//! | `i:<int>;` | integer |
//! | `d:<float>;` | float |
//! | `s:<bytes>:"<text>";` | string, length in bytes |
//! | `a:<n>:{<key><value>...}` | ordered map with `i`/`s` keys |
//! | `O:<len>:"<class>":<n>:{<name><value>...}` | object with named fields |
//! | `C:<len>:"<class>":<len>:{<payload>}` | object with a serialized payload |
//!
//! Field names of objects may carry a visibility prefix (`\0*\0` or
//! `\0Class\0`), which is stripped. Values are first parsed into a generic
//! tree and then interpreted structurally: class names are ignored.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::adjustment::AdjustmentMap;
use crate::core::error::TimerError;
use crate::core::point::PointType;
use crate::core::point::TimePoint;
use crate::core::point::TimeTarget;
use crate::core::state::TimerState;
use crate::core::tags::TagPath;
use crate::core::timeline::TimeLine;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum nesting depth accepted by the decoder.
///
/// Serialized strings holding further serialized timelines count against
/// the same limit as arrays and objects.
pub const MAX_DEPTH: usize = 32;

// ============================================================================
// SECTION: Value Tree
// ============================================================================

/// Generic parsed value.
#[derive(Debug, Clone, PartialEq)]
enum LegacyValue {
    /// `N;`
    Null,
    /// `b:..;`
    Bool(bool),
    /// `i:..;`
    Int(i64),
    /// `d:..;`
    Float(f64),
    /// `s:..;`
    Str(String),
    /// `a:..`, keys rendered as strings.
    Array(Vec<(String, LegacyValue)>),
    /// `O:..`
    Object(Vec<(String, LegacyValue)>),
    /// `C:..`
    Custom(Box<LegacyValue>),
}

impl LegacyValue {
    /// Returns the named entries of a map-like value.
    fn entries(&self) -> Option<&[(String, Self)]> {
        match self {
            Self::Array(entries) | Self::Object(entries) => Some(entries),
            Self::Custom(payload) => payload.entries(),
            _ => None,
        }
    }

    /// Returns the value of a named entry.
    fn field(&self, name: &str) -> Option<&Self> {
        self.entries()?.iter().find(|(key, _)| key == name).map(|(_, value)| value)
    }

    /// Returns true when every named field is present.
    fn has_fields(&self, names: &[&str]) -> bool {
        names.iter().all(|name| self.field(name).is_some())
    }

    /// Reads a number, accepting numeric strings.
    #[allow(clippy::cast_precision_loss, reason = "Stored integers are seconds or codes.")]
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::Str(text) => text.trim().parse().ok(),
            Self::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Reads a small integer code.
    fn as_code(&self) -> Option<u8> {
        match self {
            Self::Int(value) => u8::try_from(*value).ok(),
            Self::Str(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Reads a tag identifier.
    fn as_tag(&self) -> Option<String> {
        match self {
            Self::Str(text) => Some(text.clone()),
            Self::Int(value) => Some(value.to_string()),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Byte-level recursive descent parser.
struct Parser<'a> {
    /// Raw input.
    input: &'a [u8],
    /// Current offset.
    pos: usize,
}

impl<'a> Parser<'a> {
    /// Creates a parser over `input`.
    const fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    /// Parses exactly one value and rejects trailing input.
    fn parse_document(self) -> Result<LegacyValue, TimerError> {
        self.parse_document_at(0)
    }

    /// Parses exactly one value starting at `depth`.
    fn parse_document_at(mut self, depth: usize) -> Result<LegacyValue, TimerError> {
        let value = self.parse_value(depth)?;
        if self.input[self.pos..].iter().any(|byte| !byte.is_ascii_whitespace()) {
            return Err(self.error("trailing data after serialized value"));
        }
        Ok(value)
    }

    /// Parses one value.
    fn parse_value(&mut self, depth: usize) -> Result<LegacyValue, TimerError> {
        if depth > MAX_DEPTH {
            return Err(self.error("serialized value is nested too deeply"));
        }
        let Some(kind) = self.bump() else {
            return Err(self.error("unexpected end of serialized value"));
        };
        match kind {
            b'N' => {
                self.expect(b';')?;
                Ok(LegacyValue::Null)
            }
            b'b' => {
                self.expect(b':')?;
                let flag = self.read_until(b';')?;
                match flag {
                    "0" => Ok(LegacyValue::Bool(false)),
                    "1" => Ok(LegacyValue::Bool(true)),
                    _ => Err(self.error("boolean must be 0 or 1")),
                }
            }
            b'i' => {
                self.expect(b':')?;
                let text = self.read_until(b';')?;
                text.parse().map(LegacyValue::Int).map_err(|_| self.error("malformed integer"))
            }
            b'd' => {
                self.expect(b':')?;
                let text = self.read_until(b';')?;
                text.parse().map(LegacyValue::Float).map_err(|_| self.error("malformed float"))
            }
            b's' => {
                self.expect(b':')?;
                let text = self.read_quoted()?;
                self.expect(b';')?;
                Ok(LegacyValue::Str(text))
            }
            b'a' => {
                self.expect(b':')?;
                let count = self.read_count(b':')?;
                self.expect(b'{')?;
                let entries = self.read_entries(count, depth)?;
                Ok(LegacyValue::Array(entries))
            }
            b'O' => {
                self.expect(b':')?;
                self.read_quoted()?;
                self.expect(b':')?;
                let count = self.read_count(b':')?;
                self.expect(b'{')?;
                let entries = self
                    .read_entries(count, depth)?
                    .into_iter()
                    .map(|(name, value)| (strip_visibility(&name).to_string(), value))
                    .collect();
                Ok(LegacyValue::Object(entries))
            }
            b'C' => {
                self.expect(b':')?;
                self.read_quoted()?;
                self.expect(b':')?;
                let length = self.read_count(b':')?;
                self.expect(b'{')?;
                let payload = self.take(length)?;
                self.expect(b'}')?;
                let inner = if payload.trim().is_empty() {
                    LegacyValue::Null
                } else {
                    Parser::new(payload).parse_nested(depth + 1)?
                };
                Ok(LegacyValue::Custom(Box::new(inner)))
            }
            other => Err(self.error(&format!("unsupported serialized type {}", char::from(other)))),
        }
    }

    /// Parses a nested document at the given depth.
    fn parse_nested(mut self, depth: usize) -> Result<LegacyValue, TimerError> {
        let value = self.parse_value(depth)?;
        if self.pos != self.input.len() {
            return Err(self.error("trailing data inside serialized payload"));
        }
        Ok(value)
    }

    /// Reads `count` key/value pairs followed by `}`.
    fn read_entries(
        &mut self,
        count: usize,
        depth: usize,
    ) -> Result<Vec<(String, LegacyValue)>, TimerError> {
        let mut entries = Vec::new();
        for _ in 0..count {
            let key = match self.parse_value(depth + 1)? {
                LegacyValue::Int(index) => index.to_string(),
                LegacyValue::Str(name) => name,
                _ => return Err(self.error("map keys must be integers or strings")),
            };
            let value = self.parse_value(depth + 1)?;
            entries.push((key, value));
        }
        self.expect(b'}')?;
        Ok(entries)
    }

    /// Reads `<len>:"<bytes>"` and returns the text.
    fn read_quoted(&mut self) -> Result<String, TimerError> {
        let length = self.read_count(b':')?;
        self.expect(b'"')?;
        let text = self.take(length)?.to_string();
        self.expect(b'"')?;
        Ok(text)
    }

    /// Reads a non-negative count terminated by `terminator`.
    fn read_count(&mut self, terminator: u8) -> Result<usize, TimerError> {
        let text = self.read_until(terminator)?;
        text.parse().map_err(|_| self.error("malformed length"))
    }

    /// Reads up to `terminator` and consumes it.
    fn read_until(&mut self, terminator: u8) -> Result<&'a str, TimerError> {
        let input = self.input;
        let rest = &input[self.pos..];
        let Some(offset) = rest.iter().position(|byte| *byte == terminator) else {
            return Err(self.error("unterminated serialized token"));
        };
        let text = std::str::from_utf8(&rest[..offset])
            .map_err(|_| self.error("serialized token is not utf-8"))?;
        self.pos += offset + 1;
        Ok(text)
    }

    /// Takes exactly `length` bytes as text.
    fn take(&mut self, length: usize) -> Result<&'a str, TimerError> {
        let end = self.pos.checked_add(length).filter(|end| *end <= self.input.len());
        let Some(end) = end else {
            return Err(self.error("serialized length exceeds input"));
        };
        let input = self.input;
        let text = std::str::from_utf8(&input[self.pos..end])
            .map_err(|_| self.error("serialized string is not utf-8"))?;
        self.pos = end;
        Ok(text)
    }

    /// Consumes one byte.
    fn bump(&mut self) -> Option<u8> {
        let byte = self.input.get(self.pos).copied()?;
        self.pos += 1;
        Some(byte)
    }

    /// Consumes one expected byte.
    fn expect(&mut self, expected: u8) -> Result<(), TimerError> {
        match self.bump() {
            Some(byte) if byte == expected => Ok(()),
            _ => Err(self.error(&format!("expected '{}'", char::from(expected)))),
        }
    }

    /// Builds a positioned error.
    fn error(&self, message: &str) -> TimerError {
        TimerError::invalid(format!("legacy timer state at byte {}: {message}", self.pos))
    }
}

/// Strips a `\0*\0` or `\0Class\0` visibility prefix from a field name.
fn strip_visibility(name: &str) -> &str {
    name.strip_prefix('\0')
        .and_then(|rest| rest.split_once('\0'))
        .map_or(name, |(_, field)| field)
}

// ============================================================================
// SECTION: Interpretation
// ============================================================================

/// Fields every serialized point carries.
const POINT_FIELDS: [&str; 4] = ["tags", "timestamp", "type", "target"];

/// Decodes a full legacy timer state, or a bare legacy timeline.
///
/// # Errors
///
/// Returns [`TimerError::InvalidData`] when the input is not a known shape.
pub fn decode_state(input: &str) -> Result<TimerState, TimerError> {
    let value = Parser::new(input).parse_document()?;
    if value == LegacyValue::Null {
        return Ok(TimerState::new());
    }
    let Some(timeline) = value.field("timeLine") else {
        return Ok(TimerState::with_timeline(interpret_timeline(&value, 0)?));
    };
    Ok(TimerState {
        timeline: interpret_timeline(timeline, 0)?,
        extra_time: scalar(&value, "extraTime")?,
        extended_time: scalar(&value, "extendedTime")?,
        consumed_extra_time: scalar(&value, "consumedExtraTime")?,
        adjustment_map: match value.field("timerAdjustmentMap") {
            Some(map) => interpret_adjustments(map)?,
            None => AdjustmentMap::new(),
        },
    })
}

/// Decodes a bare legacy timeline.
///
/// # Errors
///
/// Returns [`TimerError::InvalidData`] when the input is not a timeline.
pub fn decode_timeline(input: &str) -> Result<TimeLine, TimerError> {
    decode_timeline_at(input, 0)
}

/// Decodes a serialized timeline found at `depth`.
fn decode_timeline_at(input: &str, depth: usize) -> Result<TimeLine, TimerError> {
    if depth > MAX_DEPTH {
        return Err(TimerError::invalid("legacy timeline is nested too deeply"));
    }
    let value = Parser::new(input).parse_document_at(depth)?;
    interpret_timeline(&value, depth)
}

/// Interprets a value as a timeline.
fn interpret_timeline(value: &LegacyValue, depth: usize) -> Result<TimeLine, TimerError> {
    if depth > MAX_DEPTH {
        return Err(TimerError::invalid("legacy timeline is nested too deeply"));
    }
    match value {
        LegacyValue::Null => Ok(TimeLine::new()),
        LegacyValue::Str(serialized) => decode_timeline_at(serialized, depth + 1),
        LegacyValue::Custom(payload) => interpret_timeline(payload, depth + 1),
        LegacyValue::Array(entries) | LegacyValue::Object(entries) => {
            if let Some(points) = value.field("points")
                && !value.has_fields(&POINT_FIELDS)
            {
                return interpret_timeline(points, depth + 1);
            }
            entries.iter().map(|(_, point)| interpret_point(point)).collect()
        }
        _ => Err(TimerError::invalid("legacy timeline is not a list of points")),
    }
}

/// Interprets a value as a time point.
fn interpret_point(value: &LegacyValue) -> Result<TimePoint, TimerError> {
    if !value.has_fields(&POINT_FIELDS) {
        return Err(TimerError::invalid("legacy time point lacks tags, timestamp, type, or target"));
    }
    let tags = match value.field("tags") {
        Some(LegacyValue::Str(tag)) => vec![tag.clone()],
        Some(tags) => tags
            .entries()
            .ok_or_else(|| TimerError::invalid("legacy time point tags are not a list"))?
            .iter()
            .map(|(_, tag)| {
                tag.as_tag().ok_or_else(|| TimerError::invalid("legacy time point tag is not a string"))
            })
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    let timestamp = value
        .field("timestamp")
        .and_then(LegacyValue::as_f64)
        .ok_or_else(|| TimerError::invalid("legacy time point timestamp is not a number"))?;
    let point_type = value
        .field("type")
        .and_then(LegacyValue::as_code)
        .ok_or_else(|| TimerError::invalid("legacy time point type is not a code"))?;
    let target = value
        .field("target")
        .and_then(LegacyValue::as_code)
        .ok_or_else(|| TimerError::invalid("legacy time point target is not a code"))?;
    TimePoint::new(
        TagPath::try_from(tags)?,
        timestamp,
        PointType::from_code(point_type)?,
        TimeTarget::from_code(target)?,
    )
}

/// Interprets the adjustment map, keyed by tag or as `source` records.
fn interpret_adjustments(value: &LegacyValue) -> Result<AdjustmentMap, TimerError> {
    let Some(entries) = value.entries() else {
        return match value {
            LegacyValue::Null => Ok(AdjustmentMap::new()),
            _ => Err(TimerError::invalid("legacy adjustment map is not a map")),
        };
    };
    let mut map = AdjustmentMap::new();
    for (key, entry) in entries {
        let tag = match entry.field("source").and_then(LegacyValue::as_tag) {
            Some(source) => source,
            None => key.clone(),
        };
        let increase = entry.field("increase").and_then(LegacyValue::as_f64).unwrap_or(0.0);
        let decrease = entry.field("decrease").and_then(LegacyValue::as_f64).unwrap_or(0.0);
        map.increase(tag.clone(), increase)?;
        map.decrease(tag, decrease)?;
    }
    Ok(map)
}

/// Reads a non-negative scalar field, defaulting to zero.
fn scalar(value: &LegacyValue, name: &str) -> Result<f64, TimerError> {
    let number = match value.field(name) {
        None | Some(LegacyValue::Null) => 0.0,
        Some(field) => field
            .as_f64()
            .ok_or_else(|| TimerError::invalid(format!("legacy {name} is not a number")))?,
    };
    if !number.is_finite() || number < 0.0 {
        return Err(TimerError::invalid(format!("legacy {name} must be non-negative, got {number}")));
    }
    Ok(number)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use super::*;

    fn string(text: &str) -> String {
        format!("s:{}:\"{}\";", text.len(), text)
    }

    /// Verifies scalar forms parse.
    #[test]
    fn parses_scalars() {
        assert_eq!(Parser::new("N;").parse_document().unwrap(), LegacyValue::Null);
        assert_eq!(Parser::new("b:1;").parse_document().unwrap(), LegacyValue::Bool(true));
        assert_eq!(Parser::new("i:-42;").parse_document().unwrap(), LegacyValue::Int(-42));
        assert_eq!(Parser::new("d:0.5;").parse_document().unwrap(), LegacyValue::Float(0.5));
        assert_eq!(
            Parser::new(&string("héllo")).parse_document().unwrap(),
            LegacyValue::Str("héllo".to_string())
        );
    }

    /// Verifies string lengths are counted in bytes.
    #[test]
    fn string_length_counts_bytes() {
        let err = Parser::new("s:5:\"héllo\";").parse_document().unwrap_err();
        assert!(matches!(err, TimerError::InvalidData(_)));
    }

    /// Verifies object field visibility prefixes are stripped.
    #[test]
    fn strips_visibility_prefixes() {
        assert_eq!(strip_visibility("\0*\0tags"), "tags");
        assert_eq!(strip_visibility("\0TimePoint\0target"), "target");
        assert_eq!(strip_visibility("plain"), "plain");
    }

    /// Verifies a custom payload is parsed as a nested value.
    #[test]
    fn parses_custom_payload() {
        let payload = "a:1:{i:0;i:7;}";
        let input = format!("C:4:\"Line\":{}:{{{payload}}}", payload.len());
        let value = Parser::new(&input).parse_document().unwrap();
        let LegacyValue::Custom(inner) = value else {
            panic!("expected custom value");
        };
        assert_eq!(*inner, LegacyValue::Array(vec![("0".to_string(), LegacyValue::Int(7))]));
    }

    /// Verifies truncated input is rejected.
    #[test]
    fn rejects_truncated_input() {
        for input in ["a:2:{i:0;N;", "s:10:\"short\";", "i:12", "x:1;"] {
            let err = Parser::new(input).parse_document().unwrap_err();
            assert!(matches!(err, TimerError::InvalidData(_)), "{input}");
        }
    }

    /// Verifies adjustment records keyed by `source` are accepted.
    #[test]
    fn interprets_source_records() {
        let input = format!(
            "a:1:{{i:0;a:2:{{{}{}{}d:30;}}}}",
            string("source"),
            string("section-1"),
            string("increase")
        );
        let value = Parser::new(&input).parse_document().unwrap();
        let map = interpret_adjustments(&value).unwrap();
        assert!((map.get("section-1") - 30.0).abs() < f64::EPSILON);
    }
}
