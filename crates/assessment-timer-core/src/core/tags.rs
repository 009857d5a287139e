// crates/assessment-timer-core/src/core/tags.rs
// ============================================================================
// Module: Scope Tags
// Description: Flat tag paths identifying a scope in the test hierarchy.
// Purpose: Provide validated tag sequences and the filters used by queries.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A scope is identified by the ordered path of tags from the test down to the
//! most specific node, e.g. `[test, part, section, item, item#0]`. The model
//! stays flat on purpose: queries match by exact path or by tag containment
//! and never walk a tree.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::error::TimerError;

// ============================================================================
// SECTION: Tag Path
// ============================================================================

/// Non-empty ordered sequence of scope tags, root to leaf.
///
/// # Invariants
/// - At least one tag.
/// - No tag is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct TagPath(Vec<String>);

impl TagPath {
    /// Builds a tag path from any sequence of string-like tags.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidData`] when the sequence is empty or holds
    /// an empty tag.
    pub fn new<I, S>(tags: I) -> Result<Self, TimerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags: Vec<String> = tags.into_iter().map(|tag| tag.as_ref().to_string()).collect();
        Self::try_from(tags)
    }

    /// Returns the tags as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Returns the most specific tag.
    #[must_use]
    pub fn leaf(&self) -> &str {
        self.0.last().map_or("", String::as_str)
    }

    /// Returns the number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when the path holds no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true when `tag` appears anywhere in the path.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|candidate| candidate == tag)
    }

    /// Returns true when every tag in `tags` appears in the path.
    #[must_use]
    pub fn contains_all<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        tags.iter().all(|tag| self.contains(tag.as_ref()))
    }

    /// Returns an iterator over the tags.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }
}

impl TryFrom<Vec<String>> for TagPath {
    type Error = TimerError;

    fn try_from(tags: Vec<String>) -> Result<Self, Self::Error> {
        if tags.is_empty() {
            return Err(TimerError::invalid("tags must not be empty"));
        }
        if tags.iter().any(String::is_empty) {
            return Err(TimerError::invalid("tags must not contain empty identifiers"));
        }
        Ok(Self(tags))
    }
}

impl From<TagPath> for Vec<String> {
    fn from(path: TagPath) -> Self {
        path.0
    }
}

impl fmt::Display for TagPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl<'a> IntoIterator for &'a TagPath {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ============================================================================
// SECTION: Tag Filter
// ============================================================================

/// Tag criteria applied by timeline queries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TagFilter {
    /// Matches every point.
    #[default]
    Any,
    /// Matches points whose path contains every listed tag.
    Contains(Vec<String>),
    /// Matches points whose path is exactly this one.
    Exact(TagPath),
}

impl TagFilter {
    /// Builds a containment filter; an empty tag list matches everything.
    #[must_use]
    pub fn containing<S: AsRef<str>>(tags: &[S]) -> Self {
        if tags.is_empty() {
            Self::Any
        } else {
            Self::Contains(tags.iter().map(|tag| tag.as_ref().to_string()).collect())
        }
    }

    /// Builds a filter matching a single tag anywhere in the path.
    #[must_use]
    pub fn tag(tag: impl Into<String>) -> Self {
        Self::Contains(vec![tag.into()])
    }

    /// Returns true when the path satisfies the filter.
    #[must_use]
    pub fn matches(&self, path: &TagPath) -> bool {
        match self {
            Self::Any => true,
            Self::Contains(tags) => path.contains_all(tags),
            Self::Exact(expected) => expected == path,
        }
    }
}

impl From<TagPath> for TagFilter {
    fn from(path: TagPath) -> Self {
        Self::Exact(path)
    }
}
