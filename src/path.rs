//! Segmented paths and the delimiter used to spell them.
//!
//! A [`Path`] is the validated form of an identifier such as
//! `billing:invoices:export`: at least one segment, none of them empty.

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Result, TreeError};

/// One token of a path. Shared so that rebuilt nodes reuse their keys.
pub type Segment = Arc<str>;

pub const DEFAULT_DELIMITER: char = ':';

/// How identifiers are split into segments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PathConfig {
    pub delimiter: char,
}

impl PathConfig {
    pub fn with_delimiter(delimiter: char) -> Self {
        Self { delimiter }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
        }
    }
}

/// A non-empty sequence of non-empty segments.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Path(Vec<Segment>);

impl Path {
    /// Splits `s` on the default `:` delimiter.
    pub fn parse(s: &str) -> Result<Self> {
        Self::parse_with(s, &PathConfig::default())
    }

    pub fn parse_with(s: &str, config: &PathConfig) -> Result<Self> {
        if s.is_empty() {
            return Err(TreeError::EmptyPath);
        }
        Self::from_segments(s.split(config.delimiter))
    }

    pub fn from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let segments: Vec<S> = segments.into_iter().collect();
        to_segments(&segments).map(Self)
    }

    /// Caller guarantees `segments` is non-empty and free of empty tokens.
    pub(crate) fn from_raw(segments: Vec<Segment>) -> Self {
        debug_assert!(!segments.is_empty());
        debug_assert!(segments.iter().all(|s| !s.is_empty()));
        Self(segments)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn head(&self) -> &str {
        &self.0[0]
    }

    /// The path one level up, or `None` at a root.
    pub fn parent(&self) -> Option<Path> {
        match self.0.len() {
            0 | 1 => None,
            n => Some(Self(self.0[..n - 1].to_vec())),
        }
    }

    pub fn join(&self, segment: &str) -> Result<Path> {
        if segment.is_empty() {
            return Err(TreeError::EmptySegment {
                index: self.0.len(),
            });
        }
        let mut segments = self.0.clone();
        segments.push(Arc::from(segment));
        Ok(Self(segments))
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn to_string_with(&self, config: &PathConfig) -> String {
        let mut out = String::new();
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(config.delimiter);
            }
            out.push_str(segment);
        }
        out
    }
}

/// Validates `path` and copies it into shared segments.
pub(crate) fn to_segments<S: AsRef<str>>(path: &[S]) -> Result<Vec<Segment>> {
    if path.is_empty() {
        return Err(TreeError::EmptyPath);
    }
    path.iter()
        .enumerate()
        .map(|(index, s)| match s.as_ref() {
            "" => Err(TreeError::EmptySegment { index }),
            s => Ok(Arc::from(s)),
        })
        .collect()
}

impl Deref for Path {
    type Target = [Segment];

    fn deref(&self) -> &[Segment] {
        &self.0
    }
}

impl AsRef<[Segment]> for Path {
    fn as_ref(&self) -> &[Segment] {
        &self.0
    }
}

impl FromStr for Path {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_with(&PathConfig::default()))
    }
}
