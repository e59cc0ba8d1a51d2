use thiserror::Error;

/// Errors raised when a path cannot address a node.
///
/// Only insertion and parsing validate paths. Removal and lookup treat a
/// malformed path as one that matches nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The path has no segments.
    #[error("path must contain at least one segment")]
    EmptyPath,

    /// A segment at `index` is the empty string.
    #[error("segment {index} of path is empty")]
    EmptySegment {
        /// Zero-based position of the offending segment.
        index: usize,
    },
}

pub type Result<T> = std::result::Result<T, TreeError>;
