//! Core interval type for genomic coordinate arithmetic.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LociError, Result};

/// A half-open coordinate range `[start, end)` on a single axis.
/// Uses 0-based, half-open coordinates (BED convention), so adjacent
/// intervals share a boundary without overlapping and `len == end - start`.
///
/// The invariant `start <= end` is enforced at construction; all
/// relational operations assume well-formed inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub(crate) start: u64,
    pub(crate) end: u64,
}

impl Interval {
    /// Create a new interval, rejecting `start > end`.
    pub fn new(start: u64, end: u64) -> Result<Self> {
        if start > end {
            return Err(LociError::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    /// Construct from bounds known to be ordered.
    #[inline]
    pub(crate) fn from_bounds(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Start position (inclusive).
    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    /// End position (exclusive).
    #[inline]
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Returns the length of the interval.
    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Returns true if the interval has zero length.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if this interval overlaps with another.
    /// Intervals sharing only a boundary point do not overlap.
    #[inline]
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Check if this interval fully contains another.
    #[inline]
    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Check if this interval spans a point position.
    #[inline]
    pub fn contains_point(&self, position: u64) -> bool {
        self.start <= position && position < self.end
    }

    /// Compute the gap to another interval: 0 when overlapping,
    /// otherwise the distance between the nearer edges.
    #[inline]
    pub fn distance(&self, other: &Interval) -> u64 {
        if self.overlaps(other) {
            return 0;
        }
        self.start.max(other.start) - self.end.min(other.end)
    }

    /// Compute the overlap length with another interval.
    #[inline]
    pub fn overlap_length(&self, other: &Interval) -> u64 {
        if !self.overlaps(other) {
            return 0;
        }
        self.end.min(other.end) - self.start.max(other.start)
    }

    /// The minimal interval covering both inputs.
    #[inline]
    pub fn span(&self, other: &Interval) -> Interval {
        Interval::from_bounds(self.start.min(other.start), self.end.max(other.end))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl Ord for Interval {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start
            .cmp(&other.start)
            .then(self.end.cmp(&other.end))
    }
}

impl PartialOrd for Interval {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
