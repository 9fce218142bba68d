use super::ordered_set::{self, Interval};
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SegmentationError {
    #[error("Segmentation requires at least one offset")]
    Empty,
    #[error("Segment offsets must be non-decreasing (offset {index} is {value} after {previous})")]
    NotMonotone {
        index: usize,
        value: usize,
        previous: usize,
    },
}

/// A partition of the value range `[offsets[0], offsets[n])` into contiguous segments.
///
/// Segment `i` covers the half-open interval `[offsets[i], offsets[i + 1])`. Molecular models
/// use one segmentation per level (residues, chains) over their atom indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    offsets: Vec<usize>,
}

/// The part of a projected value set that falls into one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSlice<'a> {
    pub segment: usize,
    pub values: &'a [usize],
}

impl Segmentation {
    pub fn from_offsets(offsets: Vec<usize>) -> Result<Self, SegmentationError> {
        if offsets.is_empty() {
            return Err(SegmentationError::Empty);
        }
        for (index, pair) in offsets.windows(2).enumerate() {
            if pair[1] < pair[0] {
                return Err(SegmentationError::NotMonotone {
                    index: index + 1,
                    value: pair[1],
                    previous: pair[0],
                });
            }
        }
        Ok(Self { offsets })
    }

    /// Builds a segmentation from per-segment sizes, starting at zero.
    pub fn from_sizes(sizes: impl IntoIterator<Item = usize>) -> Self {
        let mut offsets = vec![0];
        let mut end = 0;
        for size in sizes {
            end += size;
            offsets.push(end);
        }
        Self { offsets }
    }

    pub fn segment_count(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn range(&self, segment: usize) -> Option<Range<usize>> {
        if segment >= self.segment_count() {
            return None;
        }
        Some(self.offsets[segment]..self.offsets[segment + 1])
    }

    /// Finds the segment containing `value`, skipping empty segments.
    pub fn segment_of(&self, value: usize) -> Option<usize> {
        let last = *self.offsets.last()?;
        if value < self.offsets[0] || value >= last {
            return None;
        }
        // First offset strictly greater than `value`, minus one, is the owning segment.
        let upper = self.offsets.partition_point(|&o| o <= value);
        Some(upper - 1)
    }

    /// Projects an ordered set of values onto the segments it touches, in segment order.
    pub fn project<'a>(&self, values: &'a [usize]) -> Vec<SegmentSlice<'a>> {
        debug_assert!(ordered_set::is_ordered_set(values));
        let mut out = Vec::new();
        let mut rest = values;
        while let Some(&first) = rest.first() {
            let Some(segment) = self.segment_of(first) else {
                // Values outside the segmented range are skipped.
                rest = &rest[1..];
                continue;
            };
            let interval = Interval::new(self.offsets[segment], self.offsets[segment + 1]);
            let inside = ordered_set::slice_in(rest, interval);
            out.push(SegmentSlice {
                segment,
                values: inside,
            });
            rest = &rest[inside.len()..];
        }
        out
    }

    /// Expands a set of segment indices back into the ordered set of values they cover.
    pub fn expand(&self, segments: &[usize]) -> Vec<usize> {
        let mut values = Vec::new();
        for &segment in segments {
            if let Some(range) = self.range(segment) {
                values.extend(range);
            }
        }
        ordered_set::from_unsorted(values)
    }
}
