//! Dirty tracking for CPU mirrors
//!
//! Writes mark slot ranges; the renderer drains them once per frame and uploads
//! only those ranges.

use bitflags::bitflags;
use std::ops::Range;

bitflags! {
    /// Mirrors with pending uploads
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DirtyFlags: u8 {
        /// Per-slot transform matrices
        const TRANSFORMS = 1 << 0;
        /// Per-slot material data
        const MATERIALS = 1 << 1;
        /// Point light array
        const LIGHTS = 1 << 2;
    }
}

/// Sorted, non-overlapping, non-adjacent slot ranges
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyRanges {
    ranges: Vec<Range<usize>>,
}

impl DirtyRanges {
    /// Nothing dirty
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a single slot
    pub fn mark(&mut self, slot: usize) {
        self.mark_range(slot..slot + 1);
    }

    /// Mark a range, merging with every range it touches
    pub fn mark_range(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        let mut merged = range;
        // First range that ends at or after the new start
        let first = self.ranges.partition_point(|r| r.end < merged.start);
        let mut last = first;
        while last < self.ranges.len() && self.ranges[last].start <= merged.end {
            merged.start = merged.start.min(self.ranges[last].start);
            merged.end = merged.end.max(self.ranges[last].end);
            last += 1;
        }
        self.ranges.splice(first..last, std::iter::once(merged));
    }

    /// Pending ranges
    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    /// Drain all pending ranges
    pub fn take(&mut self) -> Vec<Range<usize>> {
        std::mem::take(&mut self.ranges)
    }

    /// Nothing pending
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of pending ranges
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Drop pending ranges
    pub fn clear(&mut self) {
        self.ranges.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjacent_slots_coalesce() {
        let mut dirty = DirtyRanges::new();
        dirty.mark(3);
        dirty.mark(4);
        dirty.mark(2);
        assert_eq!(dirty.ranges(), &[2..5]);
    }

    #[test]
    fn test_disjoint_slots_stay_sorted() {
        let mut dirty = DirtyRanges::new();
        dirty.mark(9);
        dirty.mark(1);
        dirty.mark(5);
        assert_eq!(dirty.ranges(), &[1..2, 5..6, 9..10]);
    }

    #[test]
    fn test_range_bridges_neighbours() {
        let mut dirty = DirtyRanges::new();
        dirty.mark(1);
        dirty.mark(5);
        dirty.mark(9);
        dirty.mark_range(2..9);
        assert_eq!(dirty.ranges(), &[1..10]);
    }

    #[test]
    fn test_repeated_marks_and_take() {
        let mut dirty = DirtyRanges::new();
        dirty.mark(7);
        dirty.mark(7);
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty.take(), vec![7..8]);
        assert!(dirty.is_empty());
    }

    #[test]
    fn test_flags_combine() {
        let flags = DirtyFlags::TRANSFORMS | DirtyFlags::MATERIALS;
        assert!(flags.contains(DirtyFlags::MATERIALS));
        assert!(!flags.contains(DirtyFlags::LIGHTS));
    }
}
