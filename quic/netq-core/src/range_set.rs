// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! A set of disjoint, sorted, inclusive integer ranges, used to track
//! received packet numbers and stream offsets without storing each value
//! individually.

use alloc::collections::VecDeque;
use core::ops::RangeInclusive;

/// A disjoint, ascending-sorted set of inclusive ranges over `T`.
#[derive(Debug, Clone, Default)]
pub struct RangeSet<T> {
    ranges: VecDeque<RangeInclusive<T>>,
    /// caps the number of disjoint sub-ranges kept; once exceeded, the
    /// oldest (lowest) range is dropped. `None` means unbounded.
    max_ranges: Option<usize>,
}

impl<T> RangeSet<T>
where
    T: Copy + Ord + core::ops::Add<Output = T> + core::ops::Sub<Output = T> + From<u8>,
{
    pub fn new() -> Self {
        Self {
            ranges: VecDeque::new(),
            max_ranges: None,
        }
    }

    /// A range set that evicts its oldest (lowest) range once it holds
    /// more than `max_ranges` disjoint ranges.
    pub fn with_max_ranges(max_ranges: usize) -> Self {
        Self {
            ranges: VecDeque::new(),
            max_ranges: Some(max_ranges),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn min_value(&self) -> Option<T> {
        self.ranges.front().map(|r| *r.start())
    }

    pub fn max_value(&self) -> Option<T> {
        self.ranges.back().map(|r| *r.end())
    }

    pub fn contains(&self, value: T) -> bool {
        self.ranges
            .binary_search_by(|r| {
                if value < *r.start() {
                    core::cmp::Ordering::Greater
                } else if value > *r.end() {
                    core::cmp::Ordering::Less
                } else {
                    core::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Inserts `value`, merging with adjacent/overlapping ranges.
    pub fn insert(&mut self, value: T) {
        self.insert_range(value..=value);
    }

    /// Inserts an inclusive range, merging with any ranges it overlaps or
    /// touches.
    pub fn insert_range(&mut self, range: RangeInclusive<T>) {
        let one = T::from(1u8);
        let (mut start, mut end) = (*range.start(), *range.end());
        if start > end {
            return;
        }

        let mut idx = 0;
        while idx < self.ranges.len() {
            let r = &self.ranges[idx];
            let touches_or_overlaps = *r.end() >= sat_sub(start, one) && *r.start() <= sat_add(end, one);
            if touches_or_overlaps {
                start = start.min(*r.start());
                end = end.max(*r.end());
                self.ranges.remove(idx);
                continue;
            }
            if *r.start() > end {
                break;
            }
            idx += 1;
        }

        self.ranges.insert(idx, start..=end);

        if let Some(max_ranges) = self.max_ranges {
            while self.ranges.len() > max_ranges {
                self.ranges.pop_front();
            }
        }
    }

    /// Removes everything below `value`, exclusive.
    pub fn remove_below(&mut self, value: T) {
        while let Some(front) = self.ranges.front().cloned() {
            if *front.end() < value {
                self.ranges.pop_front();
            } else if *front.start() < value {
                self.ranges.pop_front();
                self.ranges.push_front(value..=*front.end());
                break;
            } else {
                break;
            }
        }
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &RangeInclusive<T>> {
        self.ranges.iter()
    }
}

fn sat_add<T: Copy + Ord + core::ops::Add<Output = T>>(value: T, delta: T) -> T {
    value + delta
}

fn sat_sub<T: Copy + Ord + core::ops::Sub<Output = T>>(value: T, delta: T) -> T {
    if value < delta {
        value
    } else {
        value - delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_adjacent_ranges() {
        let mut set: RangeSet<u64> = RangeSet::new();
        set.insert_range(1..=3);
        set.insert_range(4..=6);
        assert_eq!(set.len(), 1);
        assert_eq!(set.min_value(), Some(1));
        assert_eq!(set.max_value(), Some(6));
    }

    #[test]
    fn keeps_disjoint_ranges_separate() {
        let mut set: RangeSet<u64> = RangeSet::new();
        set.insert_range(1..=2);
        set.insert_range(10..=12);
        assert_eq!(set.len(), 2);
        assert!(!set.contains(5));
        assert!(set.contains(11));
    }

    #[test]
    fn out_of_order_inserts_merge_correctly() {
        let mut set: RangeSet<u64> = RangeSet::new();
        set.insert(5);
        set.insert(1);
        set.insert(3);
        set.insert(2);
        set.insert(4);
        assert_eq!(set.len(), 1);
        assert_eq!(set.min_value(), Some(1));
        assert_eq!(set.max_value(), Some(5));
    }

    #[test]
    fn remove_below_trims_or_drops_ranges() {
        let mut set: RangeSet<u64> = RangeSet::new();
        set.insert_range(1..=5);
        set.insert_range(10..=15);
        set.remove_below(12);
        assert_eq!(set.min_value(), Some(12));
        assert_eq!(set.max_value(), Some(15));
    }

    #[test]
    fn max_ranges_evicts_the_oldest_range_on_overflow() {
        let mut set: RangeSet<u64> = RangeSet::with_max_ranges(2);
        set.insert(1);
        set.insert(10);
        set.insert(20);
        assert_eq!(set.len(), 2);
        assert!(!set.contains(1));
        assert!(set.contains(10));
        assert!(set.contains(20));
    }
}
