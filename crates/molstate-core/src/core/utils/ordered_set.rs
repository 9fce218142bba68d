use std::cmp::Ordering;
use std::ops::Range;

/// A half-open interval `[start, end)` over ordered values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval<T> {
    pub start: T,
    pub end: T,
}

impl<T: Ord + Copy> Interval<T> {
    pub fn new(start: T, end: T) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, value: T) -> bool {
        self.start <= value && value < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl<T: Ord + Copy> From<Range<T>> for Interval<T> {
    fn from(range: Range<T>) -> Self {
        Self::new(range.start, range.end)
    }
}

/// Returns `true` if `set` is strictly increasing (sorted and free of duplicates).
pub fn is_ordered_set<T: Ord>(set: &[T]) -> bool {
    set.windows(2).all(|w| w[0] < w[1])
}

/// Sorts and de-duplicates arbitrary values into an ordered set.
pub fn from_unsorted<T: Ord>(mut values: Vec<T>) -> Vec<T> {
    values.sort_unstable();
    values.dedup();
    values
}

pub fn has<T: Ord>(set: &[T], value: &T) -> bool {
    set.binary_search(value).is_ok()
}

pub fn index_of<T: Ord>(set: &[T], value: &T) -> Option<usize> {
    set.binary_search(value).ok()
}

pub fn union<T: Ord + Copy>(a: &[T], b: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

pub fn intersect<T: Ord + Copy>(a: &[T], b: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

pub fn subtract<T: Ord + Copy>(a: &[T], b: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(a.len());
    let mut j = 0;
    for &value in a {
        while j < b.len() && b[j] < value {
            j += 1;
        }
        if j >= b.len() || b[j] != value {
            out.push(value);
        }
    }
    out
}

pub fn is_subset<T: Ord>(subset: &[T], superset: &[T]) -> bool {
    let mut j = 0;
    for value in subset {
        while j < superset.len() && superset[j] < *value {
            j += 1;
        }
        if j >= superset.len() || superset[j] != *value {
            return false;
        }
        j += 1;
    }
    true
}

pub fn are_intersecting<T: Ord>(a: &[T], b: &[T]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => return true,
        }
    }
    false
}

/// Returns the sub-slice of `set` whose values fall inside `interval`.
pub fn slice_in<'a, T: Ord + Copy>(set: &'a [T], interval: Interval<T>) -> &'a [T] {
    if interval.is_empty() {
        return &set[0..0];
    }
    let start = set.partition_point(|v| *v < interval.start);
    let end = set.partition_point(|v| *v < interval.end);
    &set[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_membership_is_half_open() {
        let interval = Interval::new(2, 5);
        assert!(!interval.contains(1));
        assert!(interval.contains(2));
        assert!(interval.contains(4));
        assert!(!interval.contains(5));
        assert!(Interval::new(3, 3).is_empty());
    }

    #[test]
    fn from_unsorted_sorts_and_deduplicates() {
        assert_eq!(from_unsorted(vec![5, 1, 3, 1, 5]), vec![1, 3, 5]);
        assert!(is_ordered_set(&from_unsorted(vec![9, 2, 2, 7])));
        assert!(!is_ordered_set(&[1, 1, 2]));
    }

    #[test]
    fn set_algebra_matches_expected_results() {
        let a = [1, 3, 5, 7];
        let b = [3, 4, 5, 8];
        assert_eq!(union(&a, &b), vec![1, 3, 4, 5, 7, 8]);
        assert_eq!(intersect(&a, &b), vec![3, 5]);
        assert_eq!(subtract(&a, &b), vec![1, 7]);
        assert!(are_intersecting(&a, &b));
        assert!(!are_intersecting(&[1, 2], &[3, 4]));
    }

    #[test]
    fn membership_and_index_lookup_use_binary_search() {
        let set = [2, 4, 6, 8];
        assert!(has(&set, &6));
        assert!(!has(&set, &5));
        assert_eq!(index_of(&set, &8), Some(3));
        assert_eq!(index_of(&set, &1), None);
    }

    #[test]
    fn subset_checks_every_element() {
        assert!(is_subset(&[2, 6], &[1, 2, 4, 6]));
        assert!(!is_subset(&[2, 3], &[1, 2, 4, 6]));
        assert!(is_subset::<i32>(&[], &[1]));
    }

    #[test]
    fn slice_in_returns_values_inside_interval() {
        let set = [1, 3, 5, 7, 9];
        assert_eq!(slice_in(&set, Interval::new(3, 8)), &[3, 5, 7]);
        assert_eq!(slice_in(&set, Interval::new(10, 20)), &[] as &[i32]);
        assert_eq!(slice_in(&set, Interval::new(4, 4)), &[] as &[i32]);
    }
}
