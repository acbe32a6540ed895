//! Page-range resolution for the start/end page fields.
//!
//! Runs on every field edit. The three clamps apply in a fixed order, each
//! seeing the result of the previous one:
//!
//! 1. `start > end`  → `start = end`
//! 2. `end > total`  → `end = total` (only once the total is known)
//! 3. `start < 1`    → `start = 1`
//!
//! A final pass keeps `1 ≤ start ≤ end`, so the output is a fixed point:
//! resolving an already-resolved range changes nothing.

use serde::{Deserialize, Serialize};

/// A resolved, 1-indexed, inclusive page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    /// Number of pages in the range.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// A resolved range always holds at least one page.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn pages(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// Clamp user-edited `start`/`end` fields against a document of `total` pages.
///
/// `total == 0` means the page count is not known yet; only the ordering
/// and lower-bound clamps apply.
pub fn resolve_page_range(start: i64, end: i64, total: usize) -> PageRange {
    let mut start = start;
    let mut end = end;

    if start > end {
        start = end;
    }
    if total > 0 && end > total as i64 {
        end = total as i64;
    }
    if start < 1 {
        start = 1;
    }

    let end = end.max(1);
    let start = start.min(end);
    PageRange {
        start: start as usize,
        end: end as usize,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_after_end_snaps_to_end() {
        assert_eq!(resolve_page_range(5, 3, 20), PageRange { start: 3, end: 3 });
    }

    #[test]
    fn end_beyond_total_snaps_to_total() {
        assert_eq!(resolve_page_range(1, 30, 20), PageRange { start: 1, end: 20 });
    }

    #[test]
    fn start_below_one_snaps_to_one() {
        assert_eq!(resolve_page_range(0, 10, 20), PageRange { start: 1, end: 10 });
        assert_eq!(resolve_page_range(-4, 10, 20), PageRange { start: 1, end: 10 });
    }

    #[test]
    fn start_beyond_clamped_end_is_pulled_in() {
        assert_eq!(resolve_page_range(25, 30, 20), PageRange { start: 20, end: 20 });
    }

    #[test]
    fn unknown_total_skips_upper_clamp() {
        assert_eq!(resolve_page_range(2, 500, 0), PageRange { start: 2, end: 500 });
    }

    #[test]
    fn degenerate_fields_collapse_to_first_page() {
        assert_eq!(resolve_page_range(-2, -1, 5), PageRange { start: 1, end: 1 });
        assert_eq!(resolve_page_range(0, 0, 5), PageRange { start: 1, end: 1 });
    }

    #[test]
    fn resolution_is_idempotent() {
        for (s, e, t) in [(5, 3, 20), (1, 30, 20), (0, 10, 20), (25, 30, 20), (-2, -1, 5), (3, 3, 3)] {
            let once = resolve_page_range(s, e, t);
            let twice = resolve_page_range(once.start as i64, once.end as i64, t);
            assert_eq!(once, twice, "({s}, {e}, {t})");
        }
    }

    #[test]
    fn range_len() {
        assert_eq!(PageRange { start: 1, end: 10 }.len(), 10);
        assert_eq!(PageRange { start: 4, end: 4 }.len(), 1);
    }
}
