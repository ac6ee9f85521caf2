//! Page windowing over filtered listings.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ITEMS_PER_PAGE: usize = 6;

/// `ceil(count / items_per_page)`; zero for an empty sequence or a zero page size.
pub fn total_pages(count: usize, items_per_page: usize) -> usize {
    if items_per_page == 0 {
        return 0;
    }
    count.div_ceil(items_per_page)
}

/// Slice shown on `page` (1-based). Out-of-range and zero pages yield an empty
/// slice; callers clamp before asking.
pub fn window_for<T>(sequence: &[T], page: usize, items_per_page: usize) -> &[T] {
    if page == 0 || items_per_page == 0 {
        return &[];
    }
    let start = (page - 1).saturating_mul(items_per_page);
    if start >= sequence.len() {
        return &[];
    }
    let end = start.saturating_add(items_per_page).min(sequence.len());
    &sequence[start..end]
}

/// Pager position. `current_page` stays within `[1, total_pages]` whenever
/// there is at least one page, and is 1 otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    current_page: usize,
    items_per_page: usize,
}

impl Default for PageState {
    fn default() -> Self {
        Self::new(DEFAULT_ITEMS_PER_PAGE)
    }
}

impl PageState {
    pub fn new(items_per_page: usize) -> Self {
        Self {
            current_page: 1,
            items_per_page: items_per_page.max(1),
        }
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn items_per_page(&self) -> usize {
        self.items_per_page
    }

    pub fn total_pages(&self, count: usize) -> usize {
        total_pages(count, self.items_per_page)
    }

    pub fn reset(&mut self) {
        self.current_page = 1;
    }

    /// Pull the current page back into range after the sequence shrank.
    pub fn clamp(&mut self, count: usize) {
        let last = self.total_pages(count).max(1);
        self.current_page = self.current_page.clamp(1, last);
    }

    /// Jump to `page`, clamped to the valid range. Returns the page landed on.
    pub fn go_to(&mut self, page: usize, count: usize) -> usize {
        let last = self.total_pages(count).max(1);
        self.current_page = page.clamp(1, last);
        self.current_page
    }

    pub fn has_next(&self, count: usize) -> bool {
        self.current_page < self.total_pages(count)
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    /// Advance one page; a no-op on the last page.
    pub fn next(&mut self, count: usize) -> bool {
        if !self.has_next(count) {
            return false;
        }
        self.current_page += 1;
        true
    }

    pub fn previous(&mut self) -> bool {
        if !self.has_previous() {
            return false;
        }
        self.current_page -= 1;
        true
    }

    /// Page numbers the pager renders, `1..=total_pages`.
    pub fn page_numbers(&self, count: usize) -> RangeInclusive<usize> {
        1..=self.total_pages(count)
    }

    pub fn window<'a, T>(&self, sequence: &'a [T]) -> &'a [T] {
        window_for(sequence, self.current_page, self.items_per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn total_pages_boundaries() {
        assert_eq!(total_pages(0, 6), 0);
        assert_eq!(total_pages(6, 6), 1);
        assert_eq!(total_pages(7, 6), 2);
        assert_eq!(total_pages(10, 0), 0);
    }

    #[test]
    fn ten_records_split_six_and_four() {
        let items = (1..=10).collect::<Vec<_>>();
        assert_eq!(total_pages(items.len(), 6), 2);
        assert_eq!(window_for(&items, 1, 6), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(window_for(&items, 2, 6), &[7, 8, 9, 10]);
        assert!(window_for(&items, 3, 6).is_empty());
    }

    #[test]
    fn nonsensical_pages_degrade_to_empty() {
        let items = [1, 2, 3];
        assert!(window_for(&items, 0, 6).is_empty());
        assert!(window_for(&items, usize::MAX, 6).is_empty());
        assert!(window_for(&items, 1, 0).is_empty());
    }

    #[test]
    fn pager_navigation_stops_at_edges() {
        let mut state = PageState::new(6);
        assert!(!state.previous());
        assert!(state.next(10));
        assert_eq!(state.current_page(), 2);
        assert!(!state.next(10));
        assert!(state.previous());
        assert_eq!(state.go_to(99, 10), 2);
        assert_eq!(state.go_to(0, 10), 1);
        assert_eq!(state.page_numbers(10).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn clamp_pulls_page_back_after_shrink() {
        let mut state = PageState::new(6);
        state.go_to(3, 18);
        state.clamp(7);
        assert_eq!(state.current_page(), 2);
        state.clamp(0);
        assert_eq!(state.current_page(), 1);
    }

    #[test]
    fn zero_page_size_is_bumped_to_one() {
        assert_eq!(PageState::new(0).items_per_page(), 1);
    }

    proptest! {
        #[test]
        fn prop_windows_partition_sequence(len in 0usize..200, per_page in 1usize..25) {
            let items = (0..len).collect::<Vec<_>>();
            let pages = total_pages(len, per_page);
            let joined = (1..=pages)
                .flat_map(|p| window_for(&items, p, per_page).iter().copied())
                .collect::<Vec<_>>();
            prop_assert_eq!(joined, items.clone());
            prop_assert!(window_for(&items, pages + 1, per_page).is_empty());
        }
    }
}
