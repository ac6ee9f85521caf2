//! Listing view state: the fetched collection, current criteria and pager,
//! recomputed in one direction only.
//!
//! criteria change -> refilter -> page reset to 1 -> window
//! data refresh    -> refilter -> page clamped      -> window

use std::sync::Arc;

use rentverse_core::{FilterCriteria, FurnishedFilter, PropertyRecord, TypeFilter};
use tracing::{debug, warn};

use crate::filter::{Criterion, FilterEngine};
use crate::page::PageState;
use crate::profile::ViewProfile;

/// Identifies one fetch. Only the most recently issued ticket may install data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchTicket(u64);

impl FetchTicket {
    pub fn sequence(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    NotLoaded,
    Loading,
    Failed(String),
    Loaded(Arc<[PropertyRecord]>),
}

/// Raw collection plus its load status and fetch sequencing. Cheap to clone,
/// so a shared feed can back many independent views.
#[derive(Debug, Clone)]
pub struct PropertyFeed {
    state: LoadState,
    issued: u64,
}

impl Default for PropertyFeed {
    fn default() -> Self {
        Self {
            state: LoadState::NotLoaded,
            issued: 0,
        }
    }
}

impl PropertyFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loaded(records: Vec<PropertyRecord>) -> Self {
        Self {
            state: LoadState::Loaded(records.into()),
            issued: 0,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn records(&self) -> &[PropertyRecord] {
        match &self.state {
            LoadState::Loaded(records) => &records[..],
            _ => &[],
        }
    }

    /// Start a fetch. Data already on screen stays visible until the
    /// response lands.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.issued += 1;
        if !matches!(self.state, LoadState::Loaded(_)) {
            self.state = LoadState::Loading;
        }
        FetchTicket(self.issued)
    }

    /// Install a fetch result. Returns `false` when a newer fetch has been
    /// issued since `ticket`, in which case the result is dropped.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<PropertyRecord>, String>,
    ) -> bool {
        if ticket.0 != self.issued {
            warn!(
                ticket = ticket.0,
                latest = self.issued,
                "ignoring stale property fetch result"
            );
            return false;
        }
        self.state = match result {
            Ok(records) => {
                debug!(count = records.len(), "property collection installed");
                LoadState::Loaded(records.into())
            }
            Err(message) => {
                warn!(%message, "property fetch failed");
                LoadState::Failed(message)
            }
        };
        true
    }
}

/// One rendered page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct PageView<'a> {
    pub items: Vec<&'a PropertyRecord>,
    pub page: usize,
    pub total_pages: usize,
    pub total_matches: usize,
    pub has_previous: bool,
    pub has_next: bool,
}

/// What a listing page shows. "Nothing matches", "nothing loaded yet" and
/// "could not load" are distinct on purpose.
#[derive(Debug, Clone, PartialEq)]
pub enum ListingOutcome<'a> {
    NotLoaded,
    Loading,
    Failed { message: &'a str },
    NoMatches { total_loaded: usize },
    Page(PageView<'a>),
}

#[derive(Debug, Clone)]
pub struct ListingView {
    profile: ViewProfile,
    engine: FilterEngine,
    feed: PropertyFeed,
    criteria: FilterCriteria,
    filtered: Vec<usize>,
    page: PageState,
}

impl ListingView {
    pub fn new(profile: ViewProfile) -> Self {
        Self::with_feed(profile, PropertyFeed::new())
    }

    pub fn with_feed(profile: ViewProfile, feed: PropertyFeed) -> Self {
        let engine = profile.engine();
        let page = PageState::new(profile.items_per_page);
        let mut view = Self {
            profile,
            engine,
            feed,
            criteria: FilterCriteria::default(),
            filtered: Vec::new(),
            page,
        };
        view.refilter();
        view
    }

    pub fn profile(&self) -> &ViewProfile {
        &self.profile
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn feed(&self) -> &PropertyFeed {
        &self.feed
    }

    pub fn current_page(&self) -> usize {
        self.page.current_page()
    }

    pub fn total_pages(&self) -> usize {
        self.page.total_pages(self.filtered.len())
    }

    pub fn match_count(&self) -> usize {
        self.filtered.len()
    }

    /// Criteria currently narrowing this view; drives "Clear all".
    pub fn active_criteria(&self) -> Vec<Criterion> {
        self.engine.active_criteria(&self.criteria)
    }

    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.feed.begin_fetch()
    }

    /// See [`PropertyFeed::complete_fetch`]. A refresh under unchanged
    /// criteria keeps the reader's page where possible.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<PropertyRecord>, String>,
    ) -> bool {
        if !self.feed.complete_fetch(ticket, result) {
            return false;
        }
        self.refilter();
        self.page.clamp(self.filtered.len());
        true
    }

    /// Replace the criteria. Any actual change sends the pager back to page 1.
    pub fn set_criteria(&mut self, criteria: FilterCriteria) -> bool {
        if criteria == self.criteria {
            return false;
        }
        self.criteria = criteria;
        self.refilter();
        self.page.reset();
        true
    }

    pub fn update_criteria(&mut self, edit: impl FnOnce(&mut FilterCriteria)) -> bool {
        let mut next = self.criteria.clone();
        edit(&mut next);
        self.set_criteria(next)
    }

    pub fn set_location(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        self.update_criteria(|c| c.location_text = text)
    }

    pub fn set_property_type(&mut self, filter: TypeFilter) -> bool {
        self.update_criteria(|c| c.property_type = filter)
    }

    /// Selecting the already-selected type clears it, like the tenant picker.
    pub fn toggle_property_type(&mut self, filter: TypeFilter) -> bool {
        let next = if self.criteria.property_type == filter {
            TypeFilter::Any
        } else {
            filter
        };
        self.set_property_type(next)
    }

    pub fn set_min_price(&mut self, min_price: f64) -> bool {
        self.update_criteria(|c| c.min_price = min_price)
    }

    pub fn set_max_price(&mut self, max_price: Option<f64>) -> bool {
        let max_price = self.profile.normalize_max_price(max_price);
        self.update_criteria(|c| c.max_price = max_price)
    }

    pub fn set_min_rooms(&mut self, min_rooms: i64) -> bool {
        self.update_criteria(|c| c.min_rooms = min_rooms)
    }

    pub fn set_min_size(&mut self, min_size: f64) -> bool {
        self.update_criteria(|c| c.min_size = min_size)
    }

    pub fn set_furnished(&mut self, furnished: FurnishedFilter) -> bool {
        self.update_criteria(|c| c.furnished = furnished)
    }

    pub fn clear_filters(&mut self) -> bool {
        self.set_criteria(FilterCriteria::default())
    }

    pub fn go_to_page(&mut self, page: usize) -> usize {
        self.page.go_to(page, self.filtered.len())
    }

    pub fn next_page(&mut self) -> bool {
        self.page.next(self.filtered.len())
    }

    pub fn previous_page(&mut self) -> bool {
        self.page.previous()
    }

    pub fn outcome(&self) -> ListingOutcome<'_> {
        let records = match self.feed.state() {
            LoadState::NotLoaded => return ListingOutcome::NotLoaded,
            LoadState::Loading => return ListingOutcome::Loading,
            LoadState::Failed(message) => {
                return ListingOutcome::Failed {
                    message: message.as_str(),
                }
            }
            LoadState::Loaded(records) => records,
        };
        if self.filtered.is_empty() {
            return ListingOutcome::NoMatches {
                total_loaded: records.len(),
            };
        }
        let count = self.filtered.len();
        let items = self
            .page
            .window(&self.filtered)
            .iter()
            .map(|&idx| &records[idx])
            .collect();
        ListingOutcome::Page(PageView {
            items,
            page: self.page.current_page(),
            total_pages: self.page.total_pages(count),
            total_matches: count,
            has_previous: self.page.has_previous(),
            has_next: self.page.has_next(count),
        })
    }

    /// Records on the current page without the surrounding status.
    pub fn visible(&self) -> Vec<&PropertyRecord> {
        match self.outcome() {
            ListingOutcome::Page(page) => page.items,
            _ => Vec::new(),
        }
    }

    fn refilter(&mut self) {
        self.filtered = self.engine.apply_indices(self.feed.records(), &self.criteria);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{numbered, record};
    use crate::page::window_for;
    use rentverse_core::PropertyType;

    fn loaded_view(records: Vec<PropertyRecord>) -> ListingView {
        ListingView::with_feed(ViewProfile::tenant(), PropertyFeed::loaded(records))
    }

    fn page_ids(view: &ListingView) -> Vec<String> {
        view.visible().iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn unfiltered_ten_records_page_six_then_four() {
        let mut view = loaded_view(numbered(10));
        assert_eq!(view.total_pages(), 2);
        assert_eq!(page_ids(&view), vec!["1", "2", "3", "4", "5", "6"]);
        assert!(view.next_page());
        assert_eq!(page_ids(&view), vec!["7", "8", "9", "10"]);
    }

    #[test]
    fn filter_change_resets_to_first_page_even_when_page_still_valid() {
        let mut view = loaded_view(numbered(20));
        view.go_to_page(3);
        assert_eq!(view.current_page(), 3);

        // 18 records still match, so page 3 would exist; the reset applies anyway.
        assert!(view.set_max_price(Some(9000.0)));
        assert_eq!(view.total_pages(), 3);
        assert_eq!(view.current_page(), 1);
    }

    #[test]
    fn every_criterion_change_resets_page_when_all_records_still_match() {
        let edits: [(&str, fn(&mut ListingView) -> bool); 5] = [
            ("location", |v| v.set_location("Bayan")),
            ("furnished", |v| v.set_furnished(FurnishedFilter::UnfurnishedOnly)),
            ("type", |v| v.set_property_type(TypeFilter::Only(PropertyType::House))),
            ("min_rooms", |v| v.set_min_rooms(1)),
            ("min_size", |v| v.set_min_size(10.0)),
        ];
        for (name, edit) in edits {
            let mut view = loaded_view(numbered(20));
            view.go_to_page(3);
            assert!(edit(&mut view), "{name} should change criteria");
            assert_eq!(view.match_count(), 20, "{name} keeps every record");
            assert_eq!(view.current_page(), 1, "{name} resets the page");
        }
    }

    #[test]
    fn narrowing_to_three_leaves_page_two_empty_and_unreachable() {
        let mut view = loaded_view(numbered(10));
        view.next_page();
        assert_eq!(view.current_page(), 2);

        view.set_max_price(Some(1500.0));
        assert_eq!(view.match_count(), 3);
        assert_eq!(view.total_pages(), 1);
        assert_eq!(view.current_page(), 1);

        let filtered = view.visible();
        assert!(window_for(&filtered, 2, 6).is_empty());
        assert!(!view.next_page());
        assert_eq!(view.go_to_page(2), 1);
    }

    #[test]
    fn unchanged_criteria_do_not_reset_page() {
        let mut view = loaded_view(numbered(20));
        view.go_to_page(2);
        assert!(!view.set_criteria(FilterCriteria::default()));
        assert!(!view.set_furnished(FurnishedFilter::Any));
        assert_eq!(view.current_page(), 2);
    }

    #[test]
    fn refresh_with_same_criteria_keeps_page_but_clamps() {
        let mut view = ListingView::new(ViewProfile::guest());
        let t = view.begin_fetch();
        view.complete_fetch(t, Ok(numbered(20)));
        view.go_to_page(3);

        let t = view.begin_fetch();
        assert!(view.complete_fetch(t, Ok(numbered(19))));
        assert_eq!(view.current_page(), 3);

        let t = view.begin_fetch();
        view.complete_fetch(t, Ok(numbered(7)));
        assert_eq!(view.current_page(), 2);
    }

    #[test]
    fn stale_fetch_results_are_ignored() {
        let mut view = ListingView::new(ViewProfile::guest());
        let first = view.begin_fetch();
        let second = view.begin_fetch();
        assert!(view.complete_fetch(second, Ok(numbered(2))));
        assert!(!view.complete_fetch(first, Ok(numbered(9))));
        assert_eq!(view.match_count(), 2);

        let third = view.begin_fetch();
        assert!(!view.complete_fetch(second, Err("late failure".into())));
        assert!(view.complete_fetch(third, Ok(numbered(4))));
        assert_eq!(view.match_count(), 4);
    }

    #[test]
    fn outcomes_are_distinguishable() {
        let mut view = ListingView::new(ViewProfile::guest());
        assert_eq!(view.outcome(), ListingOutcome::NotLoaded);

        let t = view.begin_fetch();
        assert_eq!(view.outcome(), ListingOutcome::Loading);

        view.complete_fetch(t, Err("Failed to fetch properties".into()));
        assert_eq!(
            view.outcome(),
            ListingOutcome::Failed {
                message: "Failed to fetch properties"
            }
        );

        // Manual retry.
        let t = view.begin_fetch();
        assert_eq!(view.outcome(), ListingOutcome::Loading);
        view.complete_fetch(t, Ok(numbered(3)));
        assert!(matches!(view.outcome(), ListingOutcome::Page(ref p) if p.total_matches == 3));

        view.set_location("atlantis");
        assert_eq!(view.outcome(), ListingOutcome::NoMatches { total_loaded: 3 });
    }

    #[test]
    fn refresh_keeps_showing_loaded_data() {
        let mut view = loaded_view(numbered(3));
        view.begin_fetch();
        assert!(matches!(view.outcome(), ListingOutcome::Page(_)));
    }

    #[test]
    fn profile_controls_which_criteria_apply() {
        let records = vec![
            {
                let mut r = record("small", PropertyType::House, 100.0);
                r.size = 20.0;
                r
            },
            record("big", PropertyType::House, 100.0),
        ];
        let mut guest = ListingView::with_feed(ViewProfile::guest(), PropertyFeed::loaded(records.clone()));
        let mut tenant = ListingView::with_feed(ViewProfile::tenant(), PropertyFeed::loaded(records));
        guest.set_min_size(50.0);
        tenant.set_min_size(50.0);
        assert_eq!(guest.match_count(), 2);
        assert_eq!(tenant.match_count(), 1);
        assert!(guest.active_criteria().is_empty());
        assert_eq!(tenant.active_criteria(), vec![Criterion::MinSize]);
    }

    #[test]
    fn toggle_type_and_clear_filters() {
        let mut view = loaded_view(vec![
            record("c", PropertyType::Condo, 100.0),
            record("h", PropertyType::House, 100.0),
        ]);
        let condo = TypeFilter::Only(PropertyType::Condo);
        view.toggle_property_type(condo.clone());
        assert_eq!(page_ids(&view), vec!["c"]);
        view.toggle_property_type(condo);
        assert_eq!(view.match_count(), 2);

        view.set_max_price(Some(10_000.0));
        assert_eq!(view.criteria().max_price, None);
        view.set_min_rooms(5);
        assert_eq!(view.match_count(), 0);
        assert!(view.clear_filters());
        assert!(view.criteria().is_default());
        assert_eq!(view.match_count(), 2);
    }
}
