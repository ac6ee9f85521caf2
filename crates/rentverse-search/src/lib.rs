//! Listing search for Rentverse: conjunctive filtering, page windowing,
//! query-string sync and the per-view state that ties them together.

pub mod filter;
pub mod page;
pub mod profile;
pub mod query;
pub mod view;

pub use filter::{apply, Criterion, FilterEngine};
pub use page::{total_pages, window_for, PageState, DEFAULT_ITEMS_PER_PAGE};
pub use profile::{ProfileError, ProfileRegistry, ViewProfile};
pub use query::{
    reflect_criteria, reflect_into_url, seed_criteria, FilterParams, LOCATION_PARAM, TYPE_PARAM,
};
pub use view::{FetchTicket, ListingOutcome, ListingView, LoadState, PageView, PropertyFeed};

pub const CRATE_NAME: &str = "rentverse-search";
