//! Conjunctive property filtering.

use rentverse_core::{FilterCriteria, FurnishedFilter, PropertyRecord, TypeFilter};
use serde::{Deserialize, Serialize};

/// One filterable dimension. A view lists the criteria it exposes; the engine
/// never evaluates the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Location,
    PropertyType,
    MinPrice,
    MaxPrice,
    MinRooms,
    MinSize,
    Furnished,
}

impl Criterion {
    pub const ALL: [Criterion; 7] = [
        Criterion::Location,
        Criterion::PropertyType,
        Criterion::MinPrice,
        Criterion::MaxPrice,
        Criterion::MinRooms,
        Criterion::MinSize,
        Criterion::Furnished,
    ];

    /// Whether `criteria` holds a non-inactive value for this dimension.
    pub fn is_active(self, criteria: &FilterCriteria) -> bool {
        match self {
            Criterion::Location => criteria.location_needle().is_some(),
            Criterion::PropertyType => criteria.property_type.is_active(),
            Criterion::MinPrice => is_set(criteria.min_price),
            Criterion::MaxPrice => criteria.max_price.is_some_and(|v| !v.is_nan()),
            Criterion::MinRooms => criteria.min_rooms != 0,
            Criterion::MinSize => is_set(criteria.min_size),
            Criterion::Furnished => criteria.furnished != FurnishedFilter::Any,
        }
    }

    pub fn matches(self, record: &PropertyRecord, criteria: &FilterCriteria) -> bool {
        let needle = criteria.location_needle();
        self.matches_prepared(record, criteria, needle.as_deref())
    }

    fn matches_prepared(
        self,
        record: &PropertyRecord,
        criteria: &FilterCriteria,
        needle: Option<&str>,
    ) -> bool {
        if !self.is_active(criteria) {
            return true;
        }
        match self {
            Criterion::Location => needle.is_none_or(|n| location_contains(record, n)),
            Criterion::PropertyType => match &criteria.property_type {
                TypeFilter::Any => true,
                TypeFilter::Only(wanted) => &record.property_type == wanted,
            },
            Criterion::MinPrice => record.price >= criteria.min_price,
            Criterion::MaxPrice => criteria.max_price.is_none_or(|max| record.price <= max),
            Criterion::MinRooms => i64::from(record.number_of_rooms) >= criteria.min_rooms,
            Criterion::MinSize => record.size >= criteria.min_size,
            Criterion::Furnished => match criteria.furnished {
                FurnishedFilter::Any => true,
                FurnishedFilter::FurnishedOnly => record.furnished,
                FurnishedFilter::UnfurnishedOnly => !record.furnished,
            },
        }
    }
}

/// Only 0 switches a numeric minimum off; NaN counts as unset.
fn is_set(value: f64) -> bool {
    value != 0.0 && !value.is_nan()
}

/// `needle` must already be lower-cased.
fn location_contains(record: &PropertyRecord, needle: &str) -> bool {
    let hit = |field: &str| !field.is_empty() && field.to_lowercase().contains(needle);
    record
        .address
        .as_ref()
        .is_some_and(|addr| addr.searchable_fields().into_iter().any(hit))
        || hit(&record.name)
}

/// Evaluates a fixed set of criteria against property collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterEngine {
    criteria: Vec<Criterion>,
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new(Criterion::ALL)
    }
}

impl FilterEngine {
    pub fn new(criteria: impl IntoIterator<Item = Criterion>) -> Self {
        let mut criteria = criteria.into_iter().collect::<Vec<_>>();
        criteria.sort();
        criteria.dedup();
        Self { criteria }
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    /// Criteria this engine evaluates that currently narrow the result.
    pub fn active_criteria(&self, criteria: &FilterCriteria) -> Vec<Criterion> {
        self.criteria
            .iter()
            .copied()
            .filter(|c| c.is_active(criteria))
            .collect()
    }

    pub fn matches(&self, record: &PropertyRecord, criteria: &FilterCriteria) -> bool {
        let needle = criteria.location_needle();
        self.matches_with(record, criteria, needle.as_deref())
    }

    fn matches_with(
        &self,
        record: &PropertyRecord,
        criteria: &FilterCriteria,
        needle: Option<&str>,
    ) -> bool {
        self.criteria
            .iter()
            .all(|c| c.matches_prepared(record, criteria, needle))
    }

    /// Records passing every criterion, in input order.
    pub fn apply<'a>(
        &self,
        properties: &'a [PropertyRecord],
        criteria: &FilterCriteria,
    ) -> Vec<&'a PropertyRecord> {
        let needle = criteria.location_needle();
        properties
            .iter()
            .filter(|p| self.matches_with(p, criteria, needle.as_deref()))
            .collect()
    }

    /// Like [`FilterEngine::apply`] but yields positions into `properties`.
    pub fn apply_indices(&self, properties: &[PropertyRecord], criteria: &FilterCriteria) -> Vec<usize> {
        let needle = criteria.location_needle();
        properties
            .iter()
            .enumerate()
            .filter(|(_, p)| self.matches_with(p, criteria, needle.as_deref()))
            .map(|(idx, _)| idx)
            .collect()
    }
}

/// Filter with every criterion enabled.
pub fn apply<'a>(properties: &'a [PropertyRecord], criteria: &FilterCriteria) -> Vec<&'a PropertyRecord> {
    FilterEngine::default().apply(properties, criteria)
}
