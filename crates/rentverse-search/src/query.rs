//! Query-string mirror of filter state.
//!
//! `type` and `location` are the two parameters shared with the browser URL:
//! they seed criteria on load and are written back (lower-cased) on every
//! edit, with inactive values removing their parameter. The remaining
//! parameters only exist so server-rendered pages stay bookmarkable.

use rentverse_core::{FilterCriteria, FurnishedFilter, TypeFilter};
use serde::{Deserialize, Serialize};
use url::form_urlencoded;
use url::Url;

use crate::profile::ViewProfile;

pub const TYPE_PARAM: &str = "type";
pub const LOCATION_PARAM: &str = "location";

/// Seed the mirrored fields of `criteria` from a raw query string.
/// Parameters that are absent leave the criterion inactive.
pub fn seed_criteria(query: &str, criteria: &mut FilterCriteria) {
    criteria.property_type = TypeFilter::Any;
    criteria.location_text.clear();
    for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
        match &*key {
            TYPE_PARAM => criteria.property_type = parse_type(&value),
            LOCATION_PARAM => criteria.location_text = value.into_owned(),
            _ => {}
        }
    }
}

/// Rewrite `query` so its `type`/`location` pairs reflect `criteria`,
/// keeping every other parameter in place.
pub fn reflect_criteria(query: &str, criteria: &FilterCriteria) -> String {
    let mut out = form_urlencoded::Serializer::new(String::new());
    for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
        if key != TYPE_PARAM && key != LOCATION_PARAM {
            out.append_pair(&key, &value);
        }
    }
    if let Some(ty) = type_value(criteria) {
        out.append_pair(TYPE_PARAM, &ty);
    }
    if let Some(location) = location_value(criteria) {
        out.append_pair(LOCATION_PARAM, &location);
    }
    out.finish()
}

/// [`reflect_criteria`] applied to a full URL; an empty result drops the `?`.
pub fn reflect_into_url(url: &mut Url, criteria: &FilterCriteria) {
    let query = reflect_criteria(url.query().unwrap_or_default(), criteria);
    if query.is_empty() {
        url.set_query(None);
    } else {
        url.set_query(Some(&query));
    }
}

fn parse_type(value: &str) -> TypeFilter {
    value.parse().unwrap_or_default()
}

fn type_value(criteria: &FilterCriteria) -> Option<String> {
    match &criteria.property_type {
        TypeFilter::Any => None,
        TypeFilter::Only(ty) => Some(ty.as_str().to_lowercase()),
    }
}

fn location_value(criteria: &FilterCriteria) -> Option<String> {
    criteria.location_needle()
}

/// Every filter the listing pages accept on the query string. Values stay
/// strings so a malformed number degrades to "absent" instead of rejecting
/// the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterParams {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rooms: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub furnished: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
}

impl FilterParams {
    pub fn parse(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            let value = Some(value.into_owned());
            match &*key {
                TYPE_PARAM => params.property_type = value,
                LOCATION_PARAM => params.location = value,
                "min_price" => params.min_price = value,
                "max_price" => params.max_price = value,
                "min_rooms" => params.min_rooms = value,
                "min_size" => params.min_size = value,
                "furnished" => params.furnished = value,
                "page" => params.page = value,
                _ => {}
            }
        }
        params
    }

    pub fn to_criteria(&self, profile: &ViewProfile) -> FilterCriteria {
        FilterCriteria {
            location_text: self.location.clone().unwrap_or_default(),
            property_type: self.property_type.as_deref().map(parse_type).unwrap_or_default(),
            min_price: parse_number(self.min_price.as_deref()).unwrap_or(0.0),
            max_price: profile.normalize_max_price(parse_number(self.max_price.as_deref())),
            min_rooms: self
                .min_rooms
                .as_deref()
                .and_then(|v| v.trim().parse::<i64>().ok())
                .unwrap_or(0),
            min_size: parse_number(self.min_size.as_deref()).unwrap_or(0.0),
            furnished: self
                .furnished
                .as_deref()
                .and_then(|v| v.parse::<FurnishedFilter>().ok())
                .unwrap_or_default(),
        }
    }

    /// Requested page, if any. Zero and garbage count as "first page".
    pub fn page(&self) -> Option<usize> {
        self.page
            .as_deref()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .map(|p| p.max(1))
    }

    pub fn from_criteria(criteria: &FilterCriteria, page: Option<usize>) -> Self {
        let positive = |v: f64| (v != 0.0 && !v.is_nan()).then(|| format_number(v));
        Self {
            property_type: type_value(criteria),
            location: location_value(criteria),
            min_price: positive(criteria.min_price),
            max_price: criteria.max_price.filter(|v| !v.is_nan()).map(format_number),
            min_rooms: (criteria.min_rooms != 0).then(|| criteria.min_rooms.to_string()),
            min_size: positive(criteria.min_size),
            furnished: criteria.furnished.as_query_value().map(str::to_string),
            page: page.filter(|p| *p > 1).map(|p| p.to_string()),
        }
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = (page > 1).then(|| page.to_string());
        self
    }

    pub fn to_query_string(&self) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());
        let pairs = [
            (TYPE_PARAM, &self.property_type),
            (LOCATION_PARAM, &self.location),
            ("min_price", &self.min_price),
            ("max_price", &self.max_price),
            ("min_rooms", &self.min_rooms),
            ("min_size", &self.min_size),
            ("furnished", &self.furnished),
            ("page", &self.page),
        ];
        for (key, value) in pairs {
            if let Some(value) = value {
                out.append_pair(key, value);
            }
        }
        out.finish()
    }
}

fn parse_number(value: Option<&str>) -> Option<f64> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| !v.is_nan())
}

fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
