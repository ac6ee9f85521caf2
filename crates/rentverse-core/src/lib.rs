//! Core domain model for Rentverse listings and search criteria.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "rentverse-core";

/// Kind of rental listing. Parsing is case-insensitive; anything outside the
/// known set is kept verbatim as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PropertyType {
    Condo,
    Apartment,
    Office,
    House,
    Penthouse,
    Other(String),
}

impl PropertyType {
    pub const ALL: [PropertyType; 5] = [
        PropertyType::Condo,
        PropertyType::Apartment,
        PropertyType::Office,
        PropertyType::House,
        PropertyType::Penthouse,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            PropertyType::Condo => "Condo",
            PropertyType::Apartment => "Apartment",
            PropertyType::Office => "Office",
            PropertyType::House => "House",
            PropertyType::Penthouse => "Penthouse",
            PropertyType::Other(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, PropertyType::Other(_))
    }
}

impl From<String> for PropertyType {
    fn from(value: String) -> Self {
        let normalized = value
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "condo" => PropertyType::Condo,
            "apartment" => PropertyType::Apartment,
            "office" => PropertyType::Office,
            "house" => PropertyType::House,
            // The tenant view labels this "Pent House".
            "penthouse" => PropertyType::Penthouse,
            _ => PropertyType::Other(value),
        }
    }
}

impl From<PropertyType> for String {
    fn from(value: PropertyType) -> Self {
        match value {
            PropertyType::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review/availability state reported by the backend. Admin views see the
/// approval states, tenant views see availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyStatus {
    Pending,
    Approved,
    Rejected,
    Available,
    Unavailable,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    pub id: Option<String>,
    pub area: String,
    pub town: String,
    pub state: String,
    pub country: String,
    pub street_name: String,
    pub building_name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl Address {
    /// Text fields searched by the location filter.
    pub fn searchable_fields(&self) -> [&str; 6] {
        [
            &self.area,
            &self.town,
            &self.state,
            &self.country,
            &self.street_name,
            &self.building_name,
        ]
    }

    pub fn display_line(&self) -> String {
        [&self.area, &self.town, &self.state, &self.country]
            .into_iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyImage {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyOwner {
    pub id: Option<String>,
    pub name: String,
    pub email: String,
}

/// One rental listing as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub property_type: PropertyType,
    #[serde(default)]
    pub number_of_rooms: u32,
    #[serde(default)]
    pub size: f64,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub furnished: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub images: Vec<PropertyImage>,
    #[serde(default)]
    pub owner: Option<PropertyOwner>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub status: Option<PropertyStatus>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub address_id: Option<String>,
    #[serde(default)]
    pub ownership_certificate_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PropertyRecord {
    pub fn cover_image(&self) -> Option<&PropertyImage> {
        self.images.first()
    }
}

/// Response wrapper used by every backend endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Collapse the envelope into its payload or the backend's failure message.
    pub fn into_result(self) -> Result<T, String> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err(self
                .message
                .unwrap_or_else(|| "response carried no data".to_string())),
            (false, _) => Err(self
                .message
                .unwrap_or_else(|| "request was not successful".to_string())),
        }
    }
}

/// Property-type constraint. `Any` covers both the empty selection and the
/// "All" button.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TypeFilter {
    #[default]
    Any,
    Only(PropertyType),
}

impl TypeFilter {
    pub fn is_active(&self) -> bool {
        matches!(self, TypeFilter::Only(_))
    }
}

impl FromStr for TypeFilter {
    type Err = std::convert::Infallible;

    /// Unknown names resolve to `Any` so a bad link never hides every listing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(TypeFilter::Any);
        }
        let parsed = PropertyType::from(trimmed.to_string());
        Ok(if parsed.is_known() {
            TypeFilter::Only(parsed)
        } else {
            TypeFilter::Any
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FurnishedFilter {
    #[default]
    Any,
    FurnishedOnly,
    UnfurnishedOnly,
}

impl FurnishedFilter {
    pub fn as_query_value(self) -> Option<&'static str> {
        match self {
            FurnishedFilter::Any => None,
            FurnishedFilter::FurnishedOnly => Some("furnished"),
            FurnishedFilter::UnfurnishedOnly => Some("unfurnished"),
        }
    }
}

impl FromStr for FurnishedFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "furnished" | "furnished-only" | "true" | "yes" => FurnishedFilter::FurnishedOnly,
            "unfurnished" | "unfurnished-only" | "false" | "no" => FurnishedFilter::UnfurnishedOnly,
            _ => FurnishedFilter::Any,
        })
    }
}

/// Current user-selected constraints narrowing a listing.
///
/// Every field's `Default` is its inactive value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub location_text: String,
    pub property_type: TypeFilter,
    pub min_price: f64,
    /// `None` means no ceiling.
    pub max_price: Option<f64>,
    pub min_rooms: i64,
    pub min_size: f64,
    pub furnished: FurnishedFilter,
}

impl FilterCriteria {
    pub fn is_default(&self) -> bool {
        self == &FilterCriteria::default()
    }

    /// Lower-cased location needle, or `None` when the text is empty.
    /// Whitespace is part of the needle.
    pub fn location_needle(&self) -> Option<String> {
        if self.location_text.is_empty() {
            None
        } else {
            Some(self.location_text.to_lowercase())
        }
    }
}
