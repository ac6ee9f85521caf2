//! Per-view criterion sets (guest, tenant, owner) with optional YAML overrides.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filter::{Criterion, FilterEngine};
use crate::page::DEFAULT_ITEMS_PER_PAGE;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("reading view profiles from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing view profiles: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unknown view profile `{0}`")]
    Unknown(String),
    #[error("view profile `{0}` must show at least one item per page")]
    InvalidPageSize(String),
}

/// Which criteria a listing page exposes and how it pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewProfile {
    pub name: String,
    pub criteria: Vec<Criterion>,
    #[serde(default = "default_items_per_page")]
    pub items_per_page: usize,
    /// Upper end of the price slider; a ceiling at or above it means "no ceiling".
    #[serde(default)]
    pub price_slider_max: Option<f64>,
    #[serde(default)]
    pub price_slider_step: Option<f64>,
}

fn default_items_per_page() -> usize {
    DEFAULT_ITEMS_PER_PAGE
}

impl ViewProfile {
    pub fn guest() -> Self {
        Self {
            name: "guest".into(),
            criteria: vec![
                Criterion::Location,
                Criterion::PropertyType,
                Criterion::MinPrice,
                Criterion::MaxPrice,
                Criterion::MinRooms,
                Criterion::Furnished,
            ],
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            price_slider_max: None,
            price_slider_step: None,
        }
    }

    pub fn tenant() -> Self {
        Self {
            name: "tenant".into(),
            criteria: vec![
                Criterion::Location,
                Criterion::PropertyType,
                Criterion::MaxPrice,
                Criterion::MinRooms,
                Criterion::MinSize,
                Criterion::Furnished,
            ],
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            price_slider_max: Some(10_000.0),
            price_slider_step: Some(500.0),
        }
    }

    pub fn owner() -> Self {
        Self {
            name: "owner".into(),
            criteria: vec![Criterion::Location, Criterion::PropertyType, Criterion::MaxPrice],
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            price_slider_max: Some(10_000.0),
            price_slider_step: None,
        }
    }

    pub fn engine(&self) -> FilterEngine {
        FilterEngine::new(self.criteria.iter().copied())
    }

    pub fn exposes(&self, criterion: Criterion) -> bool {
        self.criteria.contains(&criterion)
    }

    /// Map a raw ceiling onto the criteria's "no ceiling" encoding.
    pub fn normalize_max_price(&self, max_price: Option<f64>) -> Option<f64> {
        match (max_price, self.price_slider_max) {
            (Some(v), _) if v.is_nan() => None,
            (Some(v), Some(slider_max)) if v >= slider_max => None,
            (value, _) => value,
        }
    }

    fn validate(&self) -> Result<(), ProfileError> {
        if self.items_per_page == 0 {
            return Err(ProfileError::InvalidPageSize(self.name.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ViewsYaml {
    views: Vec<ViewProfile>,
}

/// Named profiles; built-ins can be replaced or extended from `views.yaml`.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, ViewProfile>,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProfileRegistry {
    pub fn builtin() -> Self {
        let profiles = [ViewProfile::guest(), ViewProfile::tenant(), ViewProfile::owner()]
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();
        Self { profiles }
    }

    /// Built-ins overlaid with the profiles in `yaml`.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ProfileError> {
        let parsed: ViewsYaml = serde_yaml::from_str(yaml)?;
        let mut registry = Self::builtin();
        for profile in parsed.views {
            profile.validate()?;
            registry.profiles.insert(profile.name.clone(), profile);
        }
        Ok(registry)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn get(&self, name: &str) -> Option<&ViewProfile> {
        self.profiles.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&ViewProfile, ProfileError> {
        self.get(name)
            .ok_or_else(|| ProfileError::Unknown(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_profiles_are_registered() {
        let registry = ProfileRegistry::builtin();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["guest", "owner", "tenant"]);
        assert!(registry.require("admin").is_err());
        assert!(registry.require("tenant").unwrap().exposes(Criterion::MinSize));
        assert!(!registry.require("guest").unwrap().exposes(Criterion::MinSize));
    }

    #[test]
    fn slider_max_means_no_ceiling() {
        let tenant = ViewProfile::tenant();
        assert_eq!(tenant.normalize_max_price(Some(10_000.0)), None);
        assert_eq!(tenant.normalize_max_price(Some(5_000.0)), Some(5_000.0));
        assert_eq!(ViewProfile::guest().normalize_max_price(Some(50_000.0)), Some(50_000.0));
        assert_eq!(tenant.normalize_max_price(Some(f64::NAN)), None);
    }

    #[test]
    fn yaml_overrides_and_extends_builtins() {
        let yaml = r#"
views:
  - name: guest
    criteria: [location, property_type]
    items_per_page: 9
  - name: admin
    criteria: [location]
"#;
        let registry = ProfileRegistry::from_yaml_str(yaml).unwrap();
        let guest = registry.require("guest").unwrap();
        assert_eq!(guest.items_per_page, 9);
        assert_eq!(guest.criteria, vec![Criterion::Location, Criterion::PropertyType]);
        assert_eq!(registry.require("admin").unwrap().items_per_page, DEFAULT_ITEMS_PER_PAGE);
        assert!(registry.get("tenant").is_some());
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let yaml = "views:\n  - name: broken\n    criteria: []\n    items_per_page: 0\n";
        assert!(matches!(
            ProfileRegistry::from_yaml_str(yaml),
            Err(ProfileError::InvalidPageSize(name)) if name == "broken"
        ));
    }

    #[test]
    fn load_reads_views_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "views:\n  - name: owner\n    criteria: [max_price]").expect("write");
        let registry = ProfileRegistry::load(file.path()).expect("load");
        assert_eq!(registry.require("owner").unwrap().criteria, vec![Criterion::MaxPrice]);
        assert!(matches!(
            ProfileRegistry::load(file.path().with_extension("missing")),
            Err(ProfileError::Io { .. })
        ));
    }
}
