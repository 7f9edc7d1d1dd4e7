//! Hazard records and the values used to create and edit them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};

use crate::error::HazardError;
use crate::geo_math::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HazardId(pub u64);

impl fmt::Display for HazardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of the reporting user, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReporterId(pub String);

impl fmt::Display for ReporterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReporterId {
    fn from(s: &str) -> Self {
        ReporterId(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HazardCategory {
    /// Dog off its leash
    Leash,
    /// Dog without a muzzle
    Muzzle,
    AggressiveDog,
    HazardousMaterial,
    Wildlife,
    LowLight,
    /// Bicycle or vehicle traffic
    BikeCar,
    /// Waste not collected
    PoopLeft,
}

impl HazardCategory {
    pub const ALL: [HazardCategory; 8] = [
        HazardCategory::Leash,
        HazardCategory::Muzzle,
        HazardCategory::AggressiveDog,
        HazardCategory::HazardousMaterial,
        HazardCategory::Wildlife,
        HazardCategory::LowLight,
        HazardCategory::BikeCar,
        HazardCategory::PoopLeft,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HazardCategory::Leash => "LEASH",
            HazardCategory::Muzzle => "MUZZLE",
            HazardCategory::AggressiveDog => "AGGRESSIVE_DOG",
            HazardCategory::HazardousMaterial => "HAZARDOUS_MATERIAL",
            HazardCategory::Wildlife => "WILDLIFE",
            HazardCategory::LowLight => "LOW_LIGHT",
            HazardCategory::BikeCar => "BIKE_CAR",
            HazardCategory::PoopLeft => "POOP_LEFT",
        }
    }
}

impl fmt::Display for HazardCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HazardCategory {
    type Err = HazardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        HazardCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| HazardError::validation(format!("unknown hazard category '{}'", s)))
    }
}

// Accepts any casing, same as `FromStr`.
impl<'de> Deserialize<'de> for HazardCategory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Lifecycle of a record. `Deleted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum HazardState {
    Active,
    Deleted { at: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HazardRecord {
    pub(crate) id: HazardId,
    pub(crate) category: HazardCategory,
    pub(crate) location: GeoPoint,
    pub(crate) description: Option<String>,
    pub(crate) image_ref: Option<String>,
    pub(crate) reporter_id: ReporterId,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) state: HazardState,
}

impl HazardRecord {
    pub fn id(&self) -> HazardId {
        self.id
    }

    pub fn category(&self) -> HazardCategory {
        self.category
    }

    pub fn location(&self) -> GeoPoint {
        self.location
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn image_ref(&self) -> Option<&str> {
        self.image_ref.as_deref()
    }

    pub fn reporter_id(&self) -> &ReporterId {
        &self.reporter_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> HazardState {
        self.state
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self.state {
            HazardState::Active => None,
            HazardState::Deleted { at } => Some(at),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, HazardState::Active)
    }
}

/// Input of a hazard report. Coordinates are checked when the report is
/// inserted.
#[derive(Debug, Clone)]
pub struct NewHazard {
    pub reporter_id: ReporterId,
    pub category: HazardCategory,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub image_ref: Option<String>,
}

/// Edit of an existing report. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct HazardPatch {
    pub category: Option<HazardCategory>,
    pub description: Option<String>,
    /// (latitude, longitude)
    pub location: Option<(f64, f64)>,
    pub image_ref: Option<String>,
}

/// Optional restrictions applied on top of a radius or category query.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HazardFilter {
    pub category: Option<HazardCategory>,
    pub reported_since: Option<DateTime<Utc>>,
}

impl HazardFilter {
    pub fn category(category: HazardCategory) -> Self {
        Self {
            category: Some(category),
            ..Self::default()
        }
    }

    pub fn since(mut self, at: DateTime<Utc>) -> Self {
        self.reported_since = Some(at);
        self
    }

    pub fn matches(&self, record: &HazardRecord) -> bool {
        self.category.is_none_or(|c| c == record.category)
            && self.reported_since.is_none_or(|t| record.created_at >= t)
    }
}

/// A hazard returned by a radius query, with its distance from the query
/// center.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyHazard {
    #[serde(flatten)]
    pub hazard: HazardRecord,
    pub distance_meters: f64,
}
