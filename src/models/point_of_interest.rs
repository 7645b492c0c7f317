use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Id, Record};
use crate::models::{location::GeoPoint, time};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoiCategory {
    Monument,
    Museum,
    Park,
    Beach,
    Viewpoint,
    Other,
}

impl PoiCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoiCategory::Monument => "MONUMENT",
            PoiCategory::Museum => "MUSEUM",
            PoiCategory::Park => "PARK",
            PoiCategory::Beach => "BEACH",
            PoiCategory::Viewpoint => "VIEWPOINT",
            PoiCategory::Other => "OTHER",
        }
    }
}

impl FromStr for PoiCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MONUMENT" => Ok(PoiCategory::Monument),
            "MUSEUM" => Ok(PoiCategory::Museum),
            "PARK" => Ok(PoiCategory::Park),
            "BEACH" => Ok(PoiCategory::Beach),
            "VIEWPOINT" => Ok(PoiCategory::Viewpoint),
            "OTHER" => Ok(PoiCategory::Other),
            _ => Err(format!("unknown point of interest type '{}'", s)),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "EASY",
            Difficulty::Medium => "MEDIUM",
            Difficulty::Hard => "HARD",
        }
    }

    /// Ordinal used when averaging difficulty across points.
    pub fn level(&self) -> u8 {
        match self {
            Difficulty::Easy => 1,
            Difficulty::Medium => 2,
            Difficulty::Hard => 3,
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EASY" => Ok(Difficulty::Easy),
            "MEDIUM" => Ok(Difficulty::Medium),
            "HARD" => Ok(Difficulty::Hard),
            _ => Err(format!("unknown difficulty '{}'", s)),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PointOfInterest {
    #[serde(default)]
    pub id: Option<Id>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub address: String,
    #[serde(rename = "type")]
    pub category: PoiCategory,
    pub difficulty: Difficulty,
    #[serde(with = "time::hms")]
    pub estimated_time: TimeDelta,
    #[serde(default, with = "time::timestamp_opt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "time::timestamp_opt")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for PointOfInterest {
    const COLLECTION: &'static str = "PointsOfInterest";

    fn id(&self) -> Option<Id> {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = Some(id);
    }
}

/// One group of `GET /points-of-interest/by_type`.
#[derive(Debug, Serialize, Clone)]
pub struct CategorySummary {
    #[serde(rename = "type")]
    pub category: PoiCategory,
    pub count: usize,
    /// Mean of the difficulty ordinals (easy = 1, medium = 2, hard = 3).
    pub avg_difficulty: Option<f64>,
    pub points: Vec<PointOfInterest>,
}
