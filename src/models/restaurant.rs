use std::{collections::BTreeMap, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Id, Record};
use crate::models::{location::GeoPoint, time};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CuisineType {
    Local,
    Spanish,
    International,
}

impl CuisineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CuisineType::Local => "LOCAL",
            CuisineType::Spanish => "SPANISH",
            CuisineType::International => "INTERNATIONAL",
        }
    }
}

impl FromStr for CuisineType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOCAL" => Ok(CuisineType::Local),
            "SPANISH" => Ok(CuisineType::Spanish),
            "INTERNATIONAL" => Ok(CuisineType::International),
            _ => Err(format!("unknown cuisine type '{}'", s)),
        }
    }
}

pub const MIN_PRICE_RANGE: u8 = 1;
pub const MAX_PRICE_RANGE: u8 = 3;

fn default_price_range() -> u8 {
    MIN_PRICE_RANGE
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TimeSlot {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Restaurant {
    #[serde(default)]
    pub id: Option<Id>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub address: String,
    pub cuisine_type: CuisineType,
    /// 1 (€) to 3 (€€€).
    #[serde(default = "default_price_range")]
    pub price_range: u8,
    /// Weekday name to opening slots, e.g. `"monday": [{"start": "12:00", "end": "16:00"}]`.
    #[serde(default)]
    pub opening_hours: BTreeMap<String, Vec<TimeSlot>>,
    #[serde(default, with = "time::timestamp_opt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "time::timestamp_opt")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Restaurant {
    const COLLECTION: &'static str = "Restaurants";

    fn id(&self) -> Option<Id> {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = Some(id);
    }
}
