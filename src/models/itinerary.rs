use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Id, Record};
use crate::models::{
    place::{PlaceDetails, PlaceRef},
    time,
};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Itinerary {
    #[serde(default)]
    pub id: Option<Id>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub user: Option<Id>,
    #[serde(with = "time::date")]
    pub start_date: NaiveDate,
    #[serde(with = "time::date")]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default, with = "time::timestamp_opt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "time::timestamp_opt")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Itinerary {
    pub fn validate_dates(&self) -> Result<(), String> {
        if self.start_date > self.end_date {
            return Err("start_date must not be after end_date".to_string());
        }
        Ok(())
    }
}

impl Record for Itinerary {
    const COLLECTION: &'static str = "Itineraries";

    fn id(&self) -> Option<Id> {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = Some(id);
    }
}

/// Largest `day` or `order` a point may hold. MongoDB stores both as 32-bit integers.
pub const MAX_POSITION: u32 = i32::MAX as u32;

/// A scheduled visit. `day` and `order` are 1-based; `order` ranks the visits of one day.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ItineraryPoint {
    #[serde(default)]
    pub id: Option<Id>,
    pub itinerary: Id,
    /// `None` once the referenced place has been deleted.
    #[serde(default)]
    pub place: Option<PlaceRef>,
    pub day: u32,
    pub order: u32,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub is_visited: bool,
    #[serde(default, with = "time::timestamp_opt")]
    pub visited_at: Option<DateTime<Utc>>,
    #[serde(default, with = "time::hms_opt")]
    pub actual_time_spent: Option<TimeDelta>,
}

impl ItineraryPoint {
    pub fn new(itinerary: Id, place: PlaceRef, day: u32, order: u32, notes: String) -> Self {
        Self {
            id: None,
            itinerary,
            place: Some(place),
            day,
            order,
            notes,
            is_visited: false,
            visited_at: None,
            actual_time_spent: None,
        }
    }
}

impl Record for ItineraryPoint {
    const COLLECTION: &'static str = "ItineraryPoints";

    fn id(&self) -> Option<Id> {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = Some(id);
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct PointDetail {
    #[serde(flatten)]
    pub point: ItineraryPoint,
    pub point_details: Option<PlaceDetails>,
}

#[derive(Debug, Serialize, Clone)]
pub struct ItineraryDetail {
    #[serde(flatten)]
    pub itinerary: Itinerary,
    pub points: Vec<PointDetail>,
}

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct RatingSummary {
    pub count: u64,
    pub average: Option<f64>,
    pub scenery: Option<f64>,
    pub accessibility: Option<f64>,
    pub signposting: Option<f64>,
    pub cleanliness: Option<f64>,
    pub services: Option<f64>,
}
