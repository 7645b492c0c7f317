use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::Id;
use crate::models::{itinerary::ItineraryDetail, location::FeatureCollection, time};

/// Body of `POST /api/generate-itinerary`.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct GenerationRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub available_pois: Vec<CandidatePoi>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CandidatePoi {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub category: String,
    #[serde(default)]
    pub difficulty: String,
}

/// The JSON object the text generator is instructed to return.
#[derive(Debug, Deserialize, Clone)]
pub struct GenerationReply {
    #[serde(default)]
    pub display: String,
    pub data: GeneratedItinerary,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneratedItinerary {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "time::date")]
    pub start_date: NaiveDate,
    #[serde(with = "time::date")]
    pub end_date: NaiveDate,
    #[serde(alias = "dias")]
    pub days: Vec<GeneratedDay>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneratedDay {
    pub day: u32,
    pub points: Vec<GeneratedStop>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneratedStop {
    #[serde(alias = "poi", alias = "point_id")]
    pub point_of_interest: Id,
    pub order: u32,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Serialize)]
pub struct GenerationOutcome {
    pub display: String,
    pub itinerary_id: Id,
    pub itinerary: ItineraryDetail,
    pub geojson: FeatureCollection,
}
