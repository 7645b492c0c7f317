use std::collections::BTreeMap;

use bson::{doc, Bson};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use crate::db::{Filter, Id, Query, Record, SortKey, Store, WriteBatch};
use crate::error::ApiError;
use crate::models::{
    event::Event,
    itinerary::ItineraryPoint,
    location::GeoPoint,
    place::{Nearby, PlaceKind, PlaceRef},
    point_of_interest::{CategorySummary, Difficulty, PoiCategory, PointOfInterest},
    restaurant::{CuisineType, Restaurant, MAX_PRICE_RANGE, MIN_PRICE_RANGE},
    time,
};
use crate::services::resource_service::Resource;

pub const POI_RADIUS_KM: f64 = 10.0;
pub const RESTAURANT_RADIUS_KM: f64 = 5.0;
pub const EVENT_RADIUS_KM: f64 = 10.0;

const PLACE_SEARCH_FIELDS: &[&str] = &["name", "description"];

#[derive(Debug, Deserialize)]
pub struct NearbyParams {
    pub lat: f64,
    pub lng: f64,
    /// Radius in kilometres.
    pub max_distance: Option<f64>,
}

impl NearbyParams {
    fn resolve(&self, default_radius: f64) -> Result<(GeoPoint, f64), ApiError> {
        let center = GeoPoint::new(self.lat, self.lng);
        center.validate().map_err(ApiError::BadRequest)?;

        let radius = self.max_distance.unwrap_or(default_radius);
        if !radius.is_finite() || radius <= 0.0 {
            return Err(ApiError::bad_request("max_distance must be a positive number of kilometres"));
        }
        Ok((center, radius))
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct PoiFilters {
    #[serde(rename = "type")]
    pub category: Option<PoiCategory>,
    pub difficulty: Option<Difficulty>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RestaurantFilters {
    pub cuisine_type: Option<CuisineType>,
    pub price_range: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
pub struct EventFilters {
    /// Events starting on or after this instant.
    pub start_date: Option<String>,
    /// Events ending on or before this instant.
    pub end_date: Option<String>,
}

fn require_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }
    Ok(())
}

fn validate_location(location: &GeoPoint) -> Result<(), ApiError> {
    location.validate().map_err(ApiError::BadRequest)
}

fn timestamp_param(field: &str, raw: &str) -> Result<String, ApiError> {
    time::parse_timestamp(raw)
        .map(|instant| time::format_timestamp(&instant))
        .ok_or_else(|| ApiError::bad_request(format!("{} must be a date or RFC 3339 timestamp", field)))
}

/// Nulls the `place` of itinerary points that reference the deleted place.
fn detach_points(kind: PlaceKind, id: Id) -> WriteBatch {
    let mut batch = WriteBatch::new();
    batch.update::<ItineraryPoint>(PlaceRef::filter(kind, [id]), doc! { "place": Bson::Null });
    batch
}

impl Resource for PointOfInterest {
    const NAME: &'static str = "Point of interest";
    const SEARCH_FIELDS: &'static [&'static str] = PLACE_SEARCH_FIELDS;
    const ORDERING_FIELDS: &'static [&'static str] = &["name", "created_at"];
    const DEFAULT_ORDERING: &'static [&'static str] = &["id"];

    type Filters = PoiFilters;
    type View = PointOfInterest;

    fn filter(filters: &PoiFilters) -> Result<Filter, ApiError> {
        let mut filter = Filter::All;
        if let Some(category) = filters.category {
            filter = filter.and(Filter::eq("type", category.as_str()));
        }
        if let Some(difficulty) = filters.difficulty {
            filter = filter.and(Filter::eq("difficulty", difficulty.as_str()));
        }
        Ok(filter)
    }

    fn prepare(&mut self, existing: Option<&Self>) {
        let now = time::now();
        self.id = existing.and_then(|e| e.id);
        self.created_at = existing.and_then(|e| e.created_at).or(Some(now));
        self.updated_at = Some(now);
    }

    async fn validate<S: Store>(&self, _store: &S) -> Result<(), ApiError> {
        require_name(&self.name)?;
        if let Some(location) = &self.location {
            validate_location(location)?;
        }
        Ok(())
    }

    async fn present<S: Store>(_store: &S, records: Vec<Self>) -> Result<Vec<Self::View>, ApiError> {
        Ok(records)
    }

    fn cascade(id: Id) -> WriteBatch {
        detach_points(PlaceKind::Poi, id)
    }
}

impl Resource for Restaurant {
    const NAME: &'static str = "Restaurant";
    const SEARCH_FIELDS: &'static [&'static str] = PLACE_SEARCH_FIELDS;
    const ORDERING_FIELDS: &'static [&'static str] = &["name", "created_at"];
    const DEFAULT_ORDERING: &'static [&'static str] = &["id"];

    type Filters = RestaurantFilters;
    type View = Restaurant;

    fn filter(filters: &RestaurantFilters) -> Result<Filter, ApiError> {
        let mut filter = Filter::All;
        if let Some(cuisine) = filters.cuisine_type {
            filter = filter.and(Filter::eq("cuisine_type", cuisine.as_str()));
        }
        if let Some(price_range) = filters.price_range {
            filter = filter.and(Filter::eq("price_range", i32::from(price_range)));
        }
        Ok(filter)
    }

    fn prepare(&mut self, existing: Option<&Self>) {
        let now = time::now();
        self.id = existing.and_then(|e| e.id);
        self.created_at = existing.and_then(|e| e.created_at).or(Some(now));
        self.updated_at = Some(now);
    }

    async fn validate<S: Store>(&self, _store: &S) -> Result<(), ApiError> {
        require_name(&self.name)?;
        validate_location(&self.location)?;
        if !(MIN_PRICE_RANGE..=MAX_PRICE_RANGE).contains(&self.price_range) {
            return Err(ApiError::bad_request(format!(
                "price_range must be between {} and {}",
                MIN_PRICE_RANGE, MAX_PRICE_RANGE
            )));
        }
        for (day, slots) in &self.opening_hours {
            for slot in slots {
                let start = time::parse_hms(&slot.start);
                let end = time::parse_hms(&slot.end);
                if start.is_none() || end.is_none() {
                    return Err(ApiError::bad_request(format!(
                        "opening_hours for {} must use HH:MM times",
                        day
                    )));
                }
            }
        }
        Ok(())
    }

    async fn present<S: Store>(_store: &S, records: Vec<Self>) -> Result<Vec<Self::View>, ApiError> {
        Ok(records)
    }

    fn cascade(id: Id) -> WriteBatch {
        detach_points(PlaceKind::Restaurant, id)
    }
}

impl Resource for Event {
    const NAME: &'static str = "Event";
    const SEARCH_FIELDS: &'static [&'static str] = PLACE_SEARCH_FIELDS;
    const ORDERING_FIELDS: &'static [&'static str] = &["name", "start_date", "created_at"];
    const DEFAULT_ORDERING: &'static [&'static str] = &["id"];

    type Filters = EventFilters;
    type View = Event;

    fn filter(filters: &EventFilters) -> Result<Filter, ApiError> {
        let mut filter = Filter::All;
        if let Some(raw) = &filters.start_date {
            filter = filter.and(Filter::gte("start_date", timestamp_param("start_date", raw)?));
        }
        if let Some(raw) = &filters.end_date {
            filter = filter.and(Filter::lte("end_date", timestamp_param("end_date", raw)?));
        }
        Ok(filter)
    }

    fn prepare(&mut self, existing: Option<&Self>) {
        let now = time::now();
        self.id = existing.and_then(|e| e.id);
        self.created_at = existing.and_then(|e| e.created_at).or(Some(now));
        self.updated_at = Some(now);
    }

    async fn validate<S: Store>(&self, _store: &S) -> Result<(), ApiError> {
        require_name(&self.name)?;
        validate_location(&self.location)?;
        if self.start_date > self.end_date {
            return Err(ApiError::bad_request("start_date must not be after end_date"));
        }
        if let Some(price) = self.price {
            if !price.is_finite() || price < 0.0 {
                return Err(ApiError::bad_request("price must not be negative"));
            }
        }
        if !self.url.is_empty() {
            let parsed = Url::parse(&self.url).map_err(|e| ApiError::bad_request(format!("url is invalid: {}", e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ApiError::bad_request("url must use http or https"));
            }
        }
        Ok(())
    }

    async fn present<S: Store>(_store: &S, records: Vec<Self>) -> Result<Vec<Self::View>, ApiError> {
        Ok(records)
    }

    fn cascade(id: Id) -> WriteBatch {
        detach_points(PlaceKind::Event, id)
    }
}

/// Records within the radius of `params`, closest first.
pub async fn nearby<S: Store, T: Resource>(
    store: &S,
    params: &NearbyParams,
    default_radius: f64,
    filter: Filter,
) -> Result<Vec<Nearby<T>>, ApiError> {
    let (center, radius) = params.resolve(default_radius)?;
    let found = store.near::<T>(&center, radius, &filter).await?;
    Ok(found
        .into_iter()
        .map(|(record, distance_km)| Nearby { record, distance_km })
        .collect())
}

/// Events in the radius that have not ended yet, soonest first.
pub async fn upcoming_events<S: Store>(
    store: &S,
    params: &NearbyParams,
    now: DateTime<Utc>,
) -> Result<Vec<Nearby<Event>>, ApiError> {
    let filter = Filter::gte("end_date", time::format_timestamp(&now));
    let mut events = nearby::<S, Event>(store, params, EVENT_RADIUS_KM, filter).await?;
    events.sort_by(|a, b| a.record.start_date.cmp(&b.record.start_date));
    Ok(events)
}

/// Points of interest grouped by category, with count and mean difficulty.
pub async fn by_type<S: Store>(store: &S) -> Result<Vec<CategorySummary>, ApiError> {
    let points = store
        .find::<PointOfInterest>(&Query::new(Filter::All).sort(SortKey::asc("id")))
        .await?;

    let mut groups: BTreeMap<PoiCategory, Vec<PointOfInterest>> = BTreeMap::new();
    for point in points {
        groups.entry(point.category).or_default().push(point);
    }

    Ok(groups
        .into_iter()
        .map(|(category, points)| {
            let total: u32 = points.iter().map(|p| u32::from(p.difficulty.level())).sum();
            CategorySummary {
                category,
                count: points.len(),
                avg_difficulty: (!points.is_empty()).then(|| f64::from(total) / points.len() as f64),
                points,
            }
        })
        .collect())
}

/// Whether the place a point would reference is stored.
pub async fn place_exists<S: Store>(store: &S, place: PlaceRef) -> Result<bool, ApiError> {
    let found = match place {
        PlaceRef::Poi(id) => store.find_by_id::<PointOfInterest>(id).await?.is_some(),
        PlaceRef::Restaurant(id) => store.find_by_id::<Restaurant>(id).await?.is_some(),
        PlaceRef::Event(id) => store.find_by_id::<Event>(id).await?.is_some(),
    };
    Ok(found)
}

pub fn place_label(place: PlaceRef) -> String {
    let name = match place.kind() {
        PlaceKind::Poi => PointOfInterest::NAME,
        PlaceKind::Restaurant => Restaurant::NAME,
        PlaceKind::Event => Event::NAME,
    };
    format!("{} {}", name, place.id())
}
