use std::collections::HashMap;

use serde::Deserialize;

use crate::db::{Filter, Id, Query, Record, SortKey, Store, WriteBatch};
use crate::error::ApiError;
use crate::models::{
    event::Event,
    itinerary::{
        Itinerary, ItineraryDetail, ItineraryPoint, PointDetail, RatingSummary, MAX_POSITION,
    },
    location::{Feature, FeatureCollection, FeatureProperties},
    place::{PlaceDetails, PlaceKind, PlaceRef},
    point_of_interest::PointOfInterest,
    restaurant::Restaurant,
    review::{ItineraryReview, ReviewPhoto, ReviewPhotoData},
    time,
};
use crate::services::{place_service, resource_service::Resource};

#[derive(Debug, Deserialize, Default)]
pub struct ItineraryFilters {
    pub is_completed: Option<bool>,
    pub user: Option<Id>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PointFilters {
    pub itinerary: Option<Id>,
    pub day: Option<u32>,
}

/// Points of one itinerary, optionally restricted to a day, in visit order.
pub fn points_query(itinerary: Id, day: Option<u32>) -> Query {
    let mut filter = Filter::eq("itinerary", itinerary);
    if let Some(day) = day {
        filter = filter.and(Filter::eq("day", day));
    }
    Query::new(filter)
        .sort(SortKey::asc("day"))
        .sort(SortKey::asc("order"))
}

pub async fn fetch_itinerary<S: Store>(store: &S, id: Id) -> Result<Itinerary, ApiError> {
    store
        .find_by_id::<Itinerary>(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Itinerary {} not found", id)))
}

async fn load<S: Store, T: Record>(store: &S, ids: Vec<Id>) -> Result<HashMap<Id, T>, ApiError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let records = store.find_all::<T>(Filter::is_in("id", ids)).await?;
    Ok(records
        .into_iter()
        .filter_map(|record| record.id().map(|id| (id, record)))
        .collect())
}

fn ids_of_kind(points: &[ItineraryPoint], kind: PlaceKind) -> Vec<Id> {
    let mut ids: Vec<Id> = points
        .iter()
        .filter_map(|point| point.place)
        .filter(|place| place.kind() == kind)
        .map(|place| place.id())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Attaches the referenced place to every point, `None` for dangling references.
pub async fn resolve_places<S: Store>(
    store: &S,
    points: Vec<ItineraryPoint>,
) -> Result<Vec<PointDetail>, ApiError> {
    let pois = load::<S, PointOfInterest>(store, ids_of_kind(&points, PlaceKind::Poi)).await?;
    let restaurants =
        load::<S, Restaurant>(store, ids_of_kind(&points, PlaceKind::Restaurant)).await?;
    let events = load::<S, Event>(store, ids_of_kind(&points, PlaceKind::Event)).await?;

    Ok(points
        .into_iter()
        .map(|point| {
            let point_details = point.place.and_then(|place| match place {
                PlaceRef::Poi(id) => pois.get(&id).cloned().map(PlaceDetails::Poi),
                PlaceRef::Restaurant(id) => {
                    restaurants.get(&id).cloned().map(PlaceDetails::Restaurant)
                }
                PlaceRef::Event(id) => events.get(&id).cloned().map(PlaceDetails::Event),
            });
            PointDetail {
                point,
                point_details,
            }
        })
        .collect())
}

pub async fn hydrate<S: Store>(
    store: &S,
    itineraries: Vec<Itinerary>,
) -> Result<Vec<ItineraryDetail>, ApiError> {
    let ids: Vec<Id> = itineraries.iter().filter_map(|itinerary| itinerary.id).collect();
    let points = if ids.is_empty() {
        Vec::new()
    } else {
        store
            .find::<ItineraryPoint>(
                &Query::new(Filter::is_in("itinerary", ids))
                    .sort(SortKey::asc("day"))
                    .sort(SortKey::asc("order")),
            )
            .await?
    };

    let mut grouped: HashMap<Id, Vec<PointDetail>> = HashMap::new();
    for detail in resolve_places(store, points).await? {
        grouped.entry(detail.point.itinerary).or_default().push(detail);
    }

    Ok(itineraries
        .into_iter()
        .map(|itinerary| {
            let points = itinerary
                .id
                .and_then(|id| grouped.remove(&id))
                .unwrap_or_default();
            ItineraryDetail { itinerary, points }
        })
        .collect())
}

/// One Point feature per stop that resolves to a located point of interest.
pub fn to_geojson(points: &[PointDetail]) -> FeatureCollection {
    let features = points
        .iter()
        .filter_map(|detail| match &detail.point_details {
            Some(PlaceDetails::Poi(poi)) => poi.location.map(|location| {
                Feature::point(
                    location,
                    FeatureProperties {
                        name: poi.name.clone(),
                        description: poi.description.clone(),
                        kind: PlaceKind::Poi.as_str().to_string(),
                        day: detail.point.day,
                        order: detail.point.order,
                        notes: detail.point.notes.clone(),
                    },
                )
            }),
            _ => None,
        })
        .collect();
    FeatureCollection::new(features)
}

pub async fn geojson<S: Store>(store: &S, id: Id) -> Result<FeatureCollection, ApiError> {
    fetch_itinerary(store, id).await?;
    let points = store.find::<ItineraryPoint>(&points_query(id, None)).await?;
    Ok(to_geojson(&resolve_places(store, points).await?))
}

fn mean(values: impl Iterator<Item = Option<u8>>) -> Option<f64> {
    let (sum, count) = values
        .flatten()
        .fold((0u32, 0u32), |(sum, count), value| (sum + u32::from(value), count + 1));
    (count > 0).then(|| f64::from(sum) / f64::from(count))
}

pub fn summarize(reviews: &[ItineraryReview]) -> RatingSummary {
    RatingSummary {
        count: reviews.len() as u64,
        average: mean(reviews.iter().map(|r| Some(r.rating))),
        scenery: mean(reviews.iter().map(|r| r.scenery_rating)),
        accessibility: mean(reviews.iter().map(|r| r.accessibility_rating)),
        signposting: mean(reviews.iter().map(|r| r.signposting_rating)),
        cleanliness: mean(reviews.iter().map(|r| r.cleanliness_rating)),
        services: mean(reviews.iter().map(|r| r.services_rating)),
    }
}

pub async fn rating_summary<S: Store>(store: &S, id: Id) -> Result<RatingSummary, ApiError> {
    fetch_itinerary(store, id).await?;
    let reviews = store
        .find_all::<ItineraryReview>(Filter::eq("itinerary", id))
        .await?;
    Ok(summarize(&reviews))
}

impl Resource for Itinerary {
    const NAME: &'static str = "Itinerary";
    const SEARCH_FIELDS: &'static [&'static str] = &["title", "description"];
    const ORDERING_FIELDS: &'static [&'static str] = &["title", "start_date", "created_at"];
    const DEFAULT_ORDERING: &'static [&'static str] = &["id"];

    type Filters = ItineraryFilters;
    type View = ItineraryDetail;

    fn filter(filters: &ItineraryFilters) -> Result<Filter, ApiError> {
        let mut filter = Filter::All;
        if let Some(is_completed) = filters.is_completed {
            filter = filter.and(Filter::eq("is_completed", is_completed));
        }
        if let Some(user) = filters.user {
            filter = filter.and(Filter::eq("user", user));
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
        if self.title.trim().is_empty() {
            return Err(ApiError::bad_request("title is required"));
        }
        self.validate_dates().map_err(ApiError::BadRequest)
    }

    async fn present<S: Store>(store: &S, records: Vec<Self>) -> Result<Vec<Self::View>, ApiError> {
        hydrate(store, records).await
    }

    fn cascade(id: Id) -> WriteBatch {
        let owned = Filter::eq("itinerary", id);
        let mut batch = WriteBatch::new();
        batch
            .delete::<ItineraryPoint>(owned.clone())
            .delete::<ReviewPhotoData>(owned.clone())
            .delete::<ReviewPhoto>(owned.clone())
            .delete::<ItineraryReview>(owned);
        batch
    }
}

impl Resource for ItineraryPoint {
    const NAME: &'static str = "Itinerary point";
    const SEARCH_FIELDS: &'static [&'static str] = &[];
    const ORDERING_FIELDS: &'static [&'static str] = &["day", "order"];
    const DEFAULT_ORDERING: &'static [&'static str] = &["itinerary", "day", "order"];

    type Filters = PointFilters;
    type View = PointDetail;

    fn filter(filters: &PointFilters) -> Result<Filter, ApiError> {
        let mut filter = Filter::All;
        if let Some(itinerary) = filters.itinerary {
            filter = filter.and(Filter::eq("itinerary", itinerary));
        }
        if let Some(day) = filters.day {
            filter = filter.and(Filter::eq("day", day));
        }
        Ok(filter)
    }

    fn prepare(&mut self, existing: Option<&Self>) {
        self.id = existing.and_then(|e| e.id);
    }

    async fn validate<S: Store>(&self, store: &S) -> Result<(), ApiError> {
        if self.day < 1 || self.order < 1 {
            return Err(ApiError::bad_request("day and order must be at least 1"));
        }
        if self.day > MAX_POSITION || self.order > MAX_POSITION {
            return Err(ApiError::bad_request(format!(
                "day and order must not exceed {}",
                MAX_POSITION
            )));
        }
        if store.find_by_id::<Itinerary>(self.itinerary).await?.is_none() {
            return Err(ApiError::bad_request(format!(
                "Itinerary {} does not exist",
                self.itinerary
            )));
        }
        if let Some(place) = self.place {
            if !place_service::place_exists(store, place).await? {
                return Err(ApiError::bad_request(format!(
                    "{} does not exist",
                    place_service::place_label(place)
                )));
            }
        }

        let same_slot = Filter::eq("itinerary", self.itinerary)
            .and(Filter::eq("day", self.day))
            .and(Filter::eq("order", self.order));
        let taken = store
            .find_all::<ItineraryPoint>(same_slot)
            .await?
            .into_iter()
            .any(|other| other.id != self.id);
        if taken {
            return Err(ApiError::bad_request(format!(
                "order {} is already taken on day {}",
                self.order, self.day
            )));
        }
        Ok(())
    }

    async fn present<S: Store>(store: &S, records: Vec<Self>) -> Result<Vec<Self::View>, ApiError> {
        resolve_places(store, records).await
    }
}
