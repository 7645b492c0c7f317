//! Day/order bookkeeping for itinerary points.
//!
//! Within one (itinerary, day) the `order` values rank the visits. Appends take
//! `max + 1`; an explicit position shifts the points at or after it down by
//! one. Moving a point out of a day renumbers what remains to `1..=n`. Every
//! operation commits its writes as a single batch.

use std::collections::HashSet;

use bson::doc;
use chrono::TimeDelta;
use log::info;
use serde::Deserialize;

use crate::db::{Filter, Id, Record, Store, WriteBatch};
use crate::error::ApiError;
use crate::models::{
    itinerary::{ItineraryPoint, PointDetail, MAX_POSITION},
    place::{PlaceKind, PlaceRef},
    time,
};
use crate::services::{
    itinerary_service::{fetch_itinerary, points_query, resolve_places},
    place_service,
    resource_service::present_one,
};

#[derive(Debug, Deserialize, Default)]
pub struct AddPointRequest {
    pub point_type: Option<String>,
    pub point_id: Option<Id>,
    pub day: Option<u32>,
    pub order: Option<u32>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ReorderRequest {
    pub day: Option<u32>,
    #[serde(default)]
    pub points: Vec<Id>,
}

#[derive(Debug, Deserialize, Default)]
pub struct MovePointRequest {
    pub point_id: Option<Id>,
    pub new_day: Option<u32>,
    pub new_order: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct VisitPointRequest {
    pub point_id: Option<Id>,
    #[serde(default, with = "time::hms_opt")]
    pub actual_time_spent: Option<TimeDelta>,
}

/// Where a point lands in a day holding `existing` (`(id, order)` sorted by
/// order), and the `(id, order)` rewrites that make room for it.
///
/// Either way the last point of the day ends up at `max + 1`, so the day is
/// full once that would pass `MAX_POSITION`.
pub fn plan_insert(
    existing: &[(Id, u32)],
    requested: Option<u32>,
) -> Result<(u32, Vec<(Id, u32)>), ApiError> {
    let next = existing
        .iter()
        .map(|(_, order)| *order)
        .max()
        .unwrap_or(0)
        .checked_add(1)
        .filter(|next| *next <= MAX_POSITION)
        .ok_or_else(|| ApiError::bad_request("No positions left on this day"))?;

    match requested {
        Some(position) if position < next => {
            let shifted = existing
                .iter()
                .filter(|(_, order)| *order >= position)
                .map(|(id, order)| (*id, order + 1))
                .collect();
            Ok((position, shifted))
        }
        _ => Ok((next, Vec::new())),
    }
}

/// Renumbers `remaining` to `1..=n`, returning only the points whose order changes.
pub fn close_gaps(remaining: &[(Id, u32)]) -> Vec<(Id, u32)> {
    remaining
        .iter()
        .zip(1u32..)
        .filter(|((_, order), target)| order != target)
        .map(|((id, _), target)| (*id, target))
        .collect()
}

fn set_order(batch: &mut WriteBatch, rewrites: &[(Id, u32)]) {
    for (id, order) in rewrites {
        batch.update::<ItineraryPoint>(Filter::by_id(*id), doc! { "order": i64::from(*order) });
    }
}

async fn day_slots<S: Store>(
    store: &S,
    itinerary: Id,
    day: u32,
) -> Result<Vec<(Id, u32)>, ApiError> {
    let points = store
        .find::<ItineraryPoint>(&points_query(itinerary, Some(day)))
        .await?;
    Ok(points
        .into_iter()
        .filter_map(|point| point.id.map(|id| (id, point.order)))
        .collect())
}

async fn fetch_point<S: Store>(store: &S, itinerary: Id, point_id: Id) -> Result<ItineraryPoint, ApiError> {
    store
        .find_by_id::<ItineraryPoint>(point_id)
        .await?
        .filter(|point| point.itinerary == itinerary)
        .ok_or_else(|| ApiError::not_found("Point not found"))
}

fn require_position(field: &str, value: u32) -> Result<u32, ApiError> {
    if value < 1 {
        return Err(ApiError::bad_request(format!("{} must be at least 1", field)));
    }
    if value > MAX_POSITION {
        return Err(ApiError::bad_request(format!(
            "{} must not exceed {}",
            field, MAX_POSITION
        )));
    }
    Ok(value)
}

pub async fn add_point<S: Store>(
    store: &S,
    itinerary_id: Id,
    request: AddPointRequest,
) -> Result<PointDetail, ApiError> {
    fetch_itinerary(store, itinerary_id).await?;

    let (Some(point_type), Some(point_id), Some(day)) =
        (request.point_type.as_deref(), request.point_id, request.day)
    else {
        return Err(ApiError::bad_request("point_type, point_id and day are required"));
    };
    let kind: PlaceKind = point_type.parse().map_err(ApiError::BadRequest)?;
    let day = require_position("day", day)?;
    let requested = request
        .order
        .map(|order| require_position("order", order))
        .transpose()?;

    let place = PlaceRef::new(kind, point_id);
    if !place_service::place_exists(store, place).await? {
        return Err(ApiError::bad_request(format!(
            "{} does not exist",
            place_service::place_label(place)
        )));
    }

    let existing = day_slots(store, itinerary_id, day).await?;
    let (order, shifted) = plan_insert(&existing, requested)?;

    let mut point = ItineraryPoint::new(itinerary_id, place, day, order, request.notes);
    point.set_id(store.next_id(ItineraryPoint::COLLECTION).await?);

    let mut batch = WriteBatch::new();
    set_order(&mut batch, &shifted);
    batch.insert(&point)?;
    store.commit(batch).await?;

    info!(
        "Added {} to itinerary {} on day {} at position {}",
        place_service::place_label(place),
        itinerary_id,
        day,
        order
    );
    present_one(store, point).await
}

pub async fn reorder_points<S: Store>(
    store: &S,
    itinerary_id: Id,
    request: ReorderRequest,
) -> Result<Vec<PointDetail>, ApiError> {
    fetch_itinerary(store, itinerary_id).await?;

    // An empty list is the only permutation of an empty day.
    let day = match request.day {
        Some(day) => require_position("day", day)?,
        None => return Err(ApiError::bad_request("day is required")),
    };

    let submitted: HashSet<Id> = request.points.iter().copied().collect();
    if submitted.len() != request.points.len() {
        return Err(ApiError::bad_request("points must not contain duplicates"));
    }

    let current: HashSet<Id> = day_slots(store, itinerary_id, day)
        .await?
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    if current != submitted {
        return Err(ApiError::bad_request(
            "Some points do not exist or do not belong to this day",
        ));
    }

    let rewrites: Vec<(Id, u32)> = request.points.iter().copied().zip(1u32..).collect();
    let mut batch = WriteBatch::new();
    set_order(&mut batch, &rewrites);
    store.commit(batch).await?;

    info!("Reordered {} points of itinerary {} day {}", rewrites.len(), itinerary_id, day);
    let points = store
        .find::<ItineraryPoint>(&points_query(itinerary_id, Some(day)))
        .await?;
    resolve_places(store, points).await
}

pub async fn move_point<S: Store>(
    store: &S,
    itinerary_id: Id,
    request: MovePointRequest,
) -> Result<PointDetail, ApiError> {
    fetch_itinerary(store, itinerary_id).await?;

    let (Some(point_id), Some(new_day)) = (request.point_id, request.new_day) else {
        return Err(ApiError::bad_request("point_id and new_day are required"));
    };
    let new_day = require_position("new_day", new_day)?;
    let requested = request
        .new_order
        .map(|order| require_position("new_order", order))
        .transpose()?;

    let mut point = fetch_point(store, itinerary_id, point_id).await?;

    // Take the point out of its day and close the gap it leaves.
    let source: Vec<(Id, u32)> = day_slots(store, itinerary_id, point.day)
        .await?
        .into_iter()
        .filter(|(id, _)| *id != point_id)
        .collect();
    let renumbered = close_gaps(&source);

    let destination: Vec<(Id, u32)> = if new_day == point.day {
        source
            .iter()
            .map(|(id, order)| {
                let order = renumbered
                    .iter()
                    .find(|(moved, _)| moved == id)
                    .map_or(*order, |(_, target)| *target);
                (*id, order)
            })
            .collect()
    } else {
        day_slots(store, itinerary_id, new_day).await?
    };
    let (order, shifted) = plan_insert(&destination, requested)?;

    let mut batch = WriteBatch::new();
    if new_day == point.day {
        // Shifts override the renumbering for points that move twice.
        let pending: Vec<(Id, u32)> = renumbered
            .into_iter()
            .filter(|(id, _)| !shifted.iter().any(|(other, _)| other == id))
            .collect();
        set_order(&mut batch, &pending);
    } else {
        set_order(&mut batch, &renumbered);
    }
    set_order(&mut batch, &shifted);

    let from_day = point.day;
    point.day = new_day;
    point.order = order;
    batch.replace(&point)?;
    store.commit(batch).await?;

    info!(
        "Moved point {} of itinerary {} from day {} to day {} at position {}",
        point_id, itinerary_id, from_day, new_day, order
    );
    present_one(store, point).await
}

pub async fn visit_point<S: Store>(
    store: &S,
    itinerary_id: Id,
    request: VisitPointRequest,
) -> Result<PointDetail, ApiError> {
    fetch_itinerary(store, itinerary_id).await?;

    let point_id = request
        .point_id
        .ok_or_else(|| ApiError::bad_request("point_id is required"))?;
    let mut point = fetch_point(store, itinerary_id, point_id).await?;

    point.is_visited = true;
    point.visited_at = Some(time::now());
    if request.actual_time_spent.is_some() {
        point.actual_time_spent = request.actual_time_spent;
    }
    store.replace(&point).await?;

    present_one(store, point).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::models::{
        itinerary::Itinerary,
        point_of_interest::{Difficulty, PoiCategory, PointOfInterest},
    };
    use chrono::NaiveDate;

    #[test]
    fn test_plan_insert_appends_after_max() {
        assert_eq!(plan_insert(&[], None).unwrap(), (1, vec![]));
        assert_eq!(plan_insert(&[(10, 1), (11, 3)], None).unwrap(), (4, vec![]));
        // Positions past the end clamp to max + 1.
        assert_eq!(plan_insert(&[(10, 1), (11, 2)], Some(9)).unwrap(), (3, vec![]));
    }

    #[test]
    fn test_plan_insert_rejects_full_day() {
        let full = [(10, 1), (11, MAX_POSITION)];
        assert!(matches!(plan_insert(&full, None), Err(ApiError::BadRequest(_))));
        assert!(matches!(plan_insert(&full, Some(1)), Err(ApiError::BadRequest(_))));
        assert!(matches!(
            plan_insert(&[(10, u32::MAX)], None),
            Err(ApiError::BadRequest(_))
        ));
        assert_eq!(
            plan_insert(&[(10, MAX_POSITION - 1)], None).unwrap(),
            (MAX_POSITION, vec![])
        );
    }

    #[test]
    fn test_plan_insert_shifts_later_points() {
        let (order, shifted) = plan_insert(&[(10, 1), (11, 2), (12, 3)], Some(2)).unwrap();
        assert_eq!(order, 2);
        assert_eq!(shifted, vec![(11, 3), (12, 4)]);
    }

    #[test]
    fn test_close_gaps_only_rewrites_changed_points() {
        assert_eq!(close_gaps(&[(1, 1), (3, 3), (4, 4)]), vec![(3, 2), (4, 3)]);
        assert!(close_gaps(&[(1, 1), (2, 2)]).is_empty());
    }

    struct Fixture {
        store: MemoryStore,
        itinerary: Id,
        poi: Id,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let itinerary = store
            .insert(Itinerary {
                id: None,
                title: "Ruta de los Volcanes".to_string(),
                description: String::new(),
                user: None,
                start_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2024, 3, 17).unwrap(),
                is_completed: false,
                created_at: None,
                updated_at: None,
            })
            .await
            .unwrap();
        let poi = store
            .insert(PointOfInterest {
                id: None,
                name: "Volcán San Antonio".to_string(),
                description: String::new(),
                location: None,
                address: String::new(),
                category: PoiCategory::Park,
                difficulty: Difficulty::Medium,
                estimated_time: TimeDelta::hours(2),
                created_at: None,
                updated_at: None,
            })
            .await
            .unwrap();
        Fixture {
            store,
            itinerary: itinerary.id.unwrap(),
            poi: poi.id.unwrap(),
        }
    }

    async fn add(f: &Fixture, day: u32, order: Option<u32>) -> Id {
        add_point(
            &f.store,
            f.itinerary,
            AddPointRequest {
                point_type: Some("poi".to_string()),
                point_id: Some(f.poi),
                day: Some(day),
                order,
                notes: String::new(),
            },
        )
        .await
        .unwrap()
        .point
        .id
        .unwrap()
    }

    async fn orders(f: &Fixture, day: u32) -> Vec<(Id, u32)> {
        day_slots(&f.store, f.itinerary, day).await.unwrap()
    }

    #[actix_rt::test]
    async fn test_add_point_appends_per_day() {
        let f = fixture().await;
        let a = add(&f, 1, None).await;
        let b = add(&f, 1, None).await;
        let c = add(&f, 2, None).await;

        assert_eq!(orders(&f, 1).await, vec![(a, 1), (b, 2)]);
        assert_eq!(orders(&f, 2).await, vec![(c, 1)]);
    }

    #[actix_rt::test]
    async fn test_add_point_with_order_shifts_day() {
        let f = fixture().await;
        let a = add(&f, 1, None).await;
        let b = add(&f, 1, None).await;
        let c = add(&f, 1, Some(1)).await;

        assert_eq!(orders(&f, 1).await, vec![(c, 1), (a, 2), (b, 3)]);
    }

    #[actix_rt::test]
    async fn test_add_point_rejects_bad_input() {
        let f = fixture().await;
        let unknown_type = add_point(
            &f.store,
            f.itinerary,
            AddPointRequest {
                point_type: Some("hotel".to_string()),
                point_id: Some(f.poi),
                day: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(unknown_type, ApiError::BadRequest(_)));

        let missing_place = add_point(
            &f.store,
            f.itinerary,
            AddPointRequest {
                point_type: Some("restaurant".to_string()),
                point_id: Some(42),
                day: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(missing_place, ApiError::BadRequest(_)));

        let missing_itinerary = add_point(&f.store, 999, AddPointRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(missing_itinerary, ApiError::NotFound(_)));
        assert!(orders(&f, 1).await.is_empty());
    }

    #[actix_rt::test]
    async fn test_reorder_assigns_submitted_sequence() {
        let f = fixture().await;
        let a = add(&f, 1, None).await;
        let b = add(&f, 1, None).await;
        let c = add(&f, 1, None).await;

        let points = reorder_points(
            &f.store,
            f.itinerary,
            ReorderRequest {
                day: Some(1),
                points: vec![c, a, b],
            },
        )
        .await
        .unwrap();

        let returned: Vec<Id> = points.iter().filter_map(|p| p.point.id).collect();
        assert_eq!(returned, vec![c, a, b]);
        assert_eq!(orders(&f, 1).await, vec![(c, 1), (a, 2), (b, 3)]);
    }

    #[actix_rt::test]
    async fn test_reorder_mismatch_changes_nothing() {
        let f = fixture().await;
        let a = add(&f, 1, None).await;
        let b = add(&f, 1, None).await;
        let other_day = add(&f, 2, None).await;

        for points in [vec![], vec![b], vec![b, a, other_day], vec![b, b]] {
            let err = reorder_points(
                &f.store,
                f.itinerary,
                ReorderRequest {
                    day: Some(1),
                    points,
                },
            )
            .await
            .unwrap_err();
            assert!(matches!(err, ApiError::BadRequest(_)));
        }
        assert_eq!(orders(&f, 1).await, vec![(a, 1), (b, 2)]);
    }

    #[actix_rt::test]
    async fn test_reorder_of_empty_day_is_a_no_op() {
        let f = fixture().await;
        let a = add(&f, 1, None).await;

        let points = reorder_points(
            &f.store,
            f.itinerary,
            ReorderRequest {
                day: Some(3),
                points: vec![],
            },
        )
        .await
        .unwrap();
        assert!(points.is_empty());
        assert_eq!(orders(&f, 1).await, vec![(a, 1)]);

        let err = reorder_points(
            &f.store,
            f.itinerary,
            ReorderRequest {
                day: None,
                points: vec![a],
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[actix_rt::test]
    async fn test_move_appends_and_closes_source_gap() {
        let f = fixture().await;
        let a = add(&f, 1, None).await;
        let b = add(&f, 1, None).await;
        let c = add(&f, 1, None).await;
        let d = add(&f, 2, None).await;

        let moved = move_point(
            &f.store,
            f.itinerary,
            MovePointRequest {
                point_id: Some(a),
                new_day: Some(2),
                new_order: None,
            },
        )
        .await
        .unwrap();

        assert_eq!((moved.point.day, moved.point.order), (2, 2));
        assert_eq!(orders(&f, 1).await, vec![(b, 1), (c, 2)]);
        assert_eq!(orders(&f, 2).await, vec![(d, 1), (a, 2)]);
    }

    #[actix_rt::test]
    async fn test_move_to_explicit_position() {
        let f = fixture().await;
        let a = add(&f, 1, None).await;
        let b = add(&f, 2, None).await;
        let c = add(&f, 2, None).await;

        move_point(
            &f.store,
            f.itinerary,
            MovePointRequest {
                point_id: Some(a),
                new_day: Some(2),
                new_order: Some(1),
            },
        )
        .await
        .unwrap();

        assert!(orders(&f, 1).await.is_empty());
        assert_eq!(orders(&f, 2).await, vec![(a, 1), (b, 2), (c, 3)]);
    }

    #[actix_rt::test]
    async fn test_move_within_same_day() {
        let f = fixture().await;
        let a = add(&f, 1, None).await;
        let b = add(&f, 1, None).await;
        let c = add(&f, 1, None).await;

        move_point(
            &f.store,
            f.itinerary,
            MovePointRequest {
                point_id: Some(c),
                new_day: Some(1),
                new_order: Some(1),
            },
        )
        .await
        .unwrap();
        assert_eq!(orders(&f, 1).await, vec![(c, 1), (a, 2), (b, 3)]);

        move_point(
            &f.store,
            f.itinerary,
            MovePointRequest {
                point_id: Some(c),
                new_day: Some(1),
                new_order: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(orders(&f, 1).await, vec![(a, 1), (b, 2), (c, 3)]);
    }

    #[actix_rt::test]
    async fn test_move_unknown_point_is_not_found() {
        let f = fixture().await;
        let err = move_point(
            &f.store,
            f.itinerary,
            MovePointRequest {
                point_id: Some(77),
                new_day: Some(1),
                new_order: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[actix_rt::test]
    async fn test_visit_point_stamps_visit() {
        let f = fixture().await;
        let a = add(&f, 1, None).await;

        let visited = visit_point(
            &f.store,
            f.itinerary,
            VisitPointRequest {
                point_id: Some(a),
                actual_time_spent: Some(TimeDelta::minutes(50)),
            },
        )
        .await
        .unwrap();

        assert!(visited.point.is_visited);
        assert!(visited.point.visited_at.is_some());
        let stored = f.store.find_by_id::<ItineraryPoint>(a).await.unwrap().unwrap();
        assert_eq!(stored.actual_time_spent, Some(TimeDelta::minutes(50)));
        assert_eq!(stored.id(), Some(a));
    }
}
