use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::db::{Filter, Id};
use crate::models::{event::Event, point_of_interest::PointOfInterest, restaurant::Restaurant};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlaceKind {
    Poi,
    Restaurant,
    Event,
}

impl PlaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceKind::Poi => "poi",
            PlaceKind::Restaurant => "restaurant",
            PlaceKind::Event => "event",
        }
    }
}

impl FromStr for PlaceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "poi" => Ok(PlaceKind::Poi),
            "restaurant" => Ok(PlaceKind::Restaurant),
            "event" => Ok(PlaceKind::Event),
            _ => Err("point_type must be 'poi', 'restaurant' or 'event'".to_string()),
        }
    }
}

/// The place an itinerary point visits. Serialized as `{"kind": "poi", "id": 3}`.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum PlaceRef {
    Poi(Id),
    Restaurant(Id),
    Event(Id),
}

impl PlaceRef {
    pub fn new(kind: PlaceKind, id: Id) -> Self {
        match kind {
            PlaceKind::Poi => PlaceRef::Poi(id),
            PlaceKind::Restaurant => PlaceRef::Restaurant(id),
            PlaceKind::Event => PlaceRef::Event(id),
        }
    }

    pub fn kind(&self) -> PlaceKind {
        match self {
            PlaceRef::Poi(_) => PlaceKind::Poi,
            PlaceRef::Restaurant(_) => PlaceKind::Restaurant,
            PlaceRef::Event(_) => PlaceKind::Event,
        }
    }

    pub fn id(&self) -> Id {
        match self {
            PlaceRef::Poi(id) | PlaceRef::Restaurant(id) | PlaceRef::Event(id) => *id,
        }
    }

    /// Matches itinerary points referencing any place of `kind` among `ids`.
    pub fn filter(kind: PlaceKind, ids: impl IntoIterator<Item = Id>) -> Filter {
        Filter::eq("place.kind", kind.as_str()).and(Filter::is_in("place.id", ids))
    }
}

#[derive(Debug, Serialize, Clone)]
#[serde(untagged)]
pub enum PlaceDetails {
    Poi(PointOfInterest),
    Restaurant(Restaurant),
    Event(Event),
}

/// A record returned by a radius query, with its distance from the query point.
#[derive(Debug, Serialize, Clone)]
pub struct Nearby<T> {
    #[serde(flatten)]
    pub record: T,
    pub distance_km: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_place_ref_wire_format() {
        let place = PlaceRef::new(PlaceKind::Restaurant, 4);
        assert_eq!(
            serde_json::to_value(place).unwrap(),
            json!({ "kind": "restaurant", "id": 4 })
        );
        let parsed: PlaceRef = serde_json::from_value(json!({ "kind": "poi", "id": 9 })).unwrap();
        assert_eq!(parsed, PlaceRef::Poi(9));
        assert_eq!(parsed.kind(), PlaceKind::Poi);
        assert_eq!(parsed.id(), 9);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!("hotel".parse::<PlaceKind>().is_err());
        assert!(serde_json::from_value::<PlaceRef>(json!({ "kind": "hotel", "id": 1 })).is_err());
    }
}
