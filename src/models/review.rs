use bson::Binary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Id, Record};
use crate::models::time;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ItineraryReview {
    #[serde(default)]
    pub id: Option<Id>,
    pub itinerary: Id,
    #[serde(default)]
    pub user: Option<Id>,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub scenery_rating: Option<u8>,
    #[serde(default)]
    pub accessibility_rating: Option<u8>,
    #[serde(default)]
    pub signposting_rating: Option<u8>,
    #[serde(default)]
    pub cleanliness_rating: Option<u8>,
    #[serde(default)]
    pub services_rating: Option<u8>,
    #[serde(default, with = "time::timestamp_opt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "time::timestamp_opt")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ItineraryReview {
    /// Every rating present, paired with its field name.
    pub fn ratings(&self) -> [(&'static str, Option<u8>); 6] {
        [
            ("rating", Some(self.rating)),
            ("scenery_rating", self.scenery_rating),
            ("accessibility_rating", self.accessibility_rating),
            ("signposting_rating", self.signposting_rating),
            ("cleanliness_rating", self.cleanliness_rating),
            ("services_rating", self.services_rating),
        ]
    }

    pub fn validate_ratings(&self) -> Result<(), String> {
        for (field, value) in self.ratings() {
            if let Some(value) = value {
                if !(MIN_RATING..=MAX_RATING).contains(&value) {
                    return Err(format!(
                        "{} must be between {} and {}",
                        field, MIN_RATING, MAX_RATING
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Record for ItineraryReview {
    const COLLECTION: &'static str = "ItineraryReviews";

    fn id(&self) -> Option<Id> {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = Some(id);
    }
}

/// Photo metadata. The bytes live in [`ReviewPhotoData`] under the same id.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReviewPhoto {
    #[serde(default)]
    pub id: Option<Id>,
    pub review: Id,
    pub itinerary: Id,
    #[serde(default)]
    pub caption: String,
    pub content_type: String,
    pub size: i64,
    #[serde(default, with = "time::timestamp_opt")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl Record for ReviewPhoto {
    const COLLECTION: &'static str = "ReviewPhotos";

    fn id(&self) -> Option<Id> {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = Some(id);
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReviewPhotoData {
    pub id: Option<Id>,
    pub review: Id,
    pub itinerary: Id,
    pub data: Binary,
}

impl Record for ReviewPhotoData {
    const COLLECTION: &'static str = "ReviewPhotoData";

    fn id(&self) -> Option<Id> {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = Some(id);
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct ReviewDetail {
    #[serde(flatten)]
    pub review: ItineraryReview,
    pub photos: Vec<ReviewPhoto>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sub_rating_out_of_range() {
        let review: ItineraryReview = serde_json::from_value(json!({
            "itinerary": 1,
            "rating": 4,
            "cleanliness_rating": 6
        }))
        .unwrap();

        let err = review.validate_ratings().unwrap_err();
        assert!(err.contains("cleanliness_rating"));
    }

    #[test]
    fn test_valid_review_without_sub_ratings() {
        let review: ItineraryReview =
            serde_json::from_value(json!({ "itinerary": 1, "rating": 5 })).unwrap();
        assert!(review.validate_ratings().is_ok());
        assert!(review.user.is_none());
    }
}
