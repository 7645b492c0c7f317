use std::collections::HashMap;

use bson::{spec::BinarySubtype, Binary};
use log::info;
use serde::Deserialize;

use crate::db::{Filter, Id, Query, Record, SortKey, Store, WriteBatch};
use crate::error::ApiError;
use crate::models::{
    itinerary::Itinerary,
    review::{ItineraryReview, ReviewDetail, ReviewPhoto, ReviewPhotoData},
    time,
};
use crate::services::resource_service::{fetch, Resource};

#[derive(Debug, Deserialize, Default)]
pub struct ReviewFilters {
    pub itinerary: Option<Id>,
    pub rating: Option<u8>,
}

/// A photo read from a multipart upload.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub content_type: String,
    pub caption: String,
    pub bytes: Vec<u8>,
}

impl Resource for ItineraryReview {
    const NAME: &'static str = "Review";
    const SEARCH_FIELDS: &'static [&'static str] = &["comment"];
    const ORDERING_FIELDS: &'static [&'static str] = &["rating", "created_at"];
    const DEFAULT_ORDERING: &'static [&'static str] = &["id"];

    type Filters = ReviewFilters;
    type View = ReviewDetail;

    fn filter(filters: &ReviewFilters) -> Result<Filter, ApiError> {
        let mut filter = Filter::All;
        if let Some(itinerary) = filters.itinerary {
            filter = filter.and(Filter::eq("itinerary", itinerary));
        }
        if let Some(rating) = filters.rating {
            filter = filter.and(Filter::eq("rating", i32::from(rating)));
        }
        Ok(filter)
    }

    fn prepare(&mut self, existing: Option<&Self>) {
        let now = time::now();
        self.id = existing.and_then(|e| e.id);
        self.created_at = existing.and_then(|e| e.created_at).or(Some(now));
        self.updated_at = Some(now);
    }

    async fn validate<S: Store>(&self, store: &S) -> Result<(), ApiError> {
        self.validate_ratings().map_err(ApiError::BadRequest)?;

        if store.find_by_id::<Itinerary>(self.itinerary).await?.is_none() {
            return Err(ApiError::bad_request(format!(
                "Itinerary {} does not exist",
                self.itinerary
            )));
        }

        if let Some(user) = self.user {
            let same_author = Filter::eq("itinerary", self.itinerary).and(Filter::eq("user", user));
            let duplicate = store
                .find_all::<ItineraryReview>(same_author)
                .await?
                .into_iter()
                .any(|other| other.id != self.id);
            if duplicate {
                return Err(ApiError::Conflict(format!(
                    "User {} has already reviewed itinerary {}",
                    user, self.itinerary
                )));
            }
        }
        Ok(())
    }

    async fn present<S: Store>(store: &S, records: Vec<Self>) -> Result<Vec<Self::View>, ApiError> {
        let ids: Vec<Id> = records.iter().filter_map(|review| review.id).collect();
        let mut photos: HashMap<Id, Vec<ReviewPhoto>> = HashMap::new();
        if !ids.is_empty() {
            let found = store
                .find::<ReviewPhoto>(&Query::new(Filter::is_in("review", ids)).sort(SortKey::asc("id")))
                .await?;
            for photo in found {
                photos.entry(photo.review).or_default().push(photo);
            }
        }

        Ok(records
            .into_iter()
            .map(|review| {
                let photos = review
                    .id
                    .and_then(|id| photos.remove(&id))
                    .unwrap_or_default();
                ReviewDetail { review, photos }
            })
            .collect())
    }

    fn cascade(id: Id) -> WriteBatch {
        let owned = Filter::eq("review", id);
        let mut batch = WriteBatch::new();
        batch
            .delete::<ReviewPhotoData>(owned.clone())
            .delete::<ReviewPhoto>(owned);
        batch
    }
}

pub fn is_image(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|essence| essence.trim().to_ascii_lowercase())
        .is_some_and(|essence| essence.starts_with("image/") && essence.len() > "image/".len())
}

/// Stores the photo metadata and its bytes in one batch.
pub async fn add_photo<S: Store>(
    store: &S,
    review_id: Id,
    upload: PhotoUpload,
    max_bytes: usize,
) -> Result<ReviewPhoto, ApiError> {
    let review = fetch::<S, ItineraryReview>(store, review_id).await?;

    if !is_image(&upload.content_type) {
        return Err(ApiError::bad_request(format!(
            "Unsupported content type '{}': only images are accepted",
            upload.content_type
        )));
    }
    if upload.bytes.is_empty() {
        return Err(ApiError::bad_request("photo is empty"));
    }
    if upload.bytes.len() > max_bytes {
        return Err(ApiError::bad_request(format!(
            "photo exceeds the maximum size of {} bytes",
            max_bytes
        )));
    }

    let id = store.next_id(ReviewPhoto::COLLECTION).await?;
    let photo = ReviewPhoto {
        id: Some(id),
        review: review_id,
        itinerary: review.itinerary,
        caption: upload.caption,
        content_type: upload.content_type,
        size: upload.bytes.len() as i64,
        uploaded_at: Some(time::now()),
    };
    let data = ReviewPhotoData {
        id: Some(id),
        review: review_id,
        itinerary: review.itinerary,
        data: Binary {
            subtype: BinarySubtype::Generic,
            bytes: upload.bytes,
        },
    };

    let mut batch = WriteBatch::new();
    batch.insert(&photo)?.insert(&data)?;
    store.commit(batch).await?;

    info!("Stored photo {} ({} bytes) for review {}", id, photo.size, review_id);
    Ok(photo)
}

async fn fetch_photo<S: Store>(store: &S, review_id: Id, photo_id: Id) -> Result<ReviewPhoto, ApiError> {
    store
        .find_by_id::<ReviewPhoto>(photo_id)
        .await?
        .filter(|photo| photo.review == review_id)
        .ok_or_else(|| ApiError::not_found(format!("Photo {} not found", photo_id)))
}

/// Photo metadata and bytes.
pub async fn photo_content<S: Store>(
    store: &S,
    review_id: Id,
    photo_id: Id,
) -> Result<(ReviewPhoto, Vec<u8>), ApiError> {
    let photo = fetch_photo(store, review_id, photo_id).await?;
    let data = store
        .find_by_id::<ReviewPhotoData>(photo_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Photo {} has no content", photo_id)))?;
    Ok((photo, data.data.bytes))
}

pub async fn delete_photo<S: Store>(store: &S, review_id: Id, photo_id: Id) -> Result<(), ApiError> {
    fetch_photo(store, review_id, photo_id).await?;

    let mut batch = WriteBatch::new();
    batch
        .delete::<ReviewPhotoData>(Filter::by_id(photo_id))
        .delete::<ReviewPhoto>(Filter::by_id(photo_id));
    store.commit(batch).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::services::resource_service;
    use chrono::NaiveDate;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    async fn seed() -> (MemoryStore, Id) {
        let store = MemoryStore::new();
        let itinerary = store
            .insert(Itinerary {
                id: None,
                title: "Costa oeste".to_string(),
                description: String::new(),
                user: None,
                start_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
                is_completed: true,
                created_at: None,
                updated_at: None,
            })
            .await
            .unwrap();
        (store, itinerary.id.unwrap())
    }

    fn review(itinerary: Id, user: Option<Id>, rating: u8) -> ItineraryReview {
        ItineraryReview {
            id: None,
            itinerary,
            user,
            rating,
            comment: "Vistas increíbles".to_string(),
            scenery_rating: Some(5),
            accessibility_rating: None,
            signposting_rating: None,
            cleanliness_rating: None,
            services_rating: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn upload(content_type: &str, bytes: &[u8]) -> PhotoUpload {
        PhotoUpload {
            content_type: content_type.to_string(),
            caption: "Atardecer".to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_is_image() {
        assert!(is_image("image/png"));
        assert!(is_image("IMAGE/JPEG; charset=binary"));
        assert!(!is_image("image/"));
        assert!(!is_image("application/pdf"));
    }

    #[actix_rt::test]
    async fn test_one_review_per_user() {
        let (store, itinerary) = seed().await;
        resource_service::create(&store, review(itinerary, Some(3), 4))
            .await
            .unwrap();

        let err = resource_service::create(&store, review(itinerary, Some(3), 2))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        // Anonymous reviews are not constrained.
        resource_service::create(&store, review(itinerary, None, 2)).await.unwrap();
        resource_service::create(&store, review(itinerary, None, 3)).await.unwrap();
    }

    #[actix_rt::test]
    async fn test_update_keeps_own_review_valid() {
        let (store, itinerary) = seed().await;
        let created = resource_service::create(&store, review(itinerary, Some(3), 4))
            .await
            .unwrap();
        let id = created.review.id.unwrap();

        let updated = resource_service::replace(&store, id, review(itinerary, Some(3), 5))
            .await
            .unwrap();
        assert_eq!(updated.review.rating, 5);
        assert_eq!(updated.review.created_at, created.review.created_at);
    }

    #[actix_rt::test]
    async fn test_photo_lifecycle() {
        let (store, itinerary) = seed().await;
        let created = resource_service::create(&store, review(itinerary, None, 4))
            .await
            .unwrap();
        let review_id = created.review.id.unwrap();

        let photo = add_photo(&store, review_id, upload("image/png", PNG_HEADER), 1024)
            .await
            .unwrap();
        let photo_id = photo.id.unwrap();
        assert_eq!(photo.size, PNG_HEADER.len() as i64);
        assert_eq!(photo.itinerary, itinerary);

        let (meta, bytes) = photo_content(&store, review_id, photo_id).await.unwrap();
        assert_eq!(meta.content_type, "image/png");
        assert_eq!(bytes, PNG_HEADER);

        let detail = resource_service::retrieve::<_, ItineraryReview>(&store, review_id)
            .await
            .unwrap();
        assert_eq!(detail.photos.len(), 1);

        delete_photo(&store, review_id, photo_id).await.unwrap();
        assert!(matches!(
            photo_content(&store, review_id, photo_id).await.unwrap_err(),
            ApiError::NotFound(_)
        ));
    }

    #[actix_rt::test]
    async fn test_photo_rejections() {
        let (store, itinerary) = seed().await;
        let review_id = resource_service::create(&store, review(itinerary, None, 4))
            .await
            .unwrap()
            .review
            .id
            .unwrap();

        let not_image = add_photo(&store, review_id, upload("text/plain", b"hola"), 1024).await;
        assert!(matches!(not_image, Err(ApiError::BadRequest(_))));

        let too_big = add_photo(&store, review_id, upload("image/jpeg", &[0u8; 64]), 32).await;
        assert!(matches!(too_big, Err(ApiError::BadRequest(_))));

        let unknown_review = add_photo(&store, 404, upload("image/png", PNG_HEADER), 1024).await;
        assert!(matches!(unknown_review, Err(ApiError::NotFound(_))));
    }

    #[actix_rt::test]
    async fn test_deleting_review_removes_photos() {
        let (store, itinerary) = seed().await;
        let review_id = resource_service::create(&store, review(itinerary, None, 4))
            .await
            .unwrap()
            .review
            .id
            .unwrap();
        add_photo(&store, review_id, upload("image/png", PNG_HEADER), 1024)
            .await
            .unwrap();

        resource_service::delete::<_, ItineraryReview>(&store, review_id)
            .await
            .unwrap();
        assert_eq!(store.count::<ReviewPhoto>(&Filter::All).await.unwrap(), 0);
        assert_eq!(store.count::<ReviewPhotoData>(&Filter::All).await.unwrap(), 0);
    }
}
