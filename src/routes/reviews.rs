use actix_multipart::Multipart;
use actix_web::{http::header, web, HttpResponse};
use futures::TryStreamExt;

use crate::config::AppConfig;
use crate::db::{Id, Store};
use crate::error::ApiError;
use crate::models::review::ItineraryReview;
use crate::routes::crud;
use crate::services::review_service::{self, PhotoUpload};

const CAPTION_LIMIT: usize = 1024;

pub fn routes<S: Store>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/itinerary-reviews")
            .route("/{id}/photos", web::post().to(upload_photo::<S>))
            .service(
                web::resource("/{id}/photos/{photo_id}")
                    .route(web::get().to(download_photo::<S>))
                    .route(web::delete().to(delete_photo::<S>)),
            )
            .configure(crud::routes::<S, ItineraryReview>),
    );
}

/// Reads the `photo` file part and the optional `caption` text part.
async fn read_upload(mut payload: Multipart, max_bytes: usize) -> Result<PhotoUpload, ApiError> {
    let malformed = |e: actix_multipart::MultipartError| ApiError::bad_request(e.to_string());

    let mut photo: Option<(String, Vec<u8>)> = None;
    let mut caption = String::new();

    while let Some(mut field) = payload.try_next().await.map_err(malformed)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("photo") => {
                let content_type = field
                    .content_type()
                    .map(|mime| mime.essence_str().to_string())
                    .unwrap_or_default();
                let mut bytes = Vec::new();
                while let Some(chunk) = field.try_next().await.map_err(malformed)? {
                    if bytes.len() + chunk.len() > max_bytes {
                        return Err(ApiError::bad_request(format!(
                            "photo exceeds the maximum size of {} bytes",
                            max_bytes
                        )));
                    }
                    bytes.extend_from_slice(&chunk);
                }
                photo = Some((content_type, bytes));
            }
            Some("caption") => {
                let mut text = Vec::new();
                while let Some(chunk) = field.try_next().await.map_err(malformed)? {
                    if text.len() + chunk.len() > CAPTION_LIMIT {
                        return Err(ApiError::bad_request("caption is too long"));
                    }
                    text.extend_from_slice(&chunk);
                }
                caption = String::from_utf8(text)
                    .map_err(|_| ApiError::bad_request("caption must be UTF-8 text"))?;
            }
            _ => {
                // Unknown parts are drained and ignored.
                while field.try_next().await.map_err(malformed)?.is_some() {}
            }
        }
    }

    let (content_type, bytes) =
        photo.ok_or_else(|| ApiError::bad_request("The 'photo' file part is required"))?;
    Ok(PhotoUpload {
        content_type,
        caption: caption.trim().to_string(),
        bytes,
    })
}

pub async fn upload_photo<S: Store>(
    store: web::Data<S>,
    config: web::Data<AppConfig>,
    path: web::Path<Id>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let upload = read_upload(payload, config.max_photo_bytes).await?;
    let photo = review_service::add_photo(
        store.get_ref(),
        path.into_inner(),
        upload,
        config.max_photo_bytes,
    )
    .await?;
    Ok(HttpResponse::Created().json(photo))
}

pub async fn download_photo<S: Store>(
    store: web::Data<S>,
    path: web::Path<(Id, Id)>,
) -> Result<HttpResponse, ApiError> {
    let (review_id, photo_id) = path.into_inner();
    let (photo, bytes) = review_service::photo_content(store.get_ref(), review_id, photo_id).await?;
    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, photo.content_type))
        .body(bytes))
}

pub async fn delete_photo<S: Store>(
    store: web::Data<S>,
    path: web::Path<(Id, Id)>,
) -> Result<HttpResponse, ApiError> {
    let (review_id, photo_id) = path.into_inner();
    review_service::delete_photo(store.get_ref(), review_id, photo_id).await?;
    Ok(HttpResponse::NoContent().finish())
}
