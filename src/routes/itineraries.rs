use actix_web::{web, HttpResponse};

use crate::db::{Id, Store};
use crate::error::ApiError;
use crate::models::itinerary::{Itinerary, ItineraryPoint};
use crate::routes::crud;
use crate::services::{
    itinerary_service,
    scheduler::{self, AddPointRequest, MovePointRequest, ReorderRequest, VisitPointRequest},
};

pub fn routes<S: Store>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/itineraries")
            .route("/{id}/add_point", web::post().to(add_point::<S>))
            .route("/{id}/reorder_points", web::post().to(reorder_points::<S>))
            .route("/{id}/move_point", web::post().to(move_point::<S>))
            .route("/{id}/visit_point", web::post().to(visit_point::<S>))
            .route("/{id}/geojson", web::get().to(geojson::<S>))
            .route("/{id}/rating", web::get().to(rating::<S>))
            .configure(crud::routes::<S, Itinerary>),
    )
    .service(web::scope("/itinerary-points").configure(crud::routes::<S, ItineraryPoint>));
}

pub async fn add_point<S: Store>(
    store: web::Data<S>,
    path: web::Path<Id>,
    input: web::Json<AddPointRequest>,
) -> Result<HttpResponse, ApiError> {
    let point = scheduler::add_point(store.get_ref(), path.into_inner(), input.into_inner()).await?;
    Ok(HttpResponse::Created().json(point))
}

pub async fn reorder_points<S: Store>(
    store: web::Data<S>,
    path: web::Path<Id>,
    input: web::Json<ReorderRequest>,
) -> Result<HttpResponse, ApiError> {
    let points =
        scheduler::reorder_points(store.get_ref(), path.into_inner(), input.into_inner()).await?;
    Ok(HttpResponse::Ok().json(points))
}

pub async fn move_point<S: Store>(
    store: web::Data<S>,
    path: web::Path<Id>,
    input: web::Json<MovePointRequest>,
) -> Result<HttpResponse, ApiError> {
    let point = scheduler::move_point(store.get_ref(), path.into_inner(), input.into_inner()).await?;
    Ok(HttpResponse::Ok().json(point))
}

pub async fn visit_point<S: Store>(
    store: web::Data<S>,
    path: web::Path<Id>,
    input: web::Json<VisitPointRequest>,
) -> Result<HttpResponse, ApiError> {
    let point = scheduler::visit_point(store.get_ref(), path.into_inner(), input.into_inner()).await?;
    Ok(HttpResponse::Ok().json(point))
}

pub async fn geojson<S: Store>(
    store: web::Data<S>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let collection = itinerary_service::geojson(store.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(collection))
}

pub async fn rating<S: Store>(
    store: web::Data<S>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let summary = itinerary_service::rating_summary(store.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(summary))
}
