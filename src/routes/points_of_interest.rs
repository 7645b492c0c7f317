use actix_web::{web, HttpResponse};

use crate::db::Store;
use crate::error::ApiError;
use crate::models::point_of_interest::PointOfInterest;
use crate::routes::crud;
use crate::services::{
    place_service::{self, NearbyParams, PoiFilters, POI_RADIUS_KM},
    resource_service::Resource,
};

pub fn routes<S: Store>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/points-of-interest")
            .route("/nearby", web::get().to(nearby::<S>))
            .route("/by_type", web::get().to(by_type::<S>))
            .configure(crud::routes::<S, PointOfInterest>),
    );
}

/// `GET /points-of-interest/nearby?lat=&lng=[&max_distance=][&type=][&difficulty=]`
pub async fn nearby<S: Store>(
    store: web::Data<S>,
    params: web::Query<NearbyParams>,
    filters: web::Query<PoiFilters>,
) -> Result<HttpResponse, ApiError> {
    let filter = PointOfInterest::filter(&filters)?;
    let found =
        place_service::nearby::<S, PointOfInterest>(&store, &params, POI_RADIUS_KM, filter).await?;
    Ok(HttpResponse::Ok().json(found))
}

pub async fn by_type<S: Store>(store: web::Data<S>) -> Result<HttpResponse, ApiError> {
    let groups = place_service::by_type(store.get_ref()).await?;
    Ok(HttpResponse::Ok().json(groups))
}
