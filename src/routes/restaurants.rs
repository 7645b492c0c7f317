use actix_web::{web, HttpResponse};

use crate::db::Store;
use crate::error::ApiError;
use crate::models::restaurant::Restaurant;
use crate::routes::crud;
use crate::services::{
    place_service::{self, NearbyParams, RestaurantFilters, RESTAURANT_RADIUS_KM},
    resource_service::Resource,
};

pub fn routes<S: Store>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/restaurants")
            .route("/nearby", web::get().to(nearby::<S>))
            .configure(crud::routes::<S, Restaurant>),
    );
}

/// `GET /restaurants/nearby?lat=&lng=[&max_distance=][&cuisine_type=]`
pub async fn nearby<S: Store>(
    store: web::Data<S>,
    params: web::Query<NearbyParams>,
    filters: web::Query<RestaurantFilters>,
) -> Result<HttpResponse, ApiError> {
    let filter = Restaurant::filter(&filters)?;
    let found =
        place_service::nearby::<S, Restaurant>(&store, &params, RESTAURANT_RADIUS_KM, filter).await?;
    Ok(HttpResponse::Ok().json(found))
}
