use actix_web::{web, HttpResponse};

use crate::db::Store;
use crate::error::ApiError;
use crate::models::{event::Event, time};
use crate::routes::crud;
use crate::services::place_service::{self, NearbyParams};

pub fn routes<S: Store>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/events")
            .route("/upcoming", web::get().to(upcoming::<S>))
            .configure(crud::routes::<S, Event>),
    );
}

/// Events near a point that have not ended yet.
pub async fn upcoming<S: Store>(
    store: web::Data<S>,
    params: web::Query<NearbyParams>,
) -> Result<HttpResponse, ApiError> {
    let events = place_service::upcoming_events(store.get_ref(), &params, time::now()).await?;
    Ok(HttpResponse::Ok().json(events))
}
