//! HTTP surface. Everything except health lives under `/api`.

use actix_web::web;

use crate::db::Store;
use crate::services::llm_service::TextGenerator;

pub mod crud;
pub mod events;
pub mod generate;
pub mod health;
pub mod itineraries;
pub mod points_of_interest;
pub mod restaurants;
pub mod reviews;

pub fn configure<S: Store, G: TextGenerator>(cfg: &mut web::ServiceConfig) {
    cfg.configure(health::routes::<S, G>).service(
        web::scope("/api")
            .configure(points_of_interest::routes::<S>)
            .configure(restaurants::routes::<S>)
            .configure(events::routes::<S>)
            .configure(itineraries::routes::<S>)
            .configure(reviews::routes::<S>)
            .configure(generate::routes::<S, G>),
    );
}
