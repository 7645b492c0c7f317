use std::collections::HashMap;
use std::env;

use actix_web::{web, HttpResponse, Responder};
use log::warn;
use serde::Serialize;
use serde_json::json;

use crate::db::Store;
use crate::services::llm_service::TextGenerator;

#[derive(Serialize)]
struct HealthStatus {
    status: String,
    services: HashMap<String, ServiceStatus>,
    environment: String,
    version: String,
}

#[derive(Serialize, Clone)]
struct ServiceStatus {
    status: String,
    details: Option<String>,
}

pub fn routes<S: Store, G: TextGenerator>(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/health/details", web::get().to(health_details::<S, G>));
}

pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

pub async fn health_details<S: Store, G: TextGenerator>(
    store: web::Data<S>,
    generator: web::Data<G>,
) -> impl Responder {
    let mut health = HealthStatus {
        status: "ok".to_string(),
        services: HashMap::new(),
        environment: env::var("RUST_ENV").unwrap_or("development".to_string()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let store_result = check_store(store.get_ref()).await;
    health.services.insert("store".to_string(), store_result.clone());

    let generator_result = check_generator(generator.get_ref());
    health
        .services
        .insert("text_generation".to_string(), generator_result.clone());

    // Any service not ok degrades the overall status.
    if store_result.status != "ok" || generator_result.status != "ok" {
        health.status = "degraded".to_string();
    }

    HttpResponse::Ok().json(health)
}

async fn check_store<S: Store>(store: &S) -> ServiceStatus {
    match store.ping().await {
        Ok(()) => ServiceStatus {
            status: "ok".to_string(),
            details: Some("Store reachable".to_string()),
        },
        Err(e) => {
            warn!("Store health check failed: {}", e);
            ServiceStatus {
                status: "error".to_string(),
                details: Some(format!("Failed to reach store: {}", e)),
            }
        }
    }
}

fn check_generator<G: TextGenerator>(generator: &G) -> ServiceStatus {
    match generator.describe() {
        Ok(details) => ServiceStatus {
            status: "ok".to_string(),
            details: Some(details),
        },
        Err(details) => ServiceStatus {
            status: "error".to_string(),
            details: Some(details),
        },
    }
}
