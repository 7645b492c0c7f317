use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::config::AppConfig;
use crate::db::Store;
use crate::error::ApiError;
use crate::models::generation::GenerationRequest;
use crate::services::{generation_service, llm_service::TextGenerator};

pub fn routes<S: Store, G: TextGenerator>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/generate-itinerary")
            .route(web::get().to(usage))
            .route(web::post().to(generate::<S, G>)),
    );
}

/// Describes the expected request instead of running the pipeline.
pub async fn usage() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "This endpoint expects a POST with a JSON body containing 'query' and 'available_pois'",
        "example": {
            "query": "I want a 2-day itinerary in La Palma visiting the Roque de los Muchachos",
            "available_pois": [
                {
                    "id": 1,
                    "name": "Roque de los Muchachos",
                    "description": "Highest point of the island...",
                    "type": "VIEWPOINT",
                    "difficulty": "EASY"
                }
            ]
        }
    }))
}

pub async fn generate<S: Store, G: TextGenerator>(
    store: web::Data<S>,
    generator: web::Data<G>,
    config: web::Data<AppConfig>,
    input: web::Json<GenerationRequest>,
) -> Result<HttpResponse, ApiError> {
    let outcome = generation_service::generate(
        store.get_ref(),
        generator.get_ref(),
        config.llm.timeout,
        input.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(outcome))
}
