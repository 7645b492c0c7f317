#![allow(dead_code)]

use actix_cors::Cors;
use actix_web::{
    middleware::{Logger, NormalizePath},
    web, App,
};
use serde_json::{json, Value};

use tourism_api::{
    config::AppConfig,
    db::memory::MemoryStore,
    error::{json_error_handler, path_error_handler, query_error_handler},
    routes,
    services::llm_service::{LlmError, Prompt, TextGenerator},
};

pub const REPLY: &str = r#"```json
{
  "display": "Two days between summits and craters",
  "data": {
    "title": "La Palma in two days",
    "description": "Observatory sunrise and a walk to the caldera",
    "start_date": "2024-03-15",
    "end_date": "2024-03-16",
    "days": [
      { "day": 1, "points": [ { "point_of_interest": 1, "order": 1, "notes": "Arrive before sunrise" } ] }
    ]
  }
}
```"#;

/// Text generator returning a fixed reply, or nothing when unconfigured.
#[derive(Clone)]
pub struct CannedGenerator {
    reply: Option<String>,
}

impl CannedGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
        }
    }

    pub fn unconfigured() -> Self {
        Self { reply: None }
    }
}

impl TextGenerator for CannedGenerator {
    async fn complete(&self, _prompt: &Prompt) -> Result<String, LlmError> {
        self.reply.clone().ok_or(LlmError::NotConfigured)
    }

    fn describe(&self) -> Result<String, String> {
        match self.reply {
            Some(_) => Ok("canned replies".to_string()),
            None => Err("OPENAI_API_KEY not configured".to_string()),
        }
    }
}

pub struct TestApp {
    pub store: MemoryStore,
    pub generator: CannedGenerator,
    pub config: AppConfig,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_generator(CannedGenerator::replying(REPLY))
    }

    pub fn with_generator(generator: CannedGenerator) -> Self {
        Self {
            store: MemoryStore::new(),
            generator,
            config: AppConfig::default(),
        }
    }

    pub fn create_app(&self) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse<
                impl actix_web::body::MessageBody,
            >,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .app_data(web::Data::new(self.config.clone()))
            .app_data(web::Data::new(self.store.clone()))
            .app_data(web::Data::new(self.generator.clone()))
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::QueryConfig::default().error_handler(query_error_handler))
            .app_data(web::PathConfig::default().error_handler(path_error_handler))
            .configure(routes::configure::<MemoryStore, CannedGenerator>)
    }
}

pub fn poi_json(name: &str, lat: f64, lng: f64, category: &str, difficulty: &str) -> Value {
    json!({
        "name": name,
        "description": format!("{} on La Palma", name),
        "location": { "type": "Point", "coordinates": [lng, lat] },
        "type": category,
        "difficulty": difficulty,
        "estimated_time": "01:30:00"
    })
}

pub fn restaurant_json(name: &str, lat: f64, lng: f64, cuisine: &str, price_range: u8) -> Value {
    json!({
        "name": name,
        "location": { "type": "Point", "coordinates": [lng, lat] },
        "cuisine_type": cuisine,
        "price_range": price_range,
        "opening_hours": { "monday": [ { "start": "12:00", "end": "16:00" } ] }
    })
}

pub fn event_json(name: &str, lat: f64, lng: f64, start: &str, end: &str) -> Value {
    json!({
        "name": name,
        "location": { "type": "Point", "coordinates": [lng, lat] },
        "start_date": start,
        "end_date": end,
        "price": 12.5,
        "url": "https://example.org/events"
    })
}

pub fn itinerary_json(title: &str) -> Value {
    json!({
        "title": title,
        "description": "A week on the island",
        "start_date": "2024-03-15",
        "end_date": "2024-03-17"
    })
}
