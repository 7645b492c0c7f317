use actix_cors::Cors;
use actix_web::{
    middleware::{Logger, NormalizePath},
    web, App, HttpServer,
};
use env_logger::Env;
use log::{error, info, warn};

use tourism_api::{
    config::{AppConfig, StoreBackend},
    db::{memory::MemoryStore, mongo::MongoStore, Store},
    error::{json_error_handler, path_error_handler, query_error_handler},
    routes,
    services::llm_service::{OpenAiGenerator, TextGenerator},
};

fn cors(config: &AppConfig) -> Cors {
    let cors = match &config.cors_allowed_origins {
        Some(origins) => origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin)),
        None => Cors::default().allow_any_origin(),
    };
    cors.allow_any_method().allow_any_header().max_age(3600)
}

async fn serve<S: Store>(config: AppConfig, store: S) -> std::io::Result<()> {
    let generator = OpenAiGenerator::new(&config.llm);
    if let Err(reason) = generator.describe() {
        warn!("Itinerary generation unavailable: {}", reason);
    }

    let bind = (config.host.clone(), config.port);
    info!("Starting HTTP server on {}:{}", bind.0, bind.1);

    let config = web::Data::new(config);
    let store = web::Data::new(store);
    let generator = web::Data::new(generator);

    HttpServer::new(move || {
        App::new()
            .wrap(cors(&config))
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .app_data(config.clone())
            .app_data(store.clone())
            .app_data(generator.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::QueryConfig::default().error_handler(query_error_handler))
            .app_data(web::PathConfig::default().error_handler(path_error_handler))
            .configure(routes::configure::<S, OpenAiGenerator>)
    })
    .bind(bind)?
    .run()
    .await
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if cfg!(debug_assertions) {
        dotenv::dotenv().ok();
    }

    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
    })?;

    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory store");
            serve(config, MemoryStore::new()).await
        }
        StoreBackend::Mongo => {
            let uri = config.mongodb_uri.clone().unwrap_or_default();
            let store = MongoStore::connect(&uri, &config.mongodb_database)
                .await
                .map_err(|e| {
                    error!("Failed to connect to MongoDB: {}", e);
                    std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e)
                })?;
            info!("Connected to MongoDB database {}", config.mongodb_database);
            serve(config, store).await
        }
    }
}
