mod common;

use std::env;

use actix_web::{http::StatusCode, test};
use serde_json::{json, Value};
use serial_test::serial;

use common::{CannedGenerator, TestApp};
use tourism_api::config::{AppConfig, ConfigError, StoreBackend};

#[actix_rt::test]
async fn test_health_check() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "status": "ok" }));

    let req = test::TestRequest::get().uri("/health/").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn test_health_details() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::get().uri("/health/details").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["services"]["store"]["status"], "ok");
    assert_eq!(body["services"]["text_generation"]["status"], "ok");
    assert!(body["version"].is_string());

    let test_app = TestApp::with_generator(CannedGenerator::unconfigured());
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::get().uri("/health/details").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["services"]["text_generation"]["status"], "error");
}

#[actix_rt::test]
async fn test_unknown_route() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::get().uri("/api/hotels").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

const CONFIG_KEYS: &[&str] = &[
    "STORE_BACKEND",
    "MONGODB_URI",
    "PAGE_SIZE",
    "MAX_PAGE_SIZE",
    "OPENAI_API_KEY",
    "CORS_ALLOWED_ORIGINS",
    "GENERATION_TIMEOUT_SECS",
];

fn clear_config_env() {
    for key in CONFIG_KEYS {
        env::remove_var(key);
    }
}

#[::core::prelude::v1::test]
#[serial]
fn test_config_from_env() {
    clear_config_env();
    env::set_var("STORE_BACKEND", "memory");
    env::set_var("PAGE_SIZE", "25");
    env::set_var("OPENAI_API_KEY", "");
    env::set_var("CORS_ALLOWED_ORIGINS", "https://lapalma.example, https://admin.example");
    env::set_var("GENERATION_TIMEOUT_SECS", "5");

    let config = AppConfig::from_env().unwrap();
    assert_eq!(config.backend, StoreBackend::Memory);
    assert_eq!(config.page_size, 25);
    assert_eq!(config.max_page_size, 100);
    assert!(config.llm.api_key.is_none());
    assert_eq!(config.llm.timeout.as_secs(), 5);
    assert_eq!(
        config.cors_allowed_origins,
        Some(vec![
            "https://lapalma.example".to_string(),
            "https://admin.example".to_string()
        ])
    );

    clear_config_env();
}

#[::core::prelude::v1::test]
#[serial]
fn test_config_errors() {
    clear_config_env();
    assert_eq!(
        AppConfig::from_env().unwrap_err(),
        ConfigError::Missing("MONGODB_URI")
    );

    env::set_var("STORE_BACKEND", "memory");
    env::set_var("PAGE_SIZE", "ten");
    assert!(matches!(
        AppConfig::from_env().unwrap_err(),
        ConfigError::Invalid { key: "PAGE_SIZE", .. }
    ));

    clear_config_env();
}
