#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;

use tutor_backend_rust::core::EventBus;
use tutor_backend_rust::services::llm_provider::{LLMConfig, LLMProvider};
use tutor_backend_rust::state::AppState;
use tutor_backend_rust::tutor::config::LlmRenderConfig;
use tutor_backend_rust::tutor::{MemoryStore, TutorConfig, TutorEngine};

pub fn offline_provider() -> LLMProvider {
    LLMProvider::new(LLMConfig {
        api_key: None,
        model: "test-model".to_string(),
        api_endpoint: "http://127.0.0.1:9/v1".to_string(),
        timeout: Duration::from_millis(50),
    })
}

pub fn offline_config() -> TutorConfig {
    TutorConfig {
        llm: LlmRenderConfig {
            enabled: false,
            timeout_ms: 50,
        },
        ..TutorConfig::default()
    }
}

pub fn create_engine() -> TutorEngine<LLMProvider> {
    TutorEngine::new(
        Arc::new(MemoryStore::new()),
        Arc::new(EventBus::new()),
        offline_config(),
        offline_provider(),
    )
}

pub fn create_test_app() -> Router {
    let engine = AppState::create_engine(offline_config(), offline_provider());
    tutor_backend_rust::create_app(AppState::new(engine, false))
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
