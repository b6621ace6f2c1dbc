pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::services::ResetService;

#[derive(Clone)]
pub struct AppState {
    pub reset_service: ResetService,
}

impl AppState {
    pub fn new(reset_service: ResetService) -> Self {
        Self { reset_service }
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/auth/password-reset/request",
            post(handlers::request_password_reset),
        )
        .route(
            "/auth/password-reset/confirm",
            post(handlers::confirm_password_reset),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
