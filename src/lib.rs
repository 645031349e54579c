pub mod config;
pub mod core;
pub mod logging;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod tutor;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

pub fn create_app(state: AppState) -> axum::Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
