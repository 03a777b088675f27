use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;

use services::store::ClassSubjectStore;

// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub store: Arc<dyn ClassSubjectStore>,
}

impl AppState {
    pub fn new(config: config::Config, store: Arc<dyn ClassSubjectStore>) -> Self {
        Self { config, store }
    }
}

pub fn app(state: AppState) -> Router {
    let max_body = state.config.max_file_size;
    routes::routes()
        .merge(routes::imports::routes(max_body))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}
