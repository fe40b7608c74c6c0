use axum::{
    Router,
    http::{Method, header},
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::AppState;
use crate::handlers::{records, search, system};

/// Full application router: `/health` plus the read API under `/api`.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(system::health))
        .nest("/api", create_api_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/resources", get(records::list_resources))
        .route("/resources/{id}", get(records::get_resource))
        .route("/observations", get(records::list_observations))
        .route("/observations/{id}", get(records::get_observation))
        .route("/changes", get(records::list_changes))
        .route("/changes/{id}", get(records::get_change))
        .route("/config", get(system::config))
        .route("/metadata", get(system::metadata))
        .route("/search", post(search::search))
}
