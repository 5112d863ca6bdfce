//! HTTP surface (§6): thin axum handlers, one module per endpoint, all
//! sharing [`state::AppState`]. Mirrors the teacher's `model_server`
//! router assembly with a trace layer and a permissive CORS layer for the
//! browser-facing frontend.

pub mod execute_query;
pub mod explain_sql;
pub mod feedback;
pub mod generate_sql;
pub mod health;
pub mod state;

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use state::AppState;

pub fn router(state: AppState) -> Router {
    let allow_origin = if state.settings.cors_allowed_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        let origins = state.settings.cors_allowed_origins.iter().filter_map(|origin| origin.parse().ok()).collect::<Vec<_>>();
        AllowOrigin::list(origins)
    };
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(allow_origin);

    Router::new()
        .route("/health", get(health::handle))
        .route("/generate-sql", post(generate_sql::handle))
        .route("/execute-query", post(execute_query::handle))
        .route("/explain-sql", post(explain_sql::handle))
        .route("/save-sql-feedback", post(feedback::handle))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
