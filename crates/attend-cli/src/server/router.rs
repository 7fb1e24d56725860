//! Axum router for the attendance API.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

/// Builds the API router. CORS is open so browser-based scanners on other
/// origins can post scans.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/scan", post(handlers::scan))
        // Events
        .route(
            "/api/events",
            get(handlers::list_events).post(handlers::create_event),
        )
        .route(
            "/api/events/{id}",
            get(handlers::get_event)
                .put(handlers::update_event)
                .delete(handlers::delete_event),
        )
        .route("/api/events/{id}/finalize", post(handlers::finalize_event))
        .route("/api/events/{id}/stats", get(handlers::event_stats))
        // Attendance
        .route("/api/attendance/event/{id}", get(handlers::event_roster))
        .route(
            "/api/attendance/event/{id}/export",
            get(handlers::export_event),
        )
        .route(
            "/api/attendance/{id}/override",
            put(handlers::override_status),
        )
        // Participants
        .route(
            "/api/participants",
            get(handlers::list_participants).post(handlers::add_participant),
        )
        .route(
            "/api/participants/bulk",
            post(handlers::bulk_add_participants),
        )
        .route(
            "/api/participants/{id}",
            axum::routing::delete(handlers::delete_participant),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
