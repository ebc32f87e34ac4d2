//! API route definitions

use super::handlers::{self, TrackerState};
use super::ws_handlers;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: TrackerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // ====================================================================
        // Projects & modules
        // ====================================================================
        .route("/api/projects", post(handlers::create_project))
        .route("/api/projects/{project_id}", get(handlers::get_project))
        .route("/api/modules", post(handlers::create_module))
        .route(
            "/api/modules/{module_id}/transition",
            post(handlers::transition_module),
        )
        // ====================================================================
        // Sprints & tasks
        // ====================================================================
        .route("/api/sprints", post(handlers::create_sprint))
        .route("/api/tasks", post(handlers::create_task))
        .route(
            "/api/tasks/{task_id}/status",
            post(handlers::update_task_status),
        )
        .route("/api/tasks/{task_id}/assign", post(handlers::assign_task))
        .route("/api/tasks/{task_id}/review", post(handlers::review_task))
        .route(
            "/api/tasks/{task_id}/handover",
            post(handlers::handover_task),
        )
        // ====================================================================
        // Events & notifications
        // ====================================================================
        .route("/api/events", post(handlers::fire_event))
        .route(
            "/api/users/{user_id}/notifications",
            get(handlers::list_notifications),
        )
        .route(
            "/api/notifications/ack",
            post(handlers::ack_notifications),
        )
        // Real-time notification channel
        .route("/ws/notifications", get(ws_handlers::ws_notifications))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
