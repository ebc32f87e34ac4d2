//! API request handlers

use crate::notify::{DeliverySubsystem, EventContext, NotificationDispatcher};
use crate::store::models::{ModuleNode, NotificationNode, ProjectNode, SprintNode, TaskNode};
use crate::store::EntityStore;
use crate::workflow::models::*;
use crate::workflow::{TransitionError, WorkflowError, WorkflowManager};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Shared server state
pub struct ServerState {
    pub store: Arc<dyn EntityStore>,
    pub manager: Arc<WorkflowManager>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub delivery: Arc<DeliverySubsystem>,
}

/// Shared tracker state
pub type TrackerState = Arc<ServerState>;

// ============================================================================
// Health
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub present_users: usize,
}

pub async fn health(State(state): State<TrackerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        present_users: state.delivery.presence().present_count(),
    })
}

// ============================================================================
// Workflow operations
// ============================================================================

pub async fn create_project(
    State(state): State<TrackerState>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectNode>), AppError> {
    let project = state.manager.create_project(req).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project(
    State(state): State<TrackerState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ProjectNode>, AppError> {
    state
        .store
        .get_project(project_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("project {project_id} not found")))
}

pub async fn create_module(
    State(state): State<TrackerState>,
    Json(req): Json<CreateModuleRequest>,
) -> Result<(StatusCode, Json<ModuleNode>), AppError> {
    let module = state.manager.create_module(req).await?;
    Ok((StatusCode::CREATED, Json(module)))
}

pub async fn transition_module(
    State(state): State<TrackerState>,
    Path(module_id): Path<Uuid>,
    Json(req): Json<ModuleTransitionRequest>,
) -> Result<Json<ModuleNode>, AppError> {
    let module = state.manager.transition_module(module_id, req).await?;
    Ok(Json(module))
}

pub async fn create_sprint(
    State(state): State<TrackerState>,
    Json(req): Json<CreateSprintRequest>,
) -> Result<(StatusCode, Json<SprintNode>), AppError> {
    let sprint = state.manager.create_sprint(req).await?;
    Ok((StatusCode::CREATED, Json(sprint)))
}

#[derive(Deserialize)]
pub struct CreateTaskBody {
    #[serde(flatten)]
    pub task: CreateTaskRequest,
    pub actor_id: Uuid,
}

pub async fn create_task(
    State(state): State<TrackerState>,
    Json(body): Json<CreateTaskBody>,
) -> Result<(StatusCode, Json<TaskNode>), AppError> {
    let task = state.manager.create_task(body.task, body.actor_id).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task_status(
    State(state): State<TrackerState>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<UpdateTaskStatusRequest>,
) -> Result<Json<TaskNode>, AppError> {
    let task = state.manager.update_task_status(task_id, req).await?;
    Ok(Json(task))
}

pub async fn assign_task(
    State(state): State<TrackerState>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<AssignTaskRequest>,
) -> Result<Json<TaskNode>, AppError> {
    let task = state.manager.assign_task(task_id, req).await?;
    Ok(Json(task))
}

pub async fn review_task(
    State(state): State<TrackerState>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<ReviewTaskRequest>,
) -> Result<Json<TaskNode>, AppError> {
    let task = state.manager.review_task(task_id, req).await?;
    Ok(Json(task))
}

pub async fn handover_task(
    State(state): State<TrackerState>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<HandoverTaskRequest>,
) -> Result<Json<TaskNode>, AppError> {
    let task = state.manager.handover_task(task_id, req).await?;
    Ok(Json(task))
}

// ============================================================================
// Events & notifications
// ============================================================================

/// Inbound event from an out-of-process producer
#[derive(Deserialize)]
pub struct FireEventRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub context: EventContext,
}

/// Fire an event by its wire string. Always 202: an unknown type is a logged
/// no-op, never a caller-visible failure.
pub async fn fire_event(
    State(state): State<TrackerState>,
    Json(req): Json<FireEventRequest>,
) -> StatusCode {
    state.dispatcher.fire_raw(&req.kind, req.context).await;
    StatusCode::ACCEPTED
}

#[derive(Deserialize)]
pub struct NotificationsQuery {
    pub limit: Option<usize>,
}

pub async fn list_notifications(
    State(state): State<TrackerState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<NotificationsQuery>,
) -> Result<Json<Vec<NotificationNode>>, AppError> {
    let rows = state
        .store
        .list_notifications(user_id, query.limit.unwrap_or(50))
        .await?;
    Ok(Json(rows))
}

#[derive(Deserialize)]
pub struct AckRequest {
    pub user_id: Uuid,
    pub ids: Vec<Uuid>,
}

#[derive(Serialize)]
pub struct AckResponse {
    pub updated: usize,
}

/// Acknowledge reads. Ids owned by other users are silently ignored.
pub async fn ack_notifications(
    State(state): State<TrackerState>,
    Json(req): Json<AckRequest>,
) -> Result<Json<AckResponse>, AppError> {
    let updated = state.delivery.ack(req.user_id, &req.ids).await?;
    Ok(Json(AckResponse { updated }))
}

// ============================================================================
// Error mapping
// ============================================================================

/// API-level error with HTTP mapping
pub enum AppError {
    Internal(anyhow::Error),
    NotFound(String),
    BadRequest(String),
    Forbidden(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Validation(e @ TransitionError::EdgeNotAllowed { .. }) => {
                AppError::BadRequest(e.to_string())
            }
            WorkflowError::Validation(e) => AppError::Forbidden(e.to_string()),
            WorkflowError::NotFound(what) => AppError::NotFound(format!("{what} not found")),
            WorkflowError::Store(e) => AppError::Internal(e),
        }
    }
}
