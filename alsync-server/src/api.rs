use crate::activity::{ActivityEntry, ActivityKind, ActivityLog};
use crate::error::PushError;
use crate::session::{SessionHandle, SessionState};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_ACTIVITY_LIMIT: usize = 50;

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionHandle>,
    pub activity: Arc<ActivityLog>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(get_status))
        .route("/activity", get(get_activity))
        .route("/push", post(push_now))
        .route("/stop", post(stop_session))
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub session_id: Uuid,
    pub project_path: PathBuf,
    pub started: DateTime<Utc>,
    pub state: SessionState,
    pub push_scheduler_running: bool,
    pub commits: u64,
    pub commit_failures: u64,
    pub pushes_succeeded: u64,
    pub pushes_failed: u64,
    pub last_commit: Option<ActivityEntry>,
    pub last_push: Option<ActivityEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    limit: Option<usize>,
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let info = state.session.info();
    let activity = &state.activity;

    Json(StatusResponse {
        session_id: info.id,
        project_path: info.project_path.clone(),
        started: info.started,
        state: state.session.state(),
        push_scheduler_running: state.session.is_push_scheduler_running(),
        commits: activity.count(ActivityKind::CommitCreated),
        commit_failures: activity.count(ActivityKind::CommitFailed),
        pushes_succeeded: activity.count(ActivityKind::PushSucceeded),
        pushes_failed: activity.count(ActivityKind::PushFailed),
        last_commit: activity.last(ActivityKind::CommitCreated),
        last_push: activity.last(ActivityKind::PushSucceeded),
    })
}

async fn get_activity(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> Json<Vec<ActivityEntry>> {
    let limit = query.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
    Json(state.activity.recent(limit))
}

async fn push_now(State(state): State<AppState>) -> Result<impl IntoResponse, (StatusCode, String)> {
    state.session.push_now().await.map_err(|e| match e {
        PushError::SessionStopped => (StatusCode::CONFLICT, e.to_string()),
        _ => (StatusCode::BAD_GATEWAY, e.to_string()),
    })?;

    Ok(Json(serde_json::json!({"status": "pushed"})))
}

async fn stop_session(State(state): State<AppState>) -> impl IntoResponse {
    state.session.cancel();
    Json(serde_json::json!({"status": state.session.state()}))
}
