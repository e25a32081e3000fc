use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::replay::*;
use crate::models::shared::Pagination;
use crate::replay::ReplayService;
use crate::state::AppState;

fn replay_service(state: &AppState) -> ReplayService {
    ReplayService::new(
        state.db.clone(),
        state.mq.clone(),
        state.notifier.clone(),
        state.config.clone(),
    )
}

/// Create a replay session.
#[utoipa::path(
    post,
    path = "",
    tag = "Replay",
    operation_id = "createReplaySession",
    summary = "Create a replay session",
    description = "Creates a session in CREATED state with an immutable snapshot of the event filter. Nothing is published until the session is started.",
    request_body = CreateReplayRequest,
    responses(
        (status = 201, description = "Session created", body = ReplaySessionResponse),
        (status = 400, description = "Invalid request (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, body))]
pub async fn create_replay_session(
    State(state): State<AppState>,
    AppJson(body): AppJson<CreateReplayRequest>,
) -> Result<(StatusCode, Json<ReplaySessionResponse>), AppError> {
    if body.name.trim().is_empty() {
        return Err(AppError::Validation("name must not be blank".into()));
    }

    let session = replay_service(&state)
        .create(body.name, body.description, body.filter, body.created_by)
        .await?;

    Ok((StatusCode::CREATED, Json(session.into())))
}

/// List replay sessions.
#[utoipa::path(
    get,
    path = "",
    tag = "Replay",
    operation_id = "listReplaySessions",
    summary = "List replay sessions",
    params(ListReplayParams),
    responses(
        (status = 200, description = "Page of replay sessions", body = ReplayListResponse),
    ),
)]
#[instrument(skip(state))]
pub async fn list_replay_sessions(
    State(state): State<AppState>,
    Query(params): Query<ListReplayParams>,
) -> Result<Json<ReplayListResponse>, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(20).clamp(1, 100);

    let (sessions, total) = replay_service(&state).list(page, per_page).await?;

    Ok(Json(ReplayListResponse {
        data: sessions.into_iter().map(Into::into).collect(),
        pagination: Pagination::new(page, per_page, total),
    }))
}

/// Get a replay session.
#[utoipa::path(
    get,
    path = "/{session_id}",
    tag = "Replay",
    operation_id = "getReplaySession",
    summary = "Get a replay session",
    params(("session_id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "The replay session", body = ReplaySessionResponse),
        (status = 404, description = "Session not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_replay_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ReplaySessionResponse>, AppError> {
    let session = replay_service(&state)
        .get(&session_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Replay session {session_id} not found")))?;

    Ok(Json(session.into()))
}

/// List a session's per-event replay outcomes.
#[utoipa::path(
    get,
    path = "/events",
    tag = "Replay",
    operation_id = "listReplayEvents",
    summary = "List replayed event outcomes",
    params(ListReplayEventsParams),
    responses(
        (status = 200, description = "Page of outcome rows", body = ReplayEventListResponse),
        (status = 404, description = "Session not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn list_replay_events(
    State(state): State<AppState>,
    Query(params): Query<ListReplayEventsParams>,
) -> Result<Json<ReplayEventListResponse>, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(20).clamp(1, 100);

    let (rows, total) = replay_service(&state)
        .list_events(&params.session_id, page, per_page)
        .await?;

    Ok(Json(ReplayEventListResponse {
        data: rows.into_iter().map(Into::into).collect(),
        pagination: Pagination::new(page, per_page, total),
    }))
}

/// Get live progress for a replay session.
#[utoipa::path(
    get,
    path = "/{session_id}/progress",
    tag = "Replay",
    operation_id = "getReplayProgress",
    summary = "Get replay progress",
    description = "Counters are derived from the per-event outcome rows at request time, not read from cached columns.",
    params(("session_id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Live progress", body = ReplayProgressResponse),
        (status = 404, description = "Session not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_replay_progress(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ReplayProgressResponse>, AppError> {
    let (session, counters) = replay_service(&state).progress(&session_id).await?;
    Ok(Json(ReplayProgressResponse::new(&session, counters)))
}

/// Start a replay session.
#[utoipa::path(
    post,
    path = "/{session_id}/start",
    tag = "Replay",
    operation_id = "startReplaySession",
    summary = "Start a replay session",
    params(("session_id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session running", body = ReplaySessionResponse),
        (status = 404, description = "Session not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Session is not CREATED (STATE_VIOLATION)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn start_replay_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ReplaySessionResponse>, AppError> {
    let session = replay_service(&state).start(&session_id).await?;
    Ok(Json(session.into()))
}

/// Pause a running replay session.
#[utoipa::path(
    post,
    path = "/{session_id}/pause",
    tag = "Replay",
    operation_id = "pauseReplaySession",
    summary = "Pause a replay session",
    params(("session_id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session paused", body = ReplaySessionResponse),
        (status = 404, description = "Session not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Session is not RUNNING (STATE_VIOLATION)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn pause_replay_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ReplaySessionResponse>, AppError> {
    let session = replay_service(&state).pause(&session_id).await?;
    Ok(Json(session.into()))
}

/// Resume a paused replay session.
#[utoipa::path(
    post,
    path = "/{session_id}/resume",
    tag = "Replay",
    operation_id = "resumeReplaySession",
    summary = "Resume a replay session",
    params(("session_id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session running again", body = ReplaySessionResponse),
        (status = 404, description = "Session not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Session is not PAUSED (STATE_VIOLATION)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn resume_replay_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ReplaySessionResponse>, AppError> {
    let session = replay_service(&state).resume(&session_id).await?;
    Ok(Json(session.into()))
}

/// Cancel a replay session.
#[utoipa::path(
    post,
    path = "/{session_id}/cancel",
    tag = "Replay",
    operation_id = "cancelReplaySession",
    summary = "Cancel a replay session",
    params(("session_id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session cancelled", body = ReplaySessionResponse),
        (status = 404, description = "Session not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Session already terminal (STATE_VIOLATION)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn cancel_replay_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ReplaySessionResponse>, AppError> {
    let session = replay_service(&state).cancel(&session_id).await?;
    Ok(Json(session.into()))
}
