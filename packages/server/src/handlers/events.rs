use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::events::*;
use crate::models::shared::Pagination;
use crate::publisher;
use crate::state::AppState;

/// Publish a new event.
#[utoipa::path(
    post,
    path = "",
    tag = "Events",
    operation_id = "publishEvent",
    summary = "Publish an event",
    description = "Stores the event durably and publishes it to the primary queue for processing.",
    request_body = PublishEventRequest,
    responses(
        (status = 201, description = "Event stored and published", body = EventResponse),
        (status = 400, description = "Invalid request (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, body))]
pub async fn publish_event(
    State(state): State<AppState>,
    AppJson(body): AppJson<PublishEventRequest>,
) -> Result<(StatusCode, Json<EventResponse>), AppError> {
    let stored = publisher::publish_event(
        &state.db,
        &state.mq,
        &state.config.mq.events_queue,
        publisher::NewEvent {
            event_type: body.event_type,
            payload: body.payload,
            source_system: body.source_system,
            correlation_id: body.correlation_id,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(stored.into())))
}

/// List stored events.
#[utoipa::path(
    get,
    path = "",
    tag = "Events",
    operation_id = "listEvents",
    summary = "List stored events",
    params(ListEventsParams),
    responses(
        (status = 200, description = "Page of stored events", body = EventListResponse),
    ),
)]
#[instrument(skip(state))]
pub async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<ListEventsParams>,
) -> Result<Json<EventListResponse>, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(20).clamp(1, 100);

    let (events, total) =
        publisher::list_events(&state.db, params.event_type, page, per_page).await?;

    Ok(Json(EventListResponse {
        data: events.into_iter().map(Into::into).collect(),
        pagination: Pagination::new(page, per_page, total),
    }))
}

/// Get a stored event by id.
#[utoipa::path(
    get,
    path = "/{event_id}",
    tag = "Events",
    operation_id = "getEvent",
    summary = "Get a stored event",
    params(("event_id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "The stored event", body = EventResponse),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<EventResponse>, AppError> {
    let event = publisher::get_event(&state.db, &event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {event_id} not found")))?;

    Ok(Json(event.into()))
}

/// Manually correct a stored event's payload.
#[utoipa::path(
    patch,
    path = "/{event_id}",
    tag = "Events",
    operation_id = "correctEvent",
    summary = "Correct a stored event",
    description = "Replaces the payload and bumps the event version. The only sanctioned mutation of a stored event.",
    params(("event_id" = String, Path, description = "Event id")),
    request_body = CorrectEventRequest,
    responses(
        (status = 200, description = "The corrected event", body = EventResponse),
        (status = 400, description = "Payload is not valid JSON (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, body))]
pub async fn correct_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    AppJson(body): AppJson<CorrectEventRequest>,
) -> Result<Json<EventResponse>, AppError> {
    let corrected = publisher::correct_event(&state.db, &event_id, body.payload).await?;
    Ok(Json(corrected.into()))
}

/// Get the processing ledger for an event.
#[utoipa::path(
    get,
    path = "/{event_id}/status",
    tag = "Events",
    operation_id = "getEventStatus",
    summary = "Get processing status",
    description = "Returns every processor's ledger row for the event, including attempts and retry timing.",
    params(("event_id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "Processing records for the event", body = EventStatusResponse),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_event_status(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<EventStatusResponse>, AppError> {
    if publisher::get_event(&state.db, &event_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Event {event_id} not found")));
    }

    let records = publisher::get_processing_records(&state.db, &event_id).await?;

    Ok(Json(EventStatusResponse {
        event_id,
        records: records.into_iter().map(Into::into).collect(),
    }))
}
