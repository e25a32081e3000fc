use axum::{
    Json,
    extract::{Path, Query, State},
};
use common::{DlqStatus, ProcessingStatus};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tracing::{info, instrument, warn};

use crate::dlq::dlq_service;
use crate::entity::processing_record;
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::dlq::*;
use crate::models::shared::Pagination;
use crate::publisher;
use crate::state::AppState;

/// List dead letter entries.
#[utoipa::path(
    get,
    path = "",
    tag = "Dead Letter Queue",
    operation_id = "listDlqEntries",
    summary = "List dead letter entries",
    params(ListDlqParams),
    responses(
        (status = 200, description = "Page of DLQ entries", body = DlqListResponse),
        (status = 400, description = "Invalid status filter (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn list_dlq_entries(
    State(state): State<AppState>,
    Query(params): Query<ListDlqParams>,
) -> Result<Json<DlqListResponse>, AppError> {
    let status = params
        .status_filter()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(20).clamp(1, 100);

    let (entries, total) = dlq_service(&state.db)
        .list(Some(status), page, per_page)
        .await?;

    Ok(Json(DlqListResponse {
        data: entries.into_iter().map(Into::into).collect(),
        pagination: Pagination::new(page, per_page, total),
    }))
}

/// Get DLQ statistics.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "Dead Letter Queue",
    operation_id = "getDlqStats",
    summary = "Get DLQ statistics",
    responses(
        (status = 200, description = "Entry counts by lifecycle state", body = DlqStatsResponse),
    ),
)]
#[instrument(skip(state))]
pub async fn get_dlq_stats(
    State(state): State<AppState>,
) -> Result<Json<DlqStatsResponse>, AppError> {
    let stats = dlq_service(&state.db).stats().await?;
    Ok(Json(stats.into()))
}

/// Get a DLQ entry by event id.
#[utoipa::path(
    get,
    path = "/{event_id}",
    tag = "Dead Letter Queue",
    operation_id = "getDlqEntry",
    summary = "Get a DLQ entry",
    params(("event_id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "The DLQ entry", body = DlqEntryResponse),
        (status = 404, description = "Entry not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_dlq_entry(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<DlqEntryResponse>, AppError> {
    let entry = dlq_service(&state.db)
        .get_by_event_id(&event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("DLQ entry for event {event_id} not found")))?;

    Ok(Json(entry.into()))
}

/// Manually re-publish a quarantined event.
#[utoipa::path(
    post,
    path = "/{event_id}/retry",
    tag = "Dead Letter Queue",
    operation_id = "retryDlqEntry",
    summary = "Retry a quarantined event",
    description = "Marks the entry RETRIED, resets the processing ledger so the event gets a fresh attempt budget, and re-publishes it on the primary queue.",
    params(("event_id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event re-published", body = DlqRetryResponse),
        (status = 404, description = "Entry not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Entry is not ACTIVE (STATE_VIOLATION) or was claimed concurrently (CONFLICT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn retry_dlq_entry(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<DlqRetryResponse>, AppError> {
    let dlq = dlq_service(&state.db);
    let entry = dlq
        .get_by_event_id(&event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("DLQ entry for event {event_id} not found")))?;

    if entry.status != DlqStatus::Active.to_string() {
        return Err(AppError::StateViolation(format!(
            "DLQ entry for event {event_id} is {}, only ACTIVE entries can be retried",
            entry.status
        )));
    }

    let event = publisher::get_event(&state.db, &event_id)
        .await?
        .ok_or_else(|| {
            AppError::Internal(format!("Event {event_id} missing from the event store"))
        })?;

    // Fresh attempt budget: back to PENDING with zero attempts. Done
    // before the entry is claimed; on its own this mutation is inert,
    // nothing is in flight for the event yet.
    processing_record::Entity::update_many()
        .col_expr(
            processing_record::Column::Status,
            Expr::value(ProcessingStatus::Pending.to_string()),
        )
        .col_expr(processing_record::Column::AttemptCount, Expr::value(0))
        .col_expr(
            processing_record::Column::ErrorMessage,
            Expr::value(Option::<String>::None),
        )
        .col_expr(
            processing_record::Column::NextRetryTime,
            Expr::value(Option::<chrono::DateTime<chrono::Utc>>::None),
        )
        .filter(processing_record::Column::EventId.eq(event_id.clone()))
        .filter(processing_record::Column::ProcessorName.eq(entry.processor_name.clone()))
        .exec(&state.db)
        .await?;

    // First writer wins; a concurrent retry or archive loses here.
    if !dlq.mark_retried(&event_id).await? {
        return Err(AppError::Conflict(format!(
            "DLQ entry for event {event_id} was claimed concurrently"
        )));
    }

    // Rebuilt from the stored event; the payload comes from the snapshot
    // the entry quarantined.
    let mut message = event.to_message();
    message.payload = entry.original_payload.clone();

    if let Err(e) = state
        .mq
        .publish(&state.config.mq.events_queue, None, &message, None)
        .await
    {
        // Put the entry back so the operator can retry again; leaving it
        // RETRIED with nothing published would strand the event.
        if !dlq.reactivate(&event_id).await? {
            warn!(event_id, "Could not reactivate DLQ entry after failed re-publish");
        }
        return Err(AppError::Internal(format!("Failed to re-publish event: {e}")));
    }

    info!(event_id, "DLQ entry manually retried");

    Ok(Json(DlqRetryResponse {
        event_id,
        status: DlqStatus::Retried.to_string(),
    }))
}

/// Archive a DLQ entry without reprocessing it.
#[utoipa::path(
    post,
    path = "/{event_id}/archive",
    tag = "Dead Letter Queue",
    operation_id = "archiveDlqEntry",
    summary = "Archive a DLQ entry",
    params(("event_id" = String, Path, description = "Event id")),
    request_body = ArchiveDlqRequest,
    responses(
        (status = 200, description = "Entry archived (idempotent for already-archived entries)", body = DlqEntryResponse),
        (status = 404, description = "Entry not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Entry already RETRIED (STATE_VIOLATION)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, body))]
pub async fn archive_dlq_entry(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    AppJson(body): AppJson<ArchiveDlqRequest>,
) -> Result<Json<DlqEntryResponse>, AppError> {
    let dlq = dlq_service(&state.db);

    match dlq.archive(&event_id, body.reason).await? {
        crate::dlq::ArchiveResult::Archived => {
            info!(event_id, "DLQ entry archived");
        }
        crate::dlq::ArchiveResult::NotFound => {
            return Err(AppError::NotFound(format!(
                "DLQ entry for event {event_id} not found"
            )));
        }
        crate::dlq::ArchiveResult::NotActive => {
            // Archiving twice is a logged no-op; only RETRIED entries
            // reject the transition.
            let entry = dlq.get_by_event_id(&event_id).await?.ok_or_else(|| {
                AppError::NotFound(format!("DLQ entry for event {event_id} not found"))
            })?;
            if entry.status != DlqStatus::Archived.to_string() {
                return Err(AppError::StateViolation(format!(
                    "DLQ entry for event {event_id} is {}, it cannot be archived",
                    entry.status
                )));
            }
            info!(event_id, "DLQ entry already archived");
            return Ok(Json(entry.into()));
        }
    }

    let entry = dlq
        .get_by_event_id(&event_id)
        .await?
        .ok_or_else(|| AppError::Internal("Archived entry vanished".to_string()))?;

    Ok(Json(entry.into()))
}
