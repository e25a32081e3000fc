use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{EventFilter, ProcessingStatus, ReplayDispatch, ReplaySessionStatus};
use mq::Mq;
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::dlq::dlq_service;
use crate::entity::{event, replay_event, replay_session};
use crate::error::AppError;
use crate::filter::event_filter_condition;
use crate::notify::Notifier;

/// Processor name recorded on replay rows; replayed events run outside the
/// normal per-processor ledger.
pub const REPLAY_PROCESSOR: &str = "replay-processor";

/// Percentage of a replay session that has resolved, as a real fraction.
/// An empty session reports zero rather than dividing by zero.
pub fn progress_pct(processed: i64, total: i64) -> f64 {
    if total <= 0 {
        0.0
    } else {
        processed as f64 * 100.0 / total as f64
    }
}

/// Fresh counters derived from a session's replay rows.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReplayCounters {
    pub processed: i64,
    pub successful: i64,
    pub failed: i64,
}

/// Orchestrates replay sessions: materializes the matched event set,
/// fans it out to the replay queue in paced batches, and tracks each
/// event's second-chance outcome.
#[derive(Clone)]
pub struct ReplayService {
    db: DatabaseConnection,
    mq: Arc<Mq>,
    notifier: Arc<Notifier>,
    config: AppConfig,
}

impl ReplayService {
    pub fn new(
        db: DatabaseConnection,
        mq: Arc<Mq>,
        notifier: Arc<Notifier>,
        config: AppConfig,
    ) -> Self {
        Self {
            db,
            mq,
            notifier,
            config,
        }
    }

    /// Create a session in CREATED state with a snapshot of the filter.
    /// The matched set is not materialized until the session starts.
    pub async fn create(
        &self,
        name: String,
        description: Option<String>,
        filter: EventFilter,
        created_by: Option<String>,
    ) -> Result<replay_session::Model, AppError> {
        let total = event::Entity::find()
            .filter(event_filter_condition(&filter))
            .count(&self.db)
            .await?;

        let filter_json = serde_json::to_value(&filter)
            .map_err(|e| AppError::Internal(format!("Failed to serialize filter: {e}")))?;

        let now = Utc::now();
        let session_id = Uuid::new_v4().to_string();
        let model = replay_session::ActiveModel {
            session_id: Set(session_id.clone()),
            name: Set(name),
            description: Set(description),
            status: Set(ReplaySessionStatus::Created.to_string()),
            event_filter: Set(filter_json),
            total_events: Set(total as i32),
            processed_events: Set(0),
            successful_events: Set(0),
            failed_events: Set(0),
            created_by: Set(created_by),
            started_at: Set(None),
            completed_at: Set(None),
            created_at: Set(now),
            ..Default::default()
        };
        let session = model.insert(&self.db).await?;

        info!(
            session_id = %session.session_id,
            matched_events = total,
            "Replay session created"
        );
        Ok(session)
    }

    pub async fn get(&self, session_id: &str) -> Result<Option<replay_session::Model>, AppError> {
        Ok(replay_session::Entity::find()
            .filter(replay_session::Column::SessionId.eq(session_id))
            .one(&self.db)
            .await?)
    }

    async fn get_required(&self, session_id: &str) -> Result<replay_session::Model, AppError> {
        self.get(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Replay session {session_id} not found")))
    }

    pub async fn list(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<replay_session::Model>, u64), AppError> {
        let total = replay_session::Entity::find().count(&self.db).await?;
        let sessions = replay_session::Entity::find()
            .order_by_desc(replay_session::Column::CreatedAt)
            .offset((page.saturating_sub(1)) * per_page)
            .limit(per_page)
            .all(&self.db)
            .await?;
        Ok((sessions, total))
    }

    /// Start a CREATED session: materialize one replay row per matched
    /// event, flip to RUNNING, then fan out in the background.
    pub async fn start(&self, session_id: &str) -> Result<replay_session::Model, AppError> {
        let session = self.get_required(session_id).await?;
        self.require_status(&session, ReplaySessionStatus::Created, "start")?;

        // Win the transition before seeding so a concurrent start cannot
        // also materialize the matched set.
        let updated = replay_session::Entity::update_many()
            .col_expr(
                replay_session::Column::Status,
                Expr::value(ReplaySessionStatus::Running.to_string()),
            )
            .col_expr(replay_session::Column::StartedAt, Expr::value(Some(Utc::now())))
            .filter(replay_session::Column::SessionId.eq(session_id))
            .filter(replay_session::Column::Status.eq(ReplaySessionStatus::Created.to_string()))
            .exec(&self.db)
            .await?;
        if updated.rows_affected == 0 {
            return Err(AppError::Conflict(format!(
                "Replay session {session_id} was started concurrently"
            )));
        }

        let filter: EventFilter = serde_json::from_value(session.event_filter.clone())
            .map_err(|e| AppError::Internal(format!("Stored filter is unreadable: {e}")))?;
        let total = self.seed_replay_rows(session_id, &filter).await?;

        replay_session::Entity::update_many()
            .col_expr(replay_session::Column::TotalEvents, Expr::value(total))
            .filter(replay_session::Column::SessionId.eq(session_id))
            .exec(&self.db)
            .await?;

        info!(session_id, total_events = total, "Replay session started");
        self.spawn_publisher(session_id.to_string());
        self.get_required(session_id).await
    }

    /// Pause a RUNNING session. The fan-out task notices before its next
    /// batch; events already on the queue still resolve.
    pub async fn pause(&self, session_id: &str) -> Result<replay_session::Model, AppError> {
        self.transition(
            session_id,
            &[ReplaySessionStatus::Running],
            ReplaySessionStatus::Paused,
            "pause",
        )
        .await?;
        info!(session_id, "Replay session paused");
        self.get_required(session_id).await
    }

    /// Resume a PAUSED session; fan-out picks up at the first unresolved row.
    pub async fn resume(&self, session_id: &str) -> Result<replay_session::Model, AppError> {
        self.transition(
            session_id,
            &[ReplaySessionStatus::Paused],
            ReplaySessionStatus::Running,
            "resume",
        )
        .await?;
        info!(session_id, "Replay session resumed");
        self.spawn_publisher(session_id.to_string());
        self.get_required(session_id).await
    }

    /// Cancel a session from any non-terminal state.
    pub async fn cancel(&self, session_id: &str) -> Result<replay_session::Model, AppError> {
        self.transition(
            session_id,
            &[
                ReplaySessionStatus::Created,
                ReplaySessionStatus::Running,
                ReplaySessionStatus::Paused,
            ],
            ReplaySessionStatus::Cancelled,
            "cancel",
        )
        .await?;
        replay_session::Entity::update_many()
            .col_expr(
                replay_session::Column::CompletedAt,
                Expr::value(Some(Utc::now())),
            )
            .filter(replay_session::Column::SessionId.eq(session_id))
            .exec(&self.db)
            .await?;
        info!(session_id, "Replay session cancelled");
        self.get_required(session_id).await
    }

    /// Current counters and session row, with counters recomputed from the
    /// replay rows rather than read from the session's cached columns.
    pub async fn progress(
        &self,
        session_id: &str,
    ) -> Result<(replay_session::Model, ReplayCounters), AppError> {
        let session = self.get_required(session_id).await?;
        let counters = self.derive_counters(session_id).await?;
        Ok((session, counters))
    }

    /// Page of per-event outcome rows for a session, in fan-out order.
    pub async fn list_events(
        &self,
        session_id: &str,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<replay_event::Model>, u64), AppError> {
        self.get_required(session_id).await?;

        let query = replay_event::Entity::find()
            .filter(replay_event::Column::SessionId.eq(session_id));
        let total = query.clone().count(&self.db).await?;
        let rows = query
            .order_by_asc(replay_event::Column::Id)
            .offset((page.saturating_sub(1)) * per_page)
            .limit(per_page)
            .all(&self.db)
            .await?;

        Ok((rows, total))
    }

    /// Claim a replay row for processing: flip it to PROCESSING and bump
    /// its attempt count. Returns false when the row already resolved, so
    /// a late duplicate delivery is dropped without reprocessing.
    pub async fn begin_replay(&self, session_id: &str, event_id: &str) -> Result<bool, AppError> {
        claim_replay_row(&self.db, session_id, event_id).await
    }

    /// Record the outcome of one replayed event.
    ///
    /// The unresolved-status guard makes resolution first-write-wins: a
    /// duplicate delivery that lost the race is reported as `false` and
    /// must not touch the DLQ or the counters again.
    pub async fn record_result(
        &self,
        session_id: &str,
        event_id: &str,
        outcome: ProcessingStatus,
        error_message: Option<String>,
    ) -> Result<bool, AppError> {
        resolve_replay_row(&self.db, session_id, event_id, outcome, error_message).await
    }

    /// Refresh the session's cached counters and complete it when every
    /// row has resolved. Completion is guarded so only one resolver sends
    /// the completion alert.
    pub async fn maybe_complete(&self, session_id: &str) -> Result<bool, AppError> {
        let counters = self.derive_counters(session_id).await?;
        let session = self.get_required(session_id).await?;

        replay_session::Entity::update_many()
            .col_expr(
                replay_session::Column::ProcessedEvents,
                Expr::value(counters.processed as i32),
            )
            .col_expr(
                replay_session::Column::SuccessfulEvents,
                Expr::value(counters.successful as i32),
            )
            .col_expr(
                replay_session::Column::FailedEvents,
                Expr::value(counters.failed as i32),
            )
            .filter(replay_session::Column::SessionId.eq(session_id))
            .exec(&self.db)
            .await?;

        if counters.processed < session.total_events as i64 {
            return Ok(false);
        }

        if !complete_session_if_running(&self.db, session_id).await? {
            return Ok(false);
        }

        let session = self.get_required(session_id).await?;
        info!(
            session_id,
            successful = counters.successful,
            failed = counters.failed,
            "Replay session completed"
        );
        self.notifier.replay_completed(&session);
        Ok(true)
    }

    async fn derive_counters(&self, session_id: &str) -> Result<ReplayCounters, AppError> {
        let statuses: Vec<String> = replay_event::Entity::find()
            .select_only()
            .column(replay_event::Column::Status)
            .filter(replay_event::Column::SessionId.eq(session_id))
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut counters = ReplayCounters::default();
        for status in statuses {
            match status.as_str() {
                "SUCCESS" => {
                    counters.processed += 1;
                    counters.successful += 1;
                }
                "FAILED" => {
                    counters.processed += 1;
                    counters.failed += 1;
                }
                _ => {}
            }
        }
        Ok(counters)
    }

    fn require_status(
        &self,
        session: &replay_session::Model,
        expected: ReplaySessionStatus,
        action: &str,
    ) -> Result<(), AppError> {
        if session.status == expected.to_string() {
            Ok(())
        } else {
            Err(AppError::StateViolation(format!(
                "Cannot {action} replay session {} in status {}",
                session.session_id, session.status
            )))
        }
    }

    /// Guarded status transition; fails with STATE_VIOLATION when the
    /// session is not in one of `from`, NOT_FOUND when it does not exist.
    async fn transition(
        &self,
        session_id: &str,
        from: &[ReplaySessionStatus],
        to: ReplaySessionStatus,
        action: &str,
    ) -> Result<(), AppError> {
        if transition_session(&self.db, session_id, from, to).await? > 0 {
            return Ok(());
        }

        let session = self.get_required(session_id).await?;
        Err(AppError::StateViolation(format!(
            "Cannot {action} replay session {session_id} in status {}",
            session.status
        )))
    }

    /// One PENDING row per matched event, inserted in batches. Returns the
    /// matched count.
    async fn seed_replay_rows(
        &self,
        session_id: &str,
        filter: &EventFilter,
    ) -> Result<i32, AppError> {
        let event_ids: Vec<String> = event::Entity::find()
            .select_only()
            .column(event::Column::EventId)
            .filter(event_filter_condition(filter))
            .order_by_asc(event::Column::CreatedAt)
            .order_by_asc(event::Column::Id)
            .into_tuple()
            .all(&self.db)
            .await?;

        let now = Utc::now();
        let total = event_ids.len();
        for chunk in event_ids.chunks(self.config.processing.replay_batch_size.max(1)) {
            let rows = chunk.iter().map(|event_id| replay_event::ActiveModel {
                session_id: Set(session_id.to_string()),
                event_id: Set(event_id.clone()),
                processor_name: Set(REPLAY_PROCESSOR.to_string()),
                status: Set(ProcessingStatus::Pending.to_string()),
                error_message: Set(None),
                attempt_count: Set(0),
                processing_time: Set(None),
                created_at: Set(now),
                ..Default::default()
            });
            replay_event::Entity::insert_many(rows).exec(&self.db).await?;
        }

        Ok(total as i32)
    }

    fn spawn_publisher(&self, session_id: String) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.publish_pending(&session_id).await {
                error!(session_id = %session_id, error = %e, "Replay fan-out failed");
            }
        });
    }

    /// Paced fan-out of unresolved rows. Re-checks the session status
    /// before every batch so pause and cancel take effect at a batch
    /// boundary, then pauses between batches to avoid flooding consumers.
    async fn publish_pending(&self, session_id: &str) -> Result<(), AppError> {
        let batch_size = self.config.processing.replay_batch_size.max(1);
        let pause = Duration::from_millis(self.config.processing.replay_batch_pause_ms);
        let mut last_row_id = 0;

        loop {
            let session = self.get_required(session_id).await?;
            if session.status != ReplaySessionStatus::Running.to_string() {
                info!(
                    session_id,
                    status = %session.status,
                    "Replay session no longer running, stopping fan-out"
                );
                return Ok(());
            }

            // PROCESSING rows are republished too: a consumer that died
            // mid-flight leaves its row there, and the claim guard drops
            // the duplicate if the original delivery did resolve.
            let rows = replay_event::Entity::find()
                .filter(replay_event::Column::SessionId.eq(session_id))
                .filter(replay_event::Column::Status.is_in([
                    ProcessingStatus::Pending.to_string(),
                    ProcessingStatus::Processing.to_string(),
                ]))
                .filter(replay_event::Column::Id.gt(last_row_id))
                .order_by_asc(replay_event::Column::Id)
                .limit(batch_size as u64)
                .all(&self.db)
                .await?;
            if rows.is_empty() {
                break;
            }

            let event_ids: Vec<String> = rows.iter().map(|r| r.event_id.clone()).collect();
            let events: HashMap<String, event::Model> = event::Entity::find()
                .filter(event::Column::EventId.is_in(event_ids))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|e| (e.event_id.clone(), e))
                .collect();

            for row in &rows {
                last_row_id = row.id;
                match events.get(&row.event_id) {
                    Some(stored) => {
                        let dispatch = ReplayDispatch {
                            session_id: session_id.to_string(),
                            event: stored.to_message(),
                        };
                        self.mq
                            .publish(&self.config.mq.replay_queue, None, &dispatch, None)
                            .await
                            .map_err(|e| {
                                AppError::Internal(format!("Failed to publish replay event: {e}"))
                            })?;
                    }
                    None => {
                        // The matched set is snapshotted at start; a row
                        // with no backing event cannot be replayed.
                        warn!(
                            session_id,
                            event_id = %row.event_id,
                            "Event missing from store, marking replay row failed"
                        );
                        self.record_result(
                            session_id,
                            &row.event_id,
                            ProcessingStatus::Failed,
                            Some("Event not found in event store".to_string()),
                        )
                        .await?;
                        dlq_service(&self.db)
                            .reconcile_replay_failure(&row.event_id, "Event not found in event store")
                            .await?;
                    }
                }
            }

            tokio::time::sleep(pause).await;
        }

        info!(session_id, "Replay fan-out finished");
        // Sessions whose rows all failed inline (nothing left for the
        // consumer to resolve) still need their completion check.
        self.maybe_complete(session_id).await?;
        Ok(())
    }
}

async fn claim_replay_row(
    db: &DatabaseConnection,
    session_id: &str,
    event_id: &str,
) -> Result<bool, AppError> {
    let result = replay_event::Entity::update_many()
        .col_expr(
            replay_event::Column::Status,
            Expr::value(ProcessingStatus::Processing.to_string()),
        )
        .col_expr(
            replay_event::Column::AttemptCount,
            Expr::col(replay_event::Column::AttemptCount).add(1),
        )
        .filter(replay_event::Column::SessionId.eq(session_id))
        .filter(replay_event::Column::EventId.eq(event_id))
        .filter(replay_event::Column::Status.is_in([
            ProcessingStatus::Pending.to_string(),
            ProcessingStatus::Processing.to_string(),
        ]))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

async fn resolve_replay_row(
    db: &DatabaseConnection,
    session_id: &str,
    event_id: &str,
    outcome: ProcessingStatus,
    error_message: Option<String>,
) -> Result<bool, AppError> {
    let result = replay_event::Entity::update_many()
        .col_expr(
            replay_event::Column::Status,
            Expr::value(outcome.to_string()),
        )
        .col_expr(
            replay_event::Column::ErrorMessage,
            Expr::value(error_message),
        )
        .col_expr(
            replay_event::Column::ProcessingTime,
            Expr::value(Some(Utc::now())),
        )
        .filter(replay_event::Column::SessionId.eq(session_id))
        .filter(replay_event::Column::EventId.eq(event_id))
        .filter(replay_event::Column::Status.is_in([
            ProcessingStatus::Pending.to_string(),
            ProcessingStatus::Processing.to_string(),
        ]))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

/// Guarded session status update. Returns the number of rows moved, which
/// is zero when the session does not exist or is not in one of `from`.
async fn transition_session(
    db: &DatabaseConnection,
    session_id: &str,
    from: &[ReplaySessionStatus],
    to: ReplaySessionStatus,
) -> Result<u64, AppError> {
    let from_strings: Vec<String> = from.iter().map(|s| s.to_string()).collect();
    let result = replay_session::Entity::update_many()
        .col_expr(replay_session::Column::Status, Expr::value(to.to_string()))
        .filter(replay_session::Column::SessionId.eq(session_id))
        .filter(replay_session::Column::Status.is_in(from_strings))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Flip a RUNNING session to COMPLETED and stamp `completed_at`.
///
/// The RUNNING guard is what makes completion exactly-once: concurrent
/// resolvers all reach this update, but only one moves the row.
async fn complete_session_if_running(
    db: &DatabaseConnection,
    session_id: &str,
) -> Result<bool, AppError> {
    let result = replay_session::Entity::update_many()
        .col_expr(
            replay_session::Column::Status,
            Expr::value(ReplaySessionStatus::Completed.to_string()),
        )
        .col_expr(
            replay_session::Column::CompletedAt,
            Expr::value(Some(Utc::now())),
        )
        .filter(replay_session::Column::SessionId.eq(session_id))
        .filter(replay_session::Column::Status.eq(ReplaySessionStatus::Running.to_string()))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

#[cfg(test)]
mod tests {
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    use super::*;

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    #[test]
    fn test_progress_is_real_division() {
        assert_eq!(progress_pct(1, 3), 100.0 / 3.0);
        assert_eq!(progress_pct(0, 10), 0.0);
        assert_eq!(progress_pct(10, 10), 100.0);
    }

    #[test]
    fn test_empty_session_reports_zero_progress() {
        assert_eq!(progress_pct(0, 0), 0.0);
    }

    #[tokio::test]
    async fn test_completion_fires_for_exactly_one_resolver() {
        // Concurrent resolvers both see processed >= total; the row moves
        // for the first update and the second finds it no longer RUNNING.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(1), exec(0)])
            .into_connection();

        assert!(complete_session_if_running(&db, "sess-1").await.unwrap());
        assert!(!complete_session_if_running(&db, "sess-1").await.unwrap());

        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("RUNNING"), "completion must be guarded on RUNNING: {log}");
        assert!(log.contains("COMPLETED"));
    }

    #[tokio::test]
    async fn test_transition_is_guarded_by_source_statuses() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(1), exec(0)])
            .into_connection();

        let moved = transition_session(
            &db,
            "sess-1",
            &[ReplaySessionStatus::Running],
            ReplaySessionStatus::Paused,
        )
        .await
        .unwrap();
        assert_eq!(moved, 1);

        // A session already paused (or terminal) matches no row.
        let moved = transition_session(
            &db,
            "sess-1",
            &[ReplaySessionStatus::Running],
            ReplaySessionStatus::Paused,
        )
        .await
        .unwrap();
        assert_eq!(moved, 0);

        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("RUNNING"));
        assert!(log.contains("PAUSED"));
    }

    #[tokio::test]
    async fn test_resolved_row_cannot_be_claimed_again() {
        // A late duplicate delivery arrives after the row resolved; the
        // unresolved-status guard matches nothing and the claim fails.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(1), exec(0)])
            .into_connection();

        assert!(claim_replay_row(&db, "sess-1", "evt-1").await.unwrap());
        assert!(!claim_replay_row(&db, "sess-1", "evt-1").await.unwrap());

        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("PROCESSING"));
        assert!(log.contains("PENDING"), "claim must be guarded on unresolved status: {log}");
    }

    #[tokio::test]
    async fn test_resolution_is_first_write_wins() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(1), exec(0)])
            .into_connection();

        let won = resolve_replay_row(&db, "sess-1", "evt-1", ProcessingStatus::Success, None)
            .await
            .unwrap();
        assert!(won);

        let lost = resolve_replay_row(
            &db,
            "sess-1",
            "evt-1",
            ProcessingStatus::Failed,
            Some("late duplicate".to_string()),
        )
        .await
        .unwrap();
        assert!(!lost);

        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("SUCCESS"));
        assert!(log.contains("PENDING"), "resolution must be guarded on unresolved status: {log}");
    }
}
