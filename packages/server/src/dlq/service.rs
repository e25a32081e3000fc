use chrono::{DateTime, Duration, Utc};
use common::{DlqStatus, EventMessage};
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
};
use tracing::{debug, info};

use crate::entity::dead_letter_entry;

/// How long quarantined events are kept before cleanup may reap them.
const RETENTION_DAYS: i64 = 30;

/// Result of attempting to archive a DLQ entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveResult {
    Archived,
    NotFound,
    /// Entry already left ACTIVE (archived or retried earlier).
    NotActive,
}

/// Dead letter queue counts grouped by lifecycle state.
#[derive(Debug, Clone, Copy)]
pub struct DlqStats {
    pub active: u64,
    pub archived: u64,
    pub retried: u64,
}

pub struct DlqService<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> DlqService<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Quarantine an event that exhausted its retries.
    ///
    /// There is at most one entry per event id. A repeat failure cycle for
    /// an event that already has an entry overwrites that entry in place
    /// (fresh reason, attempt count and timestamps, status back to ACTIVE)
    /// instead of inserting a sibling.
    pub async fn quarantine(
        &self,
        event: &EventMessage,
        processor_name: &str,
        failure_reason: &str,
        total_attempts: i32,
        first_failure_time: DateTime<Utc>,
    ) -> Result<dead_letter_entry::Model, DbErr> {
        let now = Utc::now();
        let model = dead_letter_entry::ActiveModel {
            event_id: Set(event.event_id.clone()),
            processor_name: Set(processor_name.to_string()),
            original_payload: Set(event.payload.clone()),
            failure_reason: Set(failure_reason.to_string()),
            total_attempts: Set(total_attempts),
            first_failure_time: Set(first_failure_time),
            last_failure_time: Set(now),
            status: Set(DlqStatus::Active.to_string()),
            archive_reason: Set(None),
            retention_deadline: Set(now + Duration::days(RETENTION_DAYS)),
            created_at: Set(now),
            ..Default::default()
        };

        match model.insert(self.conn).await {
            Ok(inserted) => Ok(inserted),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                debug!(event_id = %event.event_id, "Overwriting existing DLQ entry");
                dead_letter_entry::Entity::update_many()
                    .col_expr(
                        dead_letter_entry::Column::ProcessorName,
                        Expr::value(processor_name),
                    )
                    .col_expr(
                        dead_letter_entry::Column::OriginalPayload,
                        Expr::value(event.payload.clone()),
                    )
                    .col_expr(
                        dead_letter_entry::Column::FailureReason,
                        Expr::value(failure_reason),
                    )
                    .col_expr(
                        dead_letter_entry::Column::TotalAttempts,
                        Expr::value(total_attempts),
                    )
                    .col_expr(
                        dead_letter_entry::Column::FirstFailureTime,
                        Expr::value(first_failure_time),
                    )
                    .col_expr(dead_letter_entry::Column::LastFailureTime, Expr::value(now))
                    .col_expr(
                        dead_letter_entry::Column::Status,
                        Expr::value(DlqStatus::Active.to_string()),
                    )
                    .col_expr(
                        dead_letter_entry::Column::ArchiveReason,
                        Expr::value(Option::<String>::None),
                    )
                    .col_expr(
                        dead_letter_entry::Column::RetentionDeadline,
                        Expr::value(now + Duration::days(RETENTION_DAYS)),
                    )
                    .filter(dead_letter_entry::Column::EventId.eq(event.event_id.clone()))
                    .exec(self.conn)
                    .await?;

                self.get_by_event_id(&event.event_id).await?.ok_or_else(|| {
                    DbErr::Custom("UniqueConstraintViolation but existing row not found".to_string())
                })
            }
            Err(e) => Err(e),
        }
    }

    /// List entries, optionally narrowed to one lifecycle state.
    pub async fn list(
        &self,
        status: Option<DlqStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<dead_letter_entry::Model>, u64), DbErr> {
        let mut query = dead_letter_entry::Entity::find();

        if let Some(status) = status {
            query = query.filter(dead_letter_entry::Column::Status.eq(status.to_string()));
        }

        let total = query.clone().count(self.conn).await?;

        let entries = query
            .order_by_desc(dead_letter_entry::Column::LastFailureTime)
            .offset((page.saturating_sub(1)) * per_page)
            .limit(per_page)
            .all(self.conn)
            .await?;

        Ok((entries, total))
    }

    pub async fn get_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<dead_letter_entry::Model>, DbErr> {
        dead_letter_entry::Entity::find()
            .filter(dead_letter_entry::Column::EventId.eq(event_id))
            .one(self.conn)
            .await
    }

    /// Archive an ACTIVE entry. The transition is guarded so two operators
    /// archiving concurrently cannot both win.
    pub async fn archive(
        &self,
        event_id: &str,
        reason: Option<String>,
    ) -> Result<ArchiveResult, DbErr> {
        let result = dead_letter_entry::Entity::update_many()
            .col_expr(
                dead_letter_entry::Column::Status,
                Expr::value(DlqStatus::Archived.to_string()),
            )
            .col_expr(dead_letter_entry::Column::ArchiveReason, Expr::value(reason))
            .filter(dead_letter_entry::Column::EventId.eq(event_id))
            .filter(dead_letter_entry::Column::Status.eq(DlqStatus::Active.to_string()))
            .exec(self.conn)
            .await?;

        if result.rows_affected > 0 {
            return Ok(ArchiveResult::Archived);
        }

        if self.get_by_event_id(event_id).await?.is_some() {
            Ok(ArchiveResult::NotActive)
        } else {
            Ok(ArchiveResult::NotFound)
        }
    }

    /// Mark an ACTIVE entry RETRIED, returning false if it was not ACTIVE.
    pub async fn mark_retried(&self, event_id: &str) -> Result<bool, DbErr> {
        let result = dead_letter_entry::Entity::update_many()
            .col_expr(
                dead_letter_entry::Column::Status,
                Expr::value(DlqStatus::Retried.to_string()),
            )
            .filter(dead_letter_entry::Column::EventId.eq(event_id))
            .filter(dead_letter_entry::Column::Status.eq(DlqStatus::Active.to_string()))
            .exec(self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Put a RETRIED entry back to ACTIVE. Compensation for a manual retry
    /// whose re-publish failed after the entry was already claimed.
    pub async fn reactivate(&self, event_id: &str) -> Result<bool, DbErr> {
        let result = dead_letter_entry::Entity::update_many()
            .col_expr(
                dead_letter_entry::Column::Status,
                Expr::value(DlqStatus::Active.to_string()),
            )
            .filter(dead_letter_entry::Column::EventId.eq(event_id))
            .filter(dead_letter_entry::Column::Status.eq(DlqStatus::Retried.to_string()))
            .exec(self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Delete the entry for an event that replayed successfully.
    ///
    /// Replay sessions may cover events that never reached the DLQ, so a
    /// missing entry is expected and is not an error.
    pub async fn reconcile_replay_success(&self, event_id: &str) -> Result<(), DbErr> {
        let result = dead_letter_entry::Entity::delete_many()
            .filter(dead_letter_entry::Column::EventId.eq(event_id))
            .exec(self.conn)
            .await?;

        if result.rows_affected > 0 {
            info!(event_id, "DLQ entry deleted after successful replay");
        }
        Ok(())
    }

    /// Archive the existing entry, if any, after a failed replay: fresh
    /// reason, bumped attempt count, stamped failure time.
    pub async fn reconcile_replay_failure(
        &self,
        event_id: &str,
        failure_reason: &str,
    ) -> Result<(), DbErr> {
        let result = dead_letter_entry::Entity::update_many()
            .col_expr(
                dead_letter_entry::Column::Status,
                Expr::value(DlqStatus::Archived.to_string()),
            )
            .col_expr(
                dead_letter_entry::Column::ArchiveReason,
                Expr::value(Some(failure_reason.to_string())),
            )
            .col_expr(
                dead_letter_entry::Column::TotalAttempts,
                Expr::col(dead_letter_entry::Column::TotalAttempts).add(1),
            )
            .col_expr(
                dead_letter_entry::Column::LastFailureTime,
                Expr::value(Utc::now()),
            )
            .filter(dead_letter_entry::Column::EventId.eq(event_id))
            .exec(self.conn)
            .await?;

        if result.rows_affected > 0 {
            info!(event_id, "DLQ entry archived after failed replay");
        }
        Ok(())
    }

    pub async fn stats(&self) -> Result<DlqStats, DbErr> {
        let statuses: Vec<String> = dead_letter_entry::Entity::find()
            .select_only()
            .column(dead_letter_entry::Column::Status)
            .into_tuple()
            .all(self.conn)
            .await?;

        let mut stats = DlqStats {
            active: 0,
            archived: 0,
            retried: 0,
        };
        for status in statuses {
            match status.as_str() {
                "ACTIVE" => stats.active += 1,
                "ARCHIVED" => stats.archived += 1,
                "RETRIED" => stats.retried += 1,
                _ => {}
            }
        }
        Ok(stats)
    }
}

/// Create a DlqService with a DatabaseConnection.
pub fn dlq_service(db: &DatabaseConnection) -> DlqService<'_, DatabaseConnection> {
    DlqService::new(db)
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

    fn entry(status: DlqStatus) -> dead_letter_entry::Model {
        let now = Utc::now();
        dead_letter_entry::Model {
            id: 1,
            event_id: "evt-1".to_string(),
            processor_name: "order-processor".to_string(),
            original_payload: r#"{"orderId":"ORD-1"}"#.to_string(),
            failure_reason: "amount must be >= 0".to_string(),
            total_attempts: 3,
            first_failure_time: now,
            last_failure_time: now,
            status: status.to_string(),
            archive_reason: None,
            retention_deadline: now + Duration::days(RETENTION_DAYS),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_mark_retried_claims_only_active_entries() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(1), exec(0)])
            .into_connection();
        let dlq = DlqService::new(&db);

        assert!(dlq.mark_retried("evt-1").await.unwrap());
        // A concurrent retry or archive already moved the entry.
        assert!(!dlq.mark_retried("evt-1").await.unwrap());

        drop(dlq);
        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("ACTIVE"), "claim must be guarded on ACTIVE: {log}");
        assert!(log.contains("RETRIED"));
    }

    #[tokio::test]
    async fn test_reactivate_reverts_only_retried_entries() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(1), exec(0)])
            .into_connection();
        let dlq = DlqService::new(&db);

        assert!(dlq.reactivate("evt-1").await.unwrap());
        assert!(!dlq.reactivate("evt-1").await.unwrap());

        drop(dlq);
        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("RETRIED"), "reactivation must be guarded on RETRIED: {log}");
    }

    #[tokio::test]
    async fn test_archive_reports_non_active_entries() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(0), exec(0)])
            .append_query_results([vec![entry(DlqStatus::Retried)], Vec::<dead_letter_entry::Model>::new()])
            .into_connection();
        let dlq = DlqService::new(&db);

        let result = dlq.archive("evt-1", Some("stale".to_string())).await.unwrap();
        assert_eq!(result, ArchiveResult::NotActive);

        let result = dlq.archive("evt-1", None).await.unwrap();
        assert_eq!(result, ArchiveResult::NotFound);
    }

    #[tokio::test]
    async fn test_replay_success_deletes_the_entry() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(1)])
            .into_connection();
        let dlq = DlqService::new(&db);

        dlq.reconcile_replay_success("evt-1").await.unwrap();

        drop(dlq);
        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("DELETE"), "replay success must delete, not archive: {log}");
    }

    #[tokio::test]
    async fn test_replay_failure_archives_with_bumped_attempts() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(1)])
            .into_connection();
        let dlq = DlqService::new(&db);

        dlq.reconcile_replay_failure("evt-1", "still broken")
            .await
            .unwrap();

        drop(dlq);
        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("ARCHIVED"));
        assert!(log.contains("total_attempts"), "failure must bump attempts: {log}");
    }
}
