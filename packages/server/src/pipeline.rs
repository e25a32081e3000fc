use std::sync::Arc;

use anyhow::Context;
use cache::CacheClient;
use cache::keys::processing_lock_key;
use chrono::{Duration, Utc};
use common::alert::DlqAlert;
use common::backoff::retry_delay;
use common::{EventMessage, ProcessingError, ProcessingStatus};
use mq::Mq;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::dlq::dlq_service;
use crate::entity::processing_record;
use crate::processors::{EventProcessor, ProcessorRegistry};
use crate::retry::RetryScheduler;

/// At-least-once delivery pipeline for one event delivery.
///
/// Every delivery runs the same ladder: processing lock, settled-check,
/// ledger attempt, processor invocation, then one of three exits (success,
/// scheduled retry, quarantine). Failures of the processor are handled
/// outcomes recorded in the ledger; infrastructure errors propagate to the
/// consumer, which logs them and acks without mutating the ledger.
#[derive(Clone)]
pub struct EventPipeline {
    db: DatabaseConnection,
    cache: CacheClient,
    mq: Arc<Mq>,
    registry: Arc<ProcessorRegistry>,
    retry: RetryScheduler,
    config: AppConfig,
}

impl EventPipeline {
    pub fn new(
        db: DatabaseConnection,
        cache: CacheClient,
        mq: Arc<Mq>,
        registry: Arc<ProcessorRegistry>,
        config: AppConfig,
    ) -> Self {
        let retry = RetryScheduler::new(cache.clone(), mq.clone(), &config);
        Self {
            db,
            cache,
            mq,
            registry,
            retry,
            config,
        }
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    pub fn mq(&self) -> Arc<Mq> {
        self.mq.clone()
    }

    /// Route a delivery to the first matching processor. An event type
    /// nobody claims is acked and logged, not retried: redelivery cannot
    /// make a processor appear.
    pub async fn dispatch(&self, event: &EventMessage) -> anyhow::Result<()> {
        match self.registry.find(&event.event_type) {
            Some(processor) => self.handle(event, processor.as_ref()).await,
            None => {
                warn!(
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    "No processor registered for event type, acking"
                );
                Ok(())
            }
        }
    }

    /// Run one delivery through the full ladder for a specific processor.
    pub async fn handle(
        &self,
        event: &EventMessage,
        processor: &dyn EventProcessor,
    ) -> anyhow::Result<()> {
        let processor_name = processor.name();

        let lock_key = processing_lock_key(&event.event_id, processor_name);
        let locks = self.cache.locks();
        if !locks
            .acquire(&lock_key, self.config.cache.lock_ttl_secs)
            .await?
        {
            warn!(
                event_id = %event.event_id,
                processor = processor_name,
                "Another worker holds the processing lock, dropping delivery"
            );
            return Ok(());
        }

        let outcome = self.run_attempt(event, processor).await;

        if let Err(e) = locks.release(&lock_key).await {
            warn!(key = %lock_key, error = %e, "Failed to release processing lock");
        }

        outcome
    }

    async fn run_attempt(
        &self,
        event: &EventMessage,
        processor: &dyn EventProcessor,
    ) -> anyhow::Result<()> {
        let processor_name = processor.name();

        // Settled events are skipped under the lock; this is what makes
        // redelivery of an already-handled message harmless.
        if let Some(record) = self.find_record(&event.event_id, processor_name).await?
            && record
                .status
                .parse::<ProcessingStatus>()
                .is_ok_and(|s| s.is_settled())
        {
            info!(
                event_id = %event.event_id,
                processor = processor_name,
                status = %record.status,
                "Event already settled, skipping"
            );
            return Ok(());
        }

        let record = self
            .begin_attempt(event, processor_name)
            .await
            .context("Failed to record processing attempt")?;
        let attempt = record.attempt_count;

        match processor.process(event).await {
            Ok(()) => {
                self.complete_success(event, processor_name).await?;
                info!(
                    event_id = %event.event_id,
                    processor = processor_name,
                    attempt,
                    "Event processed successfully"
                );
            }
            Err(err) => match failure_action(attempt, record.max_attempts) {
                FailureAction::Retry => {
                    self.schedule_retry(event, processor_name, attempt, &err)
                        .await?;
                }
                FailureAction::Quarantine => {
                    self.quarantine(event, processor_name, attempt, &err).await?;
                }
            },
        }
        Ok(())
    }

    async fn find_record(
        &self,
        event_id: &str,
        processor_name: &str,
    ) -> Result<Option<processing_record::Model>, DbErr> {
        processing_record::Entity::find()
            .filter(processing_record::Column::EventId.eq(event_id))
            .filter(processing_record::Column::ProcessorName.eq(processor_name))
            .one(&self.db)
            .await
    }

    /// Upsert the ledger row into PROCESSING with a bumped attempt count.
    async fn begin_attempt(
        &self,
        event: &EventMessage,
        processor_name: &str,
    ) -> Result<processing_record::Model, DbErr> {
        let now = Utc::now();
        match self.find_record(&event.event_id, processor_name).await? {
            Some(record) => {
                let attempt = record.attempt_count + 1;
                let mut active: processing_record::ActiveModel = record.into();
                active.status = Set(ProcessingStatus::Processing.to_string());
                active.attempt_count = Set(attempt);
                active.processing_start_time = Set(Some(now));
                active.next_retry_time = Set(None);
                active.update(&self.db).await
            }
            None => {
                let model = processing_record::ActiveModel {
                    event_id: Set(event.event_id.clone()),
                    processor_name: Set(processor_name.to_string()),
                    status: Set(ProcessingStatus::Processing.to_string()),
                    attempt_count: Set(1),
                    max_attempts: Set(self.config.processing.max_attempts),
                    error_message: Set(None),
                    processing_start_time: Set(Some(now)),
                    processing_end_time: Set(None),
                    next_retry_time: Set(None),
                    created_at: Set(now),
                    ..Default::default()
                };
                model.insert(&self.db).await
            }
        }
    }

    /// Guarded transition to SUCCESS; a row that already settled elsewhere
    /// is left untouched so terminal states are written once.
    async fn complete_success(
        &self,
        event: &EventMessage,
        processor_name: &str,
    ) -> anyhow::Result<()> {
        let result = processing_record::Entity::update_many()
            .col_expr(
                processing_record::Column::Status,
                Expr::value(ProcessingStatus::Success.to_string()),
            )
            .col_expr(
                processing_record::Column::ProcessingEndTime,
                Expr::value(Some(Utc::now())),
            )
            .col_expr(
                processing_record::Column::ErrorMessage,
                Expr::value(Option::<String>::None),
            )
            .filter(processing_record::Column::EventId.eq(event.event_id.clone()))
            .filter(processing_record::Column::ProcessorName.eq(processor_name))
            .filter(
                processing_record::Column::Status.ne(ProcessingStatus::Success.to_string()),
            )
            .filter(processing_record::Column::Status.ne(ProcessingStatus::Dlq.to_string()))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            info!(
                event_id = %event.event_id,
                processor = processor_name,
                "Record already settled, leaving terminal state untouched"
            );
        }

        // A leftover timer from an earlier failed attempt must not fire
        // after success.
        self.retry.cancel(&event.event_id, processor_name).await?;
        Ok(())
    }

    async fn schedule_retry(
        &self,
        event: &EventMessage,
        processor_name: &str,
        attempt: i32,
        err: &ProcessingError,
    ) -> anyhow::Result<()> {
        let delay = retry_delay(attempt.max(0) as u32);
        let now = Utc::now();
        let next_retry = now + Duration::seconds(delay.as_secs() as i64);

        processing_record::Entity::update_many()
            .col_expr(
                processing_record::Column::Status,
                Expr::value(ProcessingStatus::Retry.to_string()),
            )
            .col_expr(
                processing_record::Column::ErrorMessage,
                Expr::value(Some(err.to_string())),
            )
            .col_expr(
                processing_record::Column::ProcessingEndTime,
                Expr::value(Some(now)),
            )
            .col_expr(
                processing_record::Column::NextRetryTime,
                Expr::value(Some(next_retry)),
            )
            .filter(processing_record::Column::EventId.eq(event.event_id.clone()))
            .filter(processing_record::Column::ProcessorName.eq(processor_name))
            .exec(&self.db)
            .await?;

        self.retry.schedule(event, processor_name, delay).await?;

        warn!(
            event_id = %event.event_id,
            processor = processor_name,
            attempt,
            delay_secs = delay.as_secs(),
            error = %err,
            "Processing failed, retry scheduled"
        );
        Ok(())
    }

    async fn quarantine(
        &self,
        event: &EventMessage,
        processor_name: &str,
        attempt: i32,
        err: &ProcessingError,
    ) -> anyhow::Result<()> {
        // The failure timestamp doubles as the DLQ entry's first failure
        // time, matching the ledger's processing end time.
        let ended_at = Utc::now();
        processing_record::Entity::update_many()
            .col_expr(
                processing_record::Column::Status,
                Expr::value(ProcessingStatus::Dlq.to_string()),
            )
            .col_expr(
                processing_record::Column::ErrorMessage,
                Expr::value(Some(err.to_string())),
            )
            .col_expr(
                processing_record::Column::ProcessingEndTime,
                Expr::value(Some(ended_at)),
            )
            .filter(processing_record::Column::EventId.eq(event.event_id.clone()))
            .filter(processing_record::Column::ProcessorName.eq(processor_name))
            .exec(&self.db)
            .await?;

        let entry = dlq_service(&self.db)
            .quarantine(event, processor_name, &err.to_string(), attempt, ended_at)
            .await
            .context("Failed to write DLQ entry")?;

        let alert = DlqAlert {
            event_id: event.event_id.clone(),
            processor_name: processor_name.to_string(),
            failure_reason: err.to_string(),
            total_attempts: attempt,
            moved_to_dlq_at: entry.last_failure_time,
        };
        // Alerting is best-effort; a broker hiccup must not fail the
        // quarantine that already happened.
        if let Err(e) = self
            .mq
            .publish(&self.config.mq.dlq_queue, None, &alert, None)
            .await
        {
            error!(event_id = %event.event_id, error = %e, "Failed to publish DLQ alert");
        }

        error!(
            event_id = %event.event_id,
            processor = processor_name,
            attempts = attempt,
            error = %err,
            "Retries exhausted, event moved to DLQ"
        );
        Ok(())
    }
}

/// What a failed attempt does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureAction {
    Retry,
    Quarantine,
}

/// The attempt that exhausts the budget quarantines; everything before it
/// schedules a retry.
fn failure_action(attempt: i32, max_attempts: i32) -> FailureAction {
    if attempt < max_attempts {
        FailureAction::Retry
    } else {
        FailureAction::Quarantine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_third_failure_quarantines_with_default_budget() {
        assert_eq!(failure_action(1, 3), FailureAction::Retry);
        assert_eq!(failure_action(2, 3), FailureAction::Retry);
        assert_eq!(failure_action(3, 3), FailureAction::Quarantine);
    }

    #[test]
    fn test_attempts_past_the_budget_never_retry() {
        assert_eq!(failure_action(4, 3), FailureAction::Quarantine);
        assert_eq!(failure_action(1, 1), FailureAction::Quarantine);
    }
}
