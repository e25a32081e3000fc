use std::sync::Arc;

use cache::CacheClient;
use cache::keys::replay_lock_key;
use common::{ProcessingStatus, ReplayDispatch, ReplaySessionStatus};
use mq::{BroccoliError, BrokerMessage, Mq};
use sea_orm::DatabaseConnection;
use tracing::{debug, error, info, warn};

use crate::dlq::dlq_service;
use crate::processors::ProcessorRegistry;
use crate::replay::ReplayService;

/// Consume the replay queue, giving each dispatched event its second run.
pub async fn consume_replays(
    db: DatabaseConnection,
    cache: CacheClient,
    registry: Arc<ProcessorRegistry>,
    replay: ReplayService,
    mq: Arc<Mq>,
    queue_name: String,
    lock_ttl_secs: u64,
) {
    info!(queue = %queue_name, "Starting replay consumer");

    let result = mq
        .process_messages(
            &queue_name,
            None,
            None,
            move |message: BrokerMessage<ReplayDispatch>| {
                let db = db.clone();
                let cache = cache.clone();
                let registry = registry.clone();
                let replay = replay.clone();
                async move {
                    let dispatch = message.payload;
                    if let Err(e) = process_replay_dispatch(
                        &db,
                        &cache,
                        &registry,
                        &replay,
                        &dispatch,
                        lock_ttl_secs,
                    )
                    .await
                    {
                        // The row stays unresolved; resume republishes it.
                        error!(
                            session_id = %dispatch.session_id,
                            event_id = %dispatch.event.event_id,
                            error = %e,
                            "Failed to process replay delivery"
                        );
                    }
                    Ok::<_, BroccoliError>(())
                }
            },
        )
        .await;

    if let Err(e) = result {
        error!(error = %e, "Replay consumer stopped unexpectedly");
    }
}

/// Run one replayed event and record its outcome.
///
/// The replay lock has the same contract as the processing lock: held for
/// the duration of one attempt, released on every exit path past
/// acquisition. Duplicate deliveries are handled by the replay row
/// itself, whose claim and resolution updates are both guarded on
/// unresolved status.
async fn process_replay_dispatch(
    db: &DatabaseConnection,
    cache: &CacheClient,
    registry: &ProcessorRegistry,
    replay: &ReplayService,
    dispatch: &ReplayDispatch,
    lock_ttl_secs: u64,
) -> anyhow::Result<()> {
    let session_id = &dispatch.session_id;
    let event = &dispatch.event;

    let Some(session) = replay.get(session_id).await? else {
        warn!(session_id, "Replay session vanished, acking delivery");
        return Ok(());
    };
    if session.status != ReplaySessionStatus::Running.to_string() {
        // Paused or cancelled mid-flight; resume republishes unresolved
        // rows, so skipping here loses nothing.
        info!(
            session_id,
            event_id = %event.event_id,
            status = %session.status,
            "Session not running, skipping replay delivery"
        );
        return Ok(());
    }

    let lock_key = replay_lock_key(&event.event_id, session_id);
    let locks = cache.locks();
    if !locks.acquire(&lock_key, lock_ttl_secs).await? {
        debug!(
            session_id,
            event_id = %event.event_id,
            "Concurrent replay delivery in flight, dropping"
        );
        return Ok(());
    }

    let outcome = run_replayed_event(db, registry, replay, dispatch).await;

    if let Err(e) = locks.release(&lock_key).await {
        warn!(key = %lock_key, error = %e, "Failed to release replay lock");
    }

    outcome
}

async fn run_replayed_event(
    db: &DatabaseConnection,
    registry: &ProcessorRegistry,
    replay: &ReplayService,
    dispatch: &ReplayDispatch,
) -> anyhow::Result<()> {
    let session_id = &dispatch.session_id;
    let event = &dispatch.event;

    // Claim the row before invoking the processor; a row that already
    // resolved means this delivery is a late duplicate.
    if !replay.begin_replay(session_id, &event.event_id).await? {
        debug!(
            session_id,
            event_id = %event.event_id,
            "Replay row already resolved, dropping duplicate"
        );
        return Ok(());
    }

    let outcome = match registry.find(&event.event_type) {
        Some(processor) => processor
            .process(event)
            .await
            .map_err(|e| e.to_string()),
        None => Err(format!(
            "No processor registered for event type {}",
            event.event_type
        )),
    };

    match outcome {
        Ok(()) => {
            let won = replay
                .record_result(session_id, &event.event_id, ProcessingStatus::Success, None)
                .await?;
            if won {
                dlq_service(db)
                    .reconcile_replay_success(&event.event_id)
                    .await?;
                info!(
                    session_id,
                    event_id = %event.event_id,
                    "Replayed event processed successfully"
                );
            }
        }
        Err(reason) => {
            let won = replay
                .record_result(
                    session_id,
                    &event.event_id,
                    ProcessingStatus::Failed,
                    Some(reason.clone()),
                )
                .await?;
            if won {
                dlq_service(db)
                    .reconcile_replay_failure(&event.event_id, &reason)
                    .await?;
                warn!(
                    session_id,
                    event_id = %event.event_id,
                    error = %reason,
                    "Replayed event failed"
                );
            }
        }
    }

    replay.maybe_complete(session_id).await?;
    Ok(())
}
