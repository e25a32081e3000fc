use common::{EventMessage, RetryDispatch};
use mq::{BroccoliError, BrokerMessage};
use tracing::{error, info, warn};

use crate::pipeline::EventPipeline;

/// Consume the primary event queue, routing each delivery through the
/// processing pipeline.
pub async fn consume_events(pipeline: EventPipeline, queue_name: String) {
    info!(queue = %queue_name, "Starting event consumer");

    let mq = pipeline.mq();
    let result = mq
        .process_messages(
            &queue_name,
            None, // single-threaded for sequential DB writes
            None,
            move |message: BrokerMessage<EventMessage>| {
                let pipeline = pipeline.clone();
                async move {
                    let event = message.payload;
                    // Infrastructure failures ack the delivery too; the
                    // ledger was left unmutated and the event is still in
                    // the store for replay.
                    if let Err(e) = pipeline.dispatch(&event).await {
                        error!(
                            event_id = %event.event_id,
                            event_type = %event.event_type,
                            error = %e,
                            "Failed to process event delivery"
                        );
                    }
                    Ok::<_, BroccoliError>(())
                }
            },
        )
        .await;

    if let Err(e) = result {
        error!(error = %e, "Event consumer stopped unexpectedly");
    }
}

/// Consume the retry queue. Retries name their processor explicitly so the
/// exact processor that failed runs again, even if routing predicates have
/// changed since.
pub async fn consume_retries(pipeline: EventPipeline, queue_name: String) {
    info!(queue = %queue_name, "Starting retry consumer");

    let mq = pipeline.mq();
    let result = mq
        .process_messages(
            &queue_name,
            None,
            None,
            move |message: BrokerMessage<RetryDispatch>| {
                let pipeline = pipeline.clone();
                async move {
                    let dispatch = message.payload;
                    let Some(processor) = pipeline.registry().get(&dispatch.processor_name)
                    else {
                        warn!(
                            event_id = %dispatch.event.event_id,
                            processor = %dispatch.processor_name,
                            "Processor no longer registered, acking retry"
                        );
                        return Ok(());
                    };

                    if let Err(e) = pipeline.handle(&dispatch.event, processor.as_ref()).await {
                        error!(
                            event_id = %dispatch.event.event_id,
                            processor = %dispatch.processor_name,
                            error = %e,
                            "Failed to process retry delivery"
                        );
                    }
                    Ok::<_, BroccoliError>(())
                }
            },
        )
        .await;

    if let Err(e) = result {
        error!(error = %e, "Retry consumer stopped unexpectedly");
    }
}
