use std::sync::Arc;

use common::alert::DlqAlert;
use mq::{BrokerMessage, Mq};
use tracing::{error, info};

use crate::notify::Notifier;

/// Consume quarantine notifications and fan them out through the alert
/// channels. Alerting is best-effort: every delivery is acked, because
/// redelivering an alert that failed to fan out would only duplicate noise.
pub async fn consume_dlq_alerts(notifier: Arc<Notifier>, mq: Arc<Mq>, queue_name: String) {
    info!(queue = %queue_name, "Starting DLQ alert consumer");

    let result = mq
        .process_messages(
            &queue_name,
            None,
            None,
            move |message: BrokerMessage<DlqAlert>| {
                let notifier = notifier.clone();
                async move {
                    notifier.dlq_alert(&message.payload);
                    Ok(())
                }
            },
        )
        .await;

    if let Err(e) = result {
        error!(error = %e, "DLQ alert consumer stopped unexpectedly");
    }
}
