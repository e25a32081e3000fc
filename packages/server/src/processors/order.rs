use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use common::{EventMessage, ProcessingError};

use super::EventProcessor;

#[derive(Debug, Deserialize)]
struct OrderPayload {
    #[serde(rename = "orderId")]
    order_id: String,
    #[serde(rename = "customerId")]
    customer_id: String,
    amount: f64,
}

/// Validates and applies order lifecycle events.
pub struct OrderEventProcessor;

#[async_trait]
impl EventProcessor for OrderEventProcessor {
    fn name(&self) -> &str {
        "order-processor"
    }

    fn can_process(&self, event_type: &str) -> bool {
        matches!(
            event_type,
            "OrderCreated" | "OrderUpdated" | "OrderCancelled"
        )
    }

    async fn process(&self, event: &EventMessage) -> Result<(), ProcessingError> {
        let order: OrderPayload = serde_json::from_str(&event.payload)
            .map_err(|e| ProcessingError::new(format!("Invalid order payload: {e}")))?;

        debug!(amount = order.amount, order_id = %order.order_id, "Order payload parsed");

        if order.amount < 0.0 {
            return Err(ProcessingError::new("amount must be >= 0"));
        }
        if order.amount > 100_000.0 {
            return Err(ProcessingError::new(
                "Order flagged as potential fraud, manual review required",
            ));
        }
        if order.order_id.trim().is_empty() {
            return Err(ProcessingError::new("orderId must not be blank"));
        }
        if order.customer_id.trim().is_empty() {
            return Err(ProcessingError::new("customerId must not be blank"));
        }

        info!(
            order_id = %order.order_id,
            customer_id = %order.customer_id,
            amount = order.amount,
            correlation_id = ?event.correlation_id,
            "Order event applied"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_event(payload: &str) -> EventMessage {
        EventMessage::new("evt-1", "OrderCreated", payload)
    }

    #[tokio::test]
    async fn test_valid_order_succeeds() {
        let event =
            order_event(r#"{"orderId":"ORD-1","customerId":"C-1","amount":50}"#);
        assert!(OrderEventProcessor.process(&event).await.is_ok());
    }

    #[tokio::test]
    async fn test_negative_amount_is_a_business_failure() {
        let event =
            order_event(r#"{"orderId":"ORD-1","customerId":"C-1","amount":-10}"#);
        let err = OrderEventProcessor.process(&event).await.unwrap_err();
        assert_eq!(err.message(), "amount must be >= 0");
    }

    #[tokio::test]
    async fn test_fraud_threshold() {
        let event = order_event(
            r#"{"orderId":"ORD-1","customerId":"C-1","amount":200000}"#,
        );
        let err = OrderEventProcessor.process(&event).await.unwrap_err();
        assert!(err.message().contains("fraud"));
    }

    #[tokio::test]
    async fn test_blank_ids_rejected() {
        let event =
            order_event(r#"{"orderId":"  ","customerId":"C-1","amount":1}"#);
        assert!(OrderEventProcessor.process(&event).await.is_err());

        let event =
            order_event(r#"{"orderId":"ORD-1","customerId":"","amount":1}"#);
        assert!(OrderEventProcessor.process(&event).await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_a_business_failure() {
        let event = order_event("not json");
        let err = OrderEventProcessor.process(&event).await.unwrap_err();
        assert!(err.message().starts_with("Invalid order payload"));
    }

    #[test]
    fn test_accepted_event_types() {
        assert!(OrderEventProcessor.can_process("OrderCreated"));
        assert!(OrderEventProcessor.can_process("OrderUpdated"));
        assert!(OrderEventProcessor.can_process("OrderCancelled"));
        assert!(!OrderEventProcessor.can_process("PaymentProcessed"));
    }
}
