use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use common::{EventMessage, ProcessingError};

use super::EventProcessor;

#[derive(Debug, Deserialize)]
struct PaymentPayload {
    #[serde(rename = "paymentId")]
    payment_id: String,
    amount: f64,
    #[serde(rename = "paymentMethod")]
    payment_method: String,
}

/// Validates and applies payment lifecycle events.
pub struct PaymentEventProcessor;

#[async_trait]
impl EventProcessor for PaymentEventProcessor {
    fn name(&self) -> &str {
        "payment-processor"
    }

    fn can_process(&self, event_type: &str) -> bool {
        matches!(event_type, "PaymentProcessed" | "PaymentCancelled")
    }

    async fn process(&self, event: &EventMessage) -> Result<(), ProcessingError> {
        let payment: PaymentPayload = serde_json::from_str(&event.payload)
            .map_err(|e| ProcessingError::new(format!("Invalid payment payload: {e}")))?;

        if payment.payment_method == "expired_card" {
            return Err(ProcessingError::new("Payment method is expired"));
        }
        if payment.amount > 5000.0 {
            return Err(ProcessingError::new("Payment amount exceeds 5000"));
        }

        info!(
            payment_id = %payment.payment_id,
            amount = payment.amount,
            "Payment event applied"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment_event(payload: &str) -> EventMessage {
        EventMessage::new("evt-1", "PaymentProcessed", payload)
    }

    #[tokio::test]
    async fn test_valid_payment_succeeds() {
        let event = payment_event(
            r#"{"paymentId":"PAY-1","amount":99.99,"paymentMethod":"card"}"#,
        );
        assert!(PaymentEventProcessor.process(&event).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_card_rejected() {
        let event = payment_event(
            r#"{"paymentId":"PAY-1","amount":10,"paymentMethod":"expired_card"}"#,
        );
        let err = PaymentEventProcessor.process(&event).await.unwrap_err();
        assert_eq!(err.message(), "Payment method is expired");
    }

    #[tokio::test]
    async fn test_amount_ceiling() {
        let event = payment_event(
            r#"{"paymentId":"PAY-1","amount":5001,"paymentMethod":"card"}"#,
        );
        assert!(PaymentEventProcessor.process(&event).await.is_err());
    }
}
