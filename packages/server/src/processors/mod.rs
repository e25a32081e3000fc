pub mod order;
pub mod payment;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use common::{EventMessage, ProcessingError};

pub use order::OrderEventProcessor;
pub use payment::PaymentEventProcessor;

/// A polymorphic event handler.
///
/// `process` fails with `ProcessingError` on a business-rule violation;
/// such failures feed the retry/DLQ state machine rather than crashing the
/// pipeline.
#[async_trait]
pub trait EventProcessor: Send + Sync {
    fn name(&self) -> &str;

    fn can_process(&self, event_type: &str) -> bool;

    async fn process(&self, event: &EventMessage) -> Result<(), ProcessingError>;
}

/// Ordered set of processors. Selection scans in registration order and the
/// first `can_process` match wins; overlapping predicates are resolved by
/// that order, deliberately.
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: Vec<Arc<dyn EventProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, processor: Arc<dyn EventProcessor>) {
        debug!(processor = processor.name(), "Registered event processor");
        self.processors.push(processor);
    }

    /// First registered processor accepting this event type, if any.
    pub fn find(&self, event_type: &str) -> Option<Arc<dyn EventProcessor>> {
        self.processors
            .iter()
            .find(|p| p.can_process(event_type))
            .cloned()
    }

    /// Processor with the given name, used by the retry path to re-run the
    /// exact processor that failed.
    pub fn get(&self, name: &str) -> Option<Arc<dyn EventProcessor>> {
        self.processors.iter().find(|p| p.name() == name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

/// Registry with the shipped processors in their canonical order.
pub fn default_registry() -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::new();
    registry.register(Arc::new(OrderEventProcessor));
    registry.register(Arc::new(PaymentEventProcessor));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProcessor {
        name: &'static str,
        accepts: &'static [&'static str],
    }

    #[async_trait]
    impl EventProcessor for FixedProcessor {
        fn name(&self) -> &str {
            self.name
        }

        fn can_process(&self, event_type: &str) -> bool {
            self.accepts.contains(&event_type)
        }

        async fn process(&self, _event: &EventMessage) -> Result<(), ProcessingError> {
            Ok(())
        }
    }

    #[test]
    fn test_no_match_returns_none() {
        let registry = default_registry();
        assert!(registry.find("UnknownType").is_none());
    }

    #[test]
    fn test_default_registry_routes_known_types() {
        let registry = default_registry();
        assert_eq!(
            registry.find("OrderCreated").unwrap().name(),
            "order-processor"
        );
        assert_eq!(
            registry.find("PaymentProcessed").unwrap().name(),
            "payment-processor"
        );
    }

    #[test]
    fn test_get_by_name() {
        let registry = default_registry();
        assert!(registry.get("payment-processor").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_overlapping_predicates_resolve_by_registration_order() {
        let mut registry = ProcessorRegistry::new();
        registry.register(Arc::new(FixedProcessor {
            name: "first",
            accepts: &["Shared"],
        }));
        registry.register(Arc::new(FixedProcessor {
            name: "second",
            accepts: &["Shared", "OnlySecond"],
        }));

        assert_eq!(registry.find("Shared").unwrap().name(), "first");
        assert_eq!(registry.find("OnlySecond").unwrap().name(), "second");
    }
}
