pub mod dlq_alert;
pub mod events;
pub mod replay;

pub use dlq_alert::consume_dlq_alerts;
pub use events::{consume_events, consume_retries};
pub use replay::consume_replays;
