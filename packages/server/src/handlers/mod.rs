pub mod dlq;
pub mod events;
pub mod replay;
