pub mod dlq;
pub mod events;
pub mod replay;
pub mod shared;
