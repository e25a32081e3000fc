pub mod service;

pub use service::{ArchiveResult, DlqService, DlqStats, dlq_service};
