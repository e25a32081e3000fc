pub mod service;

pub use service::{REPLAY_PROCESSOR, ReplayCounters, ReplayService, progress_pct};
