pub mod alert;
pub mod backoff;
pub mod config;
pub mod error;
pub mod event;
pub mod filter;
pub mod status;

pub use error::ProcessingError;
pub use event::{EventMessage, ReplayDispatch, RetryDispatch};
pub use filter::EventFilter;
pub use status::{DlqStatus, ProcessingStatus, ReplaySessionStatus};
