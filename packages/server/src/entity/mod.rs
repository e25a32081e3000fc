pub mod dead_letter_entry;
pub mod event;
pub mod processing_record;
pub mod replay_event;
pub mod replay_session;
