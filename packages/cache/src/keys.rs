//! Cache key grammar.
//!
//! - `event:lock:{event_id}:{processor}` — processing lock, TTL = lock TTL
//! - `event:retry:{event_id}:{processor}` — serialized event, TTL = backoff
//! - `replay:lock:{event_id}:{session_id}` — replay lock, TTL = lock TTL

/// Pattern matching every pending retry key.
pub const RETRY_KEY_PATTERN: &str = "event:retry:*";

pub fn processing_lock_key(event_id: &str, processor_name: &str) -> String {
    format!("event:lock:{event_id}:{processor_name}")
}

pub fn retry_key(event_id: &str, processor_name: &str) -> String {
    format!("event:retry:{event_id}:{processor_name}")
}

pub fn replay_lock_key(event_id: &str, session_id: &str) -> String {
    format!("replay:lock:{event_id}:{session_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        assert_eq!(
            processing_lock_key("evt-1", "order-processor"),
            "event:lock:evt-1:order-processor"
        );
        assert_eq!(
            retry_key("evt-1", "order-processor"),
            "event:retry:evt-1:order-processor"
        );
        assert_eq!(
            replay_lock_key("evt-1", "sess-9"),
            "replay:lock:evt-1:sess-9"
        );
    }

    #[test]
    fn test_retry_keys_match_scan_pattern() {
        // SCAN MATCH uses glob semantics; the prefix must line up.
        let key = retry_key("evt-1", "p");
        assert!(key.starts_with("event:retry:"));
        assert!(RETRY_KEY_PATTERN.strip_suffix('*').is_some_and(|p| key.starts_with(p)));
    }
}
