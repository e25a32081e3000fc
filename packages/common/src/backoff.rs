use std::time::Duration;

/// Cap on the exponential schedule, bounding worst-case retry latency.
pub const MAX_RETRY_DELAY_SECS: u64 = 60;

/// Exponential backoff delay for a retry attempt.
///
/// Formula: `min(2^attempt, 60)` seconds. attempt is the 1-based count of
/// failed attempts so far, so the first retry waits 2s, the second 4s, and
/// the schedule saturates at 60s from attempt 6 onward.
pub fn retry_delay(attempt: u32) -> Duration {
    let secs = 2u64
        .checked_pow(attempt)
        .unwrap_or(u64::MAX)
        .min(MAX_RETRY_DELAY_SECS);
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        assert_eq!(retry_delay(1), Duration::from_secs(2));
        assert_eq!(retry_delay(2), Duration::from_secs(4));
        assert_eq!(retry_delay(3), Duration::from_secs(8));
        assert_eq!(retry_delay(5), Duration::from_secs(32));
    }

    #[test]
    fn test_backoff_caps_at_sixty_seconds() {
        assert_eq!(retry_delay(6), Duration::from_secs(60));
        assert_eq!(retry_delay(10), Duration::from_secs(60));
        assert_eq!(retry_delay(63), Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_never_overflows() {
        assert_eq!(retry_delay(u32::MAX), Duration::from_secs(60));
    }
}
