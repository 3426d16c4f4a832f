//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before retrying after the `attempt`-th failure (1-based):
/// `base * 2^(attempt-1)`, capped at `max_ms`, plus up to 10% jitter so
/// retries from one batch do not land on the target in lockstep.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 || base_ms == 0 {
        return Duration::ZERO;
    }

    let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
    let capped = base_ms.saturating_mul(factor).min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubles_per_attempt() {
        let first = calculate_backoff(1, 100, 5000).as_millis();
        let second = calculate_backoff(2, 100, 5000).as_millis();
        let third = calculate_backoff(3, 100, 5000).as_millis();
        assert!((100..110).contains(&first));
        assert!((200..220).contains(&second));
        assert!((400..440).contains(&third));
    }

    #[test]
    fn test_capped_at_max() {
        let delay = calculate_backoff(40, 100, 1000).as_millis();
        assert!((1000..1100).contains(&delay));
    }

    #[test]
    fn test_zero_inputs() {
        assert_eq!(calculate_backoff(0, 100, 1000), Duration::ZERO);
        assert_eq!(calculate_backoff(3, 0, 1000), Duration::ZERO);
    }
}
