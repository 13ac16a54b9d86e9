use rand::Rng;
use std::time::Duration;

/// Linear backoff: `attempt × base`, optionally spread by ±`jitter` (0.0..1.0).
pub fn linear_backoff_delay(attempt: u32, base: Duration, jitter: f64) -> Duration {
    // Cap the multiplier so a misconfigured attempt count cannot sleep for hours
    let multiplier = attempt.clamp(1, 10);
    let delay = base.saturating_mul(multiplier);

    let jitter = jitter.clamp(0.0, 0.9);
    if jitter == 0.0 {
        return delay;
    }
    let factor = rand::thread_rng().gen_range((1.0 - jitter)..(1.0 + jitter));
    delay.mul_f64(factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_linearly() {
        let base = Duration::from_secs(1);
        assert_eq!(linear_backoff_delay(1, base, 0.0), Duration::from_secs(1));
        assert_eq!(linear_backoff_delay(2, base, 0.0), Duration::from_secs(2));
        assert_eq!(linear_backoff_delay(3, base, 0.0), Duration::from_secs(3));
    }

    #[test]
    fn attempt_zero_waits_one_step_and_high_attempts_are_capped() {
        let base = Duration::from_millis(500);
        assert_eq!(linear_backoff_delay(0, base, 0.0), base);
        assert_eq!(linear_backoff_delay(50, base, 0.0), Duration::from_secs(5));
    }

    #[test]
    fn jitter_stays_in_band() {
        for _ in 0..50 {
            let delay = linear_backoff_delay(2, Duration::from_secs(1), 0.3);
            assert!(delay >= Duration::from_millis(1400) && delay <= Duration::from_millis(2600));
        }
    }
}
