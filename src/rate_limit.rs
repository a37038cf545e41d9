use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Entries kept before stale windows are pruned on the next failure.
const PRUNE_THRESHOLD: usize = 10_000;

/// Per-key failure limiter with a fixed window, keyed by lowercased email.
///
/// `check` never counts; callers record a failure only when the attempt was
/// actually wrong (bad password, bad activation code).
pub struct AttemptLimiter {
    /// key -> (failed_count, window_start)
    entries: DashMap<String, (u32, Instant)>,
    max_failures: u32,
    window: Duration,
}

impl AttemptLimiter {
    pub fn new(max_failures: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_failures,
            window,
        }
    }

    /// 5 failed sign-ins per 15 minutes.
    pub fn for_login() -> Self {
        Self::new(5, Duration::from_secs(15 * 60))
    }

    /// 5 wrong activation codes per 15 minutes.
    pub fn for_activation() -> Self {
        Self::new(5, Duration::from_secs(15 * 60))
    }

    /// `Err` carries the seconds left before the key may try again.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        let now = Instant::now();

        let Some(entry) = self.entries.get(&key.to_lowercase()) else {
            return Ok(());
        };
        let (count, start) = entry.value();

        if now.duration_since(*start) > self.window {
            return Ok(());
        }

        if *count >= self.max_failures {
            let elapsed = now.duration_since(*start).as_secs();
            return Err(self.window.as_secs().saturating_sub(elapsed));
        }

        Ok(())
    }

    pub fn record_failure(&self, key: &str) {
        let now = Instant::now();

        if self.entries.len() > PRUNE_THRESHOLD {
            self.cleanup();
        }

        let mut entry = self.entries.entry(key.to_lowercase()).or_insert((0, now));
        let (count, start) = entry.value_mut();

        if now.duration_since(*start) > self.window {
            *count = 1;
            *start = now;
        } else {
            *count += 1;
        }
    }

    pub fn reset(&self, key: &str) {
        self.entries.remove(&key.to_lowercase());
    }

    fn cleanup(&self) {
        let now = Instant::now();
        let window = self.window;
        self.entries
            .retain(|_, (_, start)| now.duration_since(*start) < window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_after_max_failures() {
        let limiter = AttemptLimiter::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.check("Ada@Example.com").is_ok());
            limiter.record_failure("ada@example.com");
        }
        let retry = limiter.check("ADA@example.com").unwrap_err();
        assert!(retry > 0 && retry <= 60);
    }

    #[test]
    fn reset_clears_the_key() {
        let limiter = AttemptLimiter::new(1, Duration::from_secs(60));
        limiter.record_failure("ada@example.com");
        assert!(limiter.check("ada@example.com").is_err());
        limiter.reset("ada@example.com");
        assert!(limiter.check("ada@example.com").is_ok());
    }

    #[test]
    fn window_expiry_allows_again() {
        let limiter = AttemptLimiter::new(1, Duration::from_millis(10));
        limiter.record_failure("ada@example.com");
        std::thread::sleep(Duration::from_millis(20));
        assert!(limiter.check("ada@example.com").is_ok());
    }
}
