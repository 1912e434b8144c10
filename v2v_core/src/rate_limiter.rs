//! Broadcast rate limiter.
//!
//! The host usually ticks faster than the V2V broadcast rate (e.g. a 20 Hz
//! simulation driving a 2 Hz network). Surplus calls are absorbed silently
//! and a missed interval is dropped, never replayed.

use crate::error::ConfigError;
use std::time::Duration;

/// Minimum-interval gate over a monotonic clock.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Configured rate (Hz)
    rate_hz: f64,

    /// 1 / rate_hz
    interval: Duration,

    /// Clock reading of the last accepted update, `None` before the first one
    last_update: Option<Duration>,
}

impl RateLimiter {
    /// Creates a limiter for the given rate.
    ///
    /// # Errors
    /// `ConfigError::InvalidRate` for a non-positive, non-finite, or
    /// vanishingly small rate whose interval does not fit a `Duration`.
    pub fn new(rate_hz: f64) -> Result<Self, ConfigError> {
        if !(rate_hz.is_finite() && rate_hz > 0.0) {
            return Err(ConfigError::InvalidRate(rate_hz));
        }
        let interval =
            Duration::try_from_secs_f64(1.0 / rate_hz).map_err(|_| ConfigError::InvalidRate(rate_hz))?;

        Ok(Self {
            rate_hz,
            interval,
            last_update: None,
        })
    }

    /// True iff at least one full interval has elapsed since the last
    /// accepted update (always true before the first one).
    pub fn should_update(&self, now: Duration) -> bool {
        match self.last_update {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.interval && now >= last,
        }
    }

    /// Records an accepted update. Call exactly once per accepted `should_update`.
    pub fn mark_updated(&mut self, now: Duration) {
        self.last_update = Some(now);
    }

    pub fn rate_hz(&self) -> f64 {
        self.rate_hz
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_update(&self) -> Option<Duration> {
        self.last_update
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rate_interval() {
        let limiter = RateLimiter::new(2.0).unwrap();
        assert_eq!(limiter.interval(), Duration::from_millis(500));
        assert!(limiter.last_update().is_none());
    }

    #[test]
    fn test_invalid_rates_rejected() {
        assert_eq!(RateLimiter::new(0.0).unwrap_err(), ConfigError::InvalidRate(0.0));
        assert!(RateLimiter::new(-2.0).is_err());
        assert!(RateLimiter::new(f64::INFINITY).is_err());
        assert!(RateLimiter::new(1e-300).is_err());
    }

    #[test]
    fn test_only_one_update_per_interval() {
        let mut limiter = RateLimiter::new(2.0).unwrap();
        let mut accepted = 0;

        // 20 Hz host loop for 0.45 s
        for step in 0..10 {
            let now = Duration::from_millis(step * 50);
            if limiter.should_update(now) {
                limiter.mark_updated(now);
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);

        let now = Duration::from_millis(500);
        assert!(limiter.should_update(now));
    }

    #[test]
    fn test_missed_intervals_not_replayed() {
        let mut limiter = RateLimiter::new(2.0).unwrap();
        limiter.mark_updated(Duration::ZERO);

        // Host stalls for 3 s: exactly one catch-up update, then the gate closes again
        let late = Duration::from_secs(3);
        assert!(limiter.should_update(late));
        limiter.mark_updated(late);
        assert!(!limiter.should_update(late));
        assert!(!limiter.should_update(late + Duration::from_millis(499)));
        assert!(limiter.should_update(late + Duration::from_millis(500)));
    }

    #[test]
    fn test_clock_going_backwards_is_rejected() {
        let mut limiter = RateLimiter::new(10.0).unwrap();
        limiter.mark_updated(Duration::from_secs(5));
        assert!(!limiter.should_update(Duration::from_secs(1)));
    }
}
