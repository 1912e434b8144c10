//! Clock abstraction for the V2V coordinator.

use async_trait::async_trait;
use std::time::{Duration, SystemTime};

/// The central interface for time.
///
/// Abstracts the clock so the rate limiter and the tick driver behave the
/// same under a wall clock (production) and a virtual clock (simulation).
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `std::time::Instant` and `tokio::time`
/// - **Simulation**: `SimContext` - virtual clock advanced by the harness
#[async_trait]
pub trait V2VContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// The rate limiter compares successive values of this clock, so it
    /// must never go backwards.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time.
    ///
    /// In simulation, this is derived from virtual clock + epoch offset.
    fn system_time(&self) -> SystemTime;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);
}
