// File: node-observer/src/clock.rs
//
// Time source for poll loops. Every waiter reads time and sleeps through a
// Clock so that tests can run a 60 second poll budget under paused tokio time.

use std::future::Future;
use std::pin::Pin;
use tokio::time::{self, Duration, Instant};

/// Time source used by every poll loop in this crate.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use tokio::time::Duration;
/// use tos_node_observer::clock::{Clock, SystemClock};
///
/// #[tokio::main]
/// async fn main() {
///     let clock: Arc<dyn Clock> = Arc::new(SystemClock);
///     let start = clock.now();
///     clock.sleep(Duration::from_millis(10)).await;
///     assert!(clock.now() - start >= Duration::from_millis(10));
/// }
/// ```
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Wall-clock time, used against real nodes.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        time::Instant::now()
    }

    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(time::sleep(d))
    }
}

/// Paused tokio time, used by tests.
///
/// Creating one pauses the runtime clock. While the runtime has nothing else
/// to do, pending sleeps complete immediately and time jumps forward, so a
/// full poll budget elapses in no real time while `now()` still reports the
/// simulated elapsed duration.
///
/// Must be created inside a current-thread runtime (the `#[tokio::test]`
/// default) that is not already paused.
pub struct PausedClock;

impl PausedClock {
    pub fn new() -> Self {
        time::pause();
        Self
    }

    /// Moves simulated time forward, waking sleeps that expire on the way.
    pub async fn advance(&self, d: Duration) {
        time::advance(d).await
    }
}

impl Clock for PausedClock {
    fn now(&self) -> Instant {
        time::Instant::now()
    }

    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(time::sleep(d))
    }
}

impl Default for PausedClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_paused_clock_advancement() {
        let clock = Arc::new(PausedClock::new());
        let start = clock.now();

        clock.advance(Duration::from_secs(3)).await;
        assert_eq!(clock.now() - start, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_paused_clock_sleep_auto_advances() {
        let clock = PausedClock::new();
        let start = clock.now();

        clock.sleep(Duration::from_secs(60)).await;
        assert_eq!(clock.now() - start, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_system_clock_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now();
        clock.sleep(Duration::from_millis(1)).await;
        assert!(clock.now() > a);
    }
}
