// File: node-observer/src/poller.rs
//
// Finality Poller
//
// The node offers no push notifications, so every "wait until" is a bounded
// poll: probe, sleep one interval, probe again, until the probe succeeds or
// the timeout elapses. One probe is in flight at a time.

use std::future::Future;

use log::debug;
use tokio::time::Duration;

use crate::backend::Backend;
use crate::clock::Clock;
use crate::error::{ClientError, ClientResult};
use crate::locator::{BlockLocator, Location};
use crate::model::BlockType;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60);
/// Shorter intervals are raised to this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Pacing of a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval: interval.max(MIN_POLL_INTERVAL),
            timeout,
        }
    }

    /// Interval the loop actually sleeps, even for a hand-built config.
    pub fn effective_interval(&self) -> Duration {
        self.interval.max(MIN_POLL_INTERVAL)
    }

    /// Same pacing, different budget. `None` keeps the current budget.
    pub fn with_timeout(self, timeout: Option<Duration>) -> Self {
        Self {
            timeout: timeout.unwrap_or(self.timeout),
            ..self
        }
    }

    /// Number of probes a loop that never succeeds makes: one per interval
    /// plus a last one at the deadline.
    pub fn max_attempts(&self) -> u64 {
        let interval = self.effective_interval().as_nanos();
        let full = self.timeout.as_nanos() / interval;
        let partial = u128::from(self.timeout.as_nanos() % interval != 0);
        (full + partial + 1) as u64
    }
}

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T = ()> {
    /// Nothing to see yet.
    Absent,
    /// The entity exists but the awaited condition does not hold yet.
    Observed,
    Ready(T),
}

/// Result of a whole poll loop.
///
/// A timed out loop reports whether any probe saw the entity, so that "never
/// found" and "found but never final" stay distinguishable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome<T = ()> {
    Satisfied { value: T, attempts: u32 },
    TimedOut { attempts: u32, observed: bool },
}

impl<T> WaitOutcome<T> {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Satisfied { attempts, .. } | Self::TimedOut { attempts, .. } => *attempts,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Satisfied { value, .. } => Some(value),
            Self::TimedOut { .. } => None,
        }
    }
}

/// Runs `probe` until it is ready or `config.timeout` has elapsed.
///
/// Probes happen at start, after every interval, and once more at the
/// deadline. Retryable errors count as `Absent` when `retry_errors` is set;
/// any other error ends the loop immediately.
pub async fn poll_until<T, F, Fut>(
    clock: &dyn Clock,
    config: PollConfig,
    retry_errors: bool,
    what: &str,
    mut probe: F,
) -> ClientResult<WaitOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<Probe<T>>>,
{
    let deadline = clock.now() + config.timeout;
    let mut attempts = 0u32;
    let mut observed = false;

    loop {
        attempts += 1;
        match probe().await {
            Ok(Probe::Ready(value)) => return Ok(WaitOutcome::Satisfied { value, attempts }),
            Ok(Probe::Observed) => observed = true,
            Ok(Probe::Absent) => {}
            Err(e) if retry_errors && e.is_retryable() => {
                debug!("{}: attempt {} failed, will retry: {}", what, attempts, e);
            }
            Err(e) => return Err(e),
        }

        let now = clock.now();
        if now >= deadline {
            debug!(
                "{}: gave up after {} attempts ({:?})",
                what, attempts, config.timeout
            );
            return Ok(WaitOutcome::TimedOut { attempts, observed });
        }
        if log::log_enabled!(log::Level::Debug) {
            debug!("{}: not there yet, delay and retry", what);
        }
        clock.sleep(config.effective_interval().min(deadline - now)).await;
    }
}

/// Waits for transactions and blocks to reach a given stage.
pub struct FinalityPoller<'a> {
    backend: &'a dyn Backend,
    clock: &'a dyn Clock,
    config: PollConfig,
    retry_errors: bool,
}

impl<'a> FinalityPoller<'a> {
    pub fn new(backend: &'a dyn Backend, clock: &'a dyn Clock, config: PollConfig) -> Self {
        Self {
            backend,
            clock,
            config,
            retry_errors: true,
        }
    }

    /// Surface the first backend error instead of retrying through it.
    pub fn without_delayed_retry(mut self) -> Self {
        self.retry_errors = false;
        self
    }

    /// Waits until the transaction is found inside a block.
    pub async fn wait_for_inclusion(
        &self,
        tx_id: &str,
        timeout: Option<Duration>,
    ) -> ClientResult<WaitOutcome<u64>> {
        let backend = self.backend;
        let what = format!("wait for transaction {} in a block", tx_id);
        poll_until(
            self.clock,
            self.config.with_timeout(timeout),
            self.retry_errors,
            &what,
            move || async move {
                Ok(match BlockLocator::new(backend).locate(tx_id).await? {
                    Location::Included(block_num) => Probe::Ready(block_num),
                    Location::NotYetIncluded { .. } => Probe::Observed,
                    Location::Missing => Probe::Absent,
                })
            },
        )
        .await
    }

    /// Waits until the block containing the transaction is irreversible.
    pub async fn wait_for_irreversibility(
        &self,
        tx_id: &str,
        timeout: Option<Duration>,
    ) -> ClientResult<WaitOutcome<u64>> {
        let backend = self.backend;
        let what = format!("wait for transaction {} to be final", tx_id);
        poll_until(
            self.clock,
            self.config.with_timeout(timeout),
            self.retry_errors,
            &what,
            move || async move {
                let block_num = match BlockLocator::new(backend).locate(tx_id).await? {
                    Location::Included(block_num) => block_num,
                    Location::NotYetIncluded { .. } => return Ok(Probe::Observed),
                    Location::Missing => return Ok(Probe::Absent),
                };
                match backend.get_info().await? {
                    Some(info) if info.is_block_present(block_num, BlockType::Lib) => {
                        Ok(Probe::Ready(block_num))
                    }
                    _ => Ok(Probe::Observed),
                }
            },
        )
        .await
    }

    /// Waits until the selected counter has reached `target`.
    pub async fn wait_for_block_number(
        &self,
        target: u64,
        block_type: BlockType,
        timeout: Option<Duration>,
    ) -> ClientResult<WaitOutcome> {
        let backend = self.backend;
        let what = format!("wait for {} block {}", block_type, target);
        poll_until(
            self.clock,
            self.config.with_timeout(timeout),
            self.retry_errors,
            &what,
            move || async move {
                Ok(match backend.get_info().await? {
                    Some(info) if info.is_block_present(target, block_type) => Probe::Ready(()),
                    Some(_) => Probe::Observed,
                    None => Probe::Absent,
                })
            },
        )
        .await
    }

    /// Waits until the selected counter moves past its current value.
    pub async fn wait_for_next_block(
        &self,
        block_type: BlockType,
        timeout: Option<Duration>,
    ) -> ClientResult<WaitOutcome> {
        let current = self
            .backend
            .get_info()
            .await?
            .ok_or_else(|| ClientError::backend("get info", "node did not report chain info"))?
            .block_num(block_type);
        self.wait_for_block_number(current + 1, block_type, timeout)
            .await
    }
}
