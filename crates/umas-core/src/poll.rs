//! Bounded wait for a condition to become true.

use crate::cancel::CancellationToken;
use std::time::Duration;
use tracing::trace;

/// Why [`poll_until`] gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollError {
    /// The condition never held; carries the time accounted as waited.
    TimedOut(Duration),
    Cancelled,
}

/// Check `condition` every `interval` until it holds or `timeout` elapses.
///
/// Elapsed time is accounted in whole intervals rather than read from a
/// clock, so the condition is checked exactly `ceil(timeout / interval)`
/// times before giving up. The condition is checked before the first sleep;
/// once the budget is spent the loop fails without a final check.
///
/// A zero `interval` cannot make progress: the condition is checked once and
/// the loop then fails with `TimedOut(Duration::ZERO)`.
///
/// `cancel` is consulted before every check and interrupts the sleep.
pub async fn poll_until<F>(
    interval: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
    mut condition: F,
) -> Result<(), PollError>
where
    F: FnMut() -> bool,
{
    let mut elapsed = Duration::ZERO;
    loop {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }
        if condition() {
            return Ok(());
        }
        if interval.is_zero() {
            return Err(PollError::TimedOut(elapsed));
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
        }
        elapsed += interval;
        trace!(elapsed_ms = elapsed.as_millis() as u64, "Condition not met yet");

        if elapsed >= timeout {
            return Err(PollError::TimedOut(elapsed));
        }
    }
}
