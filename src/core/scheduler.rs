//! Delayed-start countdown timer for conversation sessions.
//!
//! Between session establishment and the moment the engine is told to begin,
//! the session holds a grace period during which the caller sees a countdown
//! and the capture pipeline stays silent. The timer here is single-shot by
//! construction: the deadline is delivered over a oneshot channel, so a
//! second fire cannot be expressed, and cancellation is a token rather than
//! manual interval bookkeeping.

use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

/// Default grace period before the engine is told to start.
pub const DEFAULT_GRACE_MS: u64 = 10_000;

/// Countdown display granularity.
const TICK: Duration = Duration::from_millis(250);

/// Signal produced by an armed scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerSignal {
    /// Remaining time changed; for display only
    Tick(Duration),
    /// The deadline was reached; delivered at most once per scheduler
    Fired,
    /// The scheduler was canceled before the deadline
    Canceled,
}

/// Single-shot cancellable countdown.
///
/// Armed on construction. After a `Fired` or `Canceled` signal the scheduler
/// is spent and must be disarmed (dropped) by its owner; `cancel` calls on a
/// spent scheduler have no effect.
pub struct StartScheduler {
    fire: oneshot::Receiver<()>,
    remaining: watch::Receiver<Duration>,
    cancel: CancellationToken,
}

impl StartScheduler {
    /// Arm a countdown for `grace` from now.
    pub fn arm(grace: Duration) -> Self {
        let deadline = Instant::now() + grace;
        let (fire_tx, fire_rx) = oneshot::channel();
        let (tick_tx, tick_rx) = watch::channel(grace);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            let mut ticks = time::interval_at(Instant::now() + TICK, TICK);
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = time::sleep_until(deadline) => {
                        let _ = tick_tx.send(Duration::ZERO);
                        // Receiver gone means the owner already disarmed.
                        let _ = fire_tx.send(());
                        return;
                    }
                    _ = ticks.tick() => {
                        let _ = tick_tx.send(deadline.saturating_duration_since(Instant::now()));
                    }
                }
            }
        });

        Self {
            fire: fire_rx,
            remaining: tick_rx,
            cancel,
        }
    }

    /// Stop the countdown.
    ///
    /// Inert after the deadline has fired or after a previous cancel; if the
    /// cancel races the deadline, the fire wins at most once.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Remaining time as of the last tick.
    pub fn remaining(&self) -> Duration {
        *self.remaining.borrow()
    }

    /// Wait for the next signal.
    ///
    /// Must not be called again after `Fired` or `Canceled`.
    pub async fn next_signal(&mut self) -> SchedulerSignal {
        tokio::select! {
            res = &mut self.fire => match res {
                Ok(()) => SchedulerSignal::Fired,
                Err(_) => SchedulerSignal::Canceled,
            },
            res = self.remaining.changed() => match res {
                Ok(()) => SchedulerSignal::Tick(*self.remaining.borrow_and_update()),
                // Tick sender closed: the timer task has already returned,
                // so the fire channel resolves immediately either way.
                Err(_) => match (&mut self.fire).await {
                    Ok(()) => SchedulerSignal::Fired,
                    Err(_) => SchedulerSignal::Canceled,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    async fn drain_until_terminal(scheduler: &mut StartScheduler) -> (SchedulerSignal, Vec<Duration>) {
        let mut ticks = Vec::new();
        loop {
            match timeout(Duration::from_secs(5), scheduler.next_signal())
                .await
                .expect("scheduler produced no signal")
            {
                SchedulerSignal::Tick(d) => ticks.push(d),
                terminal => return (terminal, ticks),
            }
        }
    }

    #[tokio::test]
    async fn test_fires_once_after_grace() {
        let mut scheduler = StartScheduler::arm(Duration::from_millis(300));
        let started = Instant::now();
        let (terminal, _ticks) = drain_until_terminal(&mut scheduler).await;
        assert_eq!(terminal, SchedulerSignal::Fired);
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_ticks_decrease_before_fire() {
        let mut scheduler = StartScheduler::arm(Duration::from_millis(700));
        let (terminal, ticks) = drain_until_terminal(&mut scheduler).await;
        assert_eq!(terminal, SchedulerSignal::Fired);
        assert!(!ticks.is_empty());
        for pair in ticks.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
        assert!(ticks[0] < Duration::from_millis(700));
    }

    #[tokio::test]
    async fn test_cancel_before_deadline_prevents_fire() {
        let mut scheduler = StartScheduler::arm(Duration::from_secs(30));
        scheduler.cancel();
        let (terminal, _ticks) = drain_until_terminal(&mut scheduler).await;
        assert_eq!(terminal, SchedulerSignal::Canceled);
    }

    #[tokio::test]
    async fn test_cancel_after_fire_is_inert() {
        let mut scheduler = StartScheduler::arm(Duration::from_millis(50));
        let (terminal, _ticks) = drain_until_terminal(&mut scheduler).await;
        assert_eq!(terminal, SchedulerSignal::Fired);
        // Spent scheduler: cancel must not panic or produce anything
        scheduler.cancel();
        scheduler.cancel();
    }

    #[tokio::test]
    async fn test_remaining_reflects_countdown() {
        let scheduler = StartScheduler::arm(Duration::from_secs(30));
        assert!(scheduler.remaining() <= Duration::from_secs(30));
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(scheduler.remaining() < Duration::from_secs(30));
        scheduler.cancel();
    }
}
