use crate::engine::RunCounters;
use crate::types::StopReason;
use flume::TrySendError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tokio_util::sync::CancellationToken;

/// Permission for one worker to send one request now.
#[derive(Debug, Clone)]
pub struct DispatchToken {
    pub url: Arc<str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Running,
    /// Token stream closed; workers are finishing what they already took.
    Draining,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub ticks: u64,
    pub enqueued: u64,
    pub dropped: u64,
    pub stop: StopReason,
}

/// 1s / rps, never zero.
pub fn tick_interval(rps: u32) -> Duration {
    let nanos = 1_000_000_000u64 / u64::from(rps.max(1));
    Duration::from_nanos(nanos.max(1))
}

pub fn queue_capacity(rps: u32, workers: u32) -> usize {
    (rps.max(1) as usize).saturating_mul(workers.max(1) as usize)
}

// Far enough out that the run only ends by cancellation.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn deadline_after(start: Instant, duration: Duration) -> Instant {
    start
        .checked_add(duration)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

/// Bounded token queue sized `rps * workers`.
pub fn token_queue(
    rps: u32,
    workers: u32,
) -> (flume::Sender<DispatchToken>, flume::Receiver<DispatchToken>) {
    flume::bounded(queue_capacity(rps, workers))
}

/// Ticks at a fixed rate and offers `workers` tokens per tick until the deadline
/// passes or the run is cancelled. Offers never block: a full queue drops the
/// token.
pub struct Dispatcher {
    url: Arc<str>,
    rps: u32,
    workers: u32,
    duration: Duration,
    queue_tx: flume::Sender<DispatchToken>,
    counters: Arc<RunCounters>,
    cancel_token: CancellationToken,
    state_tx: Arc<watch::Sender<DispatchState>>,
}

impl Dispatcher {
    pub fn new(
        url: Arc<str>,
        rps: u32,
        workers: u32,
        duration: Duration,
        queue_tx: flume::Sender<DispatchToken>,
        counters: Arc<RunCounters>,
        cancel_token: CancellationToken,
    ) -> Self {
        let (state_tx, _) = watch::channel(DispatchState::Idle);
        Self {
            url,
            rps,
            workers,
            duration,
            queue_tx,
            counters,
            cancel_token,
            state_tx: Arc::new(state_tx),
        }
    }

    /// Publishes lifecycle changes on a channel owned by the caller, who marks
    /// `Stopped` once workers have drained the queue.
    pub fn with_state(mut self, state_tx: Arc<watch::Sender<DispatchState>>) -> Self {
        self.state_tx = state_tx;
        self
    }

    pub async fn run(self) -> DispatchReport {
        let period = tick_interval(self.rps);
        let start = Instant::now();
        let deadline = sleep_until(deadline_after(start, self.duration));
        tokio::pin!(deadline);

        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut ticks = 0u64;
        let mut enqueued = 0u64;
        let mut dropped = 0u64;

        self.state_tx.send_replace(DispatchState::Running);
        tracing::info!(
            "Dispatch started: {} tokens every {:?} for {:?}",
            self.workers,
            period,
            self.duration
        );

        let stop = loop {
            tokio::select! {
                biased;

                _ = self.cancel_token.cancelled() => break StopReason::Cancelled,
                _ = &mut deadline => break StopReason::Deadline,
                _ = ticker.tick() => {
                    ticks += 1;
                    let (sent, lost) = self.offer_batch();
                    enqueued += sent;
                    dropped += lost;
                }
            }
        };

        // Dropping the only sender closes the stream; workers exit once it is empty.
        drop(self.queue_tx);
        self.state_tx.send_replace(DispatchState::Draining);

        tracing::info!(
            "Dispatch stopped ({}): {} ticks, {} tokens enqueued, {} dropped",
            stop.as_str(),
            ticks,
            enqueued,
            dropped
        );

        DispatchReport {
            ticks,
            enqueued,
            dropped,
            stop,
        }
    }

    fn offer_batch(&self) -> (u64, u64) {
        let mut sent = 0u64;
        let mut lost = 0u64;

        for _ in 0..self.workers {
            let token = DispatchToken {
                url: self.url.clone(),
            };
            match self.queue_tx.try_send(token) {
                Ok(()) => sent += 1,
                Err(TrySendError::Full(_)) => lost += 1,
                Err(TrySendError::Disconnected(_)) => {
                    tracing::warn!("No workers left to receive tokens");
                    lost += 1;
                }
            }
        }

        if lost > 0 {
            self.counters.record_dropped(lost);
        }
        (sent, lost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher(
        rps: u32,
        workers: u32,
        duration: Duration,
    ) -> (Dispatcher, flume::Receiver<DispatchToken>, Arc<RunCounters>, CancellationToken) {
        let (tx, rx) = token_queue(rps, workers);
        let counters = Arc::new(RunCounters::new());
        let cancel = CancellationToken::new();
        let dispatcher = Dispatcher::new(
            Arc::from("http://localhost/"),
            rps,
            workers,
            duration,
            tx,
            counters.clone(),
            cancel.clone(),
        );
        (dispatcher, rx, counters, cancel)
    }

    #[test]
    fn interval_and_capacity_follow_rate() {
        assert_eq!(tick_interval(10), Duration::from_millis(100));
        assert_eq!(tick_interval(1), Duration::from_secs(1));
        assert_eq!(tick_interval(u32::MAX), Duration::from_nanos(1));
        assert_eq!(queue_capacity(10, 5), 50);
    }

    #[tokio::test]
    async fn stops_at_deadline_and_closes_stream() {
        let (dispatcher, rx, _, _) = dispatcher(20, 2, Duration::from_millis(300));
        let (state_tx, mut state_rx) = watch::channel(DispatchState::Idle);
        let dispatcher = dispatcher.with_state(Arc::new(state_tx));
        assert_eq!(*state_rx.borrow_and_update(), DispatchState::Idle);

        let consumer = tokio::spawn(async move {
            let mut received = 0u64;
            while rx.recv_async().await.is_ok() {
                received += 1;
            }
            received
        });

        let report = dispatcher.run().await;
        let received = consumer.await.unwrap();

        assert_eq!(report.stop, StopReason::Deadline);
        assert_eq!(*state_rx.borrow(), DispatchState::Draining);
        assert_eq!(received, report.enqueued);
        assert_eq!(report.enqueued + report.dropped, report.ticks * 2);
    }

    #[tokio::test]
    async fn rate_ceiling_holds() {
        let rps = 20;
        let workers = 3;
        let (dispatcher, rx, _, _) = dispatcher(rps, workers, Duration::from_secs(1));

        let consumer = tokio::spawn(async move {
            let mut received = 0u64;
            while rx.recv_async().await.is_ok() {
                received += 1;
            }
            received
        });

        let report = dispatcher.run().await;
        let received = consumer.await.unwrap();

        // One extra tick for the interval's immediate first fire.
        assert!(report.ticks <= u64::from(rps) + 1, "ticks = {}", report.ticks);
        assert!(received <= u64::from((rps + 1) * workers));
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let (dispatcher, rx, counters, _) = dispatcher(50, 2, Duration::from_millis(1500));

        // Nobody consumes: the queue fills to capacity and the rest is dropped.
        let report = dispatcher.run().await;

        assert_eq!(report.stop, StopReason::Deadline);
        assert_eq!(report.enqueued, queue_capacity(50, 2) as u64);
        assert_eq!(report.dropped, report.ticks * 2 - report.enqueued);
        assert_eq!(counters.dropped(), report.dropped);
        assert_eq!(rx.len(), queue_capacity(50, 2));
    }

    #[tokio::test]
    async fn cancellation_closes_stream_promptly() {
        let (dispatcher, rx, _, cancel) = dispatcher(10, 1, Duration::from_secs(30));
        let started = Instant::now();

        let handle = tokio::spawn(dispatcher.run());
        tokio::time::sleep(Duration::from_millis(250)).await;
        cancel.cancel();

        let report = handle.await.unwrap();

        assert_eq!(report.stop, StopReason::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(2));

        let drained: Vec<_> = rx.drain().collect();
        assert_eq!(drained.len() as u64, report.enqueued);
        assert!(rx.recv_async().await.is_err());
    }

    #[test]
    fn oversized_duration_does_not_overflow_deadline() {
        let start = Instant::now();
        assert_eq!(deadline_after(start, Duration::MAX), start + FAR_FUTURE);
        assert_eq!(
            deadline_after(start, Duration::from_secs(3)),
            start + Duration::from_secs(3)
        );
    }

    #[tokio::test]
    async fn unbounded_run_still_stops_on_cancel() {
        let (dispatcher, _rx, _, cancel) = dispatcher(10, 1, Duration::MAX);
        let handle = tokio::spawn(dispatcher.run());
        tokio::time::sleep(Duration::from_millis(150)).await;
        cancel.cancel();

        let report = handle.await.unwrap();
        assert_eq!(report.stop, StopReason::Cancelled);
    }

    #[tokio::test]
    async fn cancelled_before_start_sends_nothing() {
        let (dispatcher, rx, _, cancel) = dispatcher(10, 4, Duration::from_secs(5));
        cancel.cancel();

        let report = dispatcher.run().await;

        assert_eq!(report.stop, StopReason::Cancelled);
        assert_eq!(report.ticks, 0);
        assert!(rx.is_empty());
        assert!(rx.is_disconnected());
    }
}
