use crate::engine::RunCounters;
use crate::types::{RequestEvent, StatsSnapshot};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

pub const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(1);

/// Per-request status-line sink. Also republishes the shared counters as a
/// snapshot once per interval for live progress.
pub struct Reporter {
    event_rx: mpsc::Receiver<RequestEvent>,
    snapshot_tx: watch::Sender<StatsSnapshot>,
    counters: Arc<RunCounters>,
    print_lines: bool,
    start_time: Instant,
}

impl Reporter {
    pub fn new(
        event_rx: mpsc::Receiver<RequestEvent>,
        snapshot_tx: watch::Sender<StatsSnapshot>,
        counters: Arc<RunCounters>,
        print_lines: bool,
    ) -> Self {
        Self {
            event_rx,
            snapshot_tx,
            counters,
            print_lines,
            start_time: Instant::now(),
        }
    }

    /// Runs until every worker has dropped its event sender.
    pub async fn run(mut self) -> u64 {
        let mut snapshot_interval = tokio::time::interval(SNAPSHOT_INTERVAL);
        snapshot_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut lines = 0u64;

        loop {
            tokio::select! {
                biased;

                event = self.event_rx.recv() => {
                    match event {
                        Some(event) => {
                            lines += 1;
                            tracing::trace!(
                                "worker {} {} -> {}",
                                event.worker_id,
                                event.method,
                                event.outcome.label()
                            );
                            if self.print_lines {
                                print_status_line(&event);
                            }
                        }
                        None => {
                            self.send_snapshot();
                            break;
                        }
                    }
                }

                _ = snapshot_interval.tick() => self.send_snapshot(),
            }
        }

        lines
    }

    fn send_snapshot(&self) {
        let snapshot = self.counters.snapshot(self.start_time.elapsed());
        let _ = self.snapshot_tx.send(snapshot);
    }
}

pub fn format_status_line(event: &RequestEvent) -> String {
    format!("[{}] {}", event.outcome.label(), event.url)
}

fn print_status_line(event: &RequestEvent) {
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{}", format_status_line(event));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorKind, Outcome};

    fn event(outcome: Outcome) -> RequestEvent {
        RequestEvent {
            worker_id: 0,
            url: "http://localhost:8080/api".to_string(),
            method: "GET".to_string(),
            outcome,
        }
    }

    #[test]
    fn status_line_shows_label_and_url() {
        let line = format_status_line(&event(Outcome::Responded {
            status: 404,
            label: "Not Found",
        }));
        assert_eq!(line, "[Not Found] http://localhost:8080/api");

        let line = format_status_line(&event(Outcome::Unreachable(ErrorKind::Refused)));
        assert_eq!(line, "[Unreachable] http://localhost:8080/api");
    }

    #[tokio::test]
    async fn publishes_final_snapshot_when_workers_finish() {
        let counters = Arc::new(RunCounters::new());
        counters.record_response(200);
        counters.record_response(500);
        counters.record_unreachable(ErrorKind::Timeout);

        let (event_tx, event_rx) = mpsc::channel(4);
        let (snapshot_tx, snapshot_rx) = watch::channel(StatsSnapshot::default());
        let reporter = Reporter::new(event_rx, snapshot_tx, counters, false);

        event_tx
            .send(event(Outcome::Responded { status: 200, label: "OK" }))
            .await
            .unwrap();
        drop(event_tx);

        assert_eq!(reporter.run().await, 1);

        let snapshot = snapshot_rx.borrow().clone();
        assert_eq!(snapshot.total_attempted, 2);
        assert_eq!(snapshot.successful, 1);
        assert_eq!(snapshot.unreachable, 1);
    }
}
