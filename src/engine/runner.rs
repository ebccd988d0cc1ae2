use crate::engine::RunCounters;
use crate::engine::reporter::Reporter;
use crate::engine::scheduler::{DispatchState, Dispatcher, token_queue};
use crate::engine::worker::{MethodPlan, Worker};
use crate::error::EngineError;
use crate::http::methods::carries_body;
use crate::http::{POOL_MAX_IDLE_PER_HOST, create_client, resolve};
use crate::types::{LoadConfig, MethodSource, RequestEvent, RunPhase, RunSummary, StatsSnapshot};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

const EVENT_CHANNEL_SIZE: usize = 10_000;

/// Run controller: resolves methods, then drives the dispatcher and the worker
/// pool to completion and collects the counters.
pub struct Engine {
    config: LoadConfig,
    cancel_token: CancellationToken,
    print_status_lines: bool,
    phase_tx: watch::Sender<RunPhase>,
    state_tx: Arc<watch::Sender<DispatchState>>,
    snapshot_tx: watch::Sender<StatsSnapshot>,
    snapshot_rx: watch::Receiver<StatsSnapshot>,
}

impl Engine {
    pub fn new(config: LoadConfig) -> Self {
        let (phase_tx, _) = watch::channel(RunPhase::Resolving);
        let (state_tx, _) = watch::channel(DispatchState::Idle);
        let (snapshot_tx, snapshot_rx) = watch::channel(StatsSnapshot::default());

        Self {
            config,
            cancel_token: CancellationToken::new(),
            print_status_lines: true,
            phase_tx,
            state_tx: Arc::new(state_tx),
            snapshot_tx,
            snapshot_rx,
        }
    }

    pub fn with_status_lines(mut self, enabled: bool) -> Self {
        self.print_status_lines = enabled;
        self
    }

    /// External stop request. Cancelling closes the token stream; in-flight
    /// requests are left to finish.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn phase_rx(&self) -> watch::Receiver<RunPhase> {
        self.phase_tx.subscribe()
    }

    pub fn state_rx(&self) -> watch::Receiver<DispatchState> {
        self.state_tx.subscribe()
    }

    pub fn snapshot_rx(&self) -> watch::Receiver<StatsSnapshot> {
        self.snapshot_rx.clone()
    }

    pub async fn run(self) -> Result<RunSummary, EngineError> {
        let target = &self.config.target;

        let resolution = tokio::select! {
            biased;

            _ = self.cancel_token.cancelled() => return Err(EngineError::Cancelled),
            resolved = resolve(&target.url, target.method.as_deref()) => resolved?,
        };

        let explicit = (resolution.source == MethodSource::Explicit)
            .then_some(resolution.chosen.as_str());
        let plan =
            MethodPlan::new(explicit, &resolution.supported).ok_or(EngineError::EmptyMethodSet)?;

        tracing::info!(
            "Using {} ({}), supported: [{}]",
            resolution.chosen,
            resolution.source.as_str(),
            resolution.supported.join(", ")
        );
        if target.body.is_some() && !plan.methods().iter().any(|m| carries_body(m)) {
            tracing::warn!("Request body is set but no selected method sends one");
        }

        let workers = self.config.workers;
        let clients = (0..workers)
            .map(|_| create_client(POOL_MAX_IDLE_PER_HOST))
            .collect::<Result<Vec<_>, _>>()
            .map_err(EngineError::Client)?;

        let counters = Arc::new(RunCounters::new());
        let url: Arc<str> = Arc::from(target.url.as_str());
        let body: Option<Arc<str>> = target.body.as_deref().map(Arc::from);
        let (queue_tx, queue_rx) = token_queue(self.config.rps, workers);
        let (event_tx, event_rx) = mpsc::channel::<RequestEvent>(EVENT_CHANNEL_SIZE);

        let _ = self.phase_tx.send(RunPhase::Dispatching(resolution.clone()));
        let started = Instant::now();

        let reporter = Reporter::new(
            event_rx,
            self.snapshot_tx.clone(),
            counters.clone(),
            self.print_status_lines,
        );
        let reporter_handle = tokio::spawn(reporter.run());

        let dispatcher = Dispatcher::new(
            url,
            self.config.rps,
            workers,
            self.config.duration,
            queue_tx,
            counters.clone(),
            self.cancel_token.clone(),
        )
        .with_state(self.state_tx.clone());
        let dispatcher_handle = tokio::spawn(dispatcher.run());

        let mut worker_handles = Vec::with_capacity(workers as usize);
        for (id, client) in (0..workers).zip(clients) {
            let worker = Worker::new(
                id,
                client,
                queue_rx.clone(),
                plan.clone(),
                body.clone(),
                counters.clone(),
                Some(event_tx.clone()),
            );
            worker_handles.push(tokio::spawn(worker.run()));
        }

        // Workers hold the only remaining handles; the pool ends when the
        // dispatcher closes the stream and the queue is empty.
        drop(queue_rx);
        drop(event_tx);

        for handle in worker_handles {
            handle.await?;
        }
        let report = dispatcher_handle.await?;
        self.state_tx.send_replace(DispatchState::Stopped);
        reporter_handle.await?;

        let elapsed = started.elapsed();
        tracing::info!("Worker pool finished after {:?}", elapsed);
        let _ = self.phase_tx.send(RunPhase::Finished);

        Ok(RunSummary {
            elapsed,
            total_attempted: counters.total_attempted(),
            successful: counters.successful(),
            unreachable: counters.unreachable(),
            dropped: report.dropped,
            ticks: report.ticks,
            enqueued: report.enqueued,
            stop: report.stop,
            resolution,
            unreachable_by_kind: counters.unreachable_by_kind(),
        })
    }
}
