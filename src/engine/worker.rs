use crate::engine::RunCounters;
use crate::engine::scheduler::DispatchToken;
use crate::http::execute_request;
use crate::types::RequestEvent;
use rand::seq::IndexedRandom;
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// How a worker picks the method for each token.
#[derive(Debug, Clone)]
pub enum MethodPlan {
    /// Configured by the user; every request uses it.
    Fixed(Arc<str>),
    /// Auto-detected; each request draws uniformly from the set.
    Rotate(Arc<[String]>),
}

impl MethodPlan {
    /// `None` when auto-detection produced nothing to send.
    pub fn new(explicit: Option<&str>, supported: &[String]) -> Option<Self> {
        match explicit {
            Some(method) => Some(MethodPlan::Fixed(Arc::from(method))),
            None if supported.is_empty() => None,
            None => Some(MethodPlan::Rotate(Arc::from(supported))),
        }
    }

    pub fn pick(&self) -> &str {
        match self {
            MethodPlan::Fixed(method) => method.as_ref(),
            MethodPlan::Rotate(set) => set
                .choose(&mut rand::rng())
                .map(String::as_str)
                .unwrap_or_default(),
        }
    }

    pub fn methods(&self) -> Vec<String> {
        match self {
            MethodPlan::Fixed(method) => vec![method.to_string()],
            MethodPlan::Rotate(set) => set.to_vec(),
        }
    }
}

pub struct Worker {
    id: u32,
    client: Client,
    queue_rx: flume::Receiver<DispatchToken>,
    methods: MethodPlan,
    body: Option<Arc<str>>,
    counters: Arc<RunCounters>,
    event_tx: Option<mpsc::Sender<RequestEvent>>,
}

impl Worker {
    pub fn new(
        id: u32,
        client: Client,
        queue_rx: flume::Receiver<DispatchToken>,
        methods: MethodPlan,
        body: Option<Arc<str>>,
        counters: Arc<RunCounters>,
        event_tx: Option<mpsc::Sender<RequestEvent>>,
    ) -> Self {
        Self {
            id,
            client,
            queue_rx,
            methods,
            body,
            counters,
            event_tx,
        }
    }

    /// Drains tokens until the stream is closed and empty.
    pub async fn run(mut self) -> u64 {
        tracing::debug!("Worker {} started", self.id);
        let mut handled = 0u64;

        while let Ok(token) = self.queue_rx.recv_async().await {
            let method = self.methods.pick().to_string();
            let outcome = execute_request(
                &self.client,
                &token.url,
                &method,
                self.body.as_deref(),
                &self.counters,
            )
            .await;
            handled += 1;

            if let Some(tx) = &self.event_tx {
                let event = RequestEvent {
                    worker_id: self.id,
                    url: token.url.to_string(),
                    method,
                    outcome,
                };
                match tx.try_send(event) {
                    Ok(()) => {}
                    // Status lines are best effort; a slow sink never holds a worker back.
                    Err(TrySendError::Full(_)) => {}
                    Err(TrySendError::Closed(_)) => self.event_tx = None,
                }
            }
        }

        tracing::debug!("Worker {} stopped after {} requests", self.id, handled);
        handled
    }
}
