use crate::types::{ErrorKind, StatsSnapshot};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Outcome counters shared by every worker of a run.
///
/// Each counter only ever grows. `total_attempted` counts requests that got a
/// response; transport failures land in `unreachable` instead.
#[derive(Debug, Default)]
pub struct RunCounters {
    total_attempted: AtomicU64,
    successful: AtomicU64,
    unreachable: AtomicU64,
    dropped: AtomicU64,
    by_kind: Mutex<HashMap<ErrorKind, u64>>,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_response(&self, status: u16) {
        // Bump `successful` after `total_attempted` so a concurrent reader never
        // sees more successes than attempts.
        self.total_attempted.fetch_add(1, Ordering::Release);
        if (200..400).contains(&status) {
            self.successful.fetch_add(1, Ordering::Release);
        }
    }

    pub fn record_unreachable(&self, kind: ErrorKind) {
        self.unreachable.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut by_kind) = self.by_kind.lock() {
            *by_kind.entry(kind).or_insert(0) += 1;
        }
    }

    pub fn record_dropped(&self, n: u64) {
        self.dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub fn total_attempted(&self) -> u64 {
        self.total_attempted.load(Ordering::Acquire)
    }

    pub fn successful(&self) -> u64 {
        self.successful.load(Ordering::Acquire)
    }

    pub fn unreachable(&self) -> u64 {
        self.unreachable.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn unreachable_by_kind(&self) -> HashMap<ErrorKind, u64> {
        self.by_kind
            .lock()
            .map(|by_kind| by_kind.clone())
            .unwrap_or_default()
    }

    pub fn snapshot(&self, elapsed: Duration) -> StatsSnapshot {
        // Successes first: attempts read afterwards can only be larger.
        let successful = self.successful();
        StatsSnapshot {
            elapsed,
            total_attempted: self.total_attempted(),
            successful,
            unreachable: self.unreachable(),
            dropped: self.dropped(),
        }
    }
}
