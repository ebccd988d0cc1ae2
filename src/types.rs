use crate::http::Resolution;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// ============================================================================
// Target & Load Settings
// ============================================================================

/// What to hit. Built once before the run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub url: String,
    /// Upper-cased explicit method; `None` means auto-detect.
    pub method: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub target: TargetSpec,
    pub duration: Duration,
    pub workers: u32,
    pub rps: u32,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            target: TargetSpec {
                url: String::new(),
                method: None,
                body: None,
            },
            duration: Duration::from_secs(10),
            workers: 10,
            rps: 10,
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Why a request never produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    Dns,
    Connect,
    Tls,
    Refused,
    Reset,
    Malformed,
    Other,
}

impl ErrorKind {
    pub fn from_reqwest_error(err: &reqwest::Error) -> Self {
        let msg = error_chain_text(err);

        if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_builder() {
            ErrorKind::Malformed
        } else if err.is_connect() {
            if msg.contains("dns") || msg.contains("resolve") {
                ErrorKind::Dns
            } else if msg.contains("refused") {
                ErrorKind::Refused
            } else if msg.contains("certificate") || msg.contains("tls") {
                ErrorKind::Tls
            } else {
                ErrorKind::Connect
            }
        } else if msg.contains("reset") {
            ErrorKind::Reset
        } else if msg.contains("tls") || msg.contains("certificate") {
            ErrorKind::Tls
        } else {
            ErrorKind::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Dns => "dns",
            ErrorKind::Connect => "connect",
            ErrorKind::Tls => "tls",
            ErrorKind::Refused => "refused",
            ErrorKind::Reset => "reset",
            ErrorKind::Malformed => "malformed",
            ErrorKind::Other => "other",
        }
    }
}

// reqwest hides the interesting part (e.g. "Connection refused") in the source chain.
fn error_chain_text(err: &reqwest::Error) -> String {
    let mut text = err.to_string().to_lowercase();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string().to_lowercase());
        source = inner.source();
    }
    text
}

// ============================================================================
// Request Outcome
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The target answered; counted toward total attempted.
    Responded { status: u16, label: &'static str },
    /// No response was received; counted as unreachable only.
    Unreachable(ErrorKind),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Responded { label, .. } => label,
            Outcome::Unreachable(_) => "Unreachable",
        }
    }
}

/// One finished request, as reported to the status-line sink.
#[derive(Debug, Clone)]
pub struct RequestEvent {
    pub worker_id: u32,
    pub url: String,
    pub method: String,
    pub outcome: Outcome,
}

// ============================================================================
// Run Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Deadline,
    Cancelled,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Deadline => "deadline",
            StopReason::Cancelled => "cancelled",
        }
    }
}

/// Live counters, published while the run is in progress.
#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    pub elapsed: Duration,
    pub total_attempted: u64,
    pub successful: u64,
    pub unreachable: u64,
    pub dropped: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodSource {
    Explicit,
    Allow,
    Probe,
}

impl MethodSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodSource::Explicit => "explicit",
            MethodSource::Allow => "allow header",
            MethodSource::Probe => "probe",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunPhase {
    Resolving,
    /// Methods are settled and load is being generated.
    Dispatching(Resolution),
    Finished,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub elapsed: Duration,
    pub total_attempted: u64,
    pub successful: u64,
    pub unreachable: u64,
    pub dropped: u64,
    pub ticks: u64,
    pub enqueued: u64,
    pub stop: StopReason,
    pub resolution: Resolution,
    pub unreachable_by_kind: HashMap<ErrorKind, u64>,
}

impl RunSummary {
    /// True when at least one attempt was made and none got an answer.
    pub fn target_never_reached(&self) -> bool {
        self.total_attempted == 0 && self.unreachable > 0
    }
}
