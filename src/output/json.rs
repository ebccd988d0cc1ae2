use crate::types::{LoadConfig, RunSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

#[derive(Serialize, Deserialize)]
pub struct JsonOutput {
    pub metadata: Metadata,
    pub summary: Summary,
    pub methods: Methods,
    pub dispatch: Dispatch,
    pub unreachable_by_kind: BTreeMap<String, u64>,
}

#[derive(Serialize, Deserialize)]
pub struct Metadata {
    pub tool: String,
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub target: Target,
    pub load: Load,
}

#[derive(Serialize, Deserialize)]
pub struct Target {
    pub url: String,
    /// Explicit method, or `null` when detected.
    pub method: Option<String>,
    pub has_body: bool,
}

#[derive(Serialize, Deserialize)]
pub struct Load {
    pub duration_secs: f64,
    pub workers: u32,
    pub rps: u32,
}

#[derive(Serialize, Deserialize)]
pub struct Summary {
    pub total_attempted: u64,
    pub successful: u64,
    pub unreachable: u64,
    pub target_reached: bool,
}

#[derive(Serialize, Deserialize)]
pub struct Methods {
    pub chosen: String,
    pub supported: Vec<String>,
    pub source: String,
}

#[derive(Serialize, Deserialize)]
pub struct Dispatch {
    pub ticks: u64,
    pub enqueued: u64,
    pub dropped: u64,
    pub stop_reason: String,
}

pub fn create_output(summary: &RunSummary, config: &LoadConfig) -> JsonOutput {
    let now = Utc::now();
    let started_at = now - chrono::Duration::from_std(summary.elapsed).unwrap_or_default();

    let unreachable_by_kind = summary
        .unreachable_by_kind
        .iter()
        .map(|(kind, count)| (kind.as_str().to_string(), *count))
        .collect();

    JsonOutput {
        metadata: Metadata {
            tool: "surge".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at,
            ended_at: now,
            duration_secs: summary.elapsed.as_secs_f64(),
            target: Target {
                url: config.target.url.clone(),
                method: config.target.method.clone(),
                has_body: config.target.body.is_some(),
            },
            load: Load {
                duration_secs: config.duration.as_secs_f64(),
                workers: config.workers,
                rps: config.rps,
            },
        },
        summary: Summary {
            total_attempted: summary.total_attempted,
            successful: summary.successful,
            unreachable: summary.unreachable,
            target_reached: summary.total_attempted > 0,
        },
        methods: Methods {
            chosen: summary.resolution.chosen.clone(),
            supported: summary.resolution.supported.clone(),
            source: summary.resolution.source.as_str().to_string(),
        },
        dispatch: Dispatch {
            ticks: summary.ticks,
            enqueued: summary.enqueued,
            dropped: summary.dropped,
            stop_reason: summary.stop.as_str().to_string(),
        },
        unreachable_by_kind,
    }
}

pub fn write_json(summary: &RunSummary, config: &LoadConfig, path: &Path) -> io::Result<()> {
    let output = create_output(summary, config);
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &output)?;
    Ok(())
}

pub fn print_json(summary: &RunSummary, config: &LoadConfig) -> io::Result<()> {
    let output = create_output(summary, config);
    let stdout = io::stdout();
    let writer = BufWriter::new(stdout.lock());
    serde_json::to_writer_pretty(writer, &output)?;
    println!();
    Ok(())
}
