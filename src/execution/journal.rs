use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;

use crate::models::{Action, FillResult, PositionPhase};
use crate::Result;

/// What happened on a tick
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TickResult {
    NoAction,
    Filled(FillResult),
    ExecutionFailed(String),
    FeedUnavailable(String),
    SkippedInFlight,
}

/// One structured record per tick, for external logging and metrics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickRecord {
    pub timestamp: DateTime<Utc>,
    pub instrument: String,
    pub observed_price: Option<f64>,
    pub action: Action,
    pub result: TickResult,
    pub phase_after: PositionPhase,
}

/// Destination for tick records
///
/// Sinks must not fail the tick; write errors are logged and dropped.
#[async_trait]
pub trait TickSink: Send + Sync {
    async fn record(&self, record: &TickRecord);
}

/// Emits each record as a `tracing` event on the `dipbot::journal` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl TickSink for TracingSink {
    async fn record(&self, record: &TickRecord) {
        let price = record
            .observed_price
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());

        match &record.result {
            TickResult::Filled(fill) => tracing::info!(
                target: "dipbot::journal",
                instrument = %record.instrument,
                price = %price,
                action = ?record.action,
                filled = fill.filled_amount,
                fill_price = fill.fill_price,
                phase = ?record.phase_after,
                "✅ Filled"
            ),
            TickResult::ExecutionFailed(reason) => tracing::error!(
                target: "dipbot::journal",
                instrument = %record.instrument,
                price = %price,
                action = ?record.action,
                phase = ?record.phase_after,
                "❌ Execution failed: {}",
                reason
            ),
            TickResult::FeedUnavailable(reason) => tracing::warn!(
                target: "dipbot::journal",
                instrument = %record.instrument,
                "No price this tick: {}",
                reason
            ),
            TickResult::SkippedInFlight => tracing::warn!(
                target: "dipbot::journal",
                instrument = %record.instrument,
                price = %price,
                action = ?record.action,
                "⏳ Skipped, order in flight"
            ),
            TickResult::NoAction => tracing::debug!(
                target: "dipbot::journal",
                instrument = %record.instrument,
                price = %price,
                phase = ?record.phase_after,
                "Hold"
            ),
        }
    }
}

/// Appends records as JSON lines to a file
pub struct JsonLinesSink {
    path: PathBuf,
    // Serializes writers so lines from concurrent engines never interleave
    lock: tokio::sync::Mutex<()>,
}

impl JsonLinesSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, record: &TickRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}

#[async_trait]
impl TickSink for JsonLinesSink {
    async fn record(&self, record: &TickRecord) {
        if let Err(e) = self.append(record).await {
            tracing::warn!(
                path = %self.path.display(),
                "Failed to write tick record: {}",
                e
            );
        }
    }
}

/// Keeps records in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<TickRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TickRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TickSink for MemorySink {
    async fn record(&self, record: &TickRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
    }
}

/// Forwards every record to each inner sink in order
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn TickSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn TickSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl TickSink for FanoutSink {
    async fn record(&self, record: &TickRecord) {
        for sink in &self.sinks {
            sink.record(record).await;
        }
    }
}
