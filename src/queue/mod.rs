//! The batch queue engine.
//!
//! One dispatcher drives every domain queue through the same
//! fetch -> dedupe -> claim -> process -> record lifecycle. Domains plug
//! in as `ItemProcessor` implementations; everything else (leases,
//! retries, the step ledger, dedup) is shared.

mod dispatcher;
mod processor;
mod producer;
mod retry;

pub use dispatcher::{BatchOptions, Dispatcher, DispatchError};
pub use processor::{ItemProcessor, ProcessError, ProcessorRegistry};
pub use producer::{enqueue, enqueue_scheduled, EnqueueOutcome};
pub use retry::RetryPolicy;

use serde::Serialize;

/// Per-item outcome within a batch summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResult {
    pub id: String,
    pub dedup_key: String,
    pub status: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary returned by one dispatcher invocation.
///
/// Field names match what the platform's dashboards already consume.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    /// Number of items claimed (and therefore attempted).
    pub processed: usize,
    pub successful: usize,
    /// Candidates terminally skipped by the dedup pre-filter.
    pub skipped: usize,
    pub execution_time_ms: u64,
    pub results: Vec<ItemResult>,
}
