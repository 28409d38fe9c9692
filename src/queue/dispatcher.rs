//! The dispatcher - one invocation drains one bounded batch.
//!
//! Items are processed strictly sequentially; the only suspension points
//! are the processors' outbound calls. A failure on one item is recorded
//! and the loop moves on, so the returned summary always accounts for
//! every claimed item.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::processor::{ItemProcessor, ProcessError, ProcessorRegistry};
use super::retry::RetryPolicy;
use super::{BatchSummary, ItemResult};
use crate::config::EngineConfig;
use crate::models::{validate_payload, QueueItem, StepRecord};
use crate::repository::{ContentRepository, QueueRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown queue '{0}'")]
    UnknownQueue(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Options for one dispatcher invocation.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Requested batch size; clamped to the configured maximum.
    pub batch_size: Option<usize>,
}

/// Drives domain queues through the shared claim/process/record cycle.
pub struct Dispatcher {
    repo: Arc<QueueRepository>,
    content: Arc<ContentRepository>,
    registry: ProcessorRegistry,
    policy: RetryPolicy,
    engine: EngineConfig,
    /// Lease owner id recorded on claims, unique per dispatcher instance.
    owner: String,
}

impl Dispatcher {
    pub fn new(
        repo: Arc<QueueRepository>,
        content: Arc<ContentRepository>,
        registry: ProcessorRegistry,
        engine: EngineConfig,
    ) -> Self {
        let policy = RetryPolicy::from_config(&engine);
        let owner = format!("dispatcher-{}", uuid::Uuid::new_v4().simple());
        Self {
            repo,
            content,
            registry,
            policy,
            engine,
            owner,
        }
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Process up to one batch of pending items from `queue`.
    pub async fn run_batch(
        &self,
        queue: &str,
        opts: &BatchOptions,
    ) -> Result<BatchSummary, DispatchError> {
        let started = Instant::now();
        let processor = self
            .registry
            .get(queue)
            .ok_or_else(|| DispatchError::UnknownQueue(queue.to_string()))?;

        let batch_size = opts
            .batch_size
            .unwrap_or(self.engine.default_batch_size)
            .clamp(1, self.engine.max_batch_size);

        let reclaimed = self.repo.release_expired_leases(Some(queue))?;
        if reclaimed > 0 {
            info!("Reclaimed {} expired leases on {}", reclaimed, queue);
        }

        let candidates = self.repo.fetch_candidates(queue, batch_size)?;
        debug!("Fetched {} candidates from {}", candidates.len(), queue);

        let mut summary = BatchSummary {
            processed: 0,
            successful: 0,
            skipped: 0,
            execution_time_ms: 0,
            results: Vec::new(),
        };
        let mut batch_keys: HashSet<String> = HashSet::new();
        let mut first = true;

        for candidate in candidates {
            // Fixed delay between items; suspension happens only here
            // and inside processor steps.
            if !first {
                self.policy.throttle().pace().await;
            }
            first = false;

            if !processor.ready(&candidate) {
                debug!("Item {} not ready, leaving pending", candidate.id);
                continue;
            }

            match self.key_collides(&candidate, &batch_keys) {
                Ok(false) => {}
                Ok(true) => {
                    let reason =
                        format!("duplicate work for key '{}'", candidate.dedup_key);
                    if self.repo.mark_skipped(&candidate.id, &reason)? {
                        summary.skipped += 1;
                        summary.results.push(ItemResult {
                            id: candidate.id.clone(),
                            dedup_key: candidate.dedup_key.clone(),
                            status: "skipped".to_string(),
                            success: false,
                            error: Some(reason),
                        });
                    }
                    continue;
                }
                Err(e) => {
                    // Dedup check failed: leave the candidate pending
                    // rather than risk duplicate work.
                    warn!(
                        "Dedup pre-check failed for {} ({}), leaving pending",
                        candidate.id, e
                    );
                    continue;
                }
            }

            let item = match self.repo.try_claim(
                &candidate.id,
                &self.owner,
                self.engine.lease_secs,
            )? {
                Some(item) => item,
                // Another dispatcher won the row between fetch and claim.
                None => continue,
            };
            batch_keys.insert(item.dedup_key.clone());
            summary.processed += 1;

            let outcome = self.process_item(processor.as_ref(), &item).await;
            self.record_outcome(&item, outcome, &mut summary);
        }

        summary.execution_time_ms = started.elapsed().as_millis() as u64;
        info!(
            "Batch on {}: {} processed, {} successful, {} skipped in {}ms",
            queue,
            summary.processed,
            summary.successful,
            summary.skipped,
            summary.execution_time_ms
        );
        Ok(summary)
    }

    /// Run the item's step chain, resuming past completed steps.
    async fn process_item(
        &self,
        processor: &dyn ItemProcessor,
        item: &QueueItem,
    ) -> Result<(), ProcessError> {
        // A payload that no longer parses cannot succeed on retry.
        validate_payload(&item.queue, &item.payload)?;

        let mut completed = self
            .repo
            .completed_steps(&item.id)
            .map_err(|e| ProcessError::Transient(e.to_string()))?;

        for step in processor.steps() {
            if completed.contains_key(*step) {
                debug!("Item {}: step {} already completed, skipping", item.id, step);
                continue;
            }

            match processor.run_step(step, item, &completed).await {
                Ok(result) => {
                    self.repo
                        .record_step(&StepRecord::completed(&item.id, step, result.clone()))
                        .map_err(|e| ProcessError::Transient(e.to_string()))?;
                    completed.insert(step.to_string(), result);
                }
                Err(e) => {
                    let record = StepRecord::failed(&item.id, step, &e.to_string());
                    if let Err(ledger_err) = self.repo.record_step(&record) {
                        error!("Failed to record step failure: {}", ledger_err);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Map a processing outcome onto the item's next status.
    fn record_outcome(
        &self,
        item: &QueueItem,
        outcome: Result<(), ProcessError>,
        summary: &mut BatchSummary,
    ) {
        let (status, error) = match outcome {
            Ok(()) => {
                summary.successful += 1;
                match self.repo.mark_completed(&item.id) {
                    Ok(true) => ("completed", None),
                    Ok(false) => {
                        warn!("Item {} left processing before completion write", item.id);
                        ("processing", Some("lost lease before completion".to_string()))
                    }
                    Err(e) => {
                        error!("Failed to mark {} completed: {}", item.id, e);
                        ("processing", Some(e.to_string()))
                    }
                }
            }
            Err(ProcessError::Permanent(msg)) => {
                if let Err(e) = self.repo.mark_failed(&item.id, &msg) {
                    error!("Failed to mark {} failed: {}", item.id, e);
                }
                ("failed", Some(msg))
            }
            Err(ProcessError::Transient(msg)) => {
                if self.policy.should_retry(item.attempts) {
                    if let Err(e) = self.repo.mark_retry(&item.id, &msg) {
                        error!("Failed to requeue {}: {}", item.id, e);
                    }
                    ("pending", Some(msg))
                } else {
                    if let Err(e) = self.repo.mark_failed(&item.id, &msg) {
                        error!("Failed to mark {} failed: {}", item.id, e);
                    }
                    ("failed", Some(msg))
                }
            }
        };

        summary.results.push(ItemResult {
            id: item.id.clone(),
            dedup_key: item.dedup_key.clone(),
            status: status.to_string(),
            success: status == "completed",
            error,
        });
    }

    fn key_collides(
        &self,
        candidate: &QueueItem,
        batch_keys: &HashSet<String>,
    ) -> Result<bool, RepositoryError> {
        if batch_keys.contains(&candidate.dedup_key) {
            return Ok(true);
        }
        // An item with ledger entries is a resume: the colliding content
        // is its own partial output, not someone else's work.
        let resumed = !self.repo.completed_steps(&candidate.id)?.is_empty();
        if !resumed && self.content.has_key(&candidate.dedup_key)? {
            return Ok(true);
        }
        self.repo
            .live_key_exists(&candidate.queue, &candidate.dedup_key, Some(&candidate.id))
    }
}
