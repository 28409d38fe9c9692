//! Processor seam between the engine and the domain pipelines.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::adapters::AdapterError;
use crate::models::{PayloadError, QueueItem};

/// Failure taxonomy the engine maps onto queue transitions.
///
/// Transient failures requeue until the attempt ceiling; permanent
/// failures (validation, malformed upstream data) fail immediately
/// because retrying cannot help.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("{0}")]
    Transient(String),
    #[error("{0}")]
    Permanent(String),
}

impl From<AdapterError> for ProcessError {
    fn from(e: AdapterError) -> Self {
        if e.is_transient() {
            Self::Transient(e.to_string())
        } else {
            Self::Permanent(e.to_string())
        }
    }
}

impl From<PayloadError> for ProcessError {
    fn from(e: PayloadError) -> Self {
        Self::Permanent(e.to_string())
    }
}

/// A domain queue's processing pipeline.
///
/// The dispatcher owns claiming, retries and the step ledger; an
/// implementation only names its steps and executes one step at a time.
/// `run_step` receives the results of every step already completed for
/// the item (from earlier in this run or from a previous attempt), so
/// resumed items can pick up where they left off.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    /// Queue this processor serves.
    fn queue(&self) -> &'static str;

    /// Ordered step names. Executed in order; completed steps are
    /// skipped on retry.
    fn steps(&self) -> &[&'static str];

    /// Readiness predicate; unready items stay pending without being
    /// claimed.
    fn ready(&self, _item: &QueueItem) -> bool {
        true
    }

    /// Execute one step. The returned value is recorded in the ledger.
    async fn run_step(
        &self,
        step: &str,
        item: &QueueItem,
        completed: &HashMap<String, serde_json::Value>,
    ) -> Result<serde_json::Value, ProcessError>;
}

/// Lookup table from queue name to processor.
#[derive(Default, Clone)]
pub struct ProcessorRegistry {
    processors: HashMap<&'static str, Arc<dyn ItemProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, processor: Arc<dyn ItemProcessor>) {
        self.processors.insert(processor.queue(), processor);
    }

    pub fn get(&self, queue: &str) -> Option<Arc<dyn ItemProcessor>> {
        self.processors.get(queue).cloned()
    }

    pub fn queues(&self) -> Vec<&'static str> {
        let mut queues: Vec<_> = self.processors.keys().copied().collect();
        queues.sort_unstable();
        queues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopProcessor;

    #[async_trait]
    impl ItemProcessor for NoopProcessor {
        fn queue(&self) -> &'static str {
            "albums"
        }

        fn steps(&self) -> &[&'static str] {
            &["only"]
        }

        async fn run_step(
            &self,
            _step: &str,
            _item: &QueueItem,
            _completed: &HashMap<String, serde_json::Value>,
        ) -> Result<serde_json::Value, ProcessError> {
            Ok(serde_json::Value::Null)
        }
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = ProcessorRegistry::new();
        registry.register(Arc::new(NoopProcessor));

        assert!(registry.get("albums").is_some());
        assert!(registry.get("stories").is_none());
        assert_eq!(registry.queues(), vec!["albums"]);
    }

    #[test]
    fn test_adapter_error_mapping() {
        let transient: ProcessError = AdapterError::Connection("reset".into()).into();
        assert!(matches!(transient, ProcessError::Transient(_)));

        let permanent: ProcessError = AdapterError::Api {
            status: 422,
            body: "bad field".into(),
        }
        .into();
        assert!(matches!(permanent, ProcessError::Permanent(_)));
    }
}
