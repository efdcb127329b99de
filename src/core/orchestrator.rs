//! Public entry point for orchestration runs.
//!
//! Wraps a `Scheduler` and remembers the results of recent runs by run id
//! in a bounded LRU cache.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::limits::ExecutionLimits;
use super::scheduler::{Scheduler, TraceEntry};
use crate::config::ResolvedConfig;
use crate::domain::{OrchestrationResult, OrchestratorState, SchedulerRequest};
use crate::store::{MemoryRunStore, StoreError};

/// Default number of results kept for `get_state`
pub const DEFAULT_RESULT_CAPACITY: usize = 256;

/// Orchestration facade
pub struct Orchestrator {
    scheduler: Scheduler,
    results: Mutex<LruCache<String, OrchestrationResult>>,
}

impl Orchestrator {
    /// Create an orchestrator with the default result capacity
    pub fn new(scheduler: Scheduler) -> Self {
        Self::with_capacity(scheduler, DEFAULT_RESULT_CAPACITY)
    }

    /// Create an orchestrator keeping at most `capacity` results (minimum 1)
    pub fn with_capacity(scheduler: Scheduler, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            scheduler,
            results: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Orchestrator over a fresh in-memory store with default settings
    pub fn in_memory() -> Self {
        Self::new(Scheduler::new(Arc::new(MemoryRunStore::new())))
    }

    /// Build the store, limits and cache size from resolved configuration
    pub async fn from_config(config: &ResolvedConfig) -> Result<Self, StoreError> {
        let store = config.store.open().await?;
        let scheduler =
            Scheduler::new(store).with_limits(ExecutionLimits::new(config.execution.max_outputs));

        info!(
            store = scheduler.store().name(),
            max_outputs = config.execution.max_outputs,
            capacity = config.results.capacity,
            "Orchestrator configured"
        );
        Ok(Self::with_capacity(scheduler, config.results.capacity))
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Run a request and remember its result under `intent.run_id`.
    ///
    /// Reusing a run id replaces the earlier result.
    #[instrument(skip(self, request), fields(run_id = %request.intent.run_id))]
    pub async fn run(&self, request: &SchedulerRequest) -> OrchestrationResult {
        let result = self.scheduler.run(request).await;

        let mut results = self.results.lock().await;
        if let Some((evicted, _)) = results.push(request.intent.run_id.clone(), result.clone()) {
            if evicted != request.intent.run_id {
                debug!(%evicted, "Evicted oldest cached result");
            }
        }

        result
    }

    /// Result of a finished run, if still cached
    pub async fn get_state(&self, run_id: &str) -> Option<OrchestrationResult> {
        self.results.lock().await.get(run_id).cloned()
    }

    /// State of a run that is still executing
    pub fn live_state(&self, run_id: &str) -> Option<OrchestratorState> {
        self.scheduler.state(run_id)
    }

    pub async fn bootstrap(&self) -> Vec<TraceEntry> {
        self.scheduler.bootstrap().await
    }

    /// Cached results, most recently used first
    pub async fn recent(&self, limit: usize) -> Vec<OrchestrationResult> {
        self.results
            .lock()
            .await
            .iter()
            .take(limit)
            .map(|(_, result)| result.clone())
            .collect()
    }

    pub async fn cached_len(&self) -> usize {
        self.results.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExperimentContext, ExperimentIntent, ExperimentPayload, ExperimentPlan};
    use serde_json::json;

    fn request(run_id: &str) -> SchedulerRequest {
        SchedulerRequest::new(
            ExperimentIntent::new(run_id, "tenant-a", "prepare"),
            ExperimentContext::new("tenant-a", "drills"),
            ExperimentPayload::new(json!({"count": 1})),
            ExperimentPlan::new("exp-1", ["prepare"]),
        )
    }

    #[tokio::test]
    async fn test_unknown_run_id_is_none() {
        let orchestrator = Orchestrator::in_memory();
        assert!(orchestrator.get_state("missing").await.is_none());
        assert!(orchestrator.live_state("missing").is_none());
    }

    #[tokio::test]
    async fn test_cache_evicts_least_recent() {
        let orchestrator = Orchestrator::with_capacity(
            Scheduler::new(Arc::new(MemoryRunStore::new())),
            2,
        );

        orchestrator.run(&request("r1")).await;
        orchestrator.run(&request("r2")).await;
        orchestrator.run(&request("r3")).await;

        assert_eq!(orchestrator.cached_len().await, 2);
        assert!(orchestrator.get_state("r1").await.is_none());
        assert!(orchestrator.get_state("r3").await.is_some());

        let recent: Vec<String> = orchestrator
            .recent(10)
            .await
            .iter()
            .map(|r| r.run_id().to_string())
            .collect();
        assert_eq!(recent, vec!["r3", "r2"]);
    }

    #[tokio::test]
    async fn test_zero_capacity_keeps_one_result() {
        let orchestrator = Orchestrator::with_capacity(
            Scheduler::new(Arc::new(MemoryRunStore::new())),
            0,
        );

        orchestrator.run(&request("r1")).await;
        assert_eq!(orchestrator.cached_len().await, 1);
    }
}
