//! Run scheduling.
//!
//! The scheduler bootstraps the registry, executes a request's plan,
//! persists the run record and reports the combined outcome. Each run gets
//! its own state slot, published before execution starts and released by
//! the run's `RunRuntime` guard on every exit path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use super::executor::Executor;
use super::limits::ExecutionLimits;
use super::plugins::baseline_plugins;
use super::registry::{PhaseObserver, Plugin, PluginRegistry};
use crate::domain::{
    OrchestrationResult, OrchestratorState, Phase, RecordStatus, RunError, RunRecord,
    SchedulerRequest,
};
use crate::store::RunStore;

/// One line of a bootstrap trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "entry")]
pub enum TraceEntry {
    /// Free-form log line
    Log { message: String },

    /// Receipt for a registered plugin
    Loaded {
        plugin_id: String,
        kind: String,
        phase: Phase,
        priority: i32,
    },
}

impl TraceEntry {
    fn log(message: impl Into<String>) -> Self {
        Self::Log {
            message: message.into(),
        }
    }

    fn loaded(plugin: &dyn Plugin) -> Self {
        Self::Loaded {
            plugin_id: plugin.id().to_string(),
            kind: plugin.kind().to_string(),
            phase: plugin.phase().clone(),
            priority: plugin.priority(),
        }
    }
}

/// One in-flight run's slot, tagged with the token of the guard that owns it
#[derive(Debug)]
struct StateSlot {
    token: u64,
    state: OrchestratorState,
}

/// In-flight run bookkeeping shared with runtime guards.
///
/// A run id can be in flight more than once when callers reuse it; each
/// acquire gets its own slot and the most recent one is reported.
#[derive(Debug, Default)]
struct RunBook {
    slots: Mutex<HashMap<String, Vec<StateSlot>>>,
    next_token: AtomicU64,
    active: AtomicUsize,
}

impl RunBook {
    fn slots(&self) -> MutexGuard<'_, HashMap<String, Vec<StateSlot>>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn latest(&self, run_id: &str) -> Option<OrchestratorState> {
        self.slots()
            .get(run_id)
            .and_then(|slots| slots.last())
            .map(|slot| slot.state.clone())
    }
}

/// Scoped handle for one run.
///
/// Dropping it releases the run's state slot and active-run count, whether
/// the run succeeded, failed or was abandoned mid-flight. Only the slot this
/// handle acquired is touched, even if another run reuses the same id.
pub struct RunRuntime {
    run_id: String,
    token: u64,
    book: Arc<RunBook>,
    acquired_at: Instant,
}

impl RunRuntime {
    fn acquire(book: Arc<RunBook>, state: OrchestratorState) -> Self {
        let run_id = state.run_id.clone();
        let token = book.next_token.fetch_add(1, Ordering::SeqCst);
        book.slots()
            .entry(run_id.clone())
            .or_default()
            .push(StateSlot { token, state });
        book.active.fetch_add(1, Ordering::SeqCst);
        Self {
            run_id,
            token,
            book,
            acquired_at: Instant::now(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn update(&self, state: OrchestratorState) {
        let mut slots = self.book.slots();
        if let Some(slot) = slots
            .get_mut(&self.run_id)
            .and_then(|slots| slots.iter_mut().find(|slot| slot.token == self.token))
        {
            slot.state = state;
        }
    }
}

impl Drop for RunRuntime {
    fn drop(&mut self) {
        {
            let mut slots = self.book.slots();
            if let Some(owned) = slots.get_mut(&self.run_id) {
                owned.retain(|slot| slot.token != self.token);
                if owned.is_empty() {
                    slots.remove(&self.run_id);
                }
            }
        }
        self.book.active.fetch_sub(1, Ordering::SeqCst);
        debug!(
            run_id = %self.run_id,
            token = self.token,
            held_ms = self.acquired_at.elapsed().as_millis() as u64,
            "Run runtime released"
        );
    }
}

/// Executes requests against a registry and persists run records
pub struct Scheduler {
    registry: PluginRegistry,
    executor: Executor,
    store: Arc<dyn RunStore>,
    baseline: Vec<Arc<dyn Plugin>>,
    book: Arc<RunBook>,
}

impl Scheduler {
    /// Scheduler with the default baseline plugins and limits
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self {
            registry: PluginRegistry::new(),
            executor: Executor::default(),
            store,
            baseline: baseline_plugins(),
            book: Arc::new(RunBook::default()),
        }
    }

    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.executor = Executor::new(limits);
        self
    }

    /// Replace the plugins registered on every bootstrap
    pub fn with_baseline(mut self, baseline: Vec<Arc<dyn Plugin>>) -> Self {
        self.baseline = baseline;
        self
    }

    /// Route per-plugin notifications to an observer.
    ///
    /// Replaces the registry, so call it before registering plugins.
    pub fn with_observer(mut self, observer: Arc<dyn PhaseObserver>) -> Self {
        self.registry = PluginRegistry::with_observer(observer);
        self
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    pub fn limits(&self) -> &ExecutionLimits {
        self.executor.limits()
    }

    /// Register the baseline plugins and report what was loaded.
    ///
    /// Runs in full on every call. The trace always holds a start line, one
    /// receipt per baseline plugin and a ready line.
    pub async fn bootstrap(&self) -> Vec<TraceEntry> {
        let mut trace = Vec::with_capacity(self.baseline.len() + 2);
        trace.push(TraceEntry::log(format!(
            "bootstrap: registering {} baseline plugins",
            self.baseline.len()
        )));

        for plugin in &self.baseline {
            self.registry.register(Arc::clone(plugin)).await;
            trace.push(TraceEntry::loaded(plugin.as_ref()));
        }

        let registered = self.registry.len().await;
        trace.push(TraceEntry::log(format!(
            "bootstrap: registry ready with {} plugins",
            registered
        )));

        debug!(baseline = self.baseline.len(), registered, "Registry bootstrapped");
        trace
    }

    /// Current state of an in-flight run
    pub fn state(&self, run_id: &str) -> Option<OrchestratorState> {
        self.book.latest(run_id)
    }

    /// Number of runs currently holding a runtime
    pub fn active_runs(&self) -> usize {
        self.book.active.load(Ordering::SeqCst)
    }

    /// Execute one request end to end.
    ///
    /// Never fails: every outcome is reported through the result's `ok` and
    /// `error` fields. A failed persist marks the run failed with
    /// `persist failed`, overriding any execution error, but keeps the
    /// outputs of a successful execution.
    #[instrument(
        skip(self, request),
        fields(run_id = %request.intent.run_id, tenant = %request.intent.tenant_id)
    )]
    pub async fn run(&self, request: &SchedulerRequest) -> OrchestrationResult {
        let intent = &request.intent;
        info!(
            experiment = %request.plan.experiment_id,
            phases = request.plan.sequence.len(),
            "Starting orchestration run"
        );

        let runtime = RunRuntime::acquire(
            Arc::clone(&self.book),
            OrchestratorState::started(intent.run_id.clone(), intent.phase.clone()),
        );

        self.bootstrap().await;

        let executed = self
            .executor
            .execute_and_track(&request.plan, &self.registry, request, request.input())
            .await;
        runtime.update(executed.state.clone());

        let record = RunRecord::new(intent, &request.plan, RecordStatus::from_success(executed.ok));
        let result = match self.store.upsert(record).await {
            Ok(stored) => {
                debug!(
                    record_id = %stored.record_id,
                    version = stored.version,
                    store = self.store.name(),
                    "Run record persisted"
                );
                executed
            }
            Err(e) => {
                error!(error = %e, store = self.store.name(), "Failed to persist run record");
                executed.downgrade(RunError::PersistFailed {
                    detail: e.to_string(),
                })
            }
        };

        drop(runtime);

        match &result.error {
            None => info!(plugin_count = result.plugin_count, "Run completed successfully"),
            Some(e) => warn!(error = %e, "Run failed"),
        }

        result
    }
}
