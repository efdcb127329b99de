//! Orchestration Integration Tests
//!
//! End-to-end runs through the Orchestrator facade: phase ordering, output
//! ceiling, persist failure precedence and result caching.

use std::sync::Arc;

use async_trait::async_trait;
use recovery_orchestrator::core::{
    baseline_plugins, ExecutionLimits, FnPlugin, PhaseMetrics, PluginContext, PluginError,
    StepPlugin,
};
use recovery_orchestrator::domain::{RecordStatus, RunRecord};
use recovery_orchestrator::store::{MemoryRunStore, RecordQuery, RunStore, StoreError};
use recovery_orchestrator::{
    ExperimentContext, ExperimentIntent, ExperimentPayload, ExperimentPlan, Orchestrator, Phase,
    Plugin, RunError, Scheduler, SchedulerRequest,
};
use serde_json::{json, Value};
use tokio::sync::Notify;

/// Store whose writes always fail
struct FailingStore;

#[async_trait]
impl RunStore for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn upsert(&self, _record: RunRecord) -> Result<RunRecord, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn get(&self, _record_id: &str) -> Result<Option<RunRecord>, StoreError> {
        Ok(None)
    }

    async fn query(&self, _query: &RecordQuery) -> Result<Vec<RunRecord>, StoreError> {
        Ok(Vec::new())
    }
}

/// Inject-phase plugin that holds its run until released
struct Gate {
    phase: Phase,
    release: Arc<Notify>,
}

#[async_trait]
impl Plugin for Gate {
    fn id(&self) -> &str {
        "gate"
    }
    fn kind(&self) -> &str {
        "gate"
    }
    fn phase(&self) -> &Phase {
        &self.phase
    }
    fn priority(&self) -> i32 {
        0
    }
    async fn transform(&self, _input: &Value, _context: &PluginContext) -> Result<Value, PluginError> {
        self.release.notified().await;
        Ok(json!({"gate": "released"}))
    }
}

fn request(run_id: &str, sequence: &[&str]) -> SchedulerRequest {
    SchedulerRequest::new(
        ExperimentIntent::new(run_id, "tenant-a", "prepare"),
        ExperimentContext::new("tenant-a", "drills"),
        ExperimentPayload::new(json!({"count": 1})),
        ExperimentPlan::new("exp-1", sequence.iter().copied()),
    )
}

fn standard_request(run_id: &str) -> SchedulerRequest {
    request(run_id, &["prepare", "inject", "observe"])
}

#[tokio::test]
async fn test_three_phase_run() {
    let orchestrator = Orchestrator::in_memory();

    let result = orchestrator.run(&standard_request("run-1")).await;

    assert!(result.ok, "unexpected error: {:?}", result.error);
    assert_eq!(result.plugin_count, 3);
    assert_eq!(
        result.outputs,
        vec![
            json!({"step": "prepare", "count": 1}),
            json!({"step": "inject", "count": 1}),
            json!({"step": "observe", "count": 1}),
        ]
    );
    assert_eq!(result.state.phase, Phase::from("observe"));
    assert_eq!(result.state.run_id, "run-1");
    assert!(result.state.completed);
    assert!(!result.state.running);
    assert!(result.error.is_none());

    let cached = orchestrator.get_state("run-1").await.unwrap();
    assert_eq!(cached, result);
}

#[tokio::test]
async fn test_persist_failure_keeps_outputs() {
    let orchestrator = Orchestrator::new(Scheduler::new(Arc::new(FailingStore)));

    let result = orchestrator.run(&standard_request("run-persist")).await;

    assert!(!result.ok);
    assert_eq!(result.error_message().as_deref(), Some("persist failed"));
    assert_eq!(result.outputs.len(), 3);
    assert_eq!(result.plugin_count, 3);
    match result.error {
        Some(RunError::PersistFailed { detail }) => assert!(detail.contains("database offline")),
        other => panic!("Expected PersistFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_persist_failure_overrides_execution_error() {
    let scheduler = Scheduler::new(Arc::new(FailingStore)).with_limits(ExecutionLimits::new(1));
    let orchestrator = Orchestrator::new(scheduler);

    let result = orchestrator.run(&standard_request("run-both")).await;

    assert!(!result.ok);
    assert_eq!(result.error_message().as_deref(), Some("persist failed"));
    assert!(result.outputs.is_empty());
    assert_eq!(result.plugin_count, 0);
}

#[tokio::test]
async fn test_execution_failure_with_healthy_store() {
    let store = Arc::new(MemoryRunStore::new());
    let scheduler = Scheduler::new(store.clone()).with_limits(ExecutionLimits::new(1));
    let orchestrator = Orchestrator::new(scheduler);

    let result = orchestrator.run(&standard_request("run-limit")).await;

    assert!(!result.ok);
    assert_eq!(result.error_message().as_deref(), Some("execution limit reached"));
    assert!(result.outputs.is_empty());
    assert!(result.state.completed);
    assert!(!result.state.running);

    let records = store.query(&RecordQuery::tenant("tenant-a")).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, RecordStatus::Failed);
}

#[tokio::test]
async fn test_output_ceiling_boundary() {
    let fan_out = |count: usize| -> Vec<Arc<dyn Plugin>> {
        (0..count)
            .map(|i| {
                let phase = if i % 2 == 0 { "prepare" } else { "inject" };
                Arc::new(StepPlugin::new(format!("fan-{:03}", i), phase, i as i32)) as Arc<dyn Plugin>
            })
            .collect()
    };

    let at_limit = Orchestrator::new(
        Scheduler::new(Arc::new(MemoryRunStore::new())).with_baseline(fan_out(64)),
    );
    let result = at_limit.run(&request("run-64", &["prepare", "inject"])).await;
    assert!(result.ok, "{:?}", result.error);
    assert_eq!(result.plugin_count, 64);

    let over_limit = Orchestrator::new(
        Scheduler::new(Arc::new(MemoryRunStore::new())).with_baseline(fan_out(65)),
    );
    let result = over_limit.run(&request("run-65", &["prepare", "inject"])).await;
    assert!(!result.ok);
    assert_eq!(
        result.error,
        Some(RunError::LimitReached {
            outputs: 65,
            limit: 64
        })
    );
}

#[tokio::test]
async fn test_plan_level_ceiling_override() {
    let orchestrator = Orchestrator::in_memory();
    let mut req = standard_request("run-override");
    req.plan = req.plan.clone().with_max_outputs(2);

    let result = orchestrator.run(&req).await;

    assert!(!result.ok);
    assert_eq!(result.error_message().as_deref(), Some("execution limit reached"));
}

#[tokio::test]
async fn test_plugin_failure_surfaces_in_result() {
    let orchestrator = Orchestrator::in_memory();
    orchestrator
        .scheduler()
        .registry()
        .register(Arc::new(FnPlugin::new("chaos", "inject", 50, |_, _| {
            Err(PluginError::Transform("fault injector unreachable".to_string()))
        })))
        .await;

    let result = orchestrator.run(&standard_request("run-chaos")).await;

    assert!(!result.ok);
    assert_eq!(result.plugin_count, 0);
    match result.error {
        Some(RunError::Plugin { plugin_id, phase, .. }) => {
            assert_eq!(plugin_id, "chaos");
            assert_eq!(phase, Phase::from("inject"));
        }
        other => panic!("Expected plugin error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_bootstrap_is_repeatable() {
    let orchestrator = Orchestrator::in_memory();

    let mut lengths = Vec::new();
    for _ in 0..3 {
        lengths.push(orchestrator.bootstrap().await.len());
    }

    assert!(lengths.iter().all(|&len| len > 0));
    assert!(lengths.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn test_unknown_run_id() {
    let orchestrator = Orchestrator::in_memory();
    orchestrator.run(&standard_request("known")).await;

    assert!(orchestrator.get_state("unknown").await.is_none());
    assert!(orchestrator.get_state("known").await.is_some());
}

#[tokio::test]
async fn test_reused_run_id_keeps_latest_result() {
    let orchestrator = Orchestrator::in_memory();

    orchestrator.run(&request("same", &["prepare"])).await;
    orchestrator.run(&request("same", &["prepare", "observe"])).await;

    let cached = orchestrator.get_state("same").await.unwrap();
    assert_eq!(cached.plugin_count, 2);
    assert_eq!(orchestrator.cached_len().await, 1);
}

#[tokio::test]
async fn test_concurrent_runs_keep_their_own_state() {
    let orchestrator = Arc::new(Orchestrator::in_memory());

    let a = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run(&request("run-a", &["prepare"])).await })
    };
    let b = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            orchestrator
                .run(&request("run-b", &["prepare", "inject", "observe"]))
                .await
        })
    };

    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    assert_eq!(a.state.run_id, "run-a");
    assert_eq!(a.state.phase, Phase::from("prepare"));
    assert_eq!(b.state.run_id, "run-b");
    assert_eq!(b.state.phase, Phase::from("observe"));
    assert_eq!(orchestrator.scheduler().active_runs(), 0);
}

#[tokio::test]
async fn test_metrics_count_each_plugin_execution() {
    let metrics = Arc::new(PhaseMetrics::new());
    let scheduler =
        Scheduler::new(Arc::new(MemoryRunStore::new())).with_observer(metrics.clone());
    let orchestrator = Orchestrator::new(scheduler);

    orchestrator.run(&standard_request("run-m1")).await;
    orchestrator.run(&request("run-m2", &["observe"])).await;

    assert_eq!(metrics.count(&Phase::from("prepare")), 1);
    assert_eq!(metrics.count(&Phase::from("inject")), 1);
    assert_eq!(metrics.count(&Phase::from("observe")), 2);
    assert_eq!(metrics.total(), 4);
}

#[tokio::test]
async fn test_reused_run_id_keeps_in_flight_state() {
    let release = Arc::new(Notify::new());
    let mut baseline = baseline_plugins();
    baseline.push(Arc::new(Gate {
        phase: Phase::from("inject"),
        release: Arc::clone(&release),
    }));
    let orchestrator = Arc::new(Orchestrator::new(
        Scheduler::new(Arc::new(MemoryRunStore::new())).with_baseline(baseline),
    ));

    let slow = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run(&request("dup", &["prepare", "inject"])).await })
    };
    while orchestrator.scheduler().active_runs() == 0 {
        tokio::task::yield_now().await;
    }

    let fast = orchestrator.run(&request("dup", &["prepare"])).await;
    assert!(fast.ok, "{:?}", fast.error);

    let live = orchestrator.live_state("dup").expect("slow run still in flight");
    assert!(live.running);
    assert!(!live.completed);
    assert_eq!(orchestrator.scheduler().active_runs(), 1);

    release.notify_one();
    let slow = slow.await.unwrap();

    assert!(slow.ok, "{:?}", slow.error);
    assert_eq!(slow.plugin_count, 3);
    assert!(orchestrator.live_state("dup").is_none());
    assert_eq!(orchestrator.scheduler().active_runs(), 0);
}
