//! Phase-by-phase plugin execution.
//!
//! Every phase of the plan runs against the request's original input; the
//! outputs of all phases are accumulated into one buffer, which is checked
//! against the output ceiling after each phase.

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::limits::ExecutionLimits;
use super::registry::{PluginFailure, PluginRegistry};
use crate::domain::{
    ExperimentPlan, OrchestrationResult, OrchestratorState, Phase, RunError, SchedulerRequest,
};

impl From<PluginFailure> for RunError {
    fn from(failure: PluginFailure) -> Self {
        RunError::Plugin {
            plugin_id: failure.plugin_id,
            phase: failure.phase,
            message: failure.source.to_string(),
        }
    }
}

/// Runs plugin phases in plan order
#[derive(Debug, Clone, Default)]
pub struct Executor {
    limits: ExecutionLimits,
}

impl Executor {
    pub fn new(limits: ExecutionLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// Execute each phase in order, accumulating outputs.
    ///
    /// Stops at the first plugin failure, or as soon as the accumulated
    /// output count exceeds the ceiling at a phase boundary; later phases
    /// never run in either case.
    #[instrument(skip_all, fields(run_id = %request.intent.run_id, phases = phases.len()))]
    pub async fn execute_sequence(
        &self,
        phases: &[Phase],
        registry: &PluginRegistry,
        request: &SchedulerRequest,
        input: &Value,
    ) -> Result<Vec<Value>, RunError> {
        let limits = self.limits.for_plan(&request.plan);
        let mut outputs = Vec::new();

        for phase in phases {
            let phase_outputs = registry
                .run(phase, input, &request.context, &request.intent)
                .await?;
            debug!(%phase, produced = phase_outputs.len(), "Phase completed");
            outputs.extend(phase_outputs);

            if let Err(violation) = limits.check_outputs(outputs.len()) {
                warn!(
                    %phase,
                    outputs = outputs.len(),
                    limit = limits.max_outputs,
                    "Output ceiling exceeded, aborting run"
                );
                return Err(violation);
            }
        }

        Ok(outputs)
    }

    /// Execute a plan and shape the outcome as an `OrchestrationResult`
    pub async fn execute_and_track(
        &self,
        plan: &ExperimentPlan,
        registry: &PluginRegistry,
        request: &SchedulerRequest,
        input: &Value,
    ) -> OrchestrationResult {
        let started_at = Utc::now();
        let result = self
            .execute_sequence(&plan.sequence, registry, request, input)
            .await;
        let finished_at = Utc::now();

        let run_id = request.intent.run_id.clone();
        match result {
            Ok(outputs) => {
                let phase = plan
                    .sequence
                    .last()
                    .cloned()
                    .unwrap_or_else(|| request.intent.phase.clone());
                OrchestrationResult::succeeded(
                    outputs,
                    OrchestratorState::finished(run_id, phase),
                    started_at,
                    finished_at,
                )
            }
            Err(error) => OrchestrationResult::failed(
                error,
                OrchestratorState::finished(run_id, request.intent.phase.clone()),
                started_at,
                finished_at,
            ),
        }
    }
}
