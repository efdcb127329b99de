//! Execution limits.
//!
//! The output ceiling stops runaway plugin fan-out: once the accumulated
//! output count exceeds it at a phase boundary, the run is aborted.

use serde::{Deserialize, Serialize};

use crate::domain::{ExperimentPlan, RunError};

/// Default ceiling on accumulated plugin outputs per run
pub const DEFAULT_MAX_OUTPUTS: usize = 64;

/// Limits applied by the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Maximum accumulated outputs per run (default: 64)
    #[serde(default = "default_max_outputs")]
    pub max_outputs: usize,
}

fn default_max_outputs() -> usize {
    DEFAULT_MAX_OUTPUTS
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_outputs: default_max_outputs(),
        }
    }
}

impl ExecutionLimits {
    pub fn new(max_outputs: usize) -> Self {
        Self { max_outputs }
    }

    /// Limits for one plan; a plan-level ceiling wins over the configured one
    pub fn for_plan(&self, plan: &ExperimentPlan) -> Self {
        Self {
            max_outputs: plan.max_outputs.unwrap_or(self.max_outputs),
        }
    }

    /// Fails once `outputs` is strictly above the ceiling
    pub fn check_outputs(&self, outputs: usize) -> Result<(), RunError> {
        if outputs > self.max_outputs {
            return Err(RunError::LimitReached {
                outputs,
                limit: self.max_outputs,
            });
        }
        Ok(())
    }
}
