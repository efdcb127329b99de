//! Run state and the result handed back to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::experiment::Phase;

/// Progress of a single run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorState {
    pub run_id: String,
    pub running: bool,
    pub completed: bool,
    pub phase: Phase,
}

impl OrchestratorState {
    /// State published as soon as a run is accepted
    pub fn started(run_id: impl Into<String>, phase: Phase) -> Self {
        Self {
            run_id: run_id.into(),
            running: true,
            completed: false,
            phase,
        }
    }

    /// Terminal state, reached on success and failure alike
    pub fn finished(run_id: impl Into<String>, phase: Phase) -> Self {
        Self {
            run_id: run_id.into(),
            running: false,
            completed: true,
            phase,
        }
    }
}

/// Why a run did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RunError {
    #[error("plugin '{plugin_id}' failed in phase '{phase}': {message}")]
    Plugin {
        plugin_id: String,
        phase: Phase,
        message: String,
    },

    #[error("execution limit reached")]
    LimitReached { outputs: usize, limit: usize },

    /// The store rejected the run record. `detail` keeps the store's message.
    #[error("persist failed")]
    PersistFailed { detail: String },
}

/// Outcome of one orchestration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationResult {
    pub ok: bool,
    pub outputs: Vec<Value>,
    pub plugin_count: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub state: OrchestratorState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
}

impl OrchestrationResult {
    /// Successful execution carrying every accumulated output
    pub fn succeeded(
        outputs: Vec<Value>,
        state: OrchestratorState,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            ok: true,
            plugin_count: outputs.len(),
            outputs,
            started_at,
            finished_at,
            state,
            error: None,
        }
    }

    /// Failed execution. Outputs are always discarded.
    pub fn failed(
        error: RunError,
        state: OrchestratorState,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            ok: false,
            outputs: Vec::new(),
            plugin_count: 0,
            started_at,
            finished_at,
            state,
            error: Some(error),
        }
    }

    /// Mark the result as failed without touching outputs
    pub fn downgrade(mut self, error: RunError) -> Self {
        self.ok = false;
        self.error = Some(error);
        self
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    pub fn run_id(&self) -> &str {
        &self.state.run_id
    }
}
