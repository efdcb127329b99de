//! Caller-supplied value objects describing one experiment run.
//!
//! None of these are mutated once a run starts.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A named stage in a run's plan (e.g. `prepare`, `inject`, `observe`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Phase(String);

impl Phase {
    pub const PREPARE: &'static str = "prepare";
    pub const INJECT: &'static str = "inject";
    pub const OBSERVE: &'static str = "observe";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Phase {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Phase {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl PartialEq<str> for Phase {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Phase {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Identifies one logical run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentIntent {
    pub run_id: String,
    pub tenant_id: String,
    pub phase: Phase,
}

impl ExperimentIntent {
    pub fn new(run_id: impl Into<String>, tenant_id: impl Into<String>, phase: impl Into<Phase>) -> Self {
        Self {
            run_id: run_id.into(),
            tenant_id: tenant_id.into(),
            phase: phase.into(),
        }
    }

    /// Intent with a freshly generated run id
    pub fn generate(tenant_id: impl Into<String>, phase: impl Into<Phase>) -> Self {
        Self::new(Uuid::new_v4().to_string(), tenant_id, phase)
    }
}

/// Where the experiment runs and on whose behalf
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentContext {
    pub tenant_id: String,

    #[serde(default)]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl ExperimentContext {
    pub fn new(tenant_id: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }
}

/// Input handed to every phase of the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentPayload {
    #[serde(default)]
    pub input: Value,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl ExperimentPayload {
    pub fn new(input: Value) -> Self {
        Self {
            input,
            metadata: BTreeMap::new(),
        }
    }
}

/// Ordered phases to execute for one experiment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentPlan {
    pub experiment_id: String,

    /// Phases in execution order
    #[serde(default)]
    pub sequence: Vec<Phase>,

    /// Overrides the configured output ceiling for this plan
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_outputs: Option<usize>,
}

impl ExperimentPlan {
    pub fn new<I, P>(experiment_id: impl Into<String>, sequence: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Phase>,
    {
        Self {
            experiment_id: experiment_id.into(),
            sequence: sequence.into_iter().map(Into::into).collect(),
            max_outputs: None,
        }
    }

    pub fn with_max_outputs(mut self, max_outputs: usize) -> Self {
        self.max_outputs = Some(max_outputs);
        self
    }
}

/// Everything the scheduler needs to perform one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerRequest {
    pub intent: ExperimentIntent,
    pub context: ExperimentContext,
    pub payload: ExperimentPayload,
    pub plan: ExperimentPlan,
}

impl SchedulerRequest {
    pub fn new(
        intent: ExperimentIntent,
        context: ExperimentContext,
        payload: ExperimentPayload,
        plan: ExperimentPlan,
    ) -> Self {
        Self {
            intent,
            context,
            payload,
            plan,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.intent.run_id
    }

    pub fn input(&self) -> &Value {
        &self.payload.input
    }
}
