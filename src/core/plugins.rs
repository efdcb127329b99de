//! Built-in plugin variants and the baseline plugin set.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::registry::{Plugin, PluginContext, PluginError};
use crate::domain::Phase;

/// Kind shared by every step plugin
pub const STEP_KIND: &str = "step";

/// Tags its input with the phase it ran in.
///
/// An object input `{count: 1}` in phase `prepare` becomes
/// `{step: "prepare", count: 1}`. Any other input is wrapped as
/// `{step, input}`.
#[derive(Debug, Clone)]
pub struct StepPlugin {
    id: String,
    phase: Phase,
    priority: i32,
}

impl StepPlugin {
    pub fn new(id: impl Into<String>, phase: impl Into<Phase>, priority: i32) -> Self {
        Self {
            id: id.into(),
            phase: phase.into(),
            priority,
        }
    }
}

#[async_trait]
impl Plugin for StepPlugin {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &str {
        STEP_KIND
    }

    fn phase(&self) -> &Phase {
        &self.phase
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn transform(&self, input: &Value, context: &PluginContext) -> Result<Value, PluginError> {
        let step = Value::String(context.phase.to_string());
        let output = match input {
            Value::Object(fields) => {
                let mut fields = fields.clone();
                fields.insert("step".to_string(), step);
                fields
            }
            other => {
                let mut fields = Map::new();
                fields.insert("step".to_string(), step);
                fields.insert("input".to_string(), other.clone());
                fields
            }
        };
        Ok(Value::Object(output))
    }
}

type TransformFn = dyn Fn(&Value, &PluginContext) -> Result<Value, PluginError> + Send + Sync;

/// Plugin backed by a synchronous closure
#[derive(Clone)]
pub struct FnPlugin {
    id: String,
    kind: String,
    phase: Phase,
    priority: i32,
    transform: Arc<TransformFn>,
}

impl FnPlugin {
    pub fn new<F>(id: impl Into<String>, phase: impl Into<Phase>, priority: i32, transform: F) -> Self
    where
        F: Fn(&Value, &PluginContext) -> Result<Value, PluginError> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            kind: "fn".to_string(),
            phase: phase.into(),
            priority,
            transform: Arc::new(transform),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }
}

impl fmt::Debug for FnPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPlugin")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("phase", &self.phase)
            .field("priority", &self.priority)
            .finish()
    }
}

#[async_trait]
impl Plugin for FnPlugin {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn phase(&self) -> &Phase {
        &self.phase
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn transform(&self, input: &Value, context: &PluginContext) -> Result<Value, PluginError> {
        (self.transform)(input, context)
    }
}

/// One step plugin per standard phase: prepare (10), inject (15), observe (20)
pub fn baseline_plugins() -> Vec<Arc<dyn Plugin>> {
    vec![
        Arc::new(StepPlugin::new("baseline.prepare", Phase::PREPARE, 10)),
        Arc::new(StepPlugin::new("baseline.inject", Phase::INJECT, 15)),
        Arc::new(StepPlugin::new("baseline.observe", Phase::OBSERVE, 20)),
    ]
}
