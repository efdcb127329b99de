//! Plugin registry.
//!
//! Plugins are keyed by id in an id-ordered map. Each one is tagged with the
//! phase it belongs to and a priority; within a phase, higher priority runs
//! first and equal priorities run in ascending id order.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{ExperimentContext, ExperimentIntent, Phase};

/// Errors a plugin transform can return
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Transform(String),
}

/// A plugin error tagged with where it happened
#[derive(Debug, Clone, Error)]
#[error("plugin '{plugin_id}' failed in phase '{phase}': {source}")]
pub struct PluginFailure {
    pub plugin_id: String,
    pub phase: Phase,
    #[source]
    pub source: PluginError,
}

/// Per-invocation context handed to a plugin
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub run_id: String,
    pub tenant_id: String,
    pub namespace: String,
    pub phase: Phase,
    /// Unique per transform call
    pub invocation_id: Uuid,
    pub invoked_at: DateTime<Utc>,
}

impl PluginContext {
    fn for_invocation(phase: &Phase, context: &ExperimentContext, intent: &ExperimentIntent) -> Self {
        Self {
            run_id: intent.run_id.clone(),
            tenant_id: intent.tenant_id.clone(),
            namespace: context.namespace.clone(),
            phase: phase.clone(),
            invocation_id: Uuid::new_v4(),
            invoked_at: Utc::now(),
        }
    }
}

/// A named transform bound to one phase
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Registry key
    fn id(&self) -> &str;

    /// Free-form category (e.g. "step", "probe")
    fn kind(&self) -> &str;

    fn phase(&self) -> &Phase;

    /// Higher runs first within a phase
    fn priority(&self) -> i32;

    async fn transform(&self, input: &Value, context: &PluginContext) -> Result<Value, PluginError>;
}

/// Hook invoked once per plugin execution
pub trait PhaseObserver: Send + Sync {
    fn on_plugin_run(&self, phase: &Phase);
}

/// Observer that ignores every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PhaseObserver for NoopObserver {
    fn on_plugin_run(&self, _phase: &Phase) {}
}

/// Registry of phase-tagged plugins
pub struct PluginRegistry {
    plugins: RwLock<BTreeMap<String, Arc<dyn Plugin>>>,
    observer: Arc<dyn PhaseObserver>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::with_observer(Arc::new(NoopObserver))
    }

    pub fn with_observer(observer: Arc<dyn PhaseObserver>) -> Self {
        Self {
            plugins: RwLock::new(BTreeMap::new()),
            observer,
        }
    }

    /// Add a plugin, silently replacing any plugin with the same id.
    ///
    /// Returns the replaced plugin, if there was one.
    pub async fn register(&self, plugin: Arc<dyn Plugin>) -> Option<Arc<dyn Plugin>> {
        let id = plugin.id().to_string();
        self.plugins.write().await.insert(id, plugin)
    }

    /// Plugins for a phase, highest priority first
    pub async fn by_phase(&self, phase: &Phase) -> Vec<Arc<dyn Plugin>> {
        let plugins = self.plugins.read().await;
        let mut matched: Vec<Arc<dyn Plugin>> = plugins
            .values()
            .filter(|p| p.phase() == phase)
            .cloned()
            .collect();
        // stable: ties keep id order
        matched.sort_by(|a, b| b.priority().cmp(&a.priority()));
        matched
    }

    /// Direct lookup by registry key
    pub async fn by_kind(&self, kind: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.read().await.get(kind).cloned()
    }

    pub async fn len(&self) -> usize {
        self.plugins.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.plugins.read().await.is_empty()
    }

    /// Run every plugin of a phase in priority order.
    ///
    /// Plugins run one at a time and all receive the same `input`; their
    /// outputs are collected in execution order. The first failure stops the
    /// phase and is returned as-is.
    pub async fn run(
        &self,
        phase: &Phase,
        input: &Value,
        context: &ExperimentContext,
        intent: &ExperimentIntent,
    ) -> Result<Vec<Value>, PluginFailure> {
        let plugins = self.by_phase(phase).await;
        let mut outputs = Vec::with_capacity(plugins.len());

        for plugin in plugins {
            let plugin_context = PluginContext::for_invocation(phase, context, intent);
            self.observer.on_plugin_run(phase);

            let started = Instant::now();
            let result = plugin.transform(input, &plugin_context).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(output) => {
                    debug!(
                        plugin = plugin.id(),
                        %phase,
                        priority = plugin.priority(),
                        duration_ms,
                        "Plugin completed"
                    );
                    outputs.push(output);
                }
                Err(source) => {
                    warn!(plugin = plugin.id(), %phase, error = %source, "Plugin failed");
                    return Err(PluginFailure {
                        plugin_id: plugin.id().to_string(),
                        phase: phase.clone(),
                        source,
                    });
                }
            }
        }

        Ok(outputs)
    }
}
