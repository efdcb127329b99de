//! Core orchestration logic.
//!
//! This module contains:
//! - Registry: phase-tagged plugins and their execution order
//! - Plugins: built-in plugin variants and the baseline set
//! - Limits: the output ceiling
//! - Executor: phase loop over a registry
//! - Scheduler: bootstrap, execute, persist
//! - Orchestrator: public facade with a result cache
//! - Metrics: per-phase execution counters

pub mod executor;
pub mod limits;
pub mod metrics;
pub mod orchestrator;
pub mod plugins;
pub mod registry;
pub mod scheduler;

// Re-export commonly used types
pub use executor::Executor;
pub use limits::{ExecutionLimits, DEFAULT_MAX_OUTPUTS};
pub use metrics::PhaseMetrics;
pub use orchestrator::{Orchestrator, DEFAULT_RESULT_CAPACITY};
pub use plugins::{baseline_plugins, FnPlugin, StepPlugin, STEP_KIND};
pub use registry::{
    NoopObserver, PhaseObserver, Plugin, PluginContext, PluginError, PluginFailure, PluginRegistry,
};
pub use scheduler::{RunRuntime, Scheduler, TraceEntry};
