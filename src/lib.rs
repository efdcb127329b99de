//! recovery-orchestrator - Plugin-phased orchestration for recovery experiments
//!
//! Runs recovery "experiment" requests through a plan of phases. Each phase
//! selects registered plugins, executes them in priority order and collects
//! their outputs; the outcome of every run is persisted as a run record.
//!
//! # Architecture
//!
//! The pipeline for one run is:
//! - Validate: the envelope adapter decodes and checks the request
//! - Bootstrap: baseline plugins are (re-)registered
//! - Execute: phases run in plan order under an output ceiling
//! - Persist: a run record is upserted into the configured store
//! - Report: an `OrchestrationResult` is returned and cached by run id
//!
//! # Modules
//!
//! - `adapters`: JSON envelope decoding and encoding
//! - `core`: Registry, Executor, Scheduler, Orchestrator
//! - `domain`: Data structures (intent, plan, result, run record)
//! - `store`: Run record persistence (memory, JSONL)
//! - `config`: Configuration file and environment resolution
//! - `telemetry`: Tracing subscriber setup
//!
//! # Usage
//!
//! ```rust,ignore
//! use recovery_orchestrator::{adapters, Orchestrator};
//!
//! let orchestrator = Orchestrator::in_memory();
//! let request = adapters::decode_envelope(&raw)?;
//! let result = orchestrator.run(&request).await;
//! if !result.ok {
//!     eprintln!("run failed: {:?}", result.error_message());
//! }
//! ```

pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod store;
pub mod telemetry;

// Re-export main types at crate root for convenience
pub use core::{Orchestrator, Plugin, PluginRegistry, Scheduler, TraceEntry};
pub use domain::{
    ExperimentContext, ExperimentIntent, ExperimentPayload, ExperimentPlan, OrchestrationResult,
    OrchestratorState, Phase, RunError, RunRecord, SchedulerRequest,
};
pub use store::{JsonlRunStore, MemoryRunStore, RecordQuery, RunStore, StoreError};
