//! Domain types for the recovery orchestrator.
//!
//! This module contains the core data structures:
//! - Experiment: caller-supplied intent, context, payload and plan
//! - Result: per-run state and the orchestration result
//! - Record: the run record persisted to a store

pub mod experiment;
pub mod record;
pub mod result;

// Re-export commonly used types
pub use experiment::{
    ExperimentContext, ExperimentIntent, ExperimentPayload, ExperimentPlan, Phase,
    SchedulerRequest,
};
pub use record::{generate_record_id, hash_plan, RecordStatus, RunRecord};
pub use result::{OrchestrationResult, OrchestratorState, RunError};
