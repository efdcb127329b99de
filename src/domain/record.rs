//! Persisted outcome of one orchestration run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::experiment::{ExperimentIntent, ExperimentPlan};

/// Terminal status written to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Completed,
    Failed,
}

impl RecordStatus {
    pub fn from_success(ok: bool) -> Self {
        if ok {
            Self::Completed
        } else {
            Self::Failed
        }
    }
}

/// Audit record for a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    /// Format: "{experiment_id}:{run_id}:{plan_hash}"
    pub record_id: String,
    pub experiment_id: String,
    pub run_id: String,
    pub tenant_id: String,
    pub status: RecordStatus,
    pub plan: ExperimentPlan,
    pub intent: ExperimentIntent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u32,
}

impl RunRecord {
    /// Build a version-1 record for a run that just finished
    pub fn new(intent: &ExperimentIntent, plan: &ExperimentPlan, status: RecordStatus) -> Self {
        let now = Utc::now();
        Self {
            record_id: generate_record_id(&plan.experiment_id, &intent.run_id, plan),
            experiment_id: plan.experiment_id.clone(),
            run_id: intent.run_id.clone(),
            tenant_id: intent.tenant_id.clone(),
            status,
            plan: plan.clone(),
            intent: intent.clone(),
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }
}

/// Generate a stable record id for a run of a plan
pub fn generate_record_id(experiment_id: &str, run_id: &str, plan: &ExperimentPlan) -> String {
    format!("{}:{}:{}", experiment_id, run_id, hash_plan(plan))
}

/// Hash a plan's phase sequence (first 16 hex chars of SHA256)
pub fn hash_plan(plan: &ExperimentPlan) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plan.experiment_id.as_bytes());
    for phase in &plan.sequence {
        hasher.update(b"\x1f");
        hasher.update(phase.as_str().as_bytes());
    }
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_format() {
        let plan = ExperimentPlan::new("exp-7", ["prepare", "observe"]);
        let id = generate_record_id("exp-7", "run-1", &plan);

        let parts: Vec<&str> = id.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "exp-7");
        assert_eq!(parts[1], "run-1");
        assert_eq!(parts[2].len(), 16);
    }

    #[test]
    fn test_plan_hash_depends_on_order() {
        let forward = ExperimentPlan::new("exp", ["prepare", "inject"]);
        let reversed = ExperimentPlan::new("exp", ["inject", "prepare"]);

        assert_eq!(hash_plan(&forward), hash_plan(&forward.clone()));
        assert_ne!(hash_plan(&forward), hash_plan(&reversed));
    }

    #[test]
    fn test_new_record_starts_at_version_one() {
        let intent = ExperimentIntent::new("run-1", "tenant-a", "prepare");
        let plan = ExperimentPlan::new("exp-1", ["prepare"]);
        let record = RunRecord::new(&intent, &plan, RecordStatus::from_success(false));

        assert_eq!(record.version, 1);
        assert_eq!(record.status, RecordStatus::Failed);
        assert_eq!(record.tenant_id, "tenant-a");
        assert_eq!(record.created_at, record.updated_at);
    }
}
