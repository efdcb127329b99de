//! In-process run store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{merge_upsert, RecordQuery, RunStore, StoreError};
use crate::domain::RunRecord;

/// Run store backed by a map, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    records: RwLock<HashMap<String, RunRecord>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upsert(&self, record: RunRecord) -> Result<RunRecord, StoreError> {
        let mut records = self.records.write().await;
        let stored = merge_upsert(records.get(&record.record_id), record);
        records.insert(stored.record_id.clone(), stored.clone());
        Ok(stored)
    }

    async fn get(&self, record_id: &str) -> Result<Option<RunRecord>, StoreError> {
        Ok(self.records.read().await.get(record_id).cloned())
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<RunRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(query.apply(records.values().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExperimentIntent, ExperimentPlan, RecordStatus};

    #[tokio::test]
    async fn test_upsert_and_get() {
        let store = MemoryRunStore::new();
        let intent = ExperimentIntent::new("run-1", "tenant-a", "prepare");
        let plan = ExperimentPlan::new("exp-1", ["prepare"]);
        let record = RunRecord::new(&intent, &plan, RecordStatus::Completed);
        let record_id = record.record_id.clone();

        let stored = store.upsert(record).await.unwrap();
        assert_eq!(stored.version, 1);

        let fetched = store.get(&record_id).await.unwrap().unwrap();
        assert_eq!(fetched.run_id, "run-1");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_repeated_upsert_replaces_record() {
        let store = MemoryRunStore::new();
        let intent = ExperimentIntent::new("run-1", "tenant-a", "prepare");
        let plan = ExperimentPlan::new("exp-1", ["prepare"]);

        store
            .upsert(RunRecord::new(&intent, &plan, RecordStatus::Failed))
            .await
            .unwrap();
        let second = store
            .upsert(RunRecord::new(&intent, &plan, RecordStatus::Completed))
            .await
            .unwrap();

        assert_eq!(second.version, 2);
        assert_eq!(store.len().await, 1);
        assert!(store.get("missing").await.unwrap().is_none());
    }
}
