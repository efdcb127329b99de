//! Run record persistence.
//!
//! The orchestrator only needs `upsert`; `get` and `query` exist for
//! callers auditing past runs. Persistence is opaque: records can live in
//! memory or in an append-only JSONL file.

pub mod jsonl;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{RecordStatus, RunRecord};

pub use jsonl::JsonlRunStore;
pub use memory::MemoryRunStore;

/// Errors raised by run stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Filter for listing run records
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    pub tenant_id: Option<String>,
    pub experiment_id: Option<String>,
    pub status: Option<RecordStatus>,
    pub limit: Option<usize>,
}

impl RecordQuery {
    pub fn tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &RunRecord) -> bool {
        self.tenant_id
            .as_deref()
            .map_or(true, |t| record.tenant_id == t)
            && self
                .experiment_id
                .as_deref()
                .map_or(true, |e| record.experiment_id == e)
            && self.status.map_or(true, |s| record.status == s)
    }

    /// Filter, sort newest first and truncate
    pub fn apply<I>(&self, records: I) -> Vec<RunRecord>
    where
        I: IntoIterator<Item = RunRecord>,
    {
        let mut matched: Vec<RunRecord> = records.into_iter().filter(|r| self.matches(r)).collect();
        matched.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.record_id.cmp(&b.record_id))
        });
        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}

/// Storage for run records
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Human-readable store name
    fn name(&self) -> &str;

    /// Insert or replace a record, returning what was stored
    async fn upsert(&self, record: RunRecord) -> Result<RunRecord, StoreError>;

    /// Fetch a record by id
    async fn get(&self, record_id: &str) -> Result<Option<RunRecord>, StoreError>;

    /// List records matching a query
    async fn query(&self, query: &RecordQuery) -> Result<Vec<RunRecord>, StoreError>;
}

/// Merge an incoming record with the one it replaces.
///
/// The stored copy keeps its original `created_at` and bumps `version`.
pub(crate) fn merge_upsert(existing: Option<&RunRecord>, mut incoming: RunRecord) -> RunRecord {
    if let Some(existing) = existing {
        incoming.created_at = existing.created_at;
        incoming.version = existing.version + 1;
    }
    incoming
}
