//! Append-only run store with file-based persistence.
//!
//! Every upsert appends the full record as one JSON line. Current state is
//! derived by replaying the file once at open (the last line for a record id
//! wins) and kept in an in-memory index afterwards. Lines that fail to parse
//! are skipped with a warning.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{merge_upsert, RecordQuery, RunStore, StoreError};
use crate::domain::RunRecord;

/// File-based run store using JSONL format
pub struct JsonlRunStore {
    /// Path to the records.jsonl file
    records_path: PathBuf,

    /// Latest record per id. Held across the append so writes stay ordered.
    index: Mutex<HashMap<String, RunRecord>>,
}

impl JsonlRunStore {
    /// Open (or create) a store at the given file path
    pub async fn open(records_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let records_path = records_path.into();

        if let Some(parent) = records_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let index = replay_file(&records_path).await?;
        debug!(path = %records_path.display(), records = index.len(), "JSONL run store opened");

        Ok(Self {
            records_path,
            index: Mutex::new(index),
        })
    }

    /// Open a store inside a directory, using `records.jsonl`
    pub async fn open_in(dir: &Path) -> Result<Self, StoreError> {
        Self::open(dir.join("records.jsonl")).await
    }

    pub fn records_path(&self) -> &Path {
        &self.records_path
    }

    async fn append(&self, record: &RunRecord) -> Result<(), StoreError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.records_path)
            .await?;

        let json = serde_json::to_string(record)?;
        file.write_all(format!("{}\n", json).as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    /// Re-read the log from disk into the latest record per id
    pub async fn replay(&self) -> Result<HashMap<String, RunRecord>, StoreError> {
        replay_file(&self.records_path).await
    }
}

async fn replay_file(path: &Path) -> Result<HashMap<String, RunRecord>, StoreError> {
    let mut records = HashMap::new();

    if !path.exists() {
        return Ok(records);
    }

    let file = File::open(path).await?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RunRecord>(&line) {
            Ok(record) => {
                records.insert(record.record_id.clone(), record);
            }
            Err(e) => {
                warn!(path = %path.display(), line = line_no, error = %e, "Skipping malformed run record");
            }
        }
    }

    Ok(records)
}

#[async_trait]
impl RunStore for JsonlRunStore {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn upsert(&self, record: RunRecord) -> Result<RunRecord, StoreError> {
        let mut index = self.index.lock().await;

        let stored = merge_upsert(index.get(&record.record_id), record);
        self.append(&stored).await?;
        index.insert(stored.record_id.clone(), stored.clone());

        debug!(record_id = %stored.record_id, version = stored.version, "Run record appended");
        Ok(stored)
    }

    async fn get(&self, record_id: &str) -> Result<Option<RunRecord>, StoreError> {
        Ok(self.index.lock().await.get(record_id).cloned())
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<RunRecord>, StoreError> {
        let index = self.index.lock().await;
        Ok(query.apply(index.values().cloned()))
    }
}
