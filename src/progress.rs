//! Progress tracker (§4.11): a keyed `(workspace_id, job_type) -> status`
//! structure written by the async job runner (§4.10) and polled by the
//! admin status endpoints. This implementation is in-memory only, so
//! readers must tolerate `not_found` across a process restart, per §4.11's
//! explicit allowance for non-durable backings.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressEntry {
    pub status: JobStatus,
    /// Percentage in `[0, 100]`.
    pub progress: u8,
    pub processed: u64,
    pub total: u64,
    pub error: Option<String>,
    pub message: Option<String>,
}

impl ProgressEntry {
    fn pending(total: u64) -> Self {
        Self { status: JobStatus::Pending, progress: 0, processed: 0, total, error: None, message: None }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ProgressKey {
    pub workspace_id: i64,
    pub job_type: String,
}

impl ProgressKey {
    pub fn new(workspace_id: i64, job_type: impl Into<String>) -> Self {
        Self { workspace_id, job_type: job_type.into() }
    }
}

#[derive(Default)]
pub struct ProgressTracker {
    entries: RwLock<HashMap<ProgressKey, ProgressEntry>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn init(&self, key: ProgressKey, total: u64) {
        self.entries.write().await.insert(key, ProgressEntry::pending(total));
    }

    /// Writers call this after each processed batch (chunk size 10 for the
    /// comment-generation jobs, §4.10).
    pub async fn update(&self, key: &ProgressKey, processed: u64, message: Option<String>) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(key) {
            entry.status = JobStatus::Running;
            entry.processed = processed;
            entry.progress = if entry.total == 0 { 100 } else { ((processed * 100) / entry.total).min(100) as u8 };
            entry.message = message;
        }
    }

    pub async fn complete(&self, key: &ProgressKey, message: Option<String>) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(key) {
            entry.status = JobStatus::Completed;
            entry.progress = 100;
            entry.processed = entry.total;
            entry.message = message;
        }
    }

    pub async fn fail(&self, key: &ProgressKey, error: String) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(key) {
            entry.status = JobStatus::Failed;
            entry.error = Some(error);
        }
    }

    pub async fn get(&self, key: &ProgressKey) -> Option<ProgressEntry> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn clear(&self, key: &ProgressKey) {
        self.entries.write().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn update_computes_percentage_from_processed_over_total() {
        let tracker = ProgressTracker::new();
        let key = ProgressKey::new(1, "table_comments");
        tracker.init(key.clone(), 40).await;
        tracker.update(&key, 10, Some("Processing table 10/40: orders".to_string())).await;
        let entry = tracker.get(&key).await.unwrap();
        assert_eq!(entry.progress, 25);
        assert_eq!(entry.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn unknown_key_returns_none() {
        let tracker = ProgressTracker::new();
        assert!(tracker.get(&ProgressKey::new(1, "missing")).await.is_none());
    }

    #[tokio::test]
    async fn complete_sets_progress_to_full() {
        let tracker = ProgressTracker::new();
        let key = ProgressKey::new(2, "db_elements");
        tracker.init(key.clone(), 0).await;
        tracker.complete(&key, None).await;
        let entry = tracker.get(&key).await.unwrap();
        assert_eq!(entry.progress, 100);
        assert_eq!(entry.status, JobStatus::Completed);
    }
}
