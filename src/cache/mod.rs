//! Session cache (§4.9): process-local, in-memory store of fully warmed
//! per-workspace resources. Keyed by an explicit session id when the caller
//! supplies one (header-propagated across a multi-turn chat), falling back
//! to the workspace id otherwise. Mirrors [`crate::dbadapter::DbAdapterRegistry`]
//! and [`crate::vectorstore::VectorStoreRegistry`]'s `RwLock<HashMap<_, Arc<_>>>`
//! shape, but the value here is a bundle of several already-warmed handles
//! rather than a single adapter.
//!
//! This is deliberately not a consistency layer: invalidation is explicit,
//! and a multi-process deployment simply eats a cache miss on whichever
//! worker didn't warm the entry (§5).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::agents::AgentPool;
use crate::config::Settings;
use crate::dbadapter::DbAdapter;
use crate::schema::lsh::LshIndex;
use crate::vectorstore::VectorStore;

/// The fully warmed bundle for one workspace: `{workspace_config, db_manager,
/// vdb_manager, agent_pool, LSH_index_handle}` per §4.9.
#[derive(Clone)]
pub struct WarmedSession {
    pub settings: Arc<Settings>,
    pub adapter: Arc<dyn DbAdapter>,
    pub vector_store: Option<Arc<dyn VectorStore>>,
    pub agents: Arc<AgentPool>,
    pub lsh_index: Arc<LshIndex>,
}

#[derive(Default)]
pub struct SessionCache {
    entries: RwLock<HashMap<String, WarmedSession>>,
}

/// The last successful SQL a workspace produced, so `/save-sql-feedback` can
/// persist `{question, sql, evidence}` into the vector store without the
/// caller having to resend the question and final SQL in the request body.
#[derive(Clone)]
pub struct LastRun {
    pub question: String,
    pub sql: String,
}

#[derive(Default)]
pub struct LastRunCache {
    entries: RwLock<HashMap<i64, LastRun>>,
}

impl LastRunCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, workspace_id: i64) -> Option<LastRun> {
        self.entries.read().await.get(&workspace_id).cloned()
    }

    pub async fn record(&self, workspace_id: i64, question: String, sql: String) {
        self.entries.write().await.insert(workspace_id, LastRun { question, sql });
    }
}

/// Falls back to the workspace id, stringified, when no explicit session
/// header was supplied — the two keyspaces share one map since a session id
/// is never numeric-only in practice and a collision would only cause an
/// unwanted cache hit, not a correctness bug (the entry is still scoped to
/// one workspace).
pub fn cache_key(session_id: Option<&str>, workspace_id: i64) -> String {
    session_id.map(str::to_string).unwrap_or_else(|| workspace_id.to_string())
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<WarmedSession> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn warm(&self, key: String, session: WarmedSession) {
        self.entries.write().await.insert(key, session);
    }

    /// Explicit invalidation: an admin changed the workspace's configuration,
    /// or a caller hit an error that demands a clean rebuild.
    pub async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_prefers_explicit_session_id() {
        assert_eq!(cache_key(Some("sess-1"), 42), "sess-1");
        assert_eq!(cache_key(None, 42), "42");
    }

    #[tokio::test]
    async fn warm_then_invalidate_round_trips() {
        let cache = SessionCache::new();
        assert!(cache.get("w1").await.is_none());
        // Nothing to construct a real WarmedSession with here; the
        // get/invalidate contract is what's under test.
        cache.invalidate("w1").await;
        assert!(cache.get("w1").await.is_none());
    }

    #[tokio::test]
    async fn last_run_cache_records_and_returns_latest() {
        let cache = LastRunCache::new();
        assert!(cache.get(7).await.is_none());
        cache.record(7, "how many users?".to_string(), "SELECT COUNT(*) FROM users".to_string()).await;
        let run = cache.get(7).await.expect("recorded run");
        assert_eq!(run.question, "how many users?");
        cache.record(7, "how many orders?".to_string(), "SELECT COUNT(*) FROM orders".to_string()).await;
        let run = cache.get(7).await.expect("recorded run");
        assert_eq!(run.sql, "SELECT COUNT(*) FROM orders");
    }
}
