//! Shared application state (§6): one instance built at startup and handed
//! to every handler via `axum::extract::State`, mirroring the teacher's
//! `Arc<ModelServerState>` pattern in its own server module.

use std::sync::Arc;

use sqlx::PgPool;

use crate::agents::AgentPool;
use crate::cache::{LastRunCache, SessionCache};
use crate::config::Settings;
use crate::dbadapter::DbAdapterRegistry;
use crate::pipeline::CancellationTracker;
use crate::progress::ProgressTracker;
use crate::vectorstore::VectorStoreRegistry;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub metadata_pool: PgPool,
    pub http: reqwest::Client,
    pub db_adapters: Arc<DbAdapterRegistry>,
    pub vector_stores: Arc<VectorStoreRegistry>,
    pub sessions: Arc<SessionCache>,
    pub last_runs: Arc<LastRunCache>,
    pub cancellations: Arc<CancellationTracker>,
    pub progress: Arc<ProgressTracker>,
    pub agents: Arc<AgentPool>,
}

impl AppState {
    pub fn new(settings: Settings, metadata_pool: PgPool, agents: AgentPool) -> Self {
        let http = reqwest::Client::new();
        Self {
            settings: Arc::new(settings),
            metadata_pool,
            db_adapters: Arc::new(DbAdapterRegistry::new()),
            vector_stores: Arc::new(VectorStoreRegistry::new(http.clone())),
            sessions: Arc::new(SessionCache::new()),
            last_runs: Arc::new(LastRunCache::new()),
            cancellations: Arc::new(CancellationTracker::new()),
            progress: Arc::new(ProgressTracker::new()),
            agents: Arc::new(agents),
            http,
        }
    }
}
