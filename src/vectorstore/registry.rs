use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::AppError;

use super::embedding::EmbeddingService;
use super::{
    chroma::ChromaStore, milvus::MilvusStore, pgvector::PgVectorStore, qdrant::QdrantStore,
    VectorBackend, VectorDbSpec, VectorStore,
};

/// One warmed handle per VectorDb id, mirroring
/// [`crate::dbadapter::DbAdapterRegistry`]. Every backend it creates shares
/// one [`EmbeddingService`] so all of a workspace's collections embed
/// through the same provider (or fall back together).
pub struct VectorStoreRegistry {
    stores: RwLock<HashMap<i64, Arc<dyn VectorStore>>>,
    http: reqwest::Client,
    embedding: Arc<EmbeddingService>,
}

impl VectorStoreRegistry {
    pub fn new(http: reqwest::Client) -> Self {
        let embedding = Arc::new(EmbeddingService::from_env(http.clone()));
        Self { stores: RwLock::new(HashMap::new()), http, embedding }
    }

    pub async fn get_or_create(
        &self,
        vector_db_id: i64,
        spec: &VectorDbSpec,
    ) -> Result<Arc<dyn VectorStore>, AppError> {
        if let Some(store) = self.stores.read().await.get(&vector_db_id) {
            return Ok(store.clone());
        }

        let store = self.create(spec).await?;
        store.ensure_collection_exists().await?;
        self.stores.write().await.insert(vector_db_id, store.clone());
        Ok(store)
    }

    pub async fn invalidate(&self, vector_db_id: i64) {
        self.stores.write().await.remove(&vector_db_id);
    }

    async fn create(&self, spec: &VectorDbSpec) -> Result<Arc<dyn VectorStore>, AppError> {
        let embedding = self.embedding.clone();
        Ok(match spec.backend {
            VectorBackend::Qdrant => Arc::new(QdrantStore::new(self.http.clone(), spec, embedding)) as Arc<dyn VectorStore>,
            VectorBackend::Chroma => Arc::new(ChromaStore::new(self.http.clone(), spec, embedding)) as Arc<dyn VectorStore>,
            VectorBackend::Milvus => Arc::new(MilvusStore::new(self.http.clone(), spec, embedding)) as Arc<dyn VectorStore>,
            VectorBackend::PgVector => Arc::new(PgVectorStore::new(spec, embedding).await?) as Arc<dyn VectorStore>,
        })
    }
}
