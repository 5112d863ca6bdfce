//! Typed document CRUD + similarity search across the supported vector-store
//! backends. The caller never sees backend-specific dimensionality or wire
//! shape; `VectorStore` is the sole seam, mirroring the teacher's
//! `RAGEngine` trait over its `rag_simple_vector`/`rag_simple_graph` engines.

pub mod chroma;
pub mod documents;
pub mod embedding;
pub mod milvus;
pub mod pgvector;
pub mod qdrant;
pub mod registry;

pub use documents::{ColumnNameDocument, Document, DocumentType, EvidenceDocument, SqlDocument};
pub use registry::VectorStoreRegistry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    Qdrant,
    Chroma,
    PgVector,
    Milvus,
}

impl VectorBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "qdrant" => Some(VectorBackend::Qdrant),
            "chroma" => Some(VectorBackend::Chroma),
            "pgvector" | "pg_vector" => Some(VectorBackend::PgVector),
            "milvus" => Some(VectorBackend::Milvus),
            _ => None,
        }
    }
}

impl std::fmt::Display for VectorBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorBackend::Qdrant => write!(f, "qdrant"),
            VectorBackend::Chroma => write!(f, "chroma"),
            VectorBackend::PgVector => write!(f, "pgvector"),
            VectorBackend::Milvus => write!(f, "milvus"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VectorDbSpec {
    pub backend: VectorBackend,
    pub host: String,
    pub port: u16,
    pub api_key: Option<String>,
    pub collection_name: String,
}

impl VectorDbSpec {
    /// Builds a spec from a `VectorDb` row's `endpoint` (`host:port`, port
    /// defaults per backend) plus the collection name that scopes its
    /// documents to one workspace's `SqlDb` (§6.3: "collections keyed by the
    /// SqlDb's name").
    pub fn from_model(backend: VectorBackend, endpoint: &str, api_key: Option<String>, collection_name: String) -> Self {
        let default_port = match backend {
            VectorBackend::Qdrant => 6334,
            VectorBackend::Chroma => 8000,
            VectorBackend::Milvus => 19530,
            VectorBackend::PgVector => 5432,
        };
        let (host, port) = match endpoint.rsplit_once(':') {
            Some((host, port)) => (host.to_string(), port.parse().unwrap_or(default_port)),
            None => (endpoint.to_string(), default_port),
        };
        Self { backend, host, port, api_key, collection_name }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PerTypeCounts {
    pub evidence: u64,
    pub column_names: u64,
    pub sql: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub total: u64,
    pub per_type_counts: PerTypeCounts,
    pub backend: VectorBackend,
    pub status: String,
}

/// Uniform similarity-search + typed-document contract (§4.3). Embeddings
/// are generated inside the facade via a configured embedding provider;
/// callers only ever pass/receive text and typed documents.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn backend(&self) -> VectorBackend;

    async fn ensure_collection_exists(&self) -> Result<(), AppError>;

    async fn add_evidence(&self, doc: EvidenceDocument) -> Result<String, AppError>;

    async fn add_column_description(&self, doc: ColumnNameDocument) -> Result<String, AppError>;

    async fn add_sql(&self, doc: SqlDocument) -> Result<String, AppError>;

    async fn bulk_add_documents(&self, docs: Vec<Document>) -> Result<Vec<String>, AppError>;

    async fn get_document(&self, id: &str) -> Result<Option<Document>, AppError>;

    async fn delete_documents(&self, ids: &[String]) -> Result<(), AppError>;

    async fn delete_collection(&self, doc_type: DocumentType) -> Result<(), AppError>;

    async fn search_similar(
        &self,
        query_text: &str,
        doc_type: DocumentType,
        top_k: usize,
        score_threshold: f32,
    ) -> Result<Vec<Document>, AppError>;

    async fn get_all_evidence_documents(&self) -> Result<Vec<EvidenceDocument>, AppError>;

    async fn get_all_sql_documents(&self) -> Result<Vec<SqlDocument>, AppError>;

    async fn get_all_column_documents(&self) -> Result<Vec<ColumnNameDocument>, AppError>;

    async fn get_collection_info(&self) -> Result<CollectionInfo, AppError>;

    async fn health_check(&self) -> bool;
}
