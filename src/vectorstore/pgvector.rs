use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::AppError;

use super::documents::{ColumnNameDocument, Document, DocumentType, EvidenceDocument, SqlDocument};
use super::embedding::EmbeddingService;
use super::{CollectionInfo, PerTypeCounts, VectorBackend, VectorDbSpec, VectorStore};

pub struct PgVectorStore {
    pool: PgPool,
    table: String,
    embedding: Arc<EmbeddingService>,
}

impl PgVectorStore {
    pub async fn new(spec: &VectorDbSpec, embedding: Arc<EmbeddingService>) -> Result<Self, AppError> {
        let user = "postgres";
        let url = format!("postgres://{user}@{}:{}/{}", spec.host, spec.port, spec.collection_name);
        let pool = PgPool::connect(&url)
            .await
            .map_err(|e| AppError::vector_db(format!("failed to connect to pgvector store: {e}")))?;
        Ok(Self { pool, table: format!("{}_documents", spec.collection_name), embedding })
    }

    fn doc_type_str(doc_type: DocumentType) -> &'static str {
        match doc_type {
            DocumentType::Evidence => "evidence",
            DocumentType::ColumnName => "column_name",
            DocumentType::Sql => "sql",
        }
    }

    async fn insert(&self, id: &str, doc_type: DocumentType, text: &str, payload: serde_json::Value) -> Result<(), AppError> {
        let vector = self.embedding.embed(text).await;
        let vector_literal = format!("[{}]", vector.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(","));
        sqlx::query(&format!(
            "INSERT INTO {} (id, doc_type, payload, embedding) VALUES ($1, $2, $3, $4::vector) \
             ON CONFLICT (id) DO UPDATE SET payload = $3, embedding = $4::vector",
            self.table
        ))
        .bind(id)
        .bind(Self::doc_type_str(doc_type))
        .bind(payload)
        .bind(vector_literal)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn rows_of_type(&self, doc_type: DocumentType) -> Result<Vec<serde_json::Value>, AppError> {
        let rows = sqlx::query(&format!("SELECT payload FROM {} WHERE doc_type = $1", self.table))
            .bind(Self::doc_type_str(doc_type))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.get("payload")).collect())
    }
}

fn parse_payload(doc_type: DocumentType, payload: serde_json::Value) -> Option<Document> {
    match doc_type {
        DocumentType::Evidence => serde_json::from_value(payload).ok().map(Document::Evidence),
        DocumentType::ColumnName => serde_json::from_value(payload).ok().map(Document::ColumnName),
        DocumentType::Sql => serde_json::from_value(payload).ok().map(Document::Sql),
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    fn backend(&self) -> VectorBackend {
        VectorBackend::PgVector
    }

    async fn ensure_collection_exists(&self) -> Result<(), AppError> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector").execute(&self.pool).await.ok();
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, doc_type TEXT NOT NULL, \
             payload JSONB NOT NULL, embedding vector({}))",
            self.table,
            self.embedding.dimensions()
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_evidence(&self, doc: EvidenceDocument) -> Result<String, AppError> {
        let id = if doc.id.is_empty() { Uuid::new_v4().to_string() } else { doc.id.clone() };
        let payload = serde_json::to_value(&doc).unwrap();
        self.insert(&id, DocumentType::Evidence, &doc.text, payload).await?;
        Ok(id)
    }

    async fn add_column_description(&self, doc: ColumnNameDocument) -> Result<String, AppError> {
        let id = if doc.id.is_empty() { Uuid::new_v4().to_string() } else { doc.id.clone() };
        let text = Document::ColumnName(doc.clone()).embeddable_text();
        let payload = serde_json::to_value(&doc).unwrap();
        self.insert(&id, DocumentType::ColumnName, &text, payload).await?;
        Ok(id)
    }

    async fn add_sql(&self, doc: SqlDocument) -> Result<String, AppError> {
        let id = if doc.id.is_empty() { Uuid::new_v4().to_string() } else { doc.id.clone() };
        let text = Document::Sql(doc.clone()).embeddable_text();
        let payload = serde_json::to_value(&doc).unwrap();
        self.insert(&id, DocumentType::Sql, &text, payload).await?;
        Ok(id)
    }

    async fn bulk_add_documents(&self, docs: Vec<Document>) -> Result<Vec<String>, AppError> {
        let mut ids = Vec::with_capacity(docs.len());
        for doc in docs {
            let id = match doc {
                Document::Evidence(d) => self.add_evidence(d).await?,
                Document::ColumnName(d) => self.add_column_description(d).await?,
                Document::Sql(d) => self.add_sql(d).await?,
            };
            ids.push(id);
        }
        Ok(ids)
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>, AppError> {
        let row = sqlx::query(&format!("SELECT doc_type, payload FROM {} WHERE id = $1", self.table))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|r| {
            let doc_type = match r.get::<String, _>("doc_type").as_str() {
                "evidence" => DocumentType::Evidence,
                "column_name" => DocumentType::ColumnName,
                _ => DocumentType::Sql,
            };
            parse_payload(doc_type, r.get("payload"))
        }))
    }

    async fn delete_documents(&self, ids: &[String]) -> Result<(), AppError> {
        sqlx::query(&format!("DELETE FROM {} WHERE id = ANY($1)", self.table))
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_collection(&self, doc_type: DocumentType) -> Result<(), AppError> {
        sqlx::query(&format!("DELETE FROM {} WHERE doc_type = $1", self.table))
            .bind(Self::doc_type_str(doc_type))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn search_similar(
        &self,
        query_text: &str,
        doc_type: DocumentType,
        top_k: usize,
        score_threshold: f32,
    ) -> Result<Vec<Document>, AppError> {
        let vector = self.embedding.embed(query_text).await;
        let vector_literal = format!("[{}]", vector.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(","));
        let rows = sqlx::query(&format!(
            "SELECT payload, 1 - (embedding <=> $1::vector) AS score FROM {} \
             WHERE doc_type = $2 ORDER BY embedding <=> $1::vector LIMIT $3",
            self.table
        ))
        .bind(&vector_literal)
        .bind(Self::doc_type_str(doc_type))
        .bind(top_k as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter(|r| r.get::<f64, _>("score") as f32 >= score_threshold)
            .filter_map(|r| parse_payload(doc_type, r.get("payload")))
            .collect())
    }

    async fn get_all_evidence_documents(&self) -> Result<Vec<EvidenceDocument>, AppError> {
        Ok(self
            .rows_of_type(DocumentType::Evidence)
            .await?
            .into_iter()
            .filter_map(|p| serde_json::from_value(p).ok())
            .collect())
    }

    async fn get_all_sql_documents(&self) -> Result<Vec<SqlDocument>, AppError> {
        Ok(self
            .rows_of_type(DocumentType::Sql)
            .await?
            .into_iter()
            .filter_map(|p| serde_json::from_value(p).ok())
            .collect())
    }

    async fn get_all_column_documents(&self) -> Result<Vec<ColumnNameDocument>, AppError> {
        Ok(self
            .rows_of_type(DocumentType::ColumnName)
            .await?
            .into_iter()
            .filter_map(|p| serde_json::from_value(p).ok())
            .collect())
    }

    async fn get_collection_info(&self) -> Result<CollectionInfo, AppError> {
        let evidence = self.get_all_evidence_documents().await?.len() as u64;
        let sql = self.get_all_sql_documents().await?.len() as u64;
        let column_names = self.get_all_column_documents().await?.len() as u64;
        Ok(CollectionInfo {
            name: self.table.clone(),
            total: evidence + sql + column_names,
            per_type_counts: PerTypeCounts { evidence, column_names, sql },
            backend: VectorBackend::PgVector,
            status: "ok".to_string(),
        })
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}
