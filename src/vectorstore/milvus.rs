use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;

use super::documents::{ColumnNameDocument, Document, DocumentType, EvidenceDocument, SqlDocument};
use super::embedding::EmbeddingService;
use super::{CollectionInfo, PerTypeCounts, VectorBackend, VectorDbSpec, VectorStore};

/// Milvus v2 REST API (`/v1/vector/*`), the HTTP surface Milvus exposes
/// without requiring the gRPC SDK.
pub struct MilvusStore {
    http: reqwest::Client,
    base_url: String,
    collection: String,
    embedding: Arc<EmbeddingService>,
}

impl MilvusStore {
    pub fn new(http: reqwest::Client, spec: &VectorDbSpec, embedding: Arc<EmbeddingService>) -> Self {
        Self {
            http,
            base_url: format!("http://{}:{}/v1/vector", spec.host, spec.port),
            collection: spec.collection_name.clone(),
            embedding,
        }
    }

    async fn insert(&self, id: &str, doc_type: DocumentType, text: &str, fields: Value) -> Result<(), AppError> {
        let mut data = fields;
        data["id"] = json!(id);
        data["doc_type"] = json!(doc_type);
        data["vector"] = json!(self.embedding.embed(text).await);
        let body = json!({ "collectionName": self.collection, "data": [data] });
        let resp = self.http.post(format!("{}/insert", self.base_url)).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(AppError::vector_db(format!("milvus insert failed: {}", resp.status())));
        }
        Ok(())
    }

    async fn query_all(&self, doc_type: DocumentType) -> Result<Vec<Value>, AppError> {
        let body = json!({
            "collectionName": self.collection,
            "filter": format!("doc_type == \"{}\"", doc_type_str(doc_type)),
            "limit": 1000,
        });
        let resp = self.http.post(format!("{}/query", self.base_url)).json(&body).send().await?;
        let value: Value = resp.json().await?;
        Ok(value["data"].as_array().cloned().unwrap_or_default())
    }
}

fn doc_type_str(doc_type: DocumentType) -> &'static str {
    match doc_type {
        DocumentType::Evidence => "evidence",
        DocumentType::ColumnName => "column_name",
        DocumentType::Sql => "sql",
    }
}

fn parse_record(value: &Value) -> Option<Document> {
    let doc_type = match value.get("doc_type")?.as_str()? {
        "evidence" => DocumentType::Evidence,
        "column_name" => DocumentType::ColumnName,
        "sql" => DocumentType::Sql,
        _ => return None,
    };
    match doc_type {
        DocumentType::Evidence => Some(Document::Evidence(EvidenceDocument {
            id: value["id"].as_str().unwrap_or_default().to_string(),
            text: value["text"].as_str().unwrap_or_default().to_string(),
        })),
        DocumentType::ColumnName => serde_json::from_value(value.clone()).ok().map(Document::ColumnName),
        DocumentType::Sql => serde_json::from_value(value.clone()).ok().map(Document::Sql),
    }
}

#[async_trait]
impl VectorStore for MilvusStore {
    fn backend(&self) -> VectorBackend {
        VectorBackend::Milvus
    }

    async fn ensure_collection_exists(&self) -> Result<(), AppError> {
        let body = json!({
            "collectionName": self.collection,
            "dimension": self.embedding.dimensions(),
            "metricType": "COSINE",
        });
        let resp = self.http.post(format!("{}/collections/create", self.base_url)).json(&body).send().await?;
        if !resp.status().is_success() && resp.status().as_u16() != 409 {
            return Err(AppError::vector_db(format!("milvus collection creation failed: {}", resp.status())));
        }
        Ok(())
    }

    async fn add_evidence(&self, doc: EvidenceDocument) -> Result<String, AppError> {
        let id = if doc.id.is_empty() { Uuid::new_v4().to_string() } else { doc.id.clone() };
        self.insert(&id, DocumentType::Evidence, &doc.text, json!({ "text": doc.text })).await?;
        Ok(id)
    }

    async fn add_column_description(&self, doc: ColumnNameDocument) -> Result<String, AppError> {
        let id = if doc.id.is_empty() { Uuid::new_v4().to_string() } else { doc.id.clone() };
        let text = Document::ColumnName(doc.clone()).embeddable_text();
        self.insert(&id, DocumentType::ColumnName, &text, serde_json::to_value(&doc).unwrap()).await?;
        Ok(id)
    }

    async fn add_sql(&self, doc: SqlDocument) -> Result<String, AppError> {
        let id = if doc.id.is_empty() { Uuid::new_v4().to_string() } else { doc.id.clone() };
        let text = Document::Sql(doc.clone()).embeddable_text();
        self.insert(&id, DocumentType::Sql, &text, serde_json::to_value(&doc).unwrap()).await?;
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
        let body = json!({ "collectionName": self.collection, "id": id });
        let resp = self.http.post(format!("{}/get", self.base_url)).json(&body).send().await?;
        let value: Value = resp.json().await?;
        Ok(value["data"].as_array().and_then(|a| a.first()).and_then(parse_record))
    }

    async fn delete_documents(&self, ids: &[String]) -> Result<(), AppError> {
        let body = json!({ "collectionName": self.collection, "id": ids });
        self.http.post(format!("{}/delete", self.base_url)).json(&body).send().await?;
        Ok(())
    }

    async fn delete_collection(&self, doc_type: DocumentType) -> Result<(), AppError> {
        let ids: Vec<String> = self
            .query_all(doc_type)
            .await?
            .iter()
            .filter_map(|v| v["id"].as_str().map(str::to_string))
            .collect();
        if !ids.is_empty() {
            self.delete_documents(&ids).await?;
        }
        Ok(())
    }

    async fn search_similar(
        &self,
        query_text: &str,
        doc_type: DocumentType,
        top_k: usize,
        score_threshold: f32,
    ) -> Result<Vec<Document>, AppError> {
        let body = json!({
            "collectionName": self.collection,
            "vector": self.embedding.embed(query_text).await,
            "filter": format!("doc_type == \"{}\"", doc_type_str(doc_type)),
            "limit": top_k,
        });
        let resp = self.http.post(format!("{}/search", self.base_url)).json(&body).send().await?;
        let value: Value = resp.json().await?;
        let data = value["data"].as_array().cloned().unwrap_or_default();
        Ok(data
            .iter()
            .filter(|row| row["distance"].as_f64().unwrap_or(0.0) as f32 >= score_threshold)
            .filter_map(parse_record)
            .collect())
    }

    async fn get_all_evidence_documents(&self) -> Result<Vec<EvidenceDocument>, AppError> {
        Ok(self
            .query_all(DocumentType::Evidence)
            .await?
            .iter()
            .filter_map(parse_record)
            .filter_map(|d| match d {
                Document::Evidence(d) => Some(d),
                _ => None,
            })
            .collect())
    }

    async fn get_all_sql_documents(&self) -> Result<Vec<SqlDocument>, AppError> {
        Ok(self
            .query_all(DocumentType::Sql)
            .await?
            .iter()
            .filter_map(parse_record)
            .filter_map(|d| match d {
                Document::Sql(d) => Some(d),
                _ => None,
            })
            .collect())
    }

    async fn get_all_column_documents(&self) -> Result<Vec<ColumnNameDocument>, AppError> {
        Ok(self
            .query_all(DocumentType::ColumnName)
            .await?
            .iter()
            .filter_map(parse_record)
            .filter_map(|d| match d {
                Document::ColumnName(d) => Some(d),
                _ => None,
            })
            .collect())
    }

    async fn get_collection_info(&self) -> Result<CollectionInfo, AppError> {
        let evidence = self.get_all_evidence_documents().await?.len() as u64;
        let sql = self.get_all_sql_documents().await?.len() as u64;
        let column_names = self.get_all_column_documents().await?.len() as u64;
        Ok(CollectionInfo {
            name: self.collection.clone(),
            total: evidence + sql + column_names,
            per_type_counts: PerTypeCounts { evidence, column_names, sql },
            backend: VectorBackend::Milvus,
            status: "ok".to_string(),
        })
    }

    async fn health_check(&self) -> bool {
        self.http
            .get(format!("{}/collections/describe?collectionName={}", self.base_url, self.collection))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}
