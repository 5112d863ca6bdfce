use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;

use super::documents::{ColumnNameDocument, Document, DocumentType, EvidenceDocument, SqlDocument};
use super::embedding::EmbeddingService;
use super::{CollectionInfo, PerTypeCounts, VectorBackend, VectorDbSpec, VectorStore};

pub struct ChromaStore {
    http: reqwest::Client,
    base_url: String,
    collection: String,
    embedding: Arc<EmbeddingService>,
}

impl ChromaStore {
    pub fn new(http: reqwest::Client, spec: &VectorDbSpec, embedding: Arc<EmbeddingService>) -> Self {
        Self {
            http,
            base_url: format!("http://{}:{}/api/v1", spec.host, spec.port),
            collection: spec.collection_name.clone(),
            embedding,
        }
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, self.collection, suffix)
    }

    async fn add(&self, id: &str, doc_type: DocumentType, text: &str, metadata: Value) -> Result<(), AppError> {
        let mut meta = metadata;
        meta["doc_type"] = json!(doc_type);
        let body = json!({
            "ids": [id],
            "embeddings": [self.embedding.embed(text).await],
            "documents": [text],
            "metadatas": [meta],
        });
        let resp = self.http.post(self.collection_url("/add")).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(AppError::vector_db(format!("chroma add failed: {}", resp.status())));
        }
        Ok(())
    }

    async fn get_by_type(&self, doc_type: DocumentType) -> Result<Vec<(String, Value)>, AppError> {
        let body = json!({ "where": { "doc_type": doc_type } });
        let resp = self.http.post(self.collection_url("/get")).json(&body).send().await?;
        let value: Value = resp.json().await?;
        let ids = value["ids"].as_array().cloned().unwrap_or_default();
        let metas = value["metadatas"].as_array().cloned().unwrap_or_default();
        Ok(ids
            .into_iter()
            .zip(metas)
            .filter_map(|(id, meta)| id.as_str().map(|s| (s.to_string(), meta)))
            .collect())
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    fn backend(&self) -> VectorBackend {
        VectorBackend::Chroma
    }

    async fn ensure_collection_exists(&self) -> Result<(), AppError> {
        let body = json!({ "name": self.collection, "get_or_create": true });
        let resp = self.http.post(format!("{}/collections", self.base_url)).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(AppError::vector_db(format!("chroma collection creation failed: {}", resp.status())));
        }
        Ok(())
    }

    async fn add_evidence(&self, doc: EvidenceDocument) -> Result<String, AppError> {
        let id = if doc.id.is_empty() { Uuid::new_v4().to_string() } else { doc.id.clone() };
        self.add(&id, DocumentType::Evidence, &doc.text, json!({ "text": doc.text })).await?;
        Ok(id)
    }

    async fn add_column_description(&self, doc: ColumnNameDocument) -> Result<String, AppError> {
        let id = if doc.id.is_empty() { Uuid::new_v4().to_string() } else { doc.id.clone() };
        let text = Document::ColumnName(doc.clone()).embeddable_text();
        self.add(&id, DocumentType::ColumnName, &text, json!({ "doc": doc })).await?;
        Ok(id)
    }

    async fn add_sql(&self, doc: SqlDocument) -> Result<String, AppError> {
        let id = if doc.id.is_empty() { Uuid::new_v4().to_string() } else { doc.id.clone() };
        let text = Document::Sql(doc.clone()).embeddable_text();
        self.add(&id, DocumentType::Sql, &text, json!({ "doc": doc })).await?;
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
        let body = json!({ "ids": [id] });
        let resp = self.http.post(self.collection_url("/get")).json(&body).send().await?;
        let value: Value = resp.json().await?;
        let ids = value["ids"].as_array().cloned().unwrap_or_default();
        if ids.is_empty() {
            return Ok(None);
        }
        let metas = value["metadatas"].as_array().cloned().unwrap_or_default();
        Ok(metas.first().and_then(parse_meta))
    }

    async fn delete_documents(&self, ids: &[String]) -> Result<(), AppError> {
        let body = json!({ "ids": ids });
        self.http.post(self.collection_url("/delete")).json(&body).send().await?;
        Ok(())
    }

    async fn delete_collection(&self, doc_type: DocumentType) -> Result<(), AppError> {
        let ids: Vec<String> = self.get_by_type(doc_type).await?.into_iter().map(|(id, _)| id).collect();
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
            "query_embeddings": [self.embedding.embed(query_text).await],
            "n_results": top_k,
            "where": { "doc_type": doc_type },
        });
        let resp = self.http.post(self.collection_url("/query")).json(&body).send().await?;
        let value: Value = resp.json().await?;
        let metas = value["metadatas"][0].as_array().cloned().unwrap_or_default();
        let distances = value["distances"][0].as_array().cloned().unwrap_or_default();
        Ok(metas
            .into_iter()
            .zip(distances)
            .filter(|(_, dist)| {
                let similarity = 1.0 - dist.as_f64().unwrap_or(1.0) as f32;
                similarity >= score_threshold
            })
            .filter_map(|(meta, _)| parse_meta(&meta))
            .collect())
    }

    async fn get_all_evidence_documents(&self) -> Result<Vec<EvidenceDocument>, AppError> {
        Ok(self
            .get_by_type(DocumentType::Evidence)
            .await?
            .into_iter()
            .filter_map(|(_, meta)| match parse_meta(&meta) {
                Some(Document::Evidence(d)) => Some(d),
                _ => None,
            })
            .collect())
    }

    async fn get_all_sql_documents(&self) -> Result<Vec<SqlDocument>, AppError> {
        Ok(self
            .get_by_type(DocumentType::Sql)
            .await?
            .into_iter()
            .filter_map(|(_, meta)| match parse_meta(&meta) {
                Some(Document::Sql(d)) => Some(d),
                _ => None,
            })
            .collect())
    }

    async fn get_all_column_documents(&self) -> Result<Vec<ColumnNameDocument>, AppError> {
        Ok(self
            .get_by_type(DocumentType::ColumnName)
            .await?
            .into_iter()
            .filter_map(|(_, meta)| match parse_meta(&meta) {
                Some(Document::ColumnName(d)) => Some(d),
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
            backend: VectorBackend::Chroma,
            status: "ok".to_string(),
        })
    }

    async fn health_check(&self) -> bool {
        self.http
            .get(format!("{}/heartbeat", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

fn parse_meta(meta: &Value) -> Option<Document> {
    let doc_type: DocumentType = serde_json::from_value(meta.get("doc_type")?.clone()).ok()?;
    match doc_type {
        DocumentType::Evidence => meta
            .get("text")
            .and_then(|t| t.as_str())
            .map(|text| Document::Evidence(EvidenceDocument { id: Uuid::new_v4().to_string(), text: text.to_string() })),
        DocumentType::ColumnName => serde_json::from_value(meta.get("doc")?.clone()).ok().map(Document::ColumnName),
        DocumentType::Sql => serde_json::from_value(meta.get("doc")?.clone()).ok().map(Document::Sql),
    }
}
