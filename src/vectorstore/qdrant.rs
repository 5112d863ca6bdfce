use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;

use super::documents::{ColumnNameDocument, Document, DocumentType, EvidenceDocument, SqlDocument};
use super::embedding::EmbeddingService;
use super::{CollectionInfo, PerTypeCounts, VectorBackend, VectorDbSpec, VectorStore};

pub struct QdrantStore {
    http: reqwest::Client,
    base_url: String,
    collection: String,
    embedding: Arc<EmbeddingService>,
}

impl QdrantStore {
    pub fn new(http: reqwest::Client, spec: &VectorDbSpec, embedding: Arc<EmbeddingService>) -> Self {
        let scheme = if spec.port == 443 { "https" } else { "http" };
        Self {
            http,
            base_url: format!("{scheme}://{}:{}", spec.host, spec.port),
            collection: spec.collection_name.clone(),
            embedding,
        }
    }

    fn points_url(&self) -> String {
        format!("{}/collections/{}/points", self.base_url, self.collection)
    }

    async fn upsert(&self, id: &str, doc_type: DocumentType, payload: Value) -> Result<(), AppError> {
        let vector = self.embedding.embed(payload["text_for_embedding"].as_str().unwrap_or("")).await;
        let body = json!({
            "points": [{
                "id": id,
                "vector": vector,
                "payload": { "doc_type": doc_type, "data": payload },
            }]
        });
        let resp = self
            .http
            .put(format!("{}?wait=true", self.points_url()))
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AppError::vector_db(format!("qdrant upsert failed: {}", resp.status())));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn backend(&self) -> VectorBackend {
        VectorBackend::Qdrant
    }

    async fn ensure_collection_exists(&self) -> Result<(), AppError> {
        let url = format!("{}/collections/{}", self.base_url, self.collection);
        let exists = self.http.get(&url).send().await?.status().is_success();
        if exists {
            return Ok(());
        }
        let body = json!({ "vectors": { "size": self.embedding.dimensions(), "distance": "Cosine" } });
        let resp = self.http.put(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(AppError::vector_db(format!(
                "qdrant collection creation failed: {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn add_evidence(&self, doc: EvidenceDocument) -> Result<String, AppError> {
        let id = if doc.id.is_empty() { Uuid::new_v4().to_string() } else { doc.id.clone() };
        self.upsert(&id, DocumentType::Evidence, json!({ "text_for_embedding": doc.text, "text": doc.text })).await?;
        Ok(id)
    }

    async fn add_column_description(&self, doc: ColumnNameDocument) -> Result<String, AppError> {
        let id = if doc.id.is_empty() { Uuid::new_v4().to_string() } else { doc.id.clone() };
        let text = Document::ColumnName(doc.clone()).embeddable_text();
        self.upsert(&id, DocumentType::ColumnName, json!({ "text_for_embedding": text, "doc": doc })).await?;
        Ok(id)
    }

    async fn add_sql(&self, doc: SqlDocument) -> Result<String, AppError> {
        let id = if doc.id.is_empty() { Uuid::new_v4().to_string() } else { doc.id.clone() };
        let text = Document::Sql(doc.clone()).embeddable_text();
        self.upsert(&id, DocumentType::Sql, json!({ "text_for_embedding": text, "doc": doc })).await?;
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
        let url = format!("{}/{}", self.points_url(), id);
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Ok(None);
        }
        let value: Value = resp.json().await?;
        Ok(parse_point(&value["result"]))
    }

    async fn delete_documents(&self, ids: &[String]) -> Result<(), AppError> {
        let body = json!({ "points": ids });
        self.http
            .post(format!("{}/delete?wait=true", self.points_url()))
            .json(&body)
            .send()
            .await?;
        Ok(())
    }

    async fn delete_collection(&self, doc_type: DocumentType) -> Result<(), AppError> {
        let body = json!({
            "filter": { "must": [{ "key": "doc_type", "match": { "value": doc_type } }] }
        });
        self.http
            .post(format!("{}/delete?wait=true", self.points_url()))
            .json(&body)
            .send()
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
        let body = json!({
            "vector": vector,
            "limit": top_k,
            "score_threshold": score_threshold,
            "filter": { "must": [{ "key": "doc_type", "match": { "value": doc_type } }] },
            "with_payload": true,
        });
        let resp = self
            .http
            .post(format!("{}/search", self.points_url()))
            .json(&body)
            .send()
            .await?;
        let value: Value = resp.json().await?;
        let results = value["result"].as_array().cloned().unwrap_or_default();
        Ok(results.iter().filter_map(parse_point).collect())
    }

    async fn get_all_evidence_documents(&self) -> Result<Vec<EvidenceDocument>, AppError> {
        Ok(scroll_all(self, DocumentType::Evidence)
            .await?
            .into_iter()
            .filter_map(|d| match d {
                Document::Evidence(d) => Some(d),
                _ => None,
            })
            .collect())
    }

    async fn get_all_sql_documents(&self) -> Result<Vec<SqlDocument>, AppError> {
        Ok(scroll_all(self, DocumentType::Sql)
            .await?
            .into_iter()
            .filter_map(|d| match d {
                Document::Sql(d) => Some(d),
                _ => None,
            })
            .collect())
    }

    async fn get_all_column_documents(&self) -> Result<Vec<ColumnNameDocument>, AppError> {
        Ok(scroll_all(self, DocumentType::ColumnName)
            .await?
            .into_iter()
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
            backend: VectorBackend::Qdrant,
            status: "ok".to_string(),
        })
    }

    async fn health_check(&self) -> bool {
        self.http
            .get(format!("{}/collections/{}", self.base_url, self.collection))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

fn parse_point(value: &Value) -> Option<Document> {
    let payload = value.get("payload")?;
    let doc_type: DocumentType = serde_json::from_value(payload.get("doc_type")?.clone()).ok()?;
    let data = payload.get("data")?;
    match doc_type {
        DocumentType::Evidence => serde_json::from_value(data.get("text")?.clone())
            .ok()
            .map(|text: String| Document::Evidence(EvidenceDocument { id: value["id"].as_str().unwrap_or_default().to_string(), text })),
        DocumentType::ColumnName => serde_json::from_value(data.get("doc")?.clone()).ok().map(Document::ColumnName),
        DocumentType::Sql => serde_json::from_value(data.get("doc")?.clone()).ok().map(Document::Sql),
    }
}

async fn scroll_all(store: &QdrantStore, doc_type: DocumentType) -> Result<Vec<Document>, AppError> {
    let body = json!({
        "filter": { "must": [{ "key": "doc_type", "match": { "value": doc_type } }] },
        "limit": 1000,
        "with_payload": true,
    });
    let resp = store
        .http
        .post(format!("{}/scroll", store.points_url()))
        .json(&body)
        .send()
        .await?;
    let value: Value = resp.json().await?;
    let points = value["result"]["points"].as_array().cloned().unwrap_or_default();
    Ok(points.iter().filter_map(parse_point).collect())
}
