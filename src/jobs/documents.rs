//! Evidence/question upload jobs (§4.10): `(workspace_id)`-keyed background
//! tasks that wipe a document type's collection and reload it from a JSON
//! manifest keyed by `db_id`, matching the workspace's `db_name`.

use serde::Deserialize;
use sqlx::PgPool;

use crate::database::queries::workspace;
use crate::error::AppError;
use crate::progress::{ProgressKey, ProgressTracker};
use crate::vectorstore::{Document, DocumentType, EvidenceDocument, SqlDocument, VectorStore};

/// One manifest row keyed by the originating database, matching the
/// workspace's `db_name` so a single shared manifest can serve several
/// workspaces pointed at different databases.
#[derive(Debug, Clone, Deserialize)]
pub struct EvidenceManifestEntry {
    pub db_id: String,
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionManifestEntry {
    pub db_id: String,
    pub id: String,
    pub question: String,
    pub sql: String,
    pub evidence: Option<String>,
}

pub async fn upload_evidence(
    pool: &PgPool,
    vector_store: &dyn VectorStore,
    workspace_id: i64,
    manifest: &[EvidenceManifestEntry],
    progress: &ProgressTracker,
) -> Result<(), AppError> {
    let key = ProgressKey::new(workspace_id, "evidence_upload");
    let ws = workspace::get_by_id(pool, workspace_id).await?;
    let rows: Vec<&EvidenceManifestEntry> = manifest.iter().filter(|e| e.db_id == ws.db_name).collect();
    progress.init(key.clone(), rows.len() as u64).await;

    vector_store.delete_collection(DocumentType::Evidence).await?;

    let docs: Vec<Document> = rows
        .iter()
        .map(|e| Document::Evidence(EvidenceDocument { id: e.id.clone(), text: e.text.clone() }))
        .collect();
    let total = docs.len() as u64;
    vector_store.bulk_add_documents(docs).await?;
    progress.update(&key, total, Some(format!("{total} evidence documents uploaded"))).await;

    workspace::touch_last_evidence_load(pool, workspace_id).await?;
    progress.complete(&key, Some(format!("{total} evidence documents uploaded"))).await;
    Ok(())
}

pub async fn upload_questions(
    pool: &PgPool,
    vector_store: &dyn VectorStore,
    workspace_id: i64,
    manifest: &[QuestionManifestEntry],
    progress: &ProgressTracker,
) -> Result<(), AppError> {
    let key = ProgressKey::new(workspace_id, "question_upload");
    let ws = workspace::get_by_id(pool, workspace_id).await?;
    let rows: Vec<&QuestionManifestEntry> = manifest.iter().filter(|e| e.db_id == ws.db_name).collect();
    progress.init(key.clone(), rows.len() as u64).await;

    vector_store.delete_collection(DocumentType::Sql).await?;

    let docs: Vec<Document> = rows
        .iter()
        .map(|e| Document::Sql(SqlDocument { id: e.id.clone(), question: e.question.clone(), sql: e.sql.clone(), evidence: e.evidence.clone() }))
        .collect();
    let total = docs.len() as u64;
    vector_store.bulk_add_documents(docs).await?;
    progress.update(&key, total, Some(format!("{total} question/SQL shots uploaded"))).await;

    workspace::touch_last_sql_loaded(pool, workspace_id).await?;
    progress.complete(&key, Some(format!("{total} question/SQL shots uploaded"))).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_entries_deserialize_from_json() {
        let raw = r#"[{"db_id": "shop", "id": "e1", "text": "prices are in cents"}]"#;
        let entries: Vec<EvidenceManifestEntry> = serde_json::from_str(raw).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].db_id, "shop");
    }
}
