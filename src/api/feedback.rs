//! `POST /save-sql-feedback` (§6.1): persists a question/SQL pair into the
//! vector store so future similar questions retrieve it as a few-shot
//! example. Reads the last cached successful run for the workspace; callers
//! that already have the full triple (the Like-button flow in a client that
//! never streamed through this server) may post it directly instead.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::queries::{vectordb, workspace};
use crate::error::AppError;
use crate::vectorstore::{SqlDocument, VectorBackend, VectorDbSpec};

use super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SaveSqlFeedbackRequest {
    pub workspace_id: i64,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub evidence: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SaveSqlFeedbackResponse {
    pub success: bool,
    pub document_id: String,
}

pub async fn handle(State(state): State<AppState>, Json(request): Json<SaveSqlFeedbackRequest>) -> Response {
    match run(&state, request).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn run(state: &AppState, request: SaveSqlFeedbackRequest) -> Result<SaveSqlFeedbackResponse, AppError> {
    let (question, sql) = match (request.question, request.sql) {
        (Some(question), Some(sql)) => (question, sql),
        _ => {
            let cached = state
                .last_runs
                .get(request.workspace_id)
                .await
                .ok_or_else(|| AppError::resource_not_found("last run for workspace"))?;
            (cached.question, cached.sql)
        }
    };

    let ws = workspace::get_by_id(&state.metadata_pool, request.workspace_id).await?;
    let vector_db_id = ws.vector_db_id.ok_or_else(|| AppError::configuration("workspace has no vector database configured"))?;
    let vdb = vectordb::get_by_id(&state.metadata_pool, vector_db_id).await?;
    let backend = VectorBackend::parse(&vdb.backend).ok_or_else(|| AppError::configuration(format!("unknown vector backend '{}'", vdb.backend)))?;
    let spec = VectorDbSpec::from_model(backend, &vdb.endpoint, vdb.api_key.clone(), ws.db_name.clone());
    let vector_store = state.vector_stores.get_or_create(vector_db_id, &spec).await?;

    let document_id = vector_store
        .add_sql(SqlDocument { id: Uuid::new_v4().to_string(), question, sql, evidence: request.evidence })
        .await?;

    Ok(SaveSqlFeedbackResponse { success: true, document_id })
}
