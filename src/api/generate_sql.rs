//! `POST /generate-sql` (§6.1): warms the workspace's session resources,
//! hands the question to the orchestrator, and streams its frames back as
//! `text/plain` without ever ending the response in an HTTP error — the
//! teacher's `model_server` streams SSE events the same way, reusing a
//! channel-backed body instead of buffering the whole response.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::agents::AgentPool;
use crate::cache::WarmedSession;
use crate::dbadapter::ConnectionSpec;
use crate::database::queries::{sqldb, vectordb, workspace};
use crate::dbadapter::Dialect;
use crate::error::AppError;
use crate::escalation::FunctionalityLevel;
use crate::pipeline::frame::Frame;
use crate::pipeline::orchestrator::{self, PipelineContext};
use crate::pipeline::state::{RunStatus, SystemState};
use crate::schema::lsh;
use crate::vectorstore::{VectorBackend, VectorDbSpec};

use super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateSqlFlags {
    #[serde(default)]
    pub explain_generated_query: bool,
}

#[derive(Debug, Deserialize)]
pub struct GenerateSqlRequest {
    pub question: String,
    pub workspace_id: i64,
    #[serde(default)]
    pub functionality_level: Option<String>,
    #[serde(default)]
    pub flags: GenerateSqlFlags,
    #[serde(default)]
    pub username: Option<String>,
}

pub async fn handle(State(state): State<AppState>, Json(request): Json<GenerateSqlRequest>) -> Response {
    match warm_session(&state, request.workspace_id).await {
        Ok((sqldb_row, session)) => {
            let session_id = Uuid::new_v4();
            let token = state.cancellations.create_token(session_id).await;

            let mut system_state = SystemState::new(session_id, request.workspace_id, sqldb_row.id, request.question);
            if let Some(level) = request.functionality_level.as_deref().and_then(FunctionalityLevel::parse) {
                system_state.functionality_level = level;
            }

            let ctx = PipelineContext {
                adapter: session.adapter,
                vector_store: session.vector_store,
                lsh_index: session.lsh_index,
                agents: session.agents,
                settings: state.settings.clone(),
                cancellation: token,
                explain_generated_query: request.flags.explain_generated_query,
                metadata_pool: state.metadata_pool.clone(),
                username: request.username,
            };

            stream_response(ctx, system_state, state, session_id)
        }
        Err(err) => err.into_response(),
    }
}

async fn warm_session(state: &AppState, workspace_id: i64) -> Result<(crate::database::models::SqlDb, WarmedSession), AppError> {
    let cache_key = crate::cache::cache_key(None, workspace_id);
    if let Some(cached) = state.sessions.get(&cache_key).await {
        let sqldb_row = sqldb::get_single_for_workspace(&state.metadata_pool, workspace_id).await?;
        return Ok((sqldb_row, cached));
    }

    let ws = workspace::get_by_id(&state.metadata_pool, workspace_id).await?;
    let sqldb_row = sqldb::get_single_for_workspace(&state.metadata_pool, workspace_id).await?;

    let dialect = Dialect::parse(&sqldb_row.dialect)
        .ok_or_else(|| AppError::configuration(format!("unknown dialect '{}'", sqldb_row.dialect)))?;
    let conn_spec = ConnectionSpec::from_json(dialect, &sqldb_row.connection_spec)?;
    let adapter = state.db_adapters.get_or_create(workspace_id, sqldb_row.id, &conn_spec).await?;

    let vector_store = match ws.vector_db_id {
        Some(vector_db_id) => {
            let vdb = vectordb::get_by_id(&state.metadata_pool, vector_db_id).await?;
            let backend = VectorBackend::parse(&vdb.backend)
                .ok_or_else(|| AppError::configuration(format!("unknown vector backend '{}'", vdb.backend)))?;
            let spec = VectorDbSpec::from_model(backend, &vdb.endpoint, vdb.api_key.clone(), sqldb_row.name.clone());
            Some(state.vector_stores.get_or_create(vector_db_id, &spec).await?)
        }
        None => None,
    };

    let agents = Arc::new(AgentPool::from_settings(state.http.clone(), &state.settings)?);

    let lsh_index = Arc::new(
        lsh::LshIndex::load(&lsh::index_path(&state.settings.db_root, &sqldb_row.name))
            .unwrap_or_else(|_| lsh::LshIndex::build(Vec::<(String, String, String)>::new())),
    );

    let session = WarmedSession { settings: state.settings.clone(), adapter, vector_store, agents, lsh_index };
    state.sessions.warm(cache_key, session.clone()).await;
    Ok((sqldb_row, session))
}

fn stream_response(ctx: PipelineContext, system_state: SystemState, state: AppState, session_id: Uuid) -> Response {
    let (tx, rx) = mpsc::channel::<Frame>(32);
    let cancellations = state.cancellations.clone();
    let last_runs = state.last_runs.clone();

    tokio::spawn(async move {
        let (status, final_state) = orchestrator::run(ctx, system_state, tx).await;
        if status == RunStatus::Succeeded {
            if let Some(sql) = final_state.final_sql.clone() {
                last_runs.record(final_state.workspace_id, final_state.question.clone(), sql).await;
            }
        }
        cancellations.remove(session_id).await;
    });

    let byte_stream = ReceiverStream::new(rx).map(|frame| Ok::<_, std::convert::Infallible>(axum::body::Bytes::from(frame.encode())));
    let body = Body::from_stream(byte_stream);

    Response::builder()
        .header("content-type", "text/plain; charset=utf-8")
        .header("x-session-id", session_id.to_string())
        .body(body)
        .unwrap_or_else(|_| AppError::internal("failed to build streaming response").into_response())
}
