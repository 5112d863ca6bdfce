//! `GET /health` (§4.12 SUPPLEMENT, grounded on
//! `original_source/backend/thoth_core/health_check.py`): probes the
//! metadata DB pool, every configured `SqlDb` adapter, and each workspace's
//! vector store. Degrades to `"degraded"` when a non-critical dependency is
//! unreachable, `"unhealthy"` only when the metadata DB itself is down.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::database::queries::{sqldb, vectordb, workspace};
use crate::dbadapter::{ConnectionSpec, Dialect};
use crate::vectorstore::{VectorBackend, VectorDbSpec};

use super::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub metadata_database: bool,
    pub sql_databases: Vec<ComponentHealth>,
    pub vector_databases: Vec<ComponentHealth>,
}

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub healthy: bool,
}

pub async fn handle(State(state): State<AppState>) -> Response {
    let metadata_healthy = sqlx::query("SELECT 1").execute(&state.metadata_pool).await.is_ok();
    if !metadata_healthy {
        return Json(HealthResponse {
            status: "unhealthy".to_string(),
            metadata_database: false,
            sql_databases: Vec::new(),
            vector_databases: Vec::new(),
        })
        .into_response();
    }

    let sql_databases = check_sql_databases(&state).await;
    let vector_databases = check_vector_databases(&state).await;

    let any_unhealthy = sql_databases.iter().any(|c| !c.healthy) || vector_databases.iter().any(|c| !c.healthy);
    let status = if any_unhealthy { "degraded" } else { "healthy" };

    Json(HealthResponse { status: status.to_string(), metadata_database: true, sql_databases, vector_databases }).into_response()
}

async fn check_sql_databases(state: &AppState) -> Vec<ComponentHealth> {
    let rows = match sqldb::list_all(&state.metadata_pool).await {
        Ok(rows) => rows,
        Err(_) => return Vec::new(),
    };

    let mut results = Vec::with_capacity(rows.len());
    for row in rows {
        let healthy = check_one_sql_database(state, &row).await;
        results.push(ComponentHealth { name: row.name, healthy });
    }
    results
}

async fn check_one_sql_database(state: &AppState, row: &crate::database::models::SqlDb) -> bool {
    let Some(dialect) = Dialect::parse(&row.dialect) else { return false };
    let Ok(conn_spec) = ConnectionSpec::from_json(dialect, &row.connection_spec) else { return false };
    match state.db_adapters.get_or_create(row.workspace_id, row.id, &conn_spec).await {
        Ok(adapter) => adapter.health_check().await,
        Err(_) => false,
    }
}

async fn check_vector_databases(state: &AppState) -> Vec<ComponentHealth> {
    let rows = match workspace::list_with_vector_db(&state.metadata_pool).await {
        Ok(rows) => rows,
        Err(_) => return Vec::new(),
    };

    let mut results = Vec::with_capacity(rows.len());
    for ws in rows {
        let Some(vector_db_id) = ws.vector_db_id else { continue };
        let healthy = check_one_vector_database(state, vector_db_id, &ws.db_name).await;
        results.push(ComponentHealth { name: ws.name, healthy });
    }
    results
}

async fn check_one_vector_database(state: &AppState, vector_db_id: i64, collection_name: &str) -> bool {
    let Ok(vdb) = vectordb::get_by_id(&state.metadata_pool, vector_db_id).await else { return false };
    let Some(backend) = VectorBackend::parse(&vdb.backend) else { return false };
    let spec = VectorDbSpec::from_model(backend, &vdb.endpoint, vdb.api_key.clone(), collection_name.to_string());
    match state.vector_stores.get_or_create(vector_db_id, &spec).await {
        Ok(store) => store.health_check().await,
        Err(_) => false,
    }
}
