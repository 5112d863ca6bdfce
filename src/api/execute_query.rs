//! `POST /execute-query` (§6.1): runs a previously generated (or hand-edited)
//! SQL string against the workspace's target database with server-side
//! pagination, sorting, and filtering.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::database::queries::sqldb;
use crate::dbadapter::{ConnectionSpec, Dialect, FilterModel, SortModel};
use crate::error::AppError;

use super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExecuteQueryRequest {
    pub workspace_id: i64,
    pub sql: String,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub sort_model: Option<SortModel>,
    #[serde(default)]
    pub filter_model: Option<FilterModel>,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    50
}

#[derive(Debug, Serialize)]
pub struct ExecuteQueryResponse {
    pub data: Vec<serde_json::Value>,
    pub total_rows: u64,
    pub page: u32,
    pub page_size: u32,
    pub has_next: bool,
    pub has_previous: bool,
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn handle(State(state): State<AppState>, Json(request): Json<ExecuteQueryRequest>) -> Response {
    match run(&state, request).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn run(state: &AppState, request: ExecuteQueryRequest) -> Result<ExecuteQueryResponse, AppError> {
    let sqldb_row = sqldb::get_single_for_workspace(&state.metadata_pool, request.workspace_id).await?;
    let dialect = Dialect::parse(&sqldb_row.dialect)
        .ok_or_else(|| AppError::configuration(format!("unknown dialect '{}'", sqldb_row.dialect)))?;
    let conn_spec = ConnectionSpec::from_json(dialect, &sqldb_row.connection_spec)?;
    let adapter = state.db_adapters.get_or_create(request.workspace_id, sqldb_row.id, &conn_spec).await?;

    let result = adapter
        .execute_paginated(&request.sql, request.page, request.page_size, request.sort_model, request.filter_model)
        .await?;

    let has_previous = request.page > 1;
    let has_next = (request.page as u64) * (request.page_size as u64) < result.total_rows;

    Ok(ExecuteQueryResponse {
        data: result.rows,
        total_rows: result.total_rows,
        page: request.page,
        page_size: request.page_size,
        has_next,
        has_previous,
        columns: result.columns,
        error: result.error,
    })
}
