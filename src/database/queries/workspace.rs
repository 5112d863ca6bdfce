use chrono::Utc;
use sqlx::PgPool;

use crate::database::models::Workspace;
use crate::error::AppError;

pub async fn get_by_id(pool: &PgPool, workspace_id: i64) -> Result<Workspace, AppError> {
    sqlx::query_as::<_, Workspace>(
        "SELECT id, name, db_name, vector_db_id, last_evidence_load, last_sql_loaded, created_at \
         FROM workspaces WHERE id = $1",
    )
    .bind(workspace_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::from)?
    .ok_or_else(|| AppError::resource_not_found("workspace"))
}

/// Used by `/health` (§4.12 SUPPLEMENT) to probe every workspace's vector
/// store, not just the ones a live request has already warmed.
pub async fn list_with_vector_db(pool: &PgPool) -> Result<Vec<Workspace>, AppError> {
    sqlx::query_as::<_, Workspace>(
        "SELECT id, name, db_name, vector_db_id, last_evidence_load, last_sql_loaded, created_at \
         FROM workspaces WHERE vector_db_id IS NOT NULL ORDER BY id",
    )
    .fetch_all(pool)
    .await
    .map_err(AppError::from)
}

/// Stamped by the evidence-upload background job (§4.10) once its manifest
/// has been fully ingested into the vector store.
pub async fn touch_last_evidence_load(pool: &PgPool, workspace_id: i64) -> Result<(), AppError> {
    sqlx::query("UPDATE workspaces SET last_evidence_load = $1 WHERE id = $2")
        .bind(Utc::now())
        .bind(workspace_id)
        .execute(pool)
        .await
        .map_err(AppError::from)?;
    Ok(())
}

/// Stamped by the question/SQL-shots upload background job (§4.10).
pub async fn touch_last_sql_loaded(pool: &PgPool, workspace_id: i64) -> Result<(), AppError> {
    sqlx::query("UPDATE workspaces SET last_sql_loaded = $1 WHERE id = $2")
        .bind(Utc::now())
        .bind(workspace_id)
        .execute(pool)
        .await
        .map_err(AppError::from)?;
    Ok(())
}
