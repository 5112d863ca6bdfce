use chrono::Utc;
use sqlx::PgPool;

use crate::database::models::SqlDb;
use crate::error::AppError;

pub async fn get_by_id(pool: &PgPool, sqldb_id: i64) -> Result<SqlDb, AppError> {
    sqlx::query_as::<_, SqlDb>(
        "SELECT id, workspace_id, name, dialect, connection_spec, \
                db_elements_status, db_elements_log, \
                table_comment_status, table_comment_log, \
                column_comment_status, column_comment_log, updated_at \
         FROM sql_dbs WHERE id = $1",
    )
    .bind(sqldb_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::from)?
    .ok_or_else(|| AppError::resource_not_found("sql_db"))
}

/// Used by `/health` (§4.12 SUPPLEMENT) to probe every configured adapter,
/// not just the ones a live request has already warmed.
pub async fn list_all(pool: &PgPool) -> Result<Vec<SqlDb>, AppError> {
    sqlx::query_as::<_, SqlDb>(
        "SELECT id, workspace_id, name, dialect, connection_spec, \
                db_elements_status, db_elements_log, \
                table_comment_status, table_comment_log, \
                column_comment_status, column_comment_log, updated_at \
         FROM sql_dbs ORDER BY id",
    )
    .fetch_all(pool)
    .await
    .map_err(AppError::from)
}

pub async fn list_for_workspace(pool: &PgPool, workspace_id: i64) -> Result<Vec<SqlDb>, AppError> {
    sqlx::query_as::<_, SqlDb>(
        "SELECT id, workspace_id, name, dialect, connection_spec, \
                db_elements_status, db_elements_log, \
                table_comment_status, table_comment_log, \
                column_comment_status, column_comment_log, updated_at \
         FROM sql_dbs WHERE workspace_id = $1 ORDER BY name",
    )
    .bind(workspace_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::from)
}

/// A workspace owns exactly one SQL DB (§3 invariant); callers that only
/// have a `workspace_id` use this instead of picking an index out of
/// `list_for_workspace`.
pub async fn get_single_for_workspace(pool: &PgPool, workspace_id: i64) -> Result<SqlDb, AppError> {
    list_for_workspace(pool, workspace_id)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::resource_not_found("sql_db"))
}

/// One of `db_elements_status`, `table_comment_status`, `column_comment_status`.
/// `column` is never user input (always one of the three literals above), so
/// interpolating it into the query string carries no injection risk.
pub async fn set_status(pool: &PgPool, sqldb_id: i64, column: &str, status: &str, log: Option<&str>) -> Result<(), AppError> {
    let log_column = format!("{column}_log");
    let sql = format!("UPDATE sql_dbs SET {column} = $1, {log_column} = $2, updated_at = $3 WHERE id = $4");
    sqlx::query(&sql)
        .bind(status)
        .bind(log)
        .bind(Utc::now())
        .bind(sqldb_id)
        .execute(pool)
        .await
        .map_err(AppError::from)?;
    Ok(())
}
