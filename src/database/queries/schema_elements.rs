use sqlx::PgPool;

use crate::database::models::{Relationship, SqlColumn, SqlTable};
use crate::error::AppError;

/// Upsert-by-name (§4.10 SUPPLEMENT): returns `true` when a new row was
/// inserted, `false` when an existing one was matched and left untouched.
pub async fn upsert_table(pool: &PgPool, sql_db_id: i64, name: &str, comment: Option<&str>) -> Result<(SqlTable, bool), AppError> {
    if let Some(existing) = sqlx::query_as::<_, SqlTable>("SELECT id, sql_db_id, name, comment FROM sql_tables WHERE sql_db_id = $1 AND name = $2")
        .bind(sql_db_id)
        .bind(name)
        .fetch_optional(pool)
        .await
        .map_err(AppError::from)?
    {
        return Ok((existing, false));
    }

    let created = sqlx::query_as::<_, SqlTable>(
        "INSERT INTO sql_tables (sql_db_id, name, comment) VALUES ($1, $2, $3) RETURNING id, sql_db_id, name, comment",
    )
    .bind(sql_db_id)
    .bind(name)
    .bind(comment)
    .fetch_one(pool)
    .await
    .map_err(AppError::from)?;
    Ok((created, true))
}

pub async fn list_tables(pool: &PgPool, sql_db_id: i64) -> Result<Vec<SqlTable>, AppError> {
    sqlx::query_as::<_, SqlTable>("SELECT id, sql_db_id, name, comment FROM sql_tables WHERE sql_db_id = $1")
        .bind(sql_db_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::from)
}

pub async fn upsert_column(
    pool: &PgPool,
    sql_table_id: i64,
    name: &str,
    data_type: &str,
    comment: Option<&str>,
    is_primary_key: bool,
) -> Result<(SqlColumn, bool), AppError> {
    if let Some(existing) = sqlx::query_as::<_, SqlColumn>(
        "SELECT id, sql_table_id, name, data_type, comment, is_primary_key FROM sql_columns WHERE sql_table_id = $1 AND name = $2",
    )
    .bind(sql_table_id)
    .bind(name)
    .fetch_optional(pool)
    .await
    .map_err(AppError::from)?
    {
        return Ok((existing, false));
    }

    let created = sqlx::query_as::<_, SqlColumn>(
        "INSERT INTO sql_columns (sql_table_id, name, data_type, comment, is_primary_key) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id, sql_table_id, name, data_type, comment, is_primary_key",
    )
    .bind(sql_table_id)
    .bind(name)
    .bind(data_type)
    .bind(comment)
    .bind(is_primary_key)
    .fetch_one(pool)
    .await
    .map_err(AppError::from)?;
    Ok((created, true))
}

pub async fn find_column(pool: &PgPool, sql_table_id: i64, name: &str) -> Result<Option<SqlColumn>, AppError> {
    sqlx::query_as::<_, SqlColumn>(
        "SELECT id, sql_table_id, name, data_type, comment, is_primary_key FROM sql_columns WHERE sql_table_id = $1 AND name = $2",
    )
    .bind(sql_table_id)
    .bind(name)
    .fetch_optional(pool)
    .await
    .map_err(AppError::from)
}

pub async fn upsert_relationship(
    pool: &PgPool,
    sql_db_id: i64,
    from_column_id: i64,
    to_column_id: i64,
) -> Result<bool, AppError> {
    let existing = sqlx::query_as::<_, Relationship>(
        "SELECT id, sql_db_id, from_column_id, to_column_id FROM relationships \
         WHERE sql_db_id = $1 AND from_column_id = $2 AND to_column_id = $3",
    )
    .bind(sql_db_id)
    .bind(from_column_id)
    .bind(to_column_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::from)?;

    if existing.is_some() {
        return Ok(false);
    }

    sqlx::query("INSERT INTO relationships (sql_db_id, from_column_id, to_column_id) VALUES ($1, $2, $3)")
        .bind(sql_db_id)
        .bind(from_column_id)
        .bind(to_column_id)
        .execute(pool)
        .await
        .map_err(AppError::from)?;
    Ok(true)
}
