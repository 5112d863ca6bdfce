use sqlx::PgPool;

use crate::database::models::VectorDb;
use crate::error::AppError;

pub async fn get_by_id(pool: &PgPool, vector_db_id: i64) -> Result<VectorDb, AppError> {
    sqlx::query_as::<_, VectorDb>("SELECT id, name, backend, endpoint, api_key FROM vector_dbs WHERE id = $1")
        .bind(vector_db_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::resource_not_found("vector_db"))
}
