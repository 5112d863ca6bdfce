use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::ThothLog;
use crate::error::AppError;

/// Everything the orchestrator knows about a finished run, independent of
/// whether it succeeded. `sql` carries the placeholder `ERROR: <reason>`
/// form on failure, per §6.3/§7.
pub struct ThothLogEntry {
    pub workspace_id: i64,
    pub username: Option<String>,
    pub question: String,
    pub sql: String,
    pub sql_status: String,
    pub evaluation_case: Option<String>,
    pub pass_rate: Option<f64>,
    pub agent: Option<String>,
    pub duration_ms: i64,
}

/// Writes one immutable `ThothLog` row (§6.3: "ThothLog rows: immutable
/// after write"). Never called on the cancellation path — the orchestrator
/// returns before reaching this for a client-disconnected run.
pub async fn insert(pool: &PgPool, entry: ThothLogEntry) -> Result<ThothLog, AppError> {
    sqlx::query_as::<_, ThothLog>(
        r#"
        INSERT INTO thoth_logs
            (id, workspace_id, username, question, sql, sql_status, evaluation_case, pass_rate, agent, duration_ms, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING id, workspace_id, username, question, sql, sql_status, evaluation_case, pass_rate, agent, duration_ms, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(entry.workspace_id)
    .bind(entry.username)
    .bind(entry.question)
    .bind(entry.sql)
    .bind(entry.sql_status)
    .bind(entry.evaluation_case)
    .bind(entry.pass_rate)
    .bind(entry.agent)
    .bind(entry.duration_ms)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(AppError::from)
}

pub async fn latest_for_workspace(pool: &PgPool, workspace_id: i64) -> Result<Option<ThothLog>, AppError> {
    sqlx::query_as::<_, ThothLog>(
        "SELECT id, workspace_id, username, question, sql, sql_status, evaluation_case, pass_rate, agent, duration_ms, created_at \
         FROM thoth_logs WHERE workspace_id = $1 ORDER BY created_at DESC LIMIT 1",
    )
    .bind(workspace_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::from)
}
