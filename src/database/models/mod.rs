//! Metadata entities (§3): workspaces, the SQL databases attached to them,
//! their introspected schema elements, and the immutable `ThothLog` audit
//! trail of pipeline runs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Workspace {
    pub id: i64,
    pub name: String,
    pub db_name: String,
    pub vector_db_id: Option<i64>,
    pub last_evidence_load: Option<DateTime<Utc>>,
    pub last_sql_loaded: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SqlDb {
    pub id: i64,
    pub workspace_id: i64,
    pub name: String,
    pub dialect: String,
    pub connection_spec: serde_json::Value,
    pub db_elements_status: String,
    pub db_elements_log: Option<String>,
    pub table_comment_status: String,
    pub table_comment_log: Option<String>,
    pub column_comment_status: String,
    pub column_comment_log: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SqlTable {
    pub id: i64,
    pub sql_db_id: i64,
    pub name: String,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SqlColumn {
    pub id: i64,
    pub sql_table_id: i64,
    pub name: String,
    pub data_type: String,
    pub comment: Option<String>,
    pub is_primary_key: bool,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Relationship {
    pub id: i64,
    pub sql_db_id: i64,
    pub from_column_id: i64,
    pub to_column_id: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VectorDb {
    pub id: i64,
    pub name: String,
    pub backend: String,
    pub endpoint: String,
    pub api_key: Option<String>,
}

/// Immutable per-run audit record (§3/§6.3). Written once at the end of
/// every pipeline run except a client-cancelled one.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ThothLog {
    pub id: Uuid,
    pub workspace_id: i64,
    pub username: Option<String>,
    pub question: String,
    pub sql: String,
    pub sql_status: String,
    pub evaluation_case: Option<String>,
    pub pass_rate: Option<f64>,
    pub agent: Option<String>,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}
