//! Pluggable managers for the closed dialect set `PostgreSQL|MySQL|MariaDB|
//! SQLite|SQLServer|Oracle`. One [`DbAdapter`] instance is created per
//! `(workspace, SqlDb)` pair by [`registry::DbAdapterRegistry`] and shared
//! read-only across a request's parallel SQL-generation workers.

pub mod mariadb;
pub mod mysql;
pub mod oracle;
pub mod postgres;
pub mod registry;
pub mod sqlite;
pub mod sqlserver;

pub use registry::DbAdapterRegistry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Dialect {
    PostgreSql,
    MySql,
    MariaDb,
    Sqlite,
    SqlServer,
    Oracle,
}

impl Dialect {
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::PostgreSql => "PostgreSQL",
            Dialect::MySql => "MySQL",
            Dialect::MariaDb => "MariaDB",
            Dialect::Sqlite => "SQLite",
            Dialect::SqlServer => "SQLServer",
            Dialect::Oracle => "Oracle",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Some(Dialect::PostgreSql),
            "mysql" => Some(Dialect::MySql),
            "mariadb" => Some(Dialect::MariaDb),
            "sqlite" => Some(Dialect::Sqlite),
            "sqlserver" | "mssql" => Some(Dialect::SqlServer),
            "oracle" => Some(Dialect::Oracle),
            _ => None,
        }
    }
}

/// Connection coordinates as supplied by a `SqlDb` row. SQLite only uses
/// `file_path`; the remote dialects use the `(host, port, database, user,
/// password, schema?)` tuple.
#[derive(Debug, Clone)]
pub struct ConnectionSpec {
    pub dialect: Dialect,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub schema: Option<String>,
    pub file_path: Option<String>,
}

impl ConnectionSpec {
    /// Builds a spec from a `SqlDb.connection_spec` JSON blob plus its
    /// `dialect` column. SQLite rows only need `file_path`; the remote
    /// dialects read the rest of the fields, matching the `(host, port,
    /// database, user, password, schema?)` shape §4.2 documents.
    pub fn from_json(dialect: Dialect, value: &serde_json::Value) -> Result<Self, AppError> {
        let text = |key: &str| value.get(key).and_then(|v| v.as_str()).map(str::to_string);
        Ok(Self {
            dialect,
            host: text("host"),
            port: value.get("port").and_then(|v| v.as_u64()).map(|p| p as u16),
            database: text("database"),
            user: text("user"),
            password: text("password"),
            schema: text("schema"),
            file_path: text("file_path"),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub comment: Option<String>,
    pub is_primary_key: bool,
    pub is_nullable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    pub source_table_name: String,
    pub source_column_name: String,
    pub target_table_name: String,
    pub target_column_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SortModel {
    pub column: String,
    pub descending: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FilterModel {
    pub column: String,
    pub operator: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult {
    pub rows: Vec<serde_json::Value>,
    pub total_rows: u64,
    pub columns: Vec<String>,
    pub error: Option<String>,
}

/// Uniform schema-introspection + paginated-execution contract implemented
/// once per dialect. Methods without a meaningful cross-dialect default
/// return a configuration error, matching the teacher's pattern of
/// default trait methods that return "not supported" for an unimplemented
/// capability.
#[async_trait]
pub trait DbAdapter: Send + Sync {
    fn dialect(&self) -> Dialect;

    async fn introspect_tables(&self) -> Result<Vec<TableInfo>, AppError>;

    async fn introspect_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, AppError>;

    async fn introspect_foreign_keys(&self) -> Result<Vec<ForeignKeyInfo>, AppError>;

    /// Native schema DDL when the dialect supports it; SQLite has none, so
    /// its adapter falls back to a rendered description built from
    /// `introspect_columns`.
    async fn get_table_schema(&self, table: &str) -> Result<String, AppError>;

    async fn get_example_data(
        &self,
        table: &str,
        k: usize,
    ) -> Result<BTreeMap<String, Vec<String>>, AppError>;

    async fn execute_paginated(
        &self,
        sql: &str,
        page: u32,
        page_size: u32,
        sort: Option<SortModel>,
        filter: Option<FilterModel>,
    ) -> Result<PaginatedResult, AppError>;

    async fn health_check(&self) -> bool;
}

/// Rendering fallback shared by dialects without a native `SHOW CREATE
/// TABLE`/`pg_get_tabledef`-equivalent: a human-readable `table(col type, ...)`
/// line built directly from introspected columns.
pub fn render_schema_from_columns(table: &str, columns: &[ColumnInfo]) -> String {
    let body = columns
        .iter()
        .map(|c| {
            let pk = if c.is_primary_key { " PRIMARY KEY" } else { "" };
            format!("{} {}{}", c.name, c.data_type, pk)
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("{table}({body})")
}
