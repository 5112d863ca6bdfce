use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::error::AppError;

use super::{
    render_schema_from_columns, ColumnInfo, ConnectionSpec, Dialect, FilterModel,
    ForeignKeyInfo, PaginatedResult, SortModel, TableInfo,
};

pub struct SqliteAdapter {
    pool: SqlitePool,
}

impl SqliteAdapter {
    /// `{db_root}/{mode}_databases/{name}/{name}.sqlite`, per the factory
    /// rule in the registry.
    pub async fn connect(spec: &ConnectionSpec) -> Result<Self, AppError> {
        let path = spec
            .file_path
            .as_deref()
            .ok_or_else(|| AppError::configuration("sqlite adapter requires a file_path"))?;
        let url = format!("sqlite://{path}?mode=ro");
        let pool = SqlitePool::connect(&url)
            .await
            .map_err(|e| AppError::database(format!("failed to open sqlite db at {path}: {e}")))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl super::DbAdapter for SqliteAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn introspect_tables(&self) -> Result<Vec<TableInfo>, AppError> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| TableInfo { name: r.get::<String, _>("name"), comment: None })
            .collect())
    }

    async fn introspect_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, AppError> {
        let rows = sqlx::query(&format!("PRAGMA table_info('{table}')"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| ColumnInfo {
                name: r.get::<String, _>("name"),
                data_type: r.get::<String, _>("type"),
                comment: None,
                is_primary_key: r.get::<i64, _>("pk") > 0,
                is_nullable: r.get::<i64, _>("notnull") == 0,
            })
            .collect())
    }

    async fn introspect_foreign_keys(&self) -> Result<Vec<ForeignKeyInfo>, AppError> {
        let tables = self.introspect_tables().await?;
        let mut out = Vec::new();
        for table in tables {
            let rows = sqlx::query(&format!("PRAGMA foreign_key_list('{}')", table.name))
                .fetch_all(&self.pool)
                .await?;
            for r in rows {
                out.push(ForeignKeyInfo {
                    source_table_name: table.name.clone(),
                    source_column_name: r.get::<String, _>("from"),
                    target_table_name: r.get::<String, _>("table"),
                    target_column_name: r.get::<String, _>("to"),
                });
            }
        }
        Ok(out)
    }

    async fn get_table_schema(&self, table: &str) -> Result<String, AppError> {
        // SQLite has no catalog-level schema object; fall back to a rendered
        // description from introspected columns.
        let columns = self.introspect_columns(table).await?;
        Ok(render_schema_from_columns(table, &columns))
    }

    async fn get_example_data(
        &self,
        table: &str,
        k: usize,
    ) -> Result<BTreeMap<String, Vec<String>>, AppError> {
        let columns = self.introspect_columns(table).await?;
        let mut out = BTreeMap::new();
        for col in columns {
            let sql = format!(
                "SELECT DISTINCT \"{}\" FROM \"{}\" WHERE \"{}\" IS NOT NULL LIMIT {}",
                col.name, table, col.name, k
            );
            let rows = sqlx::query(&sql).fetch_all(&self.pool).await.unwrap_or_default();
            let values = rows
                .into_iter()
                .filter_map(|r| r.try_get::<String, _>(0).ok())
                .collect();
            out.insert(col.name, values);
        }
        Ok(out)
    }

    async fn execute_paginated(
        &self,
        sql: &str,
        page: u32,
        page_size: u32,
        sort: Option<SortModel>,
        _filter: Option<FilterModel>,
    ) -> Result<PaginatedResult, AppError> {
        let order_clause = sort
            .map(|s| format!(" ORDER BY \"{}\" {}", s.column, if s.descending { "DESC" } else { "ASC" }))
            .unwrap_or_default();
        let offset = page.saturating_sub(1) * page_size;
        let paged_sql = format!(
            "SELECT * FROM ({sql}){order_clause} LIMIT {page_size} OFFSET {offset}"
        );

        let rows = match sqlx::query(&paged_sql).fetch_all(&self.pool).await {
            Ok(rows) => rows,
            Err(e) => {
                return Ok(PaginatedResult {
                    rows: vec![],
                    total_rows: 0,
                    columns: vec![],
                    error: Some(e.to_string()),
                })
            }
        };

        let columns: Vec<String> = rows
            .first()
            .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let values = rows
            .iter()
            .map(|row| {
                let mut obj = serde_json::Map::new();
                for (i, name) in columns.iter().enumerate() {
                    let value = row
                        .try_get::<String, _>(i)
                        .map(serde_json::Value::String)
                        .or_else(|_| row.try_get::<i64, _>(i).map(serde_json::Value::from))
                        .or_else(|_| row.try_get::<f64, _>(i).map(serde_json::Value::from))
                        .unwrap_or(serde_json::Value::Null);
                    obj.insert(name.clone(), value);
                }
                serde_json::Value::Object(obj)
            })
            .collect();

        let count_sql = format!("SELECT COUNT(*) as c FROM ({sql})");
        let total_rows: i64 = sqlx::query(&count_sql)
            .fetch_one(&self.pool)
            .await
            .map(|r| r.get("c"))
            .unwrap_or(0);

        Ok(PaginatedResult {
            rows: values,
            total_rows: total_rows as u64,
            columns,
            error: None,
        })
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}
