use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{MySqlPool, Row};

use crate::error::AppError;

use super::{
    ColumnInfo, ConnectionSpec, Dialect, FilterModel, ForeignKeyInfo, PaginatedResult, SortModel,
    TableInfo,
};

pub struct MySqlAdapter {
    pool: MySqlPool,
    database: String,
    dialect: Dialect,
}

impl MySqlAdapter {
    pub async fn connect(spec: &ConnectionSpec, dialect: Dialect) -> Result<Self, AppError> {
        let host = spec.host.as_deref().unwrap_or("localhost");
        let port = spec.port.unwrap_or(3306);
        let database = spec
            .database
            .as_deref()
            .ok_or_else(|| AppError::configuration("mysql adapter requires a database name"))?;
        let user = spec.user.as_deref().unwrap_or("root");
        let password = spec.password.as_deref().unwrap_or("");
        let url = format!("mysql://{user}:{password}@{host}:{port}/{database}");
        let pool = MySqlPool::connect(&url)
            .await
            .map_err(|e| AppError::database(format!("failed to connect to {} db {database}: {e}", dialect.as_str())))?;
        Ok(Self { pool, database: database.to_string(), dialect })
    }
}

#[async_trait]
impl super::DbAdapter for MySqlAdapter {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn introspect_tables(&self) -> Result<Vec<TableInfo>, AppError> {
        let rows = sqlx::query(
            "SELECT table_name, table_comment FROM information_schema.tables \
             WHERE table_schema = ? AND table_type = 'BASE TABLE'",
        )
        .bind(&self.database)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| {
                let comment: String = r.get("table_comment");
                TableInfo {
                    name: r.get("table_name"),
                    comment: if comment.is_empty() { None } else { Some(comment) },
                }
            })
            .collect())
    }

    async fn introspect_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, AppError> {
        let rows = sqlx::query(
            "SELECT column_name, data_type, column_comment, column_key, is_nullable \
             FROM information_schema.columns WHERE table_schema = ? AND table_name = ? \
             ORDER BY ordinal_position",
        )
        .bind(&self.database)
        .bind(table)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| {
                let comment: String = r.get("column_comment");
                ColumnInfo {
                    name: r.get("column_name"),
                    data_type: r.get("data_type"),
                    comment: if comment.is_empty() { None } else { Some(comment) },
                    is_primary_key: r.get::<String, _>("column_key") == "PRI",
                    is_nullable: r.get::<String, _>("is_nullable") == "YES",
                }
            })
            .collect())
    }

    async fn introspect_foreign_keys(&self) -> Result<Vec<ForeignKeyInfo>, AppError> {
        let rows = sqlx::query(
            "SELECT table_name AS source_table_name, column_name AS source_column_name, \
                    referenced_table_name AS target_table_name, referenced_column_name AS target_column_name \
             FROM information_schema.key_column_usage \
             WHERE table_schema = ? AND referenced_table_name IS NOT NULL",
        )
        .bind(&self.database)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| ForeignKeyInfo {
                source_table_name: r.get("source_table_name"),
                source_column_name: r.get("source_column_name"),
                target_table_name: r.get("target_table_name"),
                target_column_name: r.get("target_column_name"),
            })
            .collect())
    }

    async fn get_table_schema(&self, table: &str) -> Result<String, AppError> {
        let row = sqlx::query(&format!("SHOW CREATE TABLE `{table}`"))
            .fetch_optional(&self.pool)
            .await;
        match row {
            Ok(Some(r)) => Ok(r.try_get::<String, _>("Create Table").unwrap_or_default()),
            _ => {
                let columns = self.introspect_columns(table).await?;
                Ok(super::render_schema_from_columns(table, &columns))
            }
        }
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
                "SELECT DISTINCT `{}` FROM `{}` WHERE `{}` IS NOT NULL LIMIT {}",
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
            .map(|s| format!(" ORDER BY `{}` {}", s.column, if s.descending { "DESC" } else { "ASC" }))
            .unwrap_or_default();
        let offset = page.saturating_sub(1) * page_size;
        let paged_sql =
            format!("SELECT * FROM ({sql}) AS subquery{order_clause} LIMIT {page_size} OFFSET {offset}");

        let rows = match sqlx::query(&paged_sql).fetch_all(&self.pool).await {
            Ok(rows) => rows,
            Err(e) => {
                return Ok(PaginatedResult { rows: vec![], total_rows: 0, columns: vec![], error: Some(e.to_string()) })
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

        let count_sql = format!("SELECT COUNT(*) as c FROM ({sql}) AS subquery");
        let total_rows: i64 = sqlx::query(&count_sql)
            .fetch_one(&self.pool)
            .await
            .map(|r| r.get("c"))
            .unwrap_or(0);

        Ok(PaginatedResult { rows: values, total_rows: total_rows as u64, columns, error: None })
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}
