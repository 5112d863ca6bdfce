use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::error::AppError;

use super::{
    ColumnInfo, ConnectionSpec, Dialect, FilterModel, ForeignKeyInfo, PaginatedResult, SortModel,
    TableInfo,
};

pub struct PostgresAdapter {
    pool: PgPool,
    schema: String,
}

impl PostgresAdapter {
    pub async fn connect(spec: &ConnectionSpec) -> Result<Self, AppError> {
        let host = spec.host.as_deref().unwrap_or("localhost");
        let port = spec.port.unwrap_or(5432);
        let database = spec
            .database
            .as_deref()
            .ok_or_else(|| AppError::configuration("postgres adapter requires a database name"))?;
        let user = spec.user.as_deref().unwrap_or("postgres");
        let password = spec.password.as_deref().unwrap_or("");
        let url = format!("postgres://{user}:{password}@{host}:{port}/{database}");
        let pool = PgPool::connect(&url)
            .await
            .map_err(|e| AppError::database(format!("failed to connect to postgres db {database}: {e}")))?;
        Ok(Self { pool, schema: spec.schema.clone().unwrap_or_else(|| "public".to_string()) })
    }
}

#[async_trait]
impl super::DbAdapter for PostgresAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::PostgreSql
    }

    async fn introspect_tables(&self) -> Result<Vec<TableInfo>, AppError> {
        let rows = sqlx::query(
            "SELECT c.relname AS name, obj_description(c.oid) AS comment \
             FROM pg_catalog.pg_class c \
             JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
             WHERE c.relkind = 'r' AND n.nspname = $1",
        )
        .bind(&self.schema)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| TableInfo { name: r.get("name"), comment: r.get("comment") })
            .collect())
    }

    async fn introspect_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, AppError> {
        let rows = sqlx::query(
            "SELECT column_name, data_type, is_nullable, \
             col_description((quote_ident($2)||'.'||quote_ident($1))::regclass::oid, ordinal_position) AS comment \
             FROM information_schema.columns WHERE table_schema = $2 AND table_name = $1 ORDER BY ordinal_position",
        )
        .bind(table)
        .bind(&self.schema)
        .fetch_all(&self.pool)
        .await?;

        let pk_rows = sqlx::query(
            "SELECT kcu.column_name FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu \
                ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
             WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = $2 AND tc.table_name = $1",
        )
        .bind(table)
        .bind(&self.schema)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_default();
        let pk_names: std::collections::HashSet<String> =
            pk_rows.into_iter().map(|r| r.get::<String, _>("column_name")).collect();

        Ok(rows
            .into_iter()
            .map(|r| {
                let name: String = r.get("column_name");
                ColumnInfo {
                    is_primary_key: pk_names.contains(&name),
                    name,
                    data_type: r.get("data_type"),
                    comment: r.get("comment"),
                    is_nullable: r.get::<String, _>("is_nullable") == "YES",
                }
            })
            .collect())
    }

    async fn introspect_foreign_keys(&self) -> Result<Vec<ForeignKeyInfo>, AppError> {
        let rows = sqlx::query(
            "SELECT \
                tc.table_name AS source_table_name, \
                kcu.column_name AS source_column_name, \
                ccu.table_name AS target_table_name, \
                ccu.column_name AS target_column_name \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu \
                ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
             JOIN information_schema.constraint_column_usage ccu \
                ON ccu.constraint_name = tc.constraint_name AND ccu.table_schema = tc.table_schema \
             WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = $1",
        )
        .bind(&self.schema)
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
        // Postgres has no single builtin that dumps DDL (pg_dump lives
        // outside the wire protocol); render from introspected columns like
        // the SQLite fallback.
        let columns = self.introspect_columns(table).await?;
        Ok(super::render_schema_from_columns(table, &columns))
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
                "SELECT DISTINCT \"{}\" FROM \"{}\".\"{}\" WHERE \"{}\" IS NOT NULL LIMIT {}",
                col.name, self.schema, table, col.name, k
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
