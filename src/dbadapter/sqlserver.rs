use std::collections::BTreeMap;

use async_trait::async_trait;
use tiberius::{AuthMethod, Client, Config};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::error::AppError;

use super::{
    ColumnInfo, ConnectionSpec, Dialect, FilterModel, ForeignKeyInfo, PaginatedResult, SortModel,
    TableInfo,
};

type TiberiusClient = Client<Compat<TcpStream>>;

/// SQL Server adapter over `tiberius`. A single connection is held behind a
/// mutex: tiberius's `Client` is not `Sync`-shareable across concurrent
/// queries, so paginated reads are serialized per adapter instance (still
/// safe for the read-only generation path described in §5).
pub struct SqlServerAdapter {
    client: Mutex<TiberiusClient>,
    schema: String,
}

impl SqlServerAdapter {
    pub async fn connect(spec: &ConnectionSpec) -> Result<Self, AppError> {
        let host = spec.host.as_deref().unwrap_or("localhost");
        let port = spec.port.unwrap_or(1433);
        let database = spec
            .database
            .as_deref()
            .ok_or_else(|| AppError::configuration("sqlserver adapter requires a database name"))?;
        let user = spec
            .user
            .as_deref()
            .ok_or_else(|| AppError::configuration("sqlserver adapter requires a user"))?;
        let password = spec.password.clone().unwrap_or_default();

        let mut config = Config::new();
        config.host(host);
        config.port(port);
        config.database(database);
        config.authentication(AuthMethod::sql_server(user, password));
        config.trust_cert();

        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| AppError::database(format!("failed to connect to sqlserver at {host}:{port}: {e}")))?;
        tcp.set_nodelay(true).ok();

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| AppError::database(format!("sqlserver handshake failed: {e}")))?;

        Ok(Self { client: Mutex::new(client), schema: spec.schema.clone().unwrap_or_else(|| "dbo".to_string()) })
    }

    async fn query_rows(&self, sql: &str) -> Result<Vec<BTreeMap<String, serde_json::Value>>, AppError> {
        let mut client = self.client.lock().await;
        let stream = client
            .simple_query(sql)
            .await
            .map_err(|e| AppError::database(format!("sqlserver query failed: {e}")))?;
        let rows = stream
            .into_first_result()
            .await
            .map_err(|e| AppError::database(format!("sqlserver result read failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let mut obj = BTreeMap::new();
                for col in row.columns() {
                    let name = col.name().to_string();
                    let value = row
                        .try_get::<&str, _>(name.as_str())
                        .ok()
                        .flatten()
                        .map(|v| serde_json::Value::String(v.to_string()))
                        .unwrap_or(serde_json::Value::Null);
                    obj.insert(name, value);
                }
                obj
            })
            .collect())
    }
}

#[async_trait]
impl super::DbAdapter for SqlServerAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    async fn introspect_tables(&self) -> Result<Vec<TableInfo>, AppError> {
        let sql = format!(
            "SELECT t.name AS name, CAST(ep.value AS NVARCHAR(4000)) AS comment \
             FROM sys.tables t \
             LEFT JOIN sys.extended_properties ep ON ep.major_id = t.object_id AND ep.minor_id = 0 AND ep.name = 'MS_Description' \
             JOIN sys.schemas s ON s.schema_id = t.schema_id WHERE s.name = '{}'",
            self.schema
        );
        let rows = self.query_rows(&sql).await?;
        Ok(rows
            .into_iter()
            .map(|r| TableInfo {
                name: r.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                comment: r.get("comment").and_then(|v| v.as_str()).map(str::to_string),
            })
            .collect())
    }

    async fn introspect_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, AppError> {
        let sql = format!(
            "SELECT c.name AS column_name, ty.name AS data_type, c.is_nullable AS is_nullable, \
                    CASE WHEN pk.column_id IS NOT NULL THEN 1 ELSE 0 END AS is_pk \
             FROM sys.columns c \
             JOIN sys.types ty ON ty.user_type_id = c.user_type_id \
             LEFT JOIN (SELECT ic.column_id, ic.object_id FROM sys.index_columns ic \
                        JOIN sys.indexes i ON i.object_id = ic.object_id AND i.index_id = ic.index_id \
                        WHERE i.is_primary_key = 1) pk ON pk.object_id = c.object_id AND pk.column_id = c.column_id \
             WHERE c.object_id = OBJECT_ID('{}.{}')",
            self.schema, table
        );
        let rows = self.query_rows(&sql).await?;
        Ok(rows
            .into_iter()
            .map(|r| ColumnInfo {
                name: r.get("column_name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                data_type: r.get("data_type").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                comment: None,
                is_primary_key: r.get("is_pk").and_then(|v| v.as_str()) == Some("1"),
                is_nullable: r.get("is_nullable").and_then(|v| v.as_str()) == Some("1"),
            })
            .collect())
    }

    async fn introspect_foreign_keys(&self) -> Result<Vec<ForeignKeyInfo>, AppError> {
        let sql = "SELECT \
                OBJECT_NAME(fkc.parent_object_id) AS source_table_name, \
                COL_NAME(fkc.parent_object_id, fkc.parent_column_id) AS source_column_name, \
                OBJECT_NAME(fkc.referenced_object_id) AS target_table_name, \
                COL_NAME(fkc.referenced_object_id, fkc.referenced_column_id) AS target_column_name \
             FROM sys.foreign_key_columns fkc";
        let rows = self.query_rows(sql).await?;
        Ok(rows
            .into_iter()
            .map(|r| ForeignKeyInfo {
                source_table_name: r.get("source_table_name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                source_column_name: r.get("source_column_name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                target_table_name: r.get("target_table_name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                target_column_name: r.get("target_column_name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            })
            .collect())
    }

    async fn get_table_schema(&self, table: &str) -> Result<String, AppError> {
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
                "SELECT DISTINCT TOP {} [{}] FROM [{}].[{}] WHERE [{}] IS NOT NULL",
                k, col.name, self.schema, table, col.name
            );
            let rows = self.query_rows(&sql).await.unwrap_or_default();
            let values = rows
                .into_iter()
                .filter_map(|r| r.get(&col.name).and_then(|v| v.as_str()).map(str::to_string))
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
            .map(|s| format!("ORDER BY [{}] {}", s.column, if s.descending { "DESC" } else { "ASC" }))
            .unwrap_or_else(|| "ORDER BY (SELECT NULL)".to_string());
        let offset = page.saturating_sub(1) * page_size;
        let paged_sql = format!(
            "SELECT * FROM ({sql}) AS subquery {order_clause} OFFSET {offset} ROWS FETCH NEXT {page_size} ROWS ONLY"
        );

        let rows = match self.query_rows(&paged_sql).await {
            Ok(rows) => rows,
            Err(e) => return Ok(PaginatedResult { rows: vec![], total_rows: 0, columns: vec![], error: Some(e.to_string()) }),
        };

        let columns: Vec<String> = rows.first().map(|r| r.keys().cloned().collect()).unwrap_or_default();
        let values = rows.into_iter().map(|r| serde_json::Value::Object(r.into_iter().collect())).collect();

        let count_sql = format!("SELECT COUNT(*) AS c FROM ({sql}) AS subquery");
        let total_rows = self
            .query_rows(&count_sql)
            .await
            .ok()
            .and_then(|rows| rows.into_iter().next())
            .and_then(|r| r.get("c").and_then(|v| v.as_str()).and_then(|s| s.parse::<u64>().ok()))
            .unwrap_or(0);

        Ok(PaginatedResult { rows: values, total_rows, columns, error: None })
    }

    async fn health_check(&self) -> bool {
        self.query_rows("SELECT 1 AS c").await.is_ok()
    }
}
