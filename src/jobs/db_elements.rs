//! Create-DB-elements job (§4.10), grounded on
//! `async_db_elements.py`'s `AsyncDbElementsTask.process_db_elements`:
//! introspect tables, introspect columns per table, then foreign keys,
//! upserting each as a catalog row and re-introspecting a table's columns
//! on demand when a foreign key references a column this pass hasn't seen
//! yet.

use std::sync::Arc;

use sqlx::PgPool;

use crate::database::queries::{schema_elements, sqldb};
use crate::dbadapter::DbAdapter;
use crate::progress::{ProgressKey, ProgressTracker};

pub struct DbElementsSummary {
    pub tables_created: usize,
    pub tables_skipped: usize,
    pub columns_created: usize,
    pub columns_skipped: usize,
    pub relationships_created: usize,
}

/// Runs to completion in the caller's task; `main.rs`/`api` wrap this in
/// `tokio::spawn` to detach it per §4.10's "background jobs run via
/// `tokio::spawn`" (§5 Rust mapping note).
pub async fn run(
    pool: &PgPool,
    adapter: Arc<dyn DbAdapter>,
    workspace_id: i64,
    sqldb_id: i64,
    progress: &ProgressTracker,
) {
    let key = ProgressKey::new(workspace_id, "db_elements");
    let _ = sqldb::set_status(pool, sqldb_id, "db_elements_status", "RUNNING", None).await;

    match process(pool, adapter.as_ref(), sqldb_id, &key, progress).await {
        Ok(summary) => {
            let log = format!(
                "tables: {} created, {} skipped; columns: {} created, {} skipped; relationships: {} created",
                summary.tables_created, summary.tables_skipped, summary.columns_created, summary.columns_skipped,
                summary.relationships_created
            );
            let _ = sqldb::set_status(pool, sqldb_id, "db_elements_status", "COMPLETED", Some(&log)).await;
            progress.complete(&key, Some(log)).await;
        }
        Err(err) => {
            let message = err.to_string();
            let _ = sqldb::set_status(pool, sqldb_id, "db_elements_status", "FAILED", Some(&message)).await;
            progress.fail(&key, message).await;
        }
    }
}

async fn process(
    pool: &PgPool,
    adapter: &dyn DbAdapter,
    sqldb_id: i64,
    key: &ProgressKey,
    progress: &ProgressTracker,
) -> Result<DbElementsSummary, crate::error::AppError> {
    let table_infos = adapter.introspect_tables().await?;
    progress.init(key.clone(), table_infos.len() as u64).await;

    let mut tables_created = 0;
    let mut tables_skipped = 0;
    let mut columns_created = 0;
    let mut columns_skipped = 0;

    for (i, table_info) in table_infos.iter().enumerate() {
        let (table, created) = schema_elements::upsert_table(pool, sqldb_id, &table_info.name, table_info.comment.as_deref()).await?;
        if created {
            tables_created += 1;
        } else {
            tables_skipped += 1;
        }

        let columns = adapter.introspect_columns(&table_info.name).await?;
        for column in &columns {
            let (_, created) = schema_elements::upsert_column(
                pool,
                table.id,
                &column.name,
                &column.data_type,
                column.comment.as_deref(),
                column.is_primary_key,
            )
            .await?;
            if created {
                columns_created += 1;
            } else {
                columns_skipped += 1;
            }
        }

        progress
            .update(key, (i + 1) as u64, Some(format!("Processing table {}/{}: {}", i + 1, table_infos.len(), table_info.name)))
            .await;
    }

    let foreign_keys = adapter.introspect_foreign_keys().await?;
    let mut relationships_created = 0;
    for fk in foreign_keys {
        let Ok(source_table) = find_table(pool, sqldb_id, &fk.source_table_name).await else { continue };
        let Ok(target_table) = find_table(pool, sqldb_id, &fk.target_table_name).await else { continue };
        let (Some(source_table), Some(target_table)) = (source_table, target_table) else { continue };

        let source_column = match schema_elements::find_column(pool, source_table.id, &fk.source_column_name).await? {
            Some(c) => c,
            None => {
                // Owning table's columns weren't introspected above (a FK can
                // reference a table outside this run's table list); pull them now.
                reintrospect_columns(pool, adapter, source_table.id, &source_table.name).await?;
                match schema_elements::find_column(pool, source_table.id, &fk.source_column_name).await? {
                    Some(c) => c,
                    None => continue,
                }
            }
        };
        let target_column = match schema_elements::find_column(pool, target_table.id, &fk.target_column_name).await? {
            Some(c) => c,
            None => {
                reintrospect_columns(pool, adapter, target_table.id, &target_table.name).await?;
                match schema_elements::find_column(pool, target_table.id, &fk.target_column_name).await? {
                    Some(c) => c,
                    None => continue,
                }
            }
        };

        if schema_elements::upsert_relationship(pool, sqldb_id, source_column.id, target_column.id).await? {
            relationships_created += 1;
        }
    }

    Ok(DbElementsSummary { tables_created, tables_skipped, columns_created, columns_skipped, relationships_created })
}

async fn find_table(pool: &PgPool, sqldb_id: i64, name: &str) -> Result<Option<crate::database::models::SqlTable>, crate::error::AppError> {
    Ok(schema_elements::list_tables(pool, sqldb_id).await?.into_iter().find(|t| t.name == name))
}

async fn reintrospect_columns(
    pool: &PgPool,
    adapter: &dyn DbAdapter,
    table_id: i64,
    table_name: &str,
) -> Result<(), crate::error::AppError> {
    for column in adapter.introspect_columns(table_name).await? {
        schema_elements::upsert_column(pool, table_id, &column.name, &column.data_type, column.comment.as_deref(), column.is_primary_key)
            .await?;
    }
    Ok(())
}

