//! Table/column comment generation jobs (§4.10 SUPPLEMENT): an LLM writes a
//! one-line natural-language comment for each table (and, in a second pass,
//! each column), processed in chunks of [`super::COMMENT_CHUNK_SIZE`] so
//! progress and partial failures are visible mid-run rather than only at the
//! end. There is no dedicated agent role for this in the pool (§4.5); it
//! reuses [`AgentRole::ResultSummarizer`], the one slot the six-phase
//! pipeline itself never calls.

use sqlx::PgPool;

use crate::agents::{AgentPool, AgentRole};
use crate::database::models::{SqlColumn, SqlTable};
use crate::database::queries::{schema_elements, sqldb};
use crate::error::AppError;
use crate::llm::client::{GenerateOptions, Message};
use crate::progress::{ProgressKey, ProgressTracker};

use super::COMMENT_CHUNK_SIZE;

pub async fn run_table_comments(pool: &PgPool, agents: &AgentPool, workspace_id: i64, sqldb_id: i64, progress: &ProgressTracker) {
    let key = ProgressKey::new(workspace_id, "table_comments");
    let _ = sqldb::set_status(pool, sqldb_id, "table_comment_status", "RUNNING", None).await;

    match process_tables(pool, agents, sqldb_id, &key, progress).await {
        Ok(count) => {
            let log = format!("{count} tables commented");
            let _ = sqldb::set_status(pool, sqldb_id, "table_comment_status", "COMPLETED", Some(&log)).await;
            progress.complete(&key, Some(log)).await;
        }
        Err(err) => {
            let message = err.to_string();
            let _ = sqldb::set_status(pool, sqldb_id, "table_comment_status", "FAILED", Some(&message)).await;
            progress.fail(&key, message).await;
        }
    }
}

pub async fn run_column_comments(pool: &PgPool, agents: &AgentPool, workspace_id: i64, sqldb_id: i64, progress: &ProgressTracker) {
    let key = ProgressKey::new(workspace_id, "column_comments");
    let _ = sqldb::set_status(pool, sqldb_id, "column_comment_status", "RUNNING", None).await;

    match process_columns(pool, agents, sqldb_id, &key, progress).await {
        Ok(count) => {
            let log = format!("{count} columns commented");
            let _ = sqldb::set_status(pool, sqldb_id, "column_comment_status", "COMPLETED", Some(&log)).await;
            progress.complete(&key, Some(log)).await;
        }
        Err(err) => {
            let message = err.to_string();
            let _ = sqldb::set_status(pool, sqldb_id, "column_comment_status", "FAILED", Some(&message)).await;
            progress.fail(&key, message).await;
        }
    }
}

async fn process_tables(pool: &PgPool, agents: &AgentPool, sqldb_id: i64, key: &ProgressKey, progress: &ProgressTracker) -> Result<usize, AppError> {
    let tables = schema_elements::list_tables(pool, sqldb_id).await?;
    progress.init(key.clone(), tables.len() as u64).await;

    let client = agents.client_for(AgentRole::ResultSummarizer)?;
    let mut commented = 0;
    for (chunk_index, chunk) in tables.chunks(COMMENT_CHUNK_SIZE).enumerate() {
        for table in chunk {
            let comment = describe_table(&client, table).await?;
            schema_elements::upsert_table(pool, sqldb_id, &table.name, Some(&comment)).await?;
            commented += 1;
        }
        progress
            .update(
                key,
                commented as u64,
                Some(format!("Commented chunk {}: {} tables so far", chunk_index + 1, commented)),
            )
            .await;
    }
    Ok(commented)
}

async fn process_columns(pool: &PgPool, agents: &AgentPool, sqldb_id: i64, key: &ProgressKey, progress: &ProgressTracker) -> Result<usize, AppError> {
    let tables = schema_elements::list_tables(pool, sqldb_id).await?;
    progress.init(key.clone(), tables.len() as u64).await;

    let client = agents.client_for(AgentRole::ResultSummarizer)?;
    let mut commented = 0;
    for (chunk_index, chunk) in tables.chunks(COMMENT_CHUNK_SIZE).enumerate() {
        for table in chunk {
            commented += describe_and_store_columns(pool, &client, table).await?;
        }
        progress
            .update(
                key,
                chunk_index as u64 * COMMENT_CHUNK_SIZE as u64 + chunk.len() as u64,
                Some(format!("Commented columns for chunk {}", chunk_index + 1)),
            )
            .await;
    }
    Ok(commented)
}

async fn describe_and_store_columns(pool: &PgPool, client: &crate::llm::LlmClient, table: &SqlTable) -> Result<usize, AppError> {
    let columns = sqlx::query_as::<_, SqlColumn>(
        "SELECT id, sql_table_id, name, data_type, comment, is_primary_key FROM sql_columns WHERE sql_table_id = $1",
    )
    .bind(table.id)
    .fetch_all(pool)
    .await
    .map_err(AppError::from)?;

    let mut count = 0;
    for column in columns {
        let comment = describe_column(client, table, &column).await?;
        schema_elements::upsert_column(pool, table.id, &column.name, &column.data_type, Some(&comment), column.is_primary_key).await?;
        count += 1;
    }
    Ok(count)
}

async fn describe_table(client: &crate::llm::LlmClient, table: &SqlTable) -> Result<String, AppError> {
    let messages = vec![
        Message::system("You write a single concise sentence describing what a database table stores. No preamble, no quotes."),
        Message::user(format!("Table name: {}", table.name)),
    ];
    let response = client
        .generate(messages, GenerateOptions { max_tokens: Some(80), ..Default::default() })
        .await
        .map_err(AppError::from)?;
    Ok(response.content.trim().to_string())
}

async fn describe_column(client: &crate::llm::LlmClient, table: &SqlTable, column: &SqlColumn) -> Result<String, AppError> {
    let messages = vec![
        Message::system("You write a single concise sentence describing what a database column holds. No preamble, no quotes."),
        Message::user(format!("Table: {}, column: {} ({})", table.name, column.name, column.data_type)),
    ];
    let response = client
        .generate(messages, GenerateOptions { max_tokens: Some(60), ..Default::default() })
        .await
        .map_err(AppError::from)?;
    Ok(response.content.trim().to_string())
}
