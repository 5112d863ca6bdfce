//! Metadata database: the Postgres pool backing `Workspace`, `SqlDb`,
//! `SqlTable`, `SqlColumn`, `Relationship`, `VectorDb`, and `ThothLog` rows
//! (§6.3). A single process-wide pool is warmed once at startup and handed
//! around as part of `AppState`, mirroring the teacher's global-pool
//! accessor but without the embedded-Postgres bootstrap this service has no
//! use for — the metadata store is assumed to be an externally managed
//! Postgres instance reachable via `THOTH_METADATA_DATABASE_URL`.

pub mod models;
pub mod queries;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::AppError;

pub async fn connect(database_url: &str) -> Result<PgPool, AppError> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|err| AppError::database(format!("failed to connect metadata database: {err}")))
}
