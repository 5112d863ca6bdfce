use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::AppError;

use super::{
    mariadb, mysql::MySqlAdapter, oracle, postgres::PostgresAdapter, sqlite::SqliteAdapter,
    sqlserver::SqlServerAdapter, ConnectionSpec, Dialect, DbAdapter,
};

/// One manager instance per `(workspace_id, sqldb_id)`, safe for concurrent
/// paginated reads (§4.2). Construction is serialized by key; reads of an
/// already-warmed adapter are lock-free after the first `Arc` clone.
#[derive(Default)]
pub struct DbAdapterRegistry {
    adapters: RwLock<HashMap<(i64, i64), Arc<dyn DbAdapter>>>,
}

impl DbAdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_create(
        &self,
        workspace_id: i64,
        sqldb_id: i64,
        spec: &ConnectionSpec,
    ) -> Result<Arc<dyn DbAdapter>, AppError> {
        let key = (workspace_id, sqldb_id);
        if let Some(adapter) = self.adapters.read().await.get(&key) {
            return Ok(adapter.clone());
        }

        let adapter = create_adapter(spec).await?;
        self.adapters.write().await.insert(key, adapter.clone());
        Ok(adapter)
    }

    pub async fn invalidate(&self, workspace_id: i64, sqldb_id: i64) {
        self.adapters.write().await.remove(&(workspace_id, sqldb_id));
    }
}

/// Dialect-tagged factory. SQLite derives its path from `{db_root}/
/// {mode}_databases/{name}/{name}.sqlite` before reaching this function; the
/// remote dialects use `(host, port, database, user, password, schema?)`.
async fn create_adapter(spec: &ConnectionSpec) -> Result<Arc<dyn DbAdapter>, AppError> {
    match spec.dialect {
        Dialect::Sqlite => Ok(Arc::new(SqliteAdapter::connect(spec).await?) as Arc<dyn DbAdapter>),
        Dialect::PostgreSql => Ok(Arc::new(PostgresAdapter::connect(spec).await?) as Arc<dyn DbAdapter>),
        Dialect::MySql => Ok(Arc::new(MySqlAdapter::connect(spec, Dialect::MySql).await?) as Arc<dyn DbAdapter>),
        Dialect::MariaDb => Ok(Arc::new(mariadb::connect(spec).await?) as Arc<dyn DbAdapter>),
        Dialect::SqlServer => Ok(Arc::new(SqlServerAdapter::connect(spec).await?) as Arc<dyn DbAdapter>),
        Dialect::Oracle => {
            oracle::connect(spec).await?;
            unreachable!("oracle::connect always returns Err")
        }
    }
}

pub fn sqlite_path(db_root: &str, mode: &str, name: &str) -> String {
    format!("{db_root}/{mode}_databases/{name}/{name}.sqlite")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_path_matches_factory_rule() {
        assert_eq!(
            sqlite_path("/var/lib/thoth", "prod", "california_schools"),
            "/var/lib/thoth/prod_databases/california_schools/california_schools.sqlite"
        );
    }
}
