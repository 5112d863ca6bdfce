//! MariaDB is wire-compatible with MySQL; the adapter is the same
//! implementation tagged with a different [`super::Dialect`].

use crate::error::AppError;

use super::{mysql::MySqlAdapter, ConnectionSpec, Dialect};

pub async fn connect(spec: &ConnectionSpec) -> Result<MySqlAdapter, AppError> {
    MySqlAdapter::connect(spec, Dialect::MariaDb).await
}
