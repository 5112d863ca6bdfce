//! Schema derivation (§4.4): turns a raw DB introspection plus extracted
//! keywords into the `mschema`-rendered context block agents reason over.
//!
//! Pipeline: [`lsh::LshIndex`] lookup is the critical path — a missing index
//! aborts the run. Vector-store description enrichment
//! ([`enrichment::enrich`]) is best-effort and degrades with a warning frame
//! rather than failing the request. [`link::decide`] then picks whether the
//! rendered context is pruned to schema-linked tables/columns or left whole.

pub mod enrichment;
pub mod link;
pub mod lsh;
pub mod mschema;

pub use link::SchemaLinkStrategy;
pub use mschema::render_mschema;

use serde::{Deserialize, Serialize};

use crate::dbadapter::{ColumnInfo, DbAdapter, ForeignKeyInfo, TableInfo};
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectedColumn {
    pub name: String,
    pub data_type: String,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    pub description: Option<String>,
    pub value_description: Option<String>,
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectedTable {
    pub name: String,
    pub comment: Option<String>,
    pub columns: Vec<ProjectedColumn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyLink {
    pub source_table: String,
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectedSchema {
    pub tables: Vec<ProjectedTable>,
    pub foreign_keys: Vec<ForeignKeyLink>,
}

impl ProjectedSchema {
    pub fn column_count(&self) -> usize {
        self.tables.iter().map(|t| t.columns.len()).sum()
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Restrict to a subset of tables, keeping only foreign keys whose
    /// endpoints both survive the prune. Used by [`link::SchemaLinkStrategy`]
    /// when it selects `WithSchemaLink`.
    pub fn pruned_to(&self, table_names: &[String]) -> ProjectedSchema {
        let keep: std::collections::HashSet<&str> = table_names.iter().map(String::as_str).collect();
        let tables = self.tables.iter().filter(|t| keep.contains(t.name.as_str())).cloned().collect();
        let foreign_keys = self
            .foreign_keys
            .iter()
            .filter(|fk| keep.contains(fk.source_table.as_str()) && keep.contains(fk.target_table.as_str()))
            .cloned()
            .collect();
        ProjectedSchema { tables, foreign_keys }
    }
}

/// Builds a [`ProjectedSchema`] by introspecting every table through the
/// adapter and attaching example values surfaced by the LSH index for the
/// supplied keywords. This is the critical path named in §4.4: if `lsh` is
/// `None` (index failed to load) the caller must already have aborted before
/// reaching here — this function itself only fails on adapter errors.
pub async fn derive_schema(
    adapter: &dyn DbAdapter,
    lsh: &lsh::LshIndex,
    keywords: &[String],
) -> Result<ProjectedSchema, AppError> {
    let tables: Vec<TableInfo> = adapter.introspect_tables().await?;
    let foreign_keys: Vec<ForeignKeyInfo> = adapter.introspect_foreign_keys().await?;

    let mut projected_tables = Vec::with_capacity(tables.len());
    for table in &tables {
        let columns: Vec<ColumnInfo> = adapter.introspect_columns(&table.name).await?;
        let mut projected_columns = Vec::with_capacity(columns.len());
        for column in &columns {
            let examples = examples_for_column(lsh, &table.name, &column.name, keywords);
            let is_foreign_key = foreign_keys
                .iter()
                .any(|fk| fk.source_table_name == table.name && fk.source_column_name == column.name);
            projected_columns.push(ProjectedColumn {
                name: column.name.clone(),
                data_type: column.data_type.clone(),
                is_primary_key: column.is_primary_key,
                is_foreign_key,
                description: None,
                value_description: None,
                examples,
            });
        }
        projected_tables.push(ProjectedTable {
            name: table.name.clone(),
            comment: table.comment.clone(),
            columns: projected_columns,
        });
    }

    let links = foreign_keys
        .into_iter()
        .map(|fk| ForeignKeyLink {
            source_table: fk.source_table_name,
            source_column: fk.source_column_name,
            target_table: fk.target_table_name,
            target_column: fk.target_column_name,
        })
        .collect();

    Ok(ProjectedSchema { tables: projected_tables, foreign_keys: links })
}

fn examples_for_column(lsh: &lsh::LshIndex, table: &str, column: &str, keywords: &[String]) -> Vec<String> {
    let mut values = Vec::new();
    for keyword in keywords {
        for hit in lsh.lookup(keyword, 20) {
            if hit.table == table && hit.column == column && !values.contains(&hit.value) {
                values.push(hit.value);
            }
        }
    }
    values.truncate(5);
    values
}
