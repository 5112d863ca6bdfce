//! Best-effort column-description enrichment from the vector store. Unlike
//! [`super::lsh`], a failure here never aborts the pipeline — the orchestrator
//! logs a `SYSTEM_WARNING` frame and proceeds with the un-enriched schema.

use std::sync::Arc;

use tracing::warn;

use crate::vectorstore::documents::{ColumnNameDocument, Document, DocumentType};
use crate::vectorstore::VectorStore;

use super::ProjectedSchema;

const TOP_K: usize = 1;
const SCORE_THRESHOLD: f32 = 0.35;

/// Looks up a column-description match for every column and merges it in
/// place. Returns `true` if enrichment fully succeeded, `false` if any
/// lookup failed and the caller should emit a degraded-mode warning.
pub async fn enrich(schema: &mut ProjectedSchema, store: &Arc<dyn VectorStore>) -> bool {
    let mut all_ok = true;
    for table in &mut schema.tables {
        for column in &mut table.columns {
            let query = format!("{}.{}", table.name, column.name);
            match store.search_similar(&query, DocumentType::ColumnName, TOP_K, SCORE_THRESHOLD).await {
                Ok(hits) => {
                    if let Some(Document::ColumnName(ColumnNameDocument { column_description, value_description, .. })) =
                        hits.into_iter().next()
                    {
                        column.description = column_description;
                        column.value_description = value_description;
                    }
                }
                Err(err) => {
                    warn!(table = %table.name, column = %column.name, error = %err, "vector store enrichment lookup failed");
                    all_ok = false;
                }
            }
        }
    }
    all_ok
}
