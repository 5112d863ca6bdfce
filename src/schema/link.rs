//! Schema-link strategy selection: whether agents reason over the full
//! projected schema or a keyword-pruned subset of it.
//!
//! Pruning too aggressively risks dropping a table the gold query actually
//! needs; never pruning wastes context budget and dilutes the agent's
//! attention on large schemas. The decision is a deterministic function of
//! keyword count against schema size, not a model call, so it is cheap and
//! reproducible across retries of the same question.

use std::collections::HashSet;

use super::{ProjectedSchema, ProjectedTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaLinkStrategy {
    WithSchemaLink,
    WithoutSchemaLink,
}

/// Small schemas are rendered whole regardless of keyword coverage: pruning
/// a handful of tables saves little context and risks losing a join path.
/// Above the threshold, the strategy switches to linking whenever the
/// keywords resolve to a strict subset of the schema's tables.
const SMALL_SCHEMA_TABLE_THRESHOLD: usize = 8;

pub fn decide(schema: &ProjectedSchema, keywords: &[String]) -> SchemaLinkStrategy {
    if schema.tables.len() <= SMALL_SCHEMA_TABLE_THRESHOLD {
        return SchemaLinkStrategy::WithoutSchemaLink;
    }

    let matched = matching_tables(schema, keywords);
    if matched.is_empty() || matched.len() >= schema.tables.len() {
        SchemaLinkStrategy::WithoutSchemaLink
    } else {
        SchemaLinkStrategy::WithSchemaLink
    }
}

/// Tables whose name or any column name shares a token with a keyword.
/// Expanded to include every table reachable by one foreign-key hop from a
/// direct match, so join targets are not pruned away from under the agent.
pub fn matching_tables(schema: &ProjectedSchema, keywords: &[String]) -> Vec<String> {
    let lowered: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();

    let direct: HashSet<&str> = schema
        .tables
        .iter()
        .filter(|t| table_matches(t, &lowered))
        .map(|t| t.name.as_str())
        .collect();

    let mut expanded: HashSet<String> = direct.iter().map(|s| s.to_string()).collect();
    for fk in &schema.foreign_keys {
        if direct.contains(fk.source_table.as_str()) {
            expanded.insert(fk.target_table.clone());
        }
        if direct.contains(fk.target_table.as_str()) {
            expanded.insert(fk.source_table.clone());
        }
    }

    schema.tables.iter().map(|t| t.name.clone()).filter(|name| expanded.contains(name)).collect()
}

fn table_matches(table: &ProjectedTable, lowered_keywords: &[String]) -> bool {
    let name = table.name.to_lowercase();
    if lowered_keywords.iter().any(|k| name.contains(k.as_str()) || k.contains(name.as_str())) {
        return true;
    }
    table.columns.iter().any(|c| {
        let col = c.name.to_lowercase();
        lowered_keywords.iter().any(|k| col.contains(k.as_str()) || k.contains(col.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ForeignKeyLink, ProjectedColumn};

    fn table(name: &str, columns: &[&str]) -> ProjectedTable {
        ProjectedTable {
            name: name.to_string(),
            comment: None,
            columns: columns
                .iter()
                .map(|c| ProjectedColumn {
                    name: c.to_string(),
                    data_type: "TEXT".to_string(),
                    is_primary_key: false,
                    is_foreign_key: false,
                    description: None,
                    value_description: None,
                    examples: vec![],
                })
                .collect(),
        }
    }

    fn big_schema() -> ProjectedSchema {
        ProjectedSchema {
            tables: (0..12).map(|i| table(&format!("table_{i}"), &["id", "value"])).collect(),
            foreign_keys: vec![ForeignKeyLink {
                source_table: "table_1".to_string(),
                source_column: "table_0_id".to_string(),
                target_table: "table_0".to_string(),
                target_column: "id".to_string(),
            }],
        }
    }

    #[test]
    fn small_schema_never_links() {
        let schema = ProjectedSchema { tables: vec![table("schools", &["CDSCode"])], foreign_keys: vec![] };
        assert_eq!(decide(&schema, &["schools".to_string()]), SchemaLinkStrategy::WithoutSchemaLink);
    }

    #[test]
    fn large_schema_with_partial_match_links() {
        let schema = big_schema();
        let strategy = decide(&schema, &["table_1".to_string()]);
        assert_eq!(strategy, SchemaLinkStrategy::WithSchemaLink);
    }

    #[test]
    fn fk_neighbor_is_pulled_in_when_linking() {
        let schema = big_schema();
        let matched = matching_tables(&schema, &["table_1".to_string()]);
        assert!(matched.contains(&"table_0".to_string()));
    }

    #[test]
    fn no_keyword_match_falls_back_to_whole_schema() {
        let schema = big_schema();
        assert_eq!(decide(&schema, &["zzz_no_match".to_string()]), SchemaLinkStrategy::WithoutSchemaLink);
    }
}
