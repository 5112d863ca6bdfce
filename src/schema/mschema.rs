//! Renders a [`super::ProjectedSchema`] into the compact `mschema` text block
//! agents are prompted with: one line per table, nested column lines
//! carrying type, key markers, description and examples.
//!
//! Agents in the pool (§4.5) diversify partly by seeing the schema in a
//! different table/column order, which discourages them from all latching
//! onto the same early columns. The shuffle is seeded from `(request_seed,
//! call_index)` so a given agent slot's ordering is reproducible for
//! debugging and distinct from every other slot's in the same request.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::{ProjectedSchema, ProjectedTable};

/// Renders the schema as-is, in introspection order.
pub fn render_mschema(schema: &ProjectedSchema, request_seed: u64, call_index: u64, shuffle: bool) -> String {
    let tables: Vec<&ProjectedTable> = if shuffle {
        let mut ordered: Vec<&ProjectedTable> = schema.tables.iter().collect();
        let mut rng = StdRng::seed_from_u64(request_seed ^ call_index.wrapping_mul(0x9e3779b97f4a7c15));
        ordered.shuffle(&mut rng);
        ordered
    } else {
        schema.tables.iter().collect()
    };

    let mut out = String::new();
    out.push_str("[DB_ID] schema\n[Schema]\n");
    for table in tables {
        out.push_str("# Table: ");
        out.push_str(&table.name);
        if let Some(comment) = &table.comment {
            out.push_str(" (");
            out.push_str(comment);
            out.push(')');
        }
        out.push('\n');

        let mut columns = table.columns.clone();
        if shuffle {
            let mut rng = StdRng::seed_from_u64(
                request_seed ^ call_index.wrapping_mul(0x9e3779b97f4a7c15) ^ fnv(&table.name),
            );
            columns.shuffle(&mut rng);
        }

        for column in &columns {
            out.push_str("[\n  (");
            out.push_str(&column.name);
            out.push_str(", ");
            out.push_str(&column.data_type);
            if column.is_primary_key {
                out.push_str(", Primary Key");
            }
            if column.is_foreign_key {
                out.push_str(", Foreign Key");
            }
            if let Some(desc) = &column.description {
                out.push_str(", Description: ");
                out.push_str(desc);
            }
            if let Some(vd) = &column.value_description {
                out.push_str(", Value Description: ");
                out.push_str(vd);
            }
            if !column.examples.is_empty() {
                out.push_str(", Examples: [");
                out.push_str(&column.examples.join(", "));
                out.push(']');
            }
            out.push_str(")\n]\n");
        }
    }

    if !schema.foreign_keys.is_empty() {
        out.push_str("[Foreign keys]\n");
        for fk in &schema.foreign_keys {
            out.push_str(&format!(
                "{}.{}={}.{}\n",
                fk.source_table, fk.source_column, fk.target_table, fk.target_column
            ));
        }
    }

    out
}

fn fnv(text: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in text.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ProjectedColumn, ProjectedTable};

    fn sample() -> ProjectedSchema {
        ProjectedSchema {
            tables: vec![
                ProjectedTable {
                    name: "schools".to_string(),
                    comment: None,
                    columns: vec![
                        ProjectedColumn {
                            name: "CDSCode".to_string(),
                            data_type: "TEXT".to_string(),
                            is_primary_key: true,
                            is_foreign_key: false,
                            description: None,
                            value_description: None,
                            examples: vec![],
                        },
                        ProjectedColumn {
                            name: "County".to_string(),
                            data_type: "TEXT".to_string(),
                            is_primary_key: false,
                            is_foreign_key: false,
                            description: None,
                            value_description: None,
                            examples: vec!["Alameda".to_string()],
                        },
                    ],
                },
                ProjectedTable {
                    name: "frpm".to_string(),
                    comment: None,
                    columns: vec![],
                },
            ],
            foreign_keys: vec![],
        }
    }

    #[test]
    fn unshuffled_render_is_stable() {
        let schema = sample();
        let a = render_mschema(&schema, 42, 0, false);
        let b = render_mschema(&schema, 999, 0, false);
        assert_eq!(a, b);
    }

    #[test]
    fn different_call_indices_diverge_under_shuffle() {
        let schema = sample();
        let a = render_mschema(&schema, 42, 0, true);
        let b = render_mschema(&schema, 42, 1, true);
        assert_ne!(a, b);
    }

    #[test]
    fn same_seed_and_index_is_reproducible() {
        let schema = sample();
        let a = render_mschema(&schema, 42, 3, true);
        let b = render_mschema(&schema, 42, 3, true);
        assert_eq!(a, b);
    }
}
