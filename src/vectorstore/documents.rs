use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Evidence,
    ColumnName,
    Sql,
}

/// A short textual hint usable by SQL generators, keyed by a stable ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceDocument {
    pub id: String,
    pub text: String,
}

/// `(table, column, original_name, column_description, value_description)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnNameDocument {
    pub id: String,
    pub table: String,
    pub column: String,
    pub original_column_name: String,
    pub column_description: Option<String>,
    pub value_description: Option<String>,
}

/// `(question, sql, evidence)` — a gold or user-liked example.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlDocument {
    pub id: String,
    pub question: String,
    pub sql: String,
    pub evidence: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Document {
    Evidence(EvidenceDocument),
    ColumnName(ColumnNameDocument),
    Sql(SqlDocument),
}

impl Document {
    pub fn id(&self) -> &str {
        match self {
            Document::Evidence(d) => &d.id,
            Document::ColumnName(d) => &d.id,
            Document::Sql(d) => &d.id,
        }
    }

    pub fn doc_type(&self) -> DocumentType {
        match self {
            Document::Evidence(_) => DocumentType::Evidence,
            Document::ColumnName(_) => DocumentType::ColumnName,
            Document::Sql(_) => DocumentType::Sql,
        }
    }

    /// Text handed to the embedding provider for indexing/search.
    pub fn embeddable_text(&self) -> String {
        match self {
            Document::Evidence(d) => d.text.clone(),
            Document::ColumnName(d) => format!(
                "{}.{} {} {}",
                d.table,
                d.original_column_name,
                d.column_description.as_deref().unwrap_or(""),
                d.value_description.as_deref().unwrap_or("")
            ),
            Document::Sql(d) => format!("{} {}", d.question, d.evidence.as_deref().unwrap_or("")),
        }
    }
}
