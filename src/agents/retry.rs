//! Structured `ModelRetry` message construction: when a generated candidate
//! fails validation, execution, or evidence checks, the agent is re-prompted
//! with a message built here rather than a bare error string, so it has
//! concrete guidance instead of just "try again."

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    SyntaxError,
    ValidationFailed,
    ExecutionError,
    EmptyResult,
    SchemaError,
    EvidenceMismatch,
}

impl ErrorCategory {
    fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::SyntaxError => "SYNTAX_ERROR",
            ErrorCategory::ValidationFailed => "VALIDATION_FAILED",
            ErrorCategory::ExecutionError => "EXECUTION_ERROR",
            ErrorCategory::EmptyResult => "EMPTY_RESULT",
            ErrorCategory::SchemaError => "SCHEMA_ERROR",
            ErrorCategory::EvidenceMismatch => "EVIDENCE_MISMATCH",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Default)]
pub struct EvidenceSummary {
    pub strict: Option<u32>,
    pub weak: Option<u32>,
    pub irrelevant: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub sql: String,
    pub db_type: String,
    pub question: String,
    pub retry_count: u32,
    pub error_message: String,
    pub validation_results: Vec<ValidationResult>,
    pub failed_tests: Vec<String>,
    pub evidence_summary: Option<EvidenceSummary>,
    pub available_tables: Vec<String>,
    pub additional_hints: Vec<String>,
    pub previous_errors: Vec<String>,
    pub metadata: HashMap<String, String>,
}

impl ErrorContext {
    pub fn attempt_number(&self) -> u32 {
        self.retry_count + 1
    }

    fn render_error_detail(&self) -> &str {
        if !self.error_message.is_empty() {
            &self.error_message
        } else {
            "Validation failed without extra detail"
        }
    }

    fn formatted_db_label(&self) -> String {
        if self.db_type.is_empty() {
            "UNKNOWN".to_string()
        } else {
            self.db_type.to_uppercase()
        }
    }
}

pub struct ModelRetryFormatter;

impl ModelRetryFormatter {
    pub fn format_error(category: ErrorCategory, context: &ErrorContext) -> String {
        let mut sections = Vec::new();

        sections.push(format!(
            "MODEL_RETRY::{}\nAttempt: {}\nDatabase: {}\n",
            category.as_str(),
            context.attempt_number(),
            context.formatted_db_label()
        ));

        if !context.question.is_empty() {
            sections.push(format_block("User Question", &context.question));
        }
        if !context.sql.is_empty() {
            sections.push(format!("Candidate SQL:\n```sql\n{}\n```", context.sql.trim()));
        }

        sections.push(format_block("Primary Issue", context.render_error_detail()));

        let category_section = Self::render_category_section(category, context);
        if !category_section.is_empty() {
            sections.push(category_section);
        }

        if !context.previous_errors.is_empty() {
            let body = context
                .previous_errors
                .iter()
                .rev()
                .take(5)
                .rev()
                .map(|e| format!("- {e}"))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(format_block("Previous Attempts", &body));
        }

        let guidance = Self::build_guidance(category, context);
        if !guidance.is_empty() {
            sections.push(format_list_block("Action Items", &guidance));
        }

        sections.into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join("\n\n").trim().to_string()
    }

    /// Short single-line summary appended to `retry_history` so later
    /// attempts (and escalation decisions) can see what already failed.
    pub fn build_history_entry(category: ErrorCategory, context: &ErrorContext) -> String {
        let mut detail = context.render_error_detail().replace('\n', " ").trim().to_string();
        if detail.len() > 160 {
            detail.truncate(157);
            detail.push_str("...");
        }
        format!("Attempt {} · {}: {detail}", context.attempt_number(), category.as_str())
    }

    fn render_category_section(category: ErrorCategory, context: &ErrorContext) -> String {
        match category {
            ErrorCategory::ValidationFailed => Self::render_validation_section(context),
            ErrorCategory::ExecutionError => Self::render_execution_section(context),
            ErrorCategory::EmptyResult => Self::render_empty_result_section(context),
            ErrorCategory::SyntaxError => Self::render_syntax_section(context),
            ErrorCategory::EvidenceMismatch => Self::render_evidence_section(context),
            ErrorCategory::SchemaError => String::new(),
        }
    }

    fn render_validation_section(context: &ErrorContext) -> String {
        if context.validation_results.is_empty() {
            return String::new();
        }
        let mut lines = Vec::new();
        let failed: Vec<&ValidationResult> = context.validation_results.iter().filter(|r| !r.passed).collect();
        let passed_count = context.validation_results.iter().filter(|r| r.passed).count();
        if !failed.is_empty() {
            lines.push("Failed Checks:".to_string());
            for (idx, item) in failed.iter().enumerate() {
                let name = if item.name.is_empty() { format!("Test {}", idx + 1) } else { item.name.clone() };
                lines.push(format!("  • {name}: {}", item.detail));
            }
        }
        if passed_count > 0 {
            lines.push("Passed Checks:".to_string());
            lines.push(format!("  • {passed_count} validations succeeded"));
        }
        lines.join("\n")
    }

    fn render_execution_section(context: &ErrorContext) -> String {
        let detail = context.render_error_detail().to_lowercase();
        let hints: Vec<&str> = if detail.contains("does not exist") && detail.contains("column") {
            vec![
                "Verify column names and aliases",
                "Ensure all referenced tables expose the column",
                "Check case sensitivity requirements",
            ]
        } else if detail.contains("does not exist") && detail.contains("table") {
            vec![
                "Confirm table name and schema prefix",
                "Ensure table is available in workspace",
                "Check spelling of identifiers",
            ]
        } else if detail.contains("syntax") || detail.contains("parse") {
            vec![
                "Review clause ordering (SELECT → FROM → WHERE → GROUP BY → ORDER BY)",
                "Check for missing commas or parentheses",
                "Ensure quotes match and strings are terminated",
            ]
        } else if detail.contains("group by") {
            vec![
                "Every SELECT column must be aggregated or appear in GROUP BY",
                "Avoid using aliases not defined before GROUP BY",
                "Validate aggregate expressions",
            ]
        } else if detail.contains("join") {
            vec![
                "Verify join predicates reference existing columns",
                "Check join type and ensure ON clause is present",
                "Confirm aliases are defined",
            ]
        } else {
            vec![
                "Run a simplified version of the query to isolate the issue",
                "Check data types used in comparisons and functions",
                "Ensure database-specific functions are correct",
            ]
        };
        format_list_block("Debugging Tips", &hints.into_iter().map(String::from).collect::<Vec<_>>())
    }

    fn render_empty_result_section(context: &ErrorContext) -> String {
        let mut hints = vec![
            "Relax restrictive WHERE filters".to_string(),
            "Verify JOIN predicates do not exclude all rows".to_string(),
            "Check date ranges against available data".to_string(),
            "Inspect underlying tables with COUNT(*)".to_string(),
        ];
        if !context.available_tables.is_empty() {
            let shown: Vec<&String> = context.available_tables.iter().take(6).collect();
            let suffix = if context.available_tables.len() > 6 { " …" } else { "" };
            hints.push(format!(
                "Tables available: {}{suffix}",
                shown.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
            ));
        }
        format_list_block("Investigation Steps", &hints)
    }

    fn render_syntax_section(context: &ErrorContext) -> String {
        let mut hints = vec![
            "Confirm clause order (SELECT, FROM, WHERE, GROUP BY, HAVING, ORDER BY)".to_string(),
            "Ensure identifiers are quoted for the target database".to_string(),
            "Replace LIMIT/OFFSET with database-specific equivalents if needed".to_string(),
        ];
        let db = context.db_type.to_lowercase();
        if db == "sqlserver" || db == "mssql" {
            hints.push("Use TOP n or OFFSET … FETCH syntax instead of LIMIT".to_string());
        }
        if db == "oracle" {
            hints.push("Consider FETCH FIRST n ROWS ONLY or ROWNUM filters".to_string());
        }
        format_list_block("Syntax Guidance", &hints)
    }

    fn render_evidence_section(context: &ErrorContext) -> String {
        let mut lines = Vec::new();
        if !context.failed_tests.is_empty() {
            lines.push("Evidence Constraints Violated:".to_string());
            for entry in &context.failed_tests {
                lines.push(format!("  • {entry}"));
            }
        }
        if let Some(summary) = &context.evidence_summary {
            let mut parts = Vec::new();
            if let Some(s) = summary.strict {
                parts.push(format!("STRICT={s}"));
            }
            if let Some(w) = summary.weak {
                parts.push(format!("WEAK={w}"));
            }
            if let Some(i) = summary.irrelevant {
                parts.push(format!("IRRELEVANT={i}"));
            }
            if !parts.is_empty() {
                lines.push(format!("Classification: {}", parts.join(", ")));
            }
        }
        lines.join("\n")
    }

    fn build_guidance(category: ErrorCategory, context: &ErrorContext) -> Vec<String> {
        if !context.additional_hints.is_empty() {
            return context.additional_hints.clone();
        }
        match category {
            ErrorCategory::ValidationFailed => vec![
                "Address each failed validation before resubmitting".to_string(),
                "Keep passing checks intact while fixing issues".to_string(),
                "Double-check join logic and filters mentioned above".to_string(),
            ],
            ErrorCategory::ExecutionError => vec![
                "Run simplified snippets locally to narrow the failure".to_string(),
                "Validate object names against the schema supplied".to_string(),
                "Ensure functions and operators match the database dialect".to_string(),
            ],
            ErrorCategory::EmptyResult => vec![
                "Ensure the question truly expects existing data".to_string(),
                "Relax filters and rebuild to reach a non-empty result".to_string(),
                "Confirm referenced tables contain data in the time range".to_string(),
            ],
            ErrorCategory::SyntaxError => vec![
                "Fix the syntax issue identified above".to_string(),
                "Re-run EXPLAIN to validate the updated query".to_string(),
                "Keep result columns aligned with the question".to_string(),
            ],
            ErrorCategory::EvidenceMismatch => vec![
                "Apply each STRICT requirement exactly as described".to_string(),
                "Capture key filters or aggregations from evidence".to_string(),
                "Re-evaluate unit tests mentally before resubmitting".to_string(),
            ],
            ErrorCategory::SchemaError => Vec::new(),
        }
    }
}

fn format_block(title: &str, content: &str) -> String {
    let clean = content.trim();
    if clean.is_empty() {
        return String::new();
    }
    format!("{title}:\n  {}", clean.replace('\n', "\n  "))
}

fn format_list_block(title: &str, items: &[String]) -> String {
    let rows: Vec<&str> = items.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
    if rows.is_empty() {
        return String::new();
    }
    let body = rows.iter().map(|r| format!("  - {r}")).collect::<Vec<_>>().join("\n");
    format!("{title}:\n{body}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_syntax_error_with_dialect_hint() {
        let context = ErrorContext {
            sql: "SELECT * FORM t".to_string(),
            db_type: "SqlServer".to_string(),
            question: "count rows".to_string(),
            error_message: "syntax error near FORM".to_string(),
            ..Default::default()
        };
        let message = ModelRetryFormatter::format_error(ErrorCategory::SyntaxError, &context);
        assert!(message.starts_with("MODEL_RETRY::SYNTAX_ERROR"));
        assert!(message.contains("OFFSET … FETCH"));
    }

    #[test]
    fn history_entry_truncates_long_detail() {
        let context = ErrorContext { error_message: "x".repeat(300), ..Default::default() };
        let entry = ModelRetryFormatter::build_history_entry(ErrorCategory::ExecutionError, &context);
        assert!(entry.ends_with("..."));
        assert!(entry.len() < 220);
    }

    #[test]
    fn validation_section_lists_failed_and_passed() {
        let context = ErrorContext {
            validation_results: vec![
                ValidationResult { name: "t1".to_string(), passed: false, detail: "mismatch".to_string() },
                ValidationResult { name: "t2".to_string(), passed: true, detail: String::new() },
            ],
            ..Default::default()
        };
        let message = ModelRetryFormatter::format_error(ErrorCategory::ValidationFailed, &context);
        assert!(message.contains("Failed Checks"));
        assert!(message.contains("t1: mismatch"));
        assert!(message.contains("1 validations succeeded"));
    }
}
