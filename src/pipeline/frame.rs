//! The streamed frame protocol (§3): each frame is one newline-delimited
//! line of `EVENT_NAME {json payload}\n` written to a `text/plain` response
//! body as the orchestrator progresses through its phases.

use serde::Serialize;
use serde_json::json;

use crate::evaluator::EvaluationSummary;

#[derive(Debug, Clone)]
pub enum Frame {
    ThothLog(String),
    Keywords(Vec<String>),
    SchemaContext { table_count: usize, column_count: usize, strategy: &'static str },
    SimilarQueries(Vec<SimilarQueryFrame>),
    SqlCandidates(Vec<String>),
    TestsGenerated { count: usize },
    EvaluationComplete(EvaluationSummary),
    SqlFormatted(String),
    SqlReady(SqlReadyFrame),
    SqlExplanation(String),
    SystemWarning(String),
    CriticalError(String),
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimilarQueryFrame {
    pub question: String,
    pub sql: String,
    pub score: f32,
}

/// Tri-state status a finalized SQL can carry, derived from the evaluation
/// case that selected it (§4.7/§6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlStatus {
    Gold,
    Silver,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SqlReadyFrame {
    pub sql: String,
    pub workspace_id: i64,
    pub timestamp: i64,
    pub username: Option<String>,
    pub agent: &'static str,
    pub sql_status: SqlStatus,
    pub evaluation_case: String,
    pub pass_rate: f64,
    pub is_silver: bool,
    pub is_gold: bool,
}

impl Frame {
    pub fn event_name(&self) -> &'static str {
        match self {
            Frame::ThothLog(_) => "THOTHLOG",
            Frame::Keywords(_) => "KEYWORDS",
            Frame::SchemaContext { .. } => "SCHEMA_CONTEXT",
            Frame::SimilarQueries(_) => "SIMILAR_QUERIES",
            Frame::SqlCandidates(_) => "SQL_CANDIDATES",
            Frame::TestsGenerated { .. } => "TESTS_GENERATED",
            Frame::EvaluationComplete(_) => "EVALUATION_COMPLETE",
            Frame::SqlFormatted(_) => "SQL_FORMATTED",
            Frame::SqlReady(_) => "SQL_READY",
            Frame::SqlExplanation(_) => "SQL_EXPLANATION",
            Frame::SystemWarning(_) => "SYSTEM_WARNING",
            Frame::CriticalError(_) => "CRITICAL_ERROR",
            Frame::Cancelled => "CANCELLED",
        }
    }

    /// Renders the frame as one `EVENT_NAME {json}\n` line.
    pub fn encode(&self) -> String {
        let payload = match self {
            Frame::ThothLog(message) => json!({ "message": message }),
            Frame::Keywords(keywords) => json!({ "keywords": keywords }),
            Frame::SchemaContext { table_count, column_count, strategy } => {
                json!({ "table_count": table_count, "column_count": column_count, "strategy": strategy })
            }
            Frame::SimilarQueries(queries) => json!({ "queries": queries }),
            Frame::SqlCandidates(candidates) => json!({ "candidates": candidates }),
            Frame::TestsGenerated { count } => json!({ "count": count }),
            Frame::EvaluationComplete(summary) => serde_json::to_value(summary).unwrap_or(json!({})),
            Frame::SqlFormatted(sql) => json!({ "sql": sql }),
            Frame::SqlReady(ready) => serde_json::to_value(ready).unwrap_or(json!({})),
            Frame::SqlExplanation(text) => json!({ "explanation": text }),
            Frame::SystemWarning(message) => json!({ "message": message }),
            Frame::CriticalError(message) => json!({ "message": message }),
            Frame::Cancelled => json!({}),
        };
        format!("{} {}\n", self.event_name(), payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_one_newline_terminated_line() {
        let frame = Frame::Keywords(vec!["county".to_string(), "school".to_string()]);
        let encoded = frame.encode();
        assert!(encoded.starts_with("KEYWORDS "));
        assert!(encoded.ends_with('\n'));
        assert_eq!(encoded.matches('\n').count(), 1);
    }

    #[test]
    fn cancelled_frame_has_empty_payload() {
        assert_eq!(Frame::Cancelled.encode(), "CANCELLED {}\n");
    }
}
