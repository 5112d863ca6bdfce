//! `POST /explain-sql` (§6.1): a standalone SQL-explainer call, used by
//! clients that already have a SQL string (e.g. a hand-edited one) and want
//! a plain-English explanation without re-running the full pipeline.

use std::time::Instant;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::agents::AgentRole;
use crate::llm::client::{GenerateOptions, Message};

use super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExplainSqlRequest {
    pub workspace_id: i64,
    pub question: String,
    pub generated_sql: String,
    pub database_schema: String,
    #[serde(default)]
    pub evidence: String,
    #[serde(default)]
    pub chain_of_thought: bool,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub username: Option<String>,
}

fn default_language() -> String {
    "english".to_string()
}

#[derive(Debug, Serialize)]
pub struct ExplainSqlResponse {
    pub explanation: String,
    pub execution_time: f64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_used: Option<String>,
}

pub async fn handle(State(state): State<AppState>, Json(request): Json<ExplainSqlRequest>) -> Response {
    let _ = request.workspace_id;
    let started_at = Instant::now();

    let client = match state.agents.client_for(AgentRole::SqlExplainer) {
        Ok(client) => client,
        Err(err) => {
            return Json(ExplainSqlResponse {
                explanation: String::new(),
                execution_time: started_at.elapsed().as_secs_f64(),
                success: false,
                error: Some(err.to_string()),
                agent_used: None,
            })
            .into_response();
        }
    };

    let cot_hint = if request.chain_of_thought { "Think step by step before answering, then give the final explanation." } else { "" };
    let messages = vec![
        Message::system(format!(
            "Explain SQL queries in plain {}. Be concise: two to four sentences. {}",
            request.language, cot_hint
        )),
        Message::user(format!(
            "Question: {}\n\nSchema:\n{}\n\nEvidence: {}\n\nSQL:\n{}",
            request.question, request.database_schema, request.evidence, request.generated_sql
        )),
    ];

    match client.generate(messages, GenerateOptions::default()).await {
        Ok(response) => Json(ExplainSqlResponse {
            explanation: response.content.trim().to_string(),
            execution_time: started_at.elapsed().as_secs_f64(),
            success: true,
            error: None,
            agent_used: Some(AgentRole::SqlExplainer.env_prefix().to_string()),
        })
        .into_response(),
        Err(err) => Json(ExplainSqlResponse {
            explanation: String::new(),
            execution_time: started_at.elapsed().as_secs_f64(),
            success: false,
            error: Some(err.to_string()),
            agent_used: None,
        })
        .into_response(),
    }
}
