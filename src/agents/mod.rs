//! Agent pool (§4.5): typed LLM client slots spanning the pipeline's
//! phases, plus the diversification policy used to spread parallel SQL
//! generation calls across methods and temperatures.

pub mod diversify;
pub mod prompts;
pub mod retry;

use std::collections::HashMap;

use crate::config::Settings;
use crate::error::AppError;
use crate::llm::{LlmClient, ModelSpec};

/// One entry per reasoning task the orchestrator hands off to an LLM.
/// `SqlBasic`/`SqlAdvanced`/`SqlExpert` back the escalation chain (§4.8);
/// `TestGenerator`/`TestGenerator2` run in parallel to diversify test
/// coverage, reconciled by `TestReducer` when both fire; `AskHuman` is the
/// terminal fallback when escalation exhausts EXPERT with no gold/silver
/// candidate. The rest are single-purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentRole {
    QuestionValidator,
    QuestionTranslator,
    KeywordExtractor,
    SqlBasic,
    SqlAdvanced,
    SqlExpert,
    TestGenerator,
    TestGenerator2,
    TestReducer,
    Evaluator,
    SqlExplainer,
    ResultSummarizer,
    AskHuman,
}

impl AgentRole {
    pub const ALL: [AgentRole; 13] = [
        AgentRole::QuestionValidator,
        AgentRole::QuestionTranslator,
        AgentRole::KeywordExtractor,
        AgentRole::SqlBasic,
        AgentRole::SqlAdvanced,
        AgentRole::SqlExpert,
        AgentRole::TestGenerator,
        AgentRole::TestGenerator2,
        AgentRole::TestReducer,
        AgentRole::Evaluator,
        AgentRole::SqlExplainer,
        AgentRole::ResultSummarizer,
        AgentRole::AskHuman,
    ];

    pub fn env_prefix(self) -> &'static str {
        match self {
            AgentRole::QuestionValidator => "QUESTION_VALIDATOR",
            AgentRole::QuestionTranslator => "QUESTION_TRANSLATOR",
            AgentRole::KeywordExtractor => "KEYWORD_EXTRACTOR",
            AgentRole::SqlBasic => "SQL_BASIC",
            AgentRole::SqlAdvanced => "SQL_ADVANCED",
            AgentRole::SqlExpert => "SQL_EXPERT",
            AgentRole::TestGenerator => "TEST_GENERATOR",
            AgentRole::TestGenerator2 => "TEST_GENERATOR_2",
            AgentRole::TestReducer => "TEST_REDUCER",
            AgentRole::Evaluator => "EVALUATOR",
            AgentRole::SqlExplainer => "SQL_EXPLAINER",
            AgentRole::ResultSummarizer => "RESULT_SUMMARIZER",
            AgentRole::AskHuman => "ASK_HUMAN",
        }
    }

    pub fn functionality_level(self) -> Option<&'static str> {
        match self {
            AgentRole::SqlBasic => Some("BASIC"),
            AgentRole::SqlAdvanced => Some("ADVANCED"),
            AgentRole::SqlExpert => Some("EXPERT"),
            _ => None,
        }
    }
}

/// Resolves each role's model from `{ROLE}_PROVIDER` / `{ROLE}_MODEL` env
/// vars (falling back to a shared `DEFAULT_PROVIDER`/`DEFAULT_MODEL` pair),
/// and hands out a fresh [`LlmClient`] per call — clients are cheap, holding
/// only a [`reqwest::Client`] handle and the resolved [`ModelSpec`].
pub struct AgentPool {
    http: reqwest::Client,
    specs: HashMap<AgentRole, ModelSpec>,
}

impl AgentPool {
    pub fn from_settings(http: reqwest::Client, settings: &Settings) -> Result<Self, AppError> {
        let mut specs = HashMap::new();
        for role in AgentRole::ALL {
            specs.insert(role, resolve_spec(role, settings)?);
        }
        Ok(Self { http, specs })
    }

    pub fn client_for(&self, role: AgentRole) -> Result<LlmClient, AppError> {
        let spec = self
            .specs
            .get(&role)
            .ok_or_else(|| AppError::configuration(format!("no model configured for {role:?}")))?
            .clone();
        Ok(LlmClient::new(self.http.clone(), spec))
    }

    /// A role's client pinned to a specific generation temperature, used by
    /// the diversified SQL-generation fan-out (§4.5, §4.6 phase 4).
    pub fn client_for_with_temperature(&self, role: AgentRole, temperature: f32) -> Result<LlmClient, AppError> {
        let spec = self
            .specs
            .get(&role)
            .ok_or_else(|| AppError::configuration(format!("no model configured for {role:?}")))?
            .clone()
            .with_temperature(temperature);
        Ok(LlmClient::new(self.http.clone(), spec))
    }
}

fn resolve_spec(role: AgentRole, settings: &Settings) -> Result<ModelSpec, AppError> {
    let prefix = role.env_prefix();
    let provider_str = std::env::var(format!("{prefix}_PROVIDER"))
        .or_else(|_| std::env::var("DEFAULT_PROVIDER"))
        .unwrap_or_else(|_| "openai".to_string());
    let model_id = std::env::var(format!("{prefix}_MODEL"))
        .or_else(|_| std::env::var("DEFAULT_MODEL"))
        .unwrap_or_else(|_| "gpt-4o-mini".to_string());

    let provider = crate::llm::Provider::parse(&provider_str)
        .ok_or_else(|| AppError::configuration(format!("unknown provider '{provider_str}' for {role:?}")))?;

    let mut spec = ModelSpec::new(provider, model_id);
    if let Ok(key) = std::env::var(format!("{prefix}_API_KEY")) {
        spec = spec.with_api_key(key);
    }
    if let Ok(base_url) = std::env::var(format!("{prefix}_BASE_URL")) {
        spec = spec.with_base_url(base_url);
    }
    let _ = settings;
    Ok(spec)
}
