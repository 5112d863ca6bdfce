//! Six-phase streamed state machine (§4.6): question validation, keyword
//! extraction, context retrieval, parallel SQL generation, test generation
//! and evaluation, and selection/escalation/finalization. Every phase
//! re-checks [`CancellationToken::is_cancelled`] before issuing new work.

use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::PgPool;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::timeout;

use crate::agents::diversify::generation_plan;
use crate::agents::prompts::generate_sql_prompt;
use crate::agents::{AgentPool, AgentRole};
use crate::config::Settings;
use crate::database::queries::thothlog::{self, ThothLogEntry};
use crate::dbadapter::DbAdapter;
use crate::error::AppError;
use crate::escalation::{self, FunctionalityLevel};
use crate::evaluator::{classify, CandidateVerdict};
use crate::llm::client::{GenerateOptions, Message};
use crate::schema::{self, lsh::LshIndex, ProjectedSchema};
use crate::vectorstore::{DocumentType, VectorStore};

use super::cancellation::CancellationToken;
use super::delimiter_corrector::correct_sql_delimiters;
use super::frame::{Frame, SqlReadyFrame, SqlStatus, SimilarQueryFrame};
use super::state::{RunStatus, SystemState};

/// Everything a single request's orchestrator run needs; constructed once
/// by the HTTP handler from the warmed session cache entry.
pub struct PipelineContext {
    pub adapter: Arc<dyn DbAdapter>,
    pub vector_store: Option<Arc<dyn VectorStore>>,
    pub lsh_index: Arc<LshIndex>,
    pub agents: Arc<AgentPool>,
    pub settings: Arc<Settings>,
    pub cancellation: CancellationToken,
    pub explain_generated_query: bool,
    pub metadata_pool: PgPool,
    pub username: Option<String>,
}

/// Writes the end-of-run `ThothLog` row (§4.6 phase 6 / §6.3). Never called
/// on the cancellation path — the caller returns before reaching this for a
/// client-disconnected run, per §4.6.2's "no ThothLog" rule.
async fn write_thothlog(
    ctx: &PipelineContext,
    state: &SystemState,
    sql: String,
    sql_status: &'static str,
    started_at: Instant,
) {
    let entry = ThothLogEntry {
        workspace_id: state.workspace_id,
        username: ctx.username.clone(),
        question: state.question.clone(),
        sql,
        sql_status: sql_status.to_string(),
        evaluation_case: state.evaluation.as_ref().map(|e| format!("{:?}", e.case)),
        pass_rate: state.evaluation.as_ref().map(|e| e.best_pass_rate),
        agent: Some(role_for_level(state.functionality_level).env_prefix().to_string()),
        duration_ms: started_at.elapsed().as_millis() as i64,
    };
    if let Err(err) = thothlog::insert(&ctx.metadata_pool, entry).await {
        tracing::warn!(error = %err, "failed to persist ThothLog row");
    }
}

fn role_for_level(level: FunctionalityLevel) -> AgentRole {
    match level {
        FunctionalityLevel::Basic => AgentRole::SqlBasic,
        FunctionalityLevel::Advanced => AgentRole::SqlAdvanced,
        FunctionalityLevel::Expert => AgentRole::SqlExpert,
    }
}

static SQL_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```sql\s*(.*?)```").unwrap());

fn extract_sql(text: &str) -> Option<String> {
    if let Some(captures) = SQL_FENCE.captures(text) {
        let body = captures.get(1)?.as_str().trim();
        if !body.is_empty() {
            return Some(body.to_string());
        }
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Sends one frame; a failed send means the receiver side of the channel
/// (the HTTP response body stream) was dropped, which only happens when the
/// client disconnected mid-run. That's treated as cancellation so the next
/// `is_cancelled` check stops the pipeline instead of running phases for a
/// client that's gone, mirroring the original's `http_request.is_disconnected()`
/// checks between phases.
async fn emit(tx: &mpsc::Sender<Frame>, cancellation: &CancellationToken, frame: Frame) {
    if let Frame::ThothLog(message) = &frame {
        tracing::info!(message = %message, "pipeline progress");
    }
    if tx.send(frame).await.is_err() {
        cancellation.mark_disconnected();
    }
}

/// Runs the full pipeline for one question, streaming [`Frame`]s to `tx` as
/// each phase completes. Returns the terminal [`RunStatus`] alongside the
/// final [`SystemState`] (so the caller can persist feedback hooks like
/// `/save-sql-feedback`'s last-run cache); the caller (the `/generate-sql`
/// handler) is responsible for closing the response body once the channel
/// drains.
pub async fn run(ctx: PipelineContext, mut state: SystemState, tx: mpsc::Sender<Frame>) -> (RunStatus, SystemState) {
    let started_at = Instant::now();
    if ctx.cancellation.is_cancelled().await {
        emit(&tx, &ctx.cancellation, Frame::Cancelled).await;
        state.status = RunStatus::Cancelled;
        return (RunStatus::Cancelled, state);
    }

    // Phase 1: question validation & translation.
    let validator = match ctx.agents.client_for(AgentRole::QuestionValidator) {
        Ok(client) => client,
        Err(err) => {
            emit(&tx, &ctx.cancellation, Frame::CriticalError(err.to_string())).await;
            write_thothlog(&ctx, &state, format!("ERROR: {err}"), "FAILED", started_at).await;
            state.status = RunStatus::Failed;
            return (RunStatus::Failed, state);
        }
    };
    let validation = validator
        .generate(
            vec![
                Message::system(
                    "You validate natural-language questions intended for SQL generation. \
                     Reply with exactly one line: either `VALID` or `INVALID: <reason>`. \
                     If the question is not in English, reply `NEEDS_TRANSLATION` instead.",
                ),
                Message::user(state.question.clone()),
            ],
            GenerateOptions::default(),
        )
        .await;
    match validation {
        Ok(response) => {
            let content = response.content.trim();
            if let Some(reason) = content.strip_prefix("INVALID:") {
                emit(&tx, &ctx.cancellation, Frame::CriticalError(format!("question rejected: {}", reason.trim()))).await;
                write_thothlog(&ctx, &state, format!("ERROR: question rejected: {}", reason.trim()), "FAILED", started_at).await;
                state.status = RunStatus::Failed;
                return (RunStatus::Failed, state);
            }
            if content == "NEEDS_TRANSLATION" {
                match ctx.agents.client_for(AgentRole::QuestionTranslator) {
                    Ok(translator) => {
                        let translation = translator
                            .generate(
                                vec![
                                    Message::system(
                                        "Translate the user's question to English. Reply with only the \
                                         translated question, no commentary.",
                                    ),
                                    Message::user(state.question.clone()),
                                ],
                                GenerateOptions::default(),
                            )
                            .await;
                        match translation {
                            Ok(response) => {
                                state.original_question = Some(state.question.clone());
                                state.original_language = Some("non-english".to_string());
                                state.question = response.content.trim().to_string();
                                emit(&tx, &ctx.cancellation, Frame::ThothLog("question translated".to_string())).await;
                            }
                            Err(err) => {
                                emit(&tx, &ctx.cancellation, Frame::CriticalError(err.to_string())).await;
                                write_thothlog(&ctx, &state, format!("ERROR: {err}"), "FAILED", started_at).await;
                                state.status = RunStatus::Failed;
                                return (RunStatus::Failed, state);
                            }
                        }
                    }
                    Err(err) => {
                        emit(&tx, &ctx.cancellation, Frame::CriticalError(err.to_string())).await;
                        write_thothlog(&ctx, &state, format!("ERROR: {err}"), "FAILED", started_at).await;
                        state.status = RunStatus::Failed;
                        return (RunStatus::Failed, state);
                    }
                }
            }
            emit(&tx, &ctx.cancellation, Frame::ThothLog("question validated".to_string())).await;
        }
        Err(err) => {
            emit(&tx, &ctx.cancellation, Frame::CriticalError(err.to_string())).await;
            write_thothlog(&ctx, &state, format!("ERROR: {err}"), "FAILED", started_at).await;
            state.status = RunStatus::Failed;
            return (RunStatus::Failed, state);
        }
    }

    if ctx.cancellation.is_cancelled().await {
        emit(&tx, &ctx.cancellation, Frame::Cancelled).await;
        state.status = RunStatus::Cancelled;
        return (RunStatus::Cancelled, state);
    }

    // Phase 2: keyword extraction.
    let keyword_client = match ctx.agents.client_for(AgentRole::KeywordExtractor) {
        Ok(client) => client,
        Err(err) => {
            emit(&tx, &ctx.cancellation, Frame::CriticalError(err.to_string())).await;
            write_thothlog(&ctx, &state, format!("ERROR: {err}"), "FAILED", started_at).await;
            state.status = RunStatus::Failed;
            return (RunStatus::Failed, state);
        }
    };
    let keywords_response = keyword_client
        .generate(
            vec![
                Message::system(
                    "Extract the key entities and terms from the question that matter for finding \
                     relevant database tables and columns. Reply with a single comma-separated line, \
                     no other text.",
                ),
                Message::user(state.question.clone()),
            ],
            GenerateOptions::default(),
        )
        .await;
    let keywords: Vec<String> = match keywords_response {
        Ok(response) => response
            .content
            .split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect(),
        Err(err) => {
            emit(&tx, &ctx.cancellation, Frame::CriticalError(err.to_string())).await;
            write_thothlog(&ctx, &state, format!("ERROR: {err}"), "FAILED", started_at).await;
            state.status = RunStatus::Failed;
            return (RunStatus::Failed, state);
        }
    };
    if keywords.is_empty() {
        emit(&tx, &ctx.cancellation, Frame::CriticalError("keyword extraction produced no keywords".to_string())).await;
        write_thothlog(&ctx, &state, "ERROR: keyword extraction produced no keywords".to_string(), "FAILED", started_at).await;
        state.status = RunStatus::Failed;
        return (RunStatus::Failed, state);
    }
    state.keywords = keywords.clone();
    emit(&tx, &ctx.cancellation, Frame::Keywords(keywords.clone())).await;

    if ctx.cancellation.is_cancelled().await {
        emit(&tx, &ctx.cancellation, Frame::Cancelled).await;
        state.status = RunStatus::Cancelled;
        return (RunStatus::Cancelled, state);
    }

    // Phase 3: context retrieval.
    let similar_queries = if let Some(store) = &ctx.vector_store {
        match store.search_similar(&state.question, DocumentType::Sql, 3, 0.3).await {
            Ok(hits) => hits
                .into_iter()
                .filter_map(|doc| match doc {
                    crate::vectorstore::Document::Sql(d) => {
                        Some(SimilarQueryFrame { question: d.question, sql: d.sql, score: 1.0 })
                    }
                    _ => None,
                })
                .collect::<Vec<_>>(),
            Err(err) => {
                emit(&tx, &ctx.cancellation, Frame::SystemWarning(format!("similar-query lookup degraded: {err}"))).await;
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };
    if !similar_queries.is_empty() {
        emit(&tx, &ctx.cancellation, Frame::SimilarQueries(similar_queries.clone())).await;
    }

    if ctx.lsh_index.is_empty() {
        let err = AppError::ai_agent("Failed to extract schema using LSH: index file missing or empty")
            .with_context("component", "lsh_extraction");
        emit(&tx, &ctx.cancellation, Frame::CriticalError(err.to_string())).await;
        write_thothlog(&ctx, &state, "ERROR: Failed to extract schema using LSH".to_string(), "FAILED", started_at).await;
        state.status = RunStatus::Failed;
        return (RunStatus::Failed, state);
    }

    let mut projected = match schema::derive_schema(ctx.adapter.as_ref(), ctx.lsh_index.as_ref(), &keywords).await {
        Ok(schema) => schema,
        Err(err) => {
            emit(&tx, &ctx.cancellation, Frame::CriticalError(err.to_string())).await;
            write_thothlog(&ctx, &state, format!("ERROR: {err}"), "FAILED", started_at).await;
            state.status = RunStatus::Failed;
            return (RunStatus::Failed, state);
        }
    };

    if let Some(store) = &ctx.vector_store {
        if !schema::enrichment::enrich(&mut projected, store).await {
            emit(&tx, &ctx.cancellation, Frame::SystemWarning("schema enrichment degraded: some column descriptions unavailable".to_string())).await;
        }
    }

    let strategy = schema::link::decide(&projected, &keywords);
    let final_schema = match strategy {
        schema::SchemaLinkStrategy::WithSchemaLink => {
            let matched = schema::link::matching_tables(&projected, &keywords);
            projected.pruned_to(&matched)
        }
        schema::SchemaLinkStrategy::WithoutSchemaLink => projected,
    };

    emit(
        &tx,
        Frame::SchemaContext {
            table_count: final_schema.tables.len(),
            column_count: final_schema.column_count(),
            strategy: match strategy {
                schema::SchemaLinkStrategy::WithSchemaLink => "with_schema_link",
                schema::SchemaLinkStrategy::WithoutSchemaLink => "without_schema_link",
            },
        },
    )
    .await;

    let example_shots = similar_queries
        .iter()
        .map(|q| format!("Q: {}\nSQL: {}", q.question, q.sql))
        .collect::<Vec<_>>()
        .join("\n\n");
    let evidence = String::new();

    // Phases 4-6: generate, evaluate, select, escalate until success or
    // the EXPERT level is exhausted.
    loop {
        if ctx.cancellation.is_cancelled().await {
            emit(&tx, &ctx.cancellation, Frame::Cancelled).await;
            state.status = RunStatus::Cancelled;
            return (RunStatus::Cancelled, state);
        }
        state.attempt_at_level += 1;

        let db_healthy = ctx.adapter.health_check().await;
        if !db_healthy {
            if let Some((next_level, record, _context)) = escalation::handle_escalation(
                state.functionality_level,
                None,
                state.attempt_at_level,
                &state.question,
                Vec::new(),
                true,
            ) {
                emit(&tx, &ctx.cancellation, Frame::SystemWarning(format!("database unavailable, escalating to {}", next_level.display_name()))).await;
                state.escalation_history.push(record);
                state.functionality_level = next_level;
                state.attempt_at_level = 0;
                continue;
            }
            emit(&tx, &ctx.cancellation, Frame::CriticalError("target database is unavailable".to_string())).await;
            state.status = RunStatus::Failed;
            write_thothlog(&ctx, &state, "ERROR: target database is unavailable".to_string(), "FAILED", started_at).await;
            state.status = RunStatus::Failed;
            return (RunStatus::Failed, state);
        }

        let candidates = generate_candidates(&ctx, &state, &final_schema, &evidence, &example_shots).await;
        if ctx.cancellation.is_cancelled().await {
            emit(&tx, &ctx.cancellation, Frame::Cancelled).await;
            state.status = RunStatus::Cancelled;
            return (RunStatus::Cancelled, state);
        }

        if candidates.is_empty() {
            match escalation::handle_escalation(
                state.functionality_level,
                None,
                state.attempt_at_level,
                &state.question,
                Vec::new(),
                false,
            ) {
                Some((next_level, record, _context)) => {
                    emit(&tx, &ctx.cancellation, Frame::SystemWarning("no SQL candidates generated, escalating".to_string())).await;
                    state.escalation_history.push(record);
                    state.functionality_level = next_level;
                    state.attempt_at_level = 0;
                    continue;
                }
                None => {
                    emit(&tx, &ctx.cancellation, Frame::CriticalError("no SQL candidates could be generated at any escalation level".to_string())).await;
                    state.status = RunStatus::Failed;
                    write_thothlog(
                        &ctx,
                        &state,
                        "ERROR: no SQL candidates could be generated at any escalation level".to_string(),
                        "FAILED",
                        started_at,
                    )
                    .await;
                    state.status = RunStatus::Failed;
                    return (RunStatus::Failed, state);
                }
            }
        }
        state.generated_sqls = candidates.clone();
        emit(&tx, &ctx.cancellation, Frame::SqlCandidates(candidates.clone())).await;

        let verdicts = evaluate_candidates(&ctx, &state, &candidates).await;
        emit(&tx, &ctx.cancellation, Frame::TestsGenerated { count: verdicts.first().map(|v| v.test_results.len()).unwrap_or(0) }).await;

        let summary = classify(&verdicts, ctx.settings.silver_threshold);
        state.evaluation = Some(summary.clone());
        emit(&tx, &ctx.cancellation, Frame::EvaluationComplete(summary.clone())).await;

        if summary.case != crate::evaluator::EvaluationCase::D {
            let selected_sql = summary
                .selected_index
                .and_then(|idx| candidates.get(idx))
                .cloned()
                .unwrap_or_default();
            let formatted = correct_sql_delimiters(&selected_sql, ctx.adapter.dialect());
            state.final_sql = Some(formatted.clone());
            state.status = RunStatus::Succeeded;
            emit(&tx, &ctx.cancellation, Frame::SqlFormatted(formatted.clone())).await;

            let sql_status = match summary.case {
                crate::evaluator::EvaluationCase::A | crate::evaluator::EvaluationCase::B => SqlStatus::Gold,
                _ => SqlStatus::Silver,
            };
            emit(
                &tx,
                Frame::SqlReady(SqlReadyFrame {
                    sql: formatted.clone(),
                    workspace_id: state.workspace_id,
                    timestamp: chrono::Utc::now().timestamp(),
                    username: ctx.username.clone(),
                    agent: role_for_level(state.functionality_level).env_prefix(),
                    sql_status,
                    evaluation_case: format!("{:?}", summary.case),
                    pass_rate: summary.best_pass_rate,
                    is_silver: sql_status == SqlStatus::Silver,
                    is_gold: sql_status == SqlStatus::Gold,
                }),
            )
            .await;

            if ctx.explain_generated_query {
                if let Ok(explainer) = ctx.agents.client_for(AgentRole::SqlExplainer) {
                    let explanation = explainer
                        .generate(
                            vec![
                                Message::system("Explain, in plain English and two or three sentences, what the following SQL query does."),
                                Message::user(formatted.clone()),
                            ],
                            GenerateOptions::default(),
                        )
                        .await;
                    if let Ok(response) = explanation {
                        emit(&tx, &ctx.cancellation, Frame::SqlExplanation(response.content.trim().to_string())).await;
                    }
                }
            }
            emit(&tx, &ctx.cancellation, Frame::ThothLog("pipeline succeeded".to_string())).await;
            let sql_status_str = if sql_status == SqlStatus::Gold { "GOLD" } else { "SILVER" };
            write_thothlog(&ctx, &state, formatted.clone(), sql_status_str, started_at).await;
            state.status = RunStatus::Succeeded;
            return (RunStatus::Succeeded, state);
        }

        match escalation::handle_escalation(
            state.functionality_level,
            Some(&summary),
            state.attempt_at_level,
            &state.question,
            candidates.clone(),
            false,
        ) {
            Some((next_level, record, _context)) => {
                emit(&tx, &ctx.cancellation, Frame::SystemWarning(format!(
                    "no candidate cleared the silver threshold, escalating to {}",
                    next_level.display_name()
                )))
                .await;
                state.escalation_history.push(record);
                state.functionality_level = next_level;
                state.attempt_at_level = 0;
            }
            None => {
                let message = format!(
                    "FAILED: best pass rate {:.2} never reached the silver threshold, even at EXPERT",
                    summary.best_pass_rate
                );
                if let Ok(ask_human) = ctx.agents.client_for(AgentRole::AskHuman) {
                    let prompt = format!(
                        "No generated SQL passed evaluation for this question, even at the highest \
                         escalation level. Write one short sentence a human reviewer could use to decide \
                         what's missing or ambiguous about the question.\n\nQuestion: {}",
                        state.question
                    );
                    if let Ok(response) = ask_human.generate(vec![Message::user(prompt)], GenerateOptions::default()).await {
                        emit(&tx, &ctx.cancellation, Frame::SystemWarning(format!("needs human review: {}", response.content.trim())))
                            .await;
                    }
                }
                emit(&tx, &ctx.cancellation, Frame::CriticalError(message.clone())).await;
                state.status = RunStatus::Failed;
                emit(&tx, &ctx.cancellation, Frame::ThothLog("pipeline failed".to_string())).await;
                write_thothlog(&ctx, &state, format!("ERROR: {message}"), "FAILED", started_at).await;
                state.status = RunStatus::Failed;
                return (RunStatus::Failed, state);
            }
        }
    }
}

async fn generate_candidates(
    ctx: &PipelineContext,
    state: &SystemState,
    schema: &ProjectedSchema,
    evidence: &str,
    example_shots: &str,
) -> Vec<String> {
    let role = role_for_level(state.functionality_level);
    let count = ctx.settings.default_number_of_sql_to_generate;
    let plan = generation_plan(count);
    let semaphore = Arc::new(Semaphore::new(ctx.settings.max_parallel_sqls));
    let dialect_label = ctx.adapter.dialect().as_str();
    let seed = state.seed();

    let tasks = plan.into_iter().enumerate().map(|(i, (method, temperature))| {
        let semaphore = semaphore.clone();
        let agents = ctx.agents.clone();
        let question = state.question.clone();
        let schema_text = schema::render_mschema(schema, seed, i as u64, true);
        let evidence = evidence.to_string();
        let example_shots = example_shots.to_string();
        let candidate_timeout = ctx.settings.sql_candidate_timeout;

        async move {
            let _permit = semaphore.acquire_owned().await.ok()?;
            let client = agents.client_for_with_temperature(role, temperature).ok()?;
            let prompt = generate_sql_prompt(method, &question, dialect_label, &schema_text, "", &evidence, &example_shots).ok()?;
            let call = client.generate(vec![Message::user(prompt)], GenerateOptions { temperature: Some(temperature), ..Default::default() });
            match timeout(candidate_timeout, call).await {
                Ok(Ok(response)) => extract_sql(&response.content),
                _ => None,
            }
        }
    });

    let results = futures::future::join_all(tasks).await;

    let mut seen = std::collections::HashSet::new();
    let mut ordered = Vec::new();
    for sql in results.into_iter().flatten() {
        let key = sql.trim().to_string();
        if seen.insert(key.clone()) {
            ordered.push(key);
        }
    }
    ordered
}

/// Runs `TestGenerator` and `TestGenerator2` in parallel, dedupes the
/// union of their assertions preserving generation order, and — only when
/// both generators actually produced tests and the unique count clears
/// `test_reducer_threshold` — hands the set to `TestReducer` for semantic
/// reconciliation. Below the threshold the plain deduplicated list is used
/// directly, matching the original's "only enable semantic filtering when
/// multiple test generators are active" gate.
async fn generate_tests(ctx: &PipelineContext, state: &SystemState) -> Vec<String> {
    async fn one_generator(ctx: &PipelineContext, state: &SystemState, role: AgentRole) -> Vec<String> {
        let client = match ctx.agents.client_for(role) {
            Ok(client) => client,
            Err(_) => return Vec::new(),
        };
        let response = client
            .generate(
                vec![
                    Message::system(
                        "Produce a short list of plain-English assertions a correct SQL answer to this \
                         question must satisfy. One assertion per line, no numbering.",
                    ),
                    Message::user(state.question.clone()),
                ],
                GenerateOptions::default(),
            )
            .await;
        match response {
            Ok(response) => response.content.lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect(),
            Err(_) => Vec::new(),
        }
    }

    let (primary, secondary) = tokio::join!(
        one_generator(ctx, state, AgentRole::TestGenerator),
        one_generator(ctx, state, AgentRole::TestGenerator2),
    );
    let both_active = !primary.is_empty() && !secondary.is_empty();

    let mut seen = std::collections::HashSet::new();
    let unique_tests: Vec<String> =
        primary.into_iter().chain(secondary).filter(|l| seen.insert(l.clone())).collect();

    if !both_active || unique_tests.len() <= ctx.settings.test_reducer_threshold {
        return unique_tests;
    }

    match ctx.agents.client_for(AgentRole::TestReducer) {
        Ok(reducer) => {
            let prompt = format!(
                "Question: {}\n\nThe assertions below overlap semantically. Merge near-duplicates and \
                 drop anything not essential to verifying a correct answer. Reply with the reduced list, \
                 one assertion per line, no numbering:\n{}",
                state.question,
                unique_tests.join("\n")
            );
            match reducer.generate(vec![Message::user(prompt)], GenerateOptions::default()).await {
                Ok(response) => {
                    let reduced: Vec<String> =
                        response.content.lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect();
                    if reduced.is_empty() {
                        unique_tests
                    } else {
                        reduced
                    }
                }
                Err(_) => unique_tests,
            }
        }
        Err(_) => unique_tests,
    }
}

async fn evaluate_candidates(ctx: &PipelineContext, state: &SystemState, candidates: &[String]) -> Vec<CandidateVerdict> {
    let tests = generate_tests(ctx, state).await;

    if tests.is_empty() {
        return candidates.iter().map(|sql| CandidateVerdict { sql: sql.clone(), test_results: Vec::new() }).collect();
    }

    let semaphore = Arc::new(Semaphore::new(ctx.settings.max_parallel_tests));
    let tasks = candidates.iter().cloned().map(|sql| {
        let semaphore = semaphore.clone();
        let evaluator = ctx.agents.client_for_with_temperature(AgentRole::Evaluator, 0.2);
        let tests = tests.clone();
        async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let results = match evaluator {
                Ok(client) => {
                    let prompt = format!(
                        "SQL:\n{sql}\n\nFor each assertion below, reply OK if the SQL satisfies it or KO if not, \
                         one verdict per line in the same order:\n{}",
                        tests.join("\n")
                    );
                    match client.generate(vec![Message::user(prompt)], GenerateOptions::default()).await {
                        Ok(response) => {
                            let verdicts: Vec<bool> = response
                                .content
                                .lines()
                                .map(|l| l.trim().to_uppercase().starts_with("OK"))
                                .collect();
                            if verdicts.len() == tests.len() {
                                verdicts
                            } else {
                                vec![false; tests.len()]
                            }
                        }
                        Err(_) => vec![false; tests.len()],
                    }
                }
                Err(_) => vec![false; tests.len()],
            };
            CandidateVerdict { sql, test_results: results }
        }
    });

    futures::future::join_all(tasks).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_sql_prefers_fenced_block() {
        let text = "Here you go:\n```sql\nSELECT 1\n```\nHope that helps.";
        assert_eq!(extract_sql(text), Some("SELECT 1".to_string()));
    }

    #[test]
    fn extract_sql_falls_back_to_trimmed_body_without_fence() {
        let text = "  SELECT 1  ";
        assert_eq!(extract_sql(text), Some("SELECT 1".to_string()));
    }

    #[test]
    fn extract_sql_returns_none_for_blank_response() {
        assert_eq!(extract_sql("   "), None);
    }
}
