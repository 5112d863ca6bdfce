//! Per-request pipeline state: the fields that travel with a question
//! through phases 1-6 and that escalation rewrites when it bumps the
//! functionality level.

use uuid::Uuid;

use crate::escalation::{EscalationHistory, FunctionalityLevel};
use crate::evaluator::EvaluationSummary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// Mutable state threaded through one `/generate-sql` request. Escalation
/// resets `generated_sqls`/`evaluation` and bumps `functionality_level` and
/// `attempt_at_level` without touching `escalation_history`, `keywords`, or
/// the original question fields, which stay fixed for the life of the
/// request.
#[derive(Debug, Clone)]
pub struct SystemState {
    pub session_id: Uuid,
    pub workspace_id: i64,
    pub sqldb_id: i64,
    pub question: String,
    pub original_question: Option<String>,
    pub original_language: Option<String>,
    pub keywords: Vec<String>,
    pub functionality_level: FunctionalityLevel,
    pub attempt_at_level: u32,
    pub generated_sqls: Vec<String>,
    pub evaluation: Option<EvaluationSummary>,
    pub escalation_history: EscalationHistory,
    pub final_sql: Option<String>,
    pub status: RunStatus,
}

impl SystemState {
    pub fn new(session_id: Uuid, workspace_id: i64, sqldb_id: i64, question: String) -> Self {
        Self {
            session_id,
            workspace_id,
            sqldb_id,
            question,
            original_question: None,
            original_language: None,
            keywords: Vec::new(),
            functionality_level: FunctionalityLevel::Basic,
            attempt_at_level: 0,
            generated_sqls: Vec::new(),
            evaluation: None,
            escalation_history: EscalationHistory::default(),
            final_sql: None,
            status: RunStatus::Running,
        }
    }

    /// Seed consumed by `mschema` rendering so every generation slot, level,
    /// and attempt in this request gets a distinct but reproducible shuffle.
    pub fn seed(&self) -> u64 {
        let (hi, lo) = self.session_id.as_u64_pair();
        hi ^ lo ^ (self.functionality_level as u64).wrapping_mul(0x9e3779b97f4a7c15) ^ self.attempt_at_level as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_changes_across_functionality_levels() {
        let mut state = SystemState::new(Uuid::new_v4(), 1, 1, "q".to_string());
        let basic = state.seed();
        state.functionality_level = FunctionalityLevel::Advanced;
        assert_ne!(basic, state.seed());
    }
}
