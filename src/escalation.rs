//! Escalation manager (§4.8): governs the BASIC → ADVANCED → EXPERT
//! functionality-level chain used when an evaluation round lands in Case D,
//! when the generation phase produces no candidates at all, or when an
//! adapter reports the target database itself is unavailable.

use serde::Serialize;

use crate::evaluator::{EvaluationCase, EvaluationSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FunctionalityLevel {
    Basic,
    Advanced,
    Expert,
}

impl FunctionalityLevel {
    const CHAIN: [FunctionalityLevel; 3] =
        [FunctionalityLevel::Basic, FunctionalityLevel::Advanced, FunctionalityLevel::Expert];

    pub fn display_name(self) -> &'static str {
        match self {
            FunctionalityLevel::Basic => "BASIC",
            FunctionalityLevel::Advanced => "ADVANCED",
            FunctionalityLevel::Expert => "EXPERT",
        }
    }

    pub fn next(self) -> Option<FunctionalityLevel> {
        let idx = Self::CHAIN.iter().position(|l| *l == self)?;
        Self::CHAIN.get(idx + 1).copied()
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "basic" => Some(FunctionalityLevel::Basic),
            "advanced" => Some(FunctionalityLevel::Advanced),
            "expert" => Some(FunctionalityLevel::Expert),
            _ => None,
        }
    }
}

pub const MAX_ATTEMPTS_PER_LEVEL: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EscalationReason {
    AllFailedEvaluation,
    NoSqlGenerated,
    ExecutionFailed,
}

impl EscalationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            EscalationReason::AllFailedEvaluation => "all_sql_failed_evaluation",
            EscalationReason::NoSqlGenerated => "no_sql_generated",
            EscalationReason::ExecutionFailed => "execution_failed",
        }
    }
}

/// Everything the next functionality level's SQL prompt needs to know about
/// why it is being asked to try again, rendered once as a deterministic
/// text block so the prompt template can drop it straight into `directives`.
#[derive(Debug, Clone)]
pub struct EscalationContext {
    pub reason: EscalationReason,
    pub previous_level: FunctionalityLevel,
    pub question: String,
    pub failed_sqls: Vec<String>,
    pub evaluation: Option<EvaluationSummary>,
    pub attempt_count: u32,
}

impl EscalationContext {
    pub fn to_context_string(&self) -> String {
        let mut lines = vec![
            "ESCALATION CONTEXT:".to_string(),
            format!("Reason: {}", self.reason.as_str()),
            format!("Previous Level: {}", self.previous_level.display_name()),
            format!("Question: {}", self.question),
        ];

        if !self.failed_sqls.is_empty() {
            lines.push("Failed SQL:".to_string());
            for sql in self.failed_sqls.iter().take(3) {
                lines.push(format!("  - {}", sql.trim()));
            }
            if self.failed_sqls.len() > 3 {
                lines.push(format!("  ... and {} more", self.failed_sqls.len() - 3));
            }
        }

        if let Some(summary) = &self.evaluation {
            lines.push(format!(
                "Evaluation: case={:?}, best_pass_rate={:.2}",
                summary.case, summary.best_pass_rate
            ));
        }

        lines.push(format!("Previous attempts at this level: {}", self.attempt_count));
        lines.join("\n")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EscalationRecord {
    pub from_level: &'static str,
    pub to_level: &'static str,
    pub reason: &'static str,
    pub context_string: String,
}

/// Append-only record of every escalation that happened for a request; the
/// orchestrator carries this in its run state and never mutates past
/// entries, only appends.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EscalationHistory {
    pub records: Vec<EscalationRecord>,
}

impl EscalationHistory {
    pub fn push(&mut self, record: EscalationRecord) {
        self.records.push(record);
    }
}

/// Whether the current level/attempt should escalate, given the last
/// evaluation's outcome. `attempt_count` is 1-indexed (this is the Nth try
/// at `current_level`). `db_unavailable` reports the `CRITICAL_DB_ERROR`
/// sentinel surfaced by a DB adapter during candidate generation.
pub fn should_escalate(
    current_level: FunctionalityLevel,
    evaluation: Option<&EvaluationSummary>,
    attempt_count: u32,
    db_unavailable: bool,
) -> Option<EscalationReason> {
    if current_level == FunctionalityLevel::Expert {
        return None;
    }

    if db_unavailable {
        return Some(EscalationReason::ExecutionFailed);
    }

    if attempt_count >= MAX_ATTEMPTS_PER_LEVEL {
        return Some(EscalationReason::AllFailedEvaluation);
    }

    match evaluation {
        None => Some(EscalationReason::NoSqlGenerated),
        Some(summary) if summary.case == EvaluationCase::D => Some(EscalationReason::AllFailedEvaluation),
        Some(_) => None,
    }
}

/// Runs the full decision: returns the next level plus the context the next
/// attempt's prompt should carry, or `None` if no escalation should happen
/// (either the result was good enough, or EXPERT has already been
/// exhausted — the caller should treat the latter as a terminal FAILED
/// outcome).
pub fn handle_escalation(
    current_level: FunctionalityLevel,
    evaluation: Option<&EvaluationSummary>,
    attempt_count: u32,
    question: &str,
    failed_sqls: Vec<String>,
    db_unavailable: bool,
) -> Option<(FunctionalityLevel, EscalationRecord, EscalationContext)> {
    let reason = should_escalate(current_level, evaluation, attempt_count, db_unavailable)?;
    let next_level = current_level.next()?;

    let context = EscalationContext {
        reason,
        previous_level: current_level,
        question: question.to_string(),
        failed_sqls,
        evaluation: evaluation.cloned(),
        attempt_count,
    };
    let record = EscalationRecord {
        from_level: current_level.display_name(),
        to_level: next_level.display_name(),
        reason: reason.as_str(),
        context_string: context.to_context_string(),
    };
    Some((next_level, record, context))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(case: EvaluationCase) -> EvaluationSummary {
        EvaluationSummary { case, best_pass_rate: 0.4, selected_index: None, perfect_indices: vec![], above_threshold_indices: vec![] }
    }

    #[test]
    fn case_d_at_basic_escalates_to_advanced() {
        let (level, record, context) = handle_escalation(
            FunctionalityLevel::Basic,
            Some(&summary(EvaluationCase::D)),
            1,
            "how many schools",
            vec!["SELECT 1".to_string()],
            false,
        )
        .unwrap();
        assert_eq!(level, FunctionalityLevel::Advanced);
        assert_eq!(record.reason, "all_sql_failed_evaluation");
        assert!(context.to_context_string().contains("ESCALATION CONTEXT"));
    }

    #[test]
    fn case_c_does_not_escalate() {
        let result =
            handle_escalation(FunctionalityLevel::Basic, Some(&summary(EvaluationCase::C)), 1, "q", vec![], false);
        assert!(result.is_none());
    }

    #[test]
    fn expert_level_never_escalates_further() {
        let result = handle_escalation(
            FunctionalityLevel::Expert,
            Some(&summary(EvaluationCase::D)),
            1,
            "q",
            vec![],
            false,
        );
        assert!(result.is_none());
    }

    #[test]
    fn max_attempts_forces_escalation_even_without_case_d() {
        let (level, record, _) =
            handle_escalation(FunctionalityLevel::Advanced, Some(&summary(EvaluationCase::C)), 2, "q", vec![], false)
                .unwrap();
        assert_eq!(level, FunctionalityLevel::Expert);
        assert_eq!(record.reason, "all_sql_failed_evaluation");
    }

    #[test]
    fn no_evaluation_at_all_triggers_escalation() {
        let (_, record, _) = handle_escalation(FunctionalityLevel::Basic, None, 1, "q", vec![], false).unwrap();
        assert_eq!(record.reason, "no_sql_generated");
    }

    #[test]
    fn db_unavailable_escalates_regardless_of_attempt_count() {
        let (_, record, _) = handle_escalation(FunctionalityLevel::Basic, None, 1, "q", vec![], true).unwrap();
        assert_eq!(record.reason, "execution_failed");
    }

    #[test]
    fn failed_sql_list_is_truncated_to_three_with_remainder_count() {
        let context = EscalationContext {
            reason: EscalationReason::AllFailedEvaluation,
            previous_level: FunctionalityLevel::Basic,
            question: "q".to_string(),
            failed_sqls: vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
            evaluation: None,
            attempt_count: 2,
        };
        let rendered = context.to_context_string();
        assert!(rendered.contains("... and 2 more"));
    }
}
