//! Evaluator core (§4.7): aggregates per-candidate test verdicts into a
//! pass rate, classifies the overall result into cases A-D, and tie-breaks
//! between multiple perfect candidates.

use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CandidateVerdict {
    pub sql: String,
    /// One bool per test unit applied to this candidate.
    pub test_results: Vec<bool>,
}

impl CandidateVerdict {
    pub fn pass_rate(&self) -> f64 {
        if self.test_results.is_empty() {
            return 0.0;
        }
        let ok = self.test_results.iter().filter(|ok| **ok).count();
        ok as f64 / self.test_results.len() as f64
    }

    pub fn is_perfect(&self) -> bool {
        !self.test_results.is_empty() && self.test_results.iter().all(|ok| *ok)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EvaluationCase {
    /// Exactly one candidate, pass_rate == 1.0.
    A,
    /// Two or more perfect candidates; selection needs a tie-break.
    B,
    /// No perfect candidate, but at least one clears the silver threshold.
    C,
    /// Every candidate is below the silver threshold; escalate or fail.
    D,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationSummary {
    pub case: EvaluationCase,
    pub best_pass_rate: f64,
    pub selected_index: Option<usize>,
    pub perfect_indices: Vec<usize>,
    pub above_threshold_indices: Vec<usize>,
}

/// Classifies a batch of evaluated candidates per §4.7's Case A-D rules, and
/// picks a winner for cases A-C (`selected_index`). `threshold` is the
/// silver cutoff (0.9 by default, configurable via `silver_threshold`).
pub fn classify(candidates: &[CandidateVerdict], threshold: f64) -> EvaluationSummary {
    if candidates.is_empty() {
        return EvaluationSummary {
            case: EvaluationCase::D,
            best_pass_rate: 0.0,
            selected_index: None,
            perfect_indices: vec![],
            above_threshold_indices: vec![],
        };
    }

    let perfect_indices: Vec<usize> =
        candidates.iter().enumerate().filter(|(_, c)| c.is_perfect()).map(|(i, _)| i).collect();
    let above_threshold_indices: Vec<usize> =
        candidates.iter().enumerate().filter(|(_, c)| c.pass_rate() >= threshold).map(|(i, _)| i).collect();

    let best_pass_rate = candidates.iter().map(|c| c.pass_rate()).fold(0.0_f64, f64::max);

    if perfect_indices.len() == 1 && candidates.len() == 1 {
        return EvaluationSummary {
            case: EvaluationCase::A,
            best_pass_rate,
            selected_index: Some(perfect_indices[0]),
            perfect_indices,
            above_threshold_indices,
        };
    }

    if perfect_indices.len() > 1 || (perfect_indices.len() == 1 && candidates.len() > 1) {
        let selected = tie_break(candidates, &perfect_indices);
        return EvaluationSummary {
            case: EvaluationCase::B,
            best_pass_rate,
            selected_index: Some(selected),
            perfect_indices,
            above_threshold_indices,
        };
    }

    if !above_threshold_indices.is_empty() {
        let selected = tie_break(candidates, &above_threshold_indices);
        return EvaluationSummary {
            case: EvaluationCase::C,
            best_pass_rate,
            selected_index: Some(selected),
            perfect_indices,
            above_threshold_indices,
        };
    }

    EvaluationSummary {
        case: EvaluationCase::D,
        best_pass_rate,
        selected_index: None,
        perfect_indices,
        above_threshold_indices,
    }
}

/// Among tied candidates, prefer the shortest SQL (simplest query that
/// clears the bar), breaking further ties by earliest generation index —
/// deterministic so the same candidate set always picks the same winner.
fn tie_break(candidates: &[CandidateVerdict], indices: &[usize]) -> usize {
    *indices
        .iter()
        .min_by_key(|&&i| (candidates[i].sql.trim().len(), i))
        .expect("indices is non-empty")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(sql: &str, results: &[bool]) -> CandidateVerdict {
        CandidateVerdict { sql: sql.to_string(), test_results: results.to_vec() }
    }

    #[test]
    fn single_perfect_candidate_is_case_a() {
        let candidates = vec![candidate("SELECT 1", &[true, true])];
        let summary = classify(&candidates, 0.9);
        assert_eq!(summary.case, EvaluationCase::A);
        assert_eq!(summary.selected_index, Some(0));
    }

    #[test]
    fn single_perfect_among_multiple_candidates_is_case_b() {
        let candidates = vec![candidate("SELECT 1", &[true, true]), candidate("SELECT 2", &[true, false])];
        let summary = classify(&candidates, 0.9);
        assert_eq!(summary.case, EvaluationCase::B);
        assert_eq!(summary.selected_index, Some(0));
        assert_eq!(summary.perfect_indices, vec![0]);
    }

    #[test]
    fn two_perfect_candidates_is_case_b_and_prefers_shorter_sql() {
        let candidates =
            vec![candidate("SELECT a, b, c FROM t", &[true, true]), candidate("SELECT a FROM t", &[true, true])];
        let summary = classify(&candidates, 0.9);
        assert_eq!(summary.case, EvaluationCase::B);
        assert_eq!(summary.selected_index, Some(1));
    }

    #[test]
    fn above_threshold_but_not_perfect_is_case_c() {
        let candidates = vec![candidate("SELECT 1", &[true, true, true, false])];
        let summary = classify(&candidates, 0.5);
        assert_eq!(summary.case, EvaluationCase::C);
        assert_eq!(summary.selected_index, Some(0));
    }

    #[test]
    fn all_below_threshold_is_case_d() {
        let candidates = vec![candidate("SELECT 1", &[true, false, false]), candidate("SELECT 2", &[false, false])];
        let summary = classify(&candidates, 0.9);
        assert_eq!(summary.case, EvaluationCase::D);
        assert_eq!(summary.selected_index, None);
    }

    #[test]
    fn empty_candidate_list_is_case_d() {
        let summary = classify(&[], 0.9);
        assert_eq!(summary.case, EvaluationCase::D);
    }
}
