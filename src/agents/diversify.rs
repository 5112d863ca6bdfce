//! Temperature and method diversification for parallel SQL candidate
//! generation (§4.5): `N` generations are spread across three reasoning
//! methods (round-robin) and three temperature bands (round-robin within
//! the band), so the candidate pool explores the solution space rather than
//! producing near-identical SQL from identical settings.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMethod {
    QueryPlan,
    StepByStep,
    DivideAndConquer,
}

impl GenerationMethod {
    const CYCLE: [GenerationMethod; 3] =
        [GenerationMethod::QueryPlan, GenerationMethod::StepByStep, GenerationMethod::DivideAndConquer];

    pub fn for_index(index: usize) -> GenerationMethod {
        Self::CYCLE[index % Self::CYCLE.len()]
    }

    pub fn template_name(self) -> &'static str {
        match self {
            GenerationMethod::QueryPlan => "generate_sql_query_plan",
            GenerationMethod::StepByStep => "generate_sql_step_by_step",
            GenerationMethod::DivideAndConquer => "generate_sql_divide_and_conquer",
        }
    }
}

const LOW_TEMPS: [f32; 3] = [0.1, 0.2, 0.3];
const MID_TEMPS: [f32; 3] = [0.5, 0.6, 0.7];
const HIGH_TEMPS: [f32; 3] = [0.8, 0.9, 1.0];

/// `N` temperature values distributed across the three bands in round-robin
/// fashion; `N == 1` collapses to the single mid-band default (0.5).
pub fn diverse_temperatures(count: usize) -> Vec<f32> {
    if count == 1 {
        return vec![0.5];
    }
    (0..count)
        .map(|i| {
            let band = match i % 3 {
                0 => LOW_TEMPS,
                1 => MID_TEMPS,
                _ => HIGH_TEMPS,
            };
            band[(i / 3) % band.len()]
        })
        .collect()
}

/// Pairs each generation slot with its round-robin method and temperature.
pub fn generation_plan(count: usize) -> Vec<(GenerationMethod, f32)> {
    diverse_temperatures(count)
        .into_iter()
        .enumerate()
        .map(|(i, temp)| (GenerationMethod::for_index(i), temp))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_generation_uses_mid_default() {
        assert_eq!(diverse_temperatures(1), vec![0.5]);
    }

    #[test]
    fn plan_cycles_methods_and_bands() {
        let plan = generation_plan(9);
        assert_eq!(plan[0], (GenerationMethod::QueryPlan, 0.1));
        assert_eq!(plan[1], (GenerationMethod::StepByStep, 0.5));
        assert_eq!(plan[2], (GenerationMethod::DivideAndConquer, 0.8));
        assert_eq!(plan[3], (GenerationMethod::QueryPlan, 0.2));
        assert_eq!(plan[8], (GenerationMethod::DivideAndConquer, 1.0));
    }

    #[test]
    fn plan_length_matches_requested_count() {
        assert_eq!(generation_plan(12).len(), 12);
    }
}
