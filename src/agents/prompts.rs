//! Prompt template rendering via `minijinja`. Templates are embedded rather
//! than loaded from disk — there is no user-editable template directory in
//! this service, unlike the desktop app this pipeline is modeled on.

use minijinja::{context, Environment};
use once_cell::sync::Lazy;

use crate::error::AppError;

use super::diversify::GenerationMethod;

const QUERY_PLAN_TEMPLATE: &str = include_str!("templates/generate_sql_query_plan.txt");
const STEP_BY_STEP_TEMPLATE: &str = include_str!("templates/generate_sql_step_by_step.txt");
const DIVIDE_AND_CONQUER_TEMPLATE: &str = include_str!("templates/generate_sql_divide_and_conquer.txt");

static ENV: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    env.add_template("generate_sql_query_plan", QUERY_PLAN_TEMPLATE).expect("valid template");
    env.add_template("generate_sql_step_by_step", STEP_BY_STEP_TEMPLATE).expect("valid template");
    env.add_template("generate_sql_divide_and_conquer", DIVIDE_AND_CONQUER_TEMPLATE).expect("valid template");
    env
});

/// Database-specific NULL-ordering guidance appended to every generation
/// prompt's directives, since `ORDER BY ... NULLS LAST/FIRST` support and
/// default NULL placement differ across dialects.
fn null_handling_rules(db_type: &str) -> String {
    if db_type.eq_ignore_ascii_case("sqlite") {
        "CRITICAL DATABASE RULE FOR SQLite (3.30.0+):\n\
         - ALWAYS use NULLS LAST with ORDER BY ASC to put NULL values at the end\n\
         - ALWAYS use NULLS FIRST with ORDER BY DESC to put NULL values at the beginning\n\
         - Example: ORDER BY column ASC NULLS LAST"
            .to_string()
    } else {
        format!(
            "DATABASE RULE FOR {db_type}:\n\
             - Use NULLS LAST with ASC sorting\n\
             - Use NULLS FIRST with DESC sorting\n\
             - This database supports explicit NULL positioning in ORDER BY"
        )
    }
}

#[allow(clippy::too_many_arguments)]
pub fn generate_sql_prompt(
    method: GenerationMethod,
    question: &str,
    database_type: &str,
    schema: &str,
    directives: &str,
    evidence: &str,
    example_shots: &str,
) -> Result<String, AppError> {
    let enhanced_directives = format!("{directives}\n\n{}", null_handling_rules(database_type));
    let template = ENV
        .get_template(method.template_name())
        .map_err(|e| AppError::internal(format!("missing prompt template: {e}")))?;
    template
        .render(context! {
            question => question,
            database_type => database_type,
            schema => schema,
            directives => enhanced_directives,
            evidence => evidence,
            example_shots => example_shots,
        })
        .map_err(|e| AppError::internal(format!("prompt template render failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_each_method_without_error() {
        for method in [GenerationMethod::QueryPlan, GenerationMethod::StepByStep, GenerationMethod::DivideAndConquer] {
            let rendered = generate_sql_prompt(
                method,
                "How many schools are in Alameda?",
                "SQLite",
                "",
                "schema text",
                "evidence text",
                "",
            )
            .unwrap();
            assert!(rendered.contains("Alameda"));
            assert!(rendered.contains("NULLS LAST"));
        }
    }
}
