use std::time::Duration;

use clap::Parser;

use crate::error::AppError;

/// Command-line overrides layered on top of environment configuration.
#[derive(Debug, Parser)]
#[command(name = "thoth-sql-generator", about = "Text-to-SQL generation pipeline service")]
pub struct Cli {
    /// Override THOTH_BIND_ADDR.
    #[arg(long)]
    pub bind_addr: Option<String>,

    /// Override THOTH_METADATA_DATABASE_URL.
    #[arg(long)]
    pub database_url: Option<String>,
}

/// Process-wide configuration, loaded once at startup from environment
/// variables (with CLI flags taking precedence) and handed around as an
/// `Arc<Settings>` inside `AppState`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub metadata_database_url: String,
    pub db_root: String,
    pub max_parallel_sqls: usize,
    pub max_parallel_tests: usize,
    pub default_number_of_sql_to_generate: usize,
    pub sql_candidate_timeout: Duration,
    pub silver_threshold: f64,
    pub max_attempts_per_level: u32,
    pub test_reducer_threshold: usize,
    pub cors_allowed_origins: Vec<String>,
}

impl Settings {
    pub fn load(cli: &Cli) -> Result<Self, AppError> {
        let bind_addr = cli
            .bind_addr
            .clone()
            .or_else(|| std::env::var("THOTH_BIND_ADDR").ok())
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let metadata_database_url = cli
            .database_url
            .clone()
            .or_else(|| std::env::var("THOTH_METADATA_DATABASE_URL").ok())
            .ok_or_else(|| {
                AppError::configuration(
                    "THOTH_METADATA_DATABASE_URL is required (or pass --database-url)",
                )
            })?;

        let db_root = std::env::var("THOTH_DB_ROOT").unwrap_or_else(|_| "/var/lib/thoth".to_string());

        let max_parallel_sqls = env_usize("THOTH_MAX_PARALLEL_SQLS", 12)?;
        let max_parallel_tests = env_usize("THOTH_MAX_PARALLEL_TESTS", 3)?;
        let default_number_of_sql_to_generate = env_usize("THOTH_DEFAULT_SQL_CANDIDATES", 12)?;
        let sql_candidate_timeout = Duration::from_secs(env_usize("THOTH_SQL_CANDIDATE_TIMEOUT_SECS", 20)? as u64);
        let silver_threshold = env_f64("THOTH_SILVER_THRESHOLD", 0.9)?;
        let max_attempts_per_level = env_usize("THOTH_MAX_ATTEMPTS_PER_LEVEL", 2)? as u32;
        let test_reducer_threshold = env_usize("THOTH_TEST_REDUCER_THRESHOLD", 5)?;

        let cors_allowed_origins = std::env::var("THOTH_CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["http://localhost:3000".to_string()]);

        Ok(Self {
            bind_addr,
            metadata_database_url,
            db_root,
            max_parallel_sqls,
            max_parallel_tests,
            default_number_of_sql_to_generate,
            sql_candidate_timeout,
            silver_threshold,
            max_attempts_per_level,
            test_reducer_threshold,
            cors_allowed_origins,
        })
    }
}

fn env_usize(key: &str, default: usize) -> Result<usize, AppError> {
    match std::env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| AppError::configuration(format!("{key} must be an integer, got '{v}'"))),
        Err(_) => Ok(default),
    }
}

fn env_f64(key: &str, default: f64) -> Result<f64, AppError> {
    match std::env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| AppError::configuration(format!("{key} must be a float, got '{v}'"))),
        Err(_) => Ok(default),
    }
}
