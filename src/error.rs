use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error category taxonomy. Every `AppError` is stamped with exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Configuration,
    Database,
    VectorDb,
    AiAgent,
    Validation,
    Network,
    Authentication,
    Resource,
    UserInput,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub category: ErrorCategory,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Taxonomised application error: category + severity + user-safe message +
/// technical details + optional machine-readable code + optional context.
#[derive(Debug, Clone)]
pub struct AppError {
    pub category: ErrorCategory,
    pub severity: Severity,
    pub message: String,
    pub code: Option<String>,
    pub details: Option<serde_json::Value>,
    pub context: std::collections::BTreeMap<String, String>,
}

impl AppError {
    pub fn new(category: ErrorCategory, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            category,
            severity,
            message: message.into(),
            code: None,
            details: None,
            context: Default::default(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Configuration, Severity::Critical, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Database, Severity::Error, message)
    }

    pub fn vector_db(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::VectorDb, Severity::Warning, message)
    }

    pub fn ai_agent(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::AiAgent, Severity::Critical, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, Severity::Error, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Network, Severity::Error, message)
    }

    pub fn resource_not_found(resource: &str) -> Self {
        Self::new(
            ErrorCategory::Resource,
            Severity::Error,
            format!("{resource} not found"),
        )
    }

    pub fn user_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::UserInput, Severity::Warning, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Internal, Severity::Critical, message)
    }

    /// True when this error must be surfaced to the client as `CRITICAL_ERROR`
    /// and the pipeline run terminated.
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }

    fn status_code(&self) -> StatusCode {
        match self.category {
            ErrorCategory::Validation | ErrorCategory::UserInput => StatusCode::BAD_REQUEST,
            ErrorCategory::Authentication => StatusCode::UNAUTHORIZED,
            ErrorCategory::Resource => StatusCode::NOT_FOUND,
            ErrorCategory::Configuration
            | ErrorCategory::Database
            | ErrorCategory::VectorDb
            | ErrorCategory::AiAgent
            | ErrorCategory::Network
            | ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}/{:?}] {}", self.category, self.severity, self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ApiError {
            error: self.message,
            category: self.category,
            severity: self.severity,
            code: self.code,
            details: self.details,
        });
        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::resource_not_found("row"),
            other => AppError::database(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::network(err.to_string())
    }
}

impl From<minijinja::Error> for AppError {
    fn from(err: minijinja::Error) -> Self {
        AppError::new(ErrorCategory::Internal, Severity::Error, err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}
