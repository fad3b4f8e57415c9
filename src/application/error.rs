use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    application::backend::BackendError,
    domain::{briefing::FieldError, error::DomainError, slug::SlugError},
    infra::error::InfraError,
};

/// Flattened `source()` chain of an error, for logging.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }

    pub fn joined(&self) -> String {
        self.messages.join(": ")
    }
}

/// Errors surfaced by the services.
///
/// Clonable so that callers coalesced onto one in-flight read all receive the
/// same outcome.
#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("you must be signed in to do this")]
    Unauthenticated,
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound { .. })
    }

    /// Text placed in the description of an error toast.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Backend(err) => err.message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<DomainError> for AppError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::NotFound { entity } => AppError::NotFound { entity },
            DomainError::Validation { message } => AppError::InvalidInput(message),
        }
    }
}

impl From<SlugError> for AppError {
    fn from(error: SlugError) -> Self {
        AppError::InvalidInput(error.to_string())
    }
}

impl From<InfraError> for AppError {
    fn from(error: InfraError) -> Self {
        let report = ErrorReport::from_error("application::error::AppError", &error);
        AppError::Unexpected(report.joined())
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
