use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::application::repos::RepoError;
use crate::cache::CacheStoreError;
use crate::{domain::error::DomainError, infra::error::InfraError};

/// Caller-facing classification, mirroring HTTP status semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Invalid,
    Unavailable,
    Internal,
}

impl ErrorClass {
    /// HTTP-equivalent status code.
    pub fn status(self) -> u16 {
        match self {
            ErrorClass::NotFound => 404,
            ErrorClass::Invalid => 400,
            ErrorClass::Unavailable => 503,
            ErrorClass::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status())
    }
}

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub class: ErrorClass,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, class: ErrorClass, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            class,
            messages,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Repo(RepoError),
    #[error("cache store unavailable")]
    Cache(#[from] CacheStoreError),
    #[error("resource not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => AppError::NotFound,
            RepoError::InvalidInput { message } => AppError::Validation(message),
            RepoError::Duplicate { constraint } => {
                AppError::Validation(format!("record already exists ({constraint})"))
            }
            other => AppError::Repo(other),
        }
    }
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            AppError::Domain(DomainError::NotFound { .. }) | AppError::NotFound => {
                ErrorClass::NotFound
            }
            AppError::Domain(DomainError::Validation { .. }) | AppError::Validation(_) => {
                ErrorClass::Invalid
            }
            AppError::Infra(InfraError::Database { .. })
            | AppError::Infra(InfraError::CacheBackend { .. })
            | AppError::Repo(RepoError::Timeout)
            | AppError::Cache(_) => ErrorClass::Unavailable,
            AppError::Infra(_)
            | AppError::Repo(_)
            | AppError::Unexpected(_) => ErrorClass::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.class() == ErrorClass::NotFound
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::from_error("application::error::AppError", self.class(), self)
    }
}
