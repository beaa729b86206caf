//! Shared error types for the services crate.

use thiserror::Error;

use clinic_core::model::{SessionError, UserCode};
use clinic_core::{Failure, FailureKind, FieldErrors, RoleChangeError};
use storage::HttpInitError;
use storage::repository::StorageError;

/// Errors emitted by `SessionForm`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionFormError {
    #[error("a submission is already in progress")]
    Busy,
    #[error("{0}")]
    Invalid(FieldErrors),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionFormError {
    /// Per-field messages to show next to the form controls, if any.
    #[must_use]
    pub fn fields(&self) -> Option<&FieldErrors> {
        match self {
            Self::Invalid(fields) => Some(fields),
            _ => None,
        }
    }

    #[must_use]
    pub fn failure(&self) -> Failure {
        match self {
            Self::Busy => Failure::new(FailureKind::Transient)
                .with_detail("Ya se está guardando la sesión. Espere un momento."),
            Self::Invalid(fields) => Failure::validation(fields.clone()),
            Self::Session(err) => Failure::new(FailureKind::Validation).with_detail(err.to_string()),
            Self::Storage(err) => err.failure(),
        }
    }
}

/// Errors emitted by `SessionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `RoleService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RoleChangeFlowError {
    #[error("no user with code {0}")]
    UnknownUser(UserCode),
    #[error(transparent)]
    Guard(#[from] RoleChangeError),
    /// The backend refused the change; `message` is what the dialog shows.
    #[error("{message}")]
    Rejected { message: String, failure: Failure },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `EvidenceService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EvidenceError {
    #[error("evidence file `{0}` is empty")]
    Empty(String),
    #[error("evidence file `{name}` is {size} bytes; the limit is {max}")]
    TooLarge { name: String, size: usize, max: usize },
    #[error("evidence file `{name}` has unsupported type `{mime}`")]
    UnsupportedType { name: String, mime: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `BackupService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackupServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AuditService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuditServiceError {
    #[error("date range starts after it ends")]
    InvertedRange,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid upload mode `{0}`: expected `durable` or `inline`")]
    InvalidUploadMode(String),
    #[error(transparent)]
    Api(#[from] HttpInitError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Http(#[from] HttpInitError),
}
