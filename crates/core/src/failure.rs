//! What a screen needs to know about a failed remote operation.

use thiserror::Error;

use crate::validation::FieldErrors;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The backend rejected the input (HTTP 400).
    Validation,
    NotFound,
    /// Authentication or authorization refused (HTTP 401/403).
    Forbidden,
    /// Network, timeout or server-side trouble; worth another try.
    Transient,
    /// The backend answered with data that contradicts itself.
    Inconsistent,
}

/// A failed operation, classified for display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.user_message())]
pub struct Failure {
    pub kind: FailureKind,
    /// Human-readable detail from the backend, shown verbatim when present.
    pub detail: Option<String>,
    pub fields: FieldErrors,
}

impl Failure {
    #[must_use]
    pub fn new(kind: FailureKind) -> Self {
        Self {
            kind,
            detail: None,
            fields: FieldErrors::new(),
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        self.detail = (!detail.trim().is_empty()).then_some(detail);
        self
    }

    #[must_use]
    pub fn with_fields(mut self, fields: FieldErrors) -> Self {
        self.fields = fields;
        self
    }

    #[must_use]
    pub fn validation(fields: FieldErrors) -> Self {
        Self::new(FailureKind::Validation).with_fields(fields)
    }

    /// Backend detail when it sent one, otherwise a default for the kind.
    #[must_use]
    pub fn user_message(&self) -> String {
        if let Some(detail) = &self.detail {
            return detail.clone();
        }
        let default = match self.kind {
            FailureKind::Validation => "Datos inválidos. Revise el formulario e intente nuevamente.",
            FailureKind::NotFound => "El registro solicitado no existe.",
            FailureKind::Forbidden => "No tiene permisos para realizar esta acción.",
            FailureKind::Transient => "No se pudo contactar al servidor. Intente nuevamente.",
            FailureKind::Inconsistent => {
                "El servidor devolvió datos inconsistentes. Contacte al administrador."
            }
        };
        default.to_owned()
    }

    #[must_use]
    pub fn retryable(&self) -> bool {
        self.kind == FailureKind::Transient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_is_shown_verbatim() {
        let failure = Failure::new(FailureKind::Forbidden)
            .with_detail("Solo administradores pueden cambiar roles.");
        assert_eq!(
            failure.user_message(),
            "Solo administradores pueden cambiar roles."
        );
        assert_eq!(failure.to_string(), failure.user_message());
    }

    #[test]
    fn blank_detail_falls_back_to_default() {
        let failure = Failure::new(FailureKind::NotFound).with_detail("  ");
        assert_eq!(failure.detail, None);
        assert!(failure.user_message().contains("no existe"));
    }

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(Failure::new(FailureKind::Transient).retryable());
        assert!(!Failure::new(FailureKind::Forbidden).retryable());
        assert!(!Failure::validation(FieldErrors::new()).retryable());
        assert!(!Failure::new(FailureKind::Inconsistent).retryable());
    }
}
