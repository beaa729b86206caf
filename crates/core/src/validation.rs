//! Field-level validation of session forms.
//!
//! Checks here are advisory: the backend validates again and its answer wins.
//! Every rule runs; nothing short-circuits, so a form shows all of its
//! problems at once.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Percent, SessionDraft, SessionPatch};

/// Wire names of the session fields, as the backend keys its own errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionField {
    PlanItem,
    Consultation,
    Date,
    Duration,
    CurrentProgress,
    Actions,
}

impl SessionField {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlanItem => "item_plan",
            Self::Consultation => "consulta",
            Self::Date => "fecha_sesion",
            Self::Duration => "duracion_minutos",
            Self::CurrentProgress => "progreso_actual",
            Self::Actions => "acciones_realizadas",
        }
    }
}

/// Field name to human-readable messages.
///
/// Shaped like the backend's `{"campo": ["mensaje", ...]}` bodies so local and
/// remote errors live in one map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// First message for a field, the one a form shows inline.
    #[must_use]
    pub fn message(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }

    #[must_use]
    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }

    /// Drop the error for a field, e.g. once the user edits it.
    pub fn clear(&mut self, field: &str) {
        self.0.remove(field);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Combine local errors with the ones the backend returned.
    ///
    /// The backend is authoritative: its messages replace local ones for the
    /// same field, and fields only it reports are added.
    #[must_use]
    pub fn reconcile(mut self, server: FieldErrors) -> FieldErrors {
        for (field, messages) in server.0 {
            if !messages.is_empty() {
                self.0.insert(field, messages);
            }
        }
        self
    }

    /// `Ok(())` when there is nothing to report.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one field failed.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Validates session forms against the prior progress of their plan item.
pub struct SessionValidator;

impl SessionValidator {
    /// Check a new-session form.
    #[must_use]
    pub fn check(draft: &SessionDraft, previous: Percent) -> FieldErrors {
        let mut errors = FieldErrors::new();

        check_progress(&mut errors, draft.current_progress, previous);

        if draft.duration_minutes <= 0 {
            errors.add(
                SessionField::Duration.as_str(),
                "La duración debe ser mayor a 0 minutos",
            );
        }
        if draft.actions.trim().is_empty() {
            errors.add(
                SessionField::Actions.as_str(),
                "Debe describir las acciones realizadas",
            );
        }
        if draft.date.is_none() {
            errors.add(SessionField::Date.as_str(), "La fecha de sesión es obligatoria");
        }
        if !draft.plan_item.is_some_and(|id| id.is_present()) {
            errors.add(
                SessionField::PlanItem.as_str(),
                "Debe seleccionar un ítem del plan",
            );
        }
        if !draft.consultation.is_some_and(|id| id.is_present()) {
            errors.add(SessionField::Consultation.as_str(), "Debe seleccionar una consulta");
        }

        errors
    }

    /// Check the fields present in an edit of an existing session.
    #[must_use]
    pub fn check_patch(patch: &SessionPatch, previous: Percent) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if let Some(current) = patch.current_progress {
            check_progress(&mut errors, current, previous);
        }
        if patch.duration_minutes == Some(0) {
            errors.add(
                SessionField::Duration.as_str(),
                "La duración debe ser mayor a 0 minutos",
            );
        }
        if patch.actions.as_deref().is_some_and(|a| a.trim().is_empty()) {
            errors.add(
                SessionField::Actions.as_str(),
                "Debe describir las acciones realizadas",
            );
        }
        errors
    }

    /// # Errors
    ///
    /// Returns the collected `FieldErrors` when any rule fails.
    pub fn validate(draft: &SessionDraft, previous: Percent) -> Result<(), FieldErrors> {
        Self::check(draft, previous).into_result()
    }
}

fn check_progress(errors: &mut FieldErrors, current: f64, previous: Percent) {
    let field = SessionField::CurrentProgress.as_str();
    if !(current.is_finite() && (0.0..=100.0).contains(&current)) {
        errors.add(field, "El progreso debe estar entre 0 y 100%");
    }
    if current < previous.value() {
        errors.add(
            field,
            format!("El progreso no puede ser menor a {previous}"),
        );
    }
}
