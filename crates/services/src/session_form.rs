use std::sync::Arc;

use clinic_core::model::{Percent, PlanItemId, Session, SessionDraft, SessionError, SessionPatch};
use clinic_core::{FieldErrors, SessionValidator};
use storage::repository::{SessionStore, StorageError};

use crate::error::SessionFormError;
use crate::in_flight::InFlight;
use crate::session_table::SessionTable;

/// Key the backend uses for messages that belong to the whole form.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Submission side of one session form (new session or edit dialog).
///
/// Local rules run first; the backend's verdict is merged over them. Only one
/// submission per form may be pending, a second attempt gets `Busy`.
pub struct SessionForm {
    sessions: Arc<dyn SessionStore>,
    in_flight: InFlight,
}

impl SessionForm {
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            sessions,
            in_flight: InFlight::new(),
        }
    }

    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.in_flight.is_busy()
    }

    /// Record a new session.
    ///
    /// The prior progress is the item's current progress; an item the backend
    /// has never seen starts at zero.
    ///
    /// # Errors
    ///
    /// Returns `SessionFormError::Busy` while another submission is pending,
    /// `Invalid` with per-field messages (local or from the backend), or
    /// `Storage` for other remote failures.
    pub async fn submit(&self, draft: &SessionDraft) -> Result<Session, SessionFormError> {
        let _ticket = self.in_flight.try_begin().ok_or(SessionFormError::Busy)?;

        let previous = self.previous_progress(draft.plan_item).await?;
        let local = SessionValidator::check(draft, previous);
        if !local.is_empty() {
            tracing::warn!(errors = %local, "session form rejected locally");
            return Err(SessionFormError::Invalid(local));
        }

        match self.sessions.create(draft).await {
            Ok(session) => {
                tracing::debug!(session = %session.id(), item = %session.plan_item(), "session recorded");
                Ok(session)
            }
            Err(err) => Err(reconcile(local, err)),
        }
    }

    /// Edit an existing session.
    ///
    /// # Errors
    ///
    /// Returns `SessionFormError::Session` for archived sessions, otherwise as
    /// [`SessionForm::submit`].
    pub async fn update(
        &self,
        session: &Session,
        patch: &SessionPatch,
    ) -> Result<Session, SessionFormError> {
        let _ticket = self.in_flight.try_begin().ok_or(SessionFormError::Busy)?;

        if session.is_archived() {
            return Err(SessionError::Archived(session.id()).into());
        }
        let local = SessionValidator::check_patch(patch, session.previous_progress());
        if !local.is_empty() {
            tracing::warn!(session = %session.id(), errors = %local, "session edit rejected locally");
            return Err(SessionFormError::Invalid(local));
        }
        if patch.is_empty() {
            return Ok(session.clone());
        }

        self.sessions
            .update(session.id(), patch)
            .await
            .map_err(|err| reconcile(local, err))
    }

    /// Record a new session and put it on top of `table`.
    ///
    /// # Errors
    ///
    /// As [`SessionForm::submit`]; `table` is untouched on failure.
    pub async fn submit_into(
        &self,
        draft: &SessionDraft,
        table: &mut SessionTable,
    ) -> Result<Session, SessionFormError> {
        let session = self.submit(draft).await?;
        table.apply_created(session.clone());
        Ok(session)
    }

    /// Edit a session and refresh its row in `table`.
    ///
    /// # Errors
    ///
    /// As [`SessionForm::update`]; `table` is untouched on failure.
    pub async fn update_in(
        &self,
        session: &Session,
        patch: &SessionPatch,
        table: &mut SessionTable,
    ) -> Result<Session, SessionFormError> {
        let updated = self.update(session, patch).await?;
        table.apply_updated(updated.clone());
        Ok(updated)
    }

    async fn previous_progress(&self, item: Option<PlanItemId>) -> Result<Percent, StorageError> {
        let Some(item) = item.filter(PlanItemId::is_present) else {
            return Ok(Percent::ZERO);
        };
        match self.sessions.progress_of_item(item).await {
            Ok(progress) => Ok(progress.current),
            Err(StorageError::NotFound(_)) => Ok(Percent::ZERO),
            Err(err) => Err(err),
        }
    }
}

fn reconcile(local: FieldErrors, err: StorageError) -> SessionFormError {
    let (detail, mut server) = match err {
        StorageError::Validation { detail, fields } => (detail, fields),
        other => return other.into(),
    };
    if server.is_empty() {
        match detail {
            Some(detail) => server.add(NON_FIELD_ERRORS, detail),
            None => return StorageError::validation(server).into(),
        }
    }
    tracing::warn!(errors = %server, "session form rejected by backend");
    SessionFormError::Invalid(local.reconcile(server))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_detail_without_fields_becomes_form_message() {
        let err = reconcile(
            FieldErrors::new(),
            StorageError::Validation {
                detail: Some("La consulta ya fue facturada.".into()),
                fields: FieldErrors::new(),
            },
        );
        let fields = err.fields().expect("field errors");
        assert_eq!(
            fields.message(NON_FIELD_ERRORS),
            Some("La consulta ya fue facturada.")
        );
    }

    #[test]
    fn other_storage_errors_pass_through() {
        let err = reconcile(FieldErrors::new(), StorageError::Unavailable("502".into()));
        assert!(matches!(err, SessionFormError::Storage(StorageError::Unavailable(_))));
        assert!(err.failure().retryable());
    }
}
