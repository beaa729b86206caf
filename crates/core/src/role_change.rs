//! Confirmed, single-step reassignment of a user's role.
//!
//! ```text
//! Idle ──select(other)──▶ PendingConfirmation ──begin_commit──▶ Submitting
//!  ▲                          │    ▲                               │
//!  └──cancel / select(current)┘    └──────resolve(Err)─────────────┤
//!                                                                  ▼
//!                                                    Committed (resolve(Ok))
//! ```

use thiserror::Error;

use crate::failure::{Failure, FailureKind};
use crate::model::{Role, RoleId, RoleSet, UserAccount, UserCode};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RoleChangeError {
    #[error("user already has role {0}")]
    NoOp(RoleId),

    #[error("role {0} is not one of the known roles")]
    UnknownRole(RoleId),

    #[error("no role change is awaiting confirmation")]
    NothingPending,

    #[error("a role change is already being submitted")]
    InFlight,

    #[error("the role change has already been applied")]
    AlreadyCommitted,

    #[error("confirmation does not match the pending role change")]
    StalePrompt,
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleChangeState {
    Idle,
    PendingConfirmation { candidate: RoleId },
    Submitting { candidate: RoleId },
    Committed { role: RoleId },
}

/// What the user is asked to confirm. Holding one is the proof of an explicit
/// confirmation step; [`RoleChangeGuard::begin_commit`] requires it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationPrompt {
    pub user: UserCode,
    pub user_name: String,
    pub current: Option<Role>,
    pub candidate: Role,
}

impl ConfirmationPrompt {
    #[must_use]
    pub fn message(&self) -> String {
        let from = self
            .current
            .as_ref()
            .map_or("sin rol", |role| role.display().label);
        format!(
            "¿Cambiar el rol de {} de {} a {}?",
            self.user_name,
            from,
            self.candidate.display().label
        )
    }
}

/// Role change dialog for one user.
#[derive(Debug, Clone)]
pub struct RoleChangeGuard {
    user: UserAccount,
    roles: RoleSet,
    state: RoleChangeState,
    last_failure: Option<String>,
}

impl RoleChangeGuard {
    #[must_use]
    pub fn new(user: UserAccount, roles: RoleSet) -> Self {
        Self {
            user,
            roles,
            state: RoleChangeState::Idle,
            last_failure: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> RoleChangeState {
        self.state
    }

    #[must_use]
    pub fn user(&self) -> &UserAccount {
        &self.user
    }

    #[must_use]
    pub fn current_role(&self) -> RoleId {
        self.user.role_id
    }

    #[must_use]
    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    /// Message of the last failed commit, cleared on the next selection.
    #[must_use]
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    /// Pick a role in the dialog.
    ///
    /// Picking the current role returns to `Idle`; it never leads to a request.
    ///
    /// # Errors
    ///
    /// `UnknownRole` if the role is not in the known set (state unchanged),
    /// `InFlight` or `AlreadyCommitted` outside the editable states.
    pub fn select(&mut self, role: RoleId) -> Result<&RoleChangeState, RoleChangeError> {
        self.ensure_editable()?;
        if role == self.user.role_id {
            self.state = RoleChangeState::Idle;
            self.last_failure = None;
            return Ok(&self.state);
        }
        if !self.roles.contains(role) {
            return Err(RoleChangeError::UnknownRole(role));
        }
        self.state = RoleChangeState::PendingConfirmation { candidate: role };
        self.last_failure = None;
        Ok(&self.state)
    }

    /// Abandon a pending selection.
    ///
    /// # Errors
    ///
    /// `InFlight` while a submission is pending, `AlreadyCommitted` afterwards.
    pub fn cancel(&mut self) -> Result<(), RoleChangeError> {
        self.ensure_editable()?;
        self.state = RoleChangeState::Idle;
        Ok(())
    }

    /// Prompt for the pending change, if there is one.
    #[must_use]
    pub fn confirmation(&self) -> Option<ConfirmationPrompt> {
        let RoleChangeState::PendingConfirmation { candidate } = self.state else {
            return None;
        };
        let candidate = self.roles.get(candidate)?.clone();
        Some(ConfirmationPrompt {
            user: self.user.code,
            user_name: self.user.full_name(),
            current: self.roles.get(self.user.role_id).cloned(),
            candidate,
        })
    }

    /// Move to `Submitting` and hand back the role id to send.
    ///
    /// # Errors
    ///
    /// `NoOp` when the confirmed role equals the current one, before any
    /// request can be made. `StalePrompt` if the prompt is for another user or
    /// candidate, `NothingPending`, `InFlight` and `AlreadyCommitted` for the
    /// other states.
    pub fn begin_commit(&mut self, prompt: &ConfirmationPrompt) -> Result<RoleId, RoleChangeError> {
        if prompt.candidate.id() == self.user.role_id {
            return Err(RoleChangeError::NoOp(self.user.role_id));
        }
        match self.state {
            RoleChangeState::Idle => Err(RoleChangeError::NothingPending),
            RoleChangeState::Submitting { .. } => Err(RoleChangeError::InFlight),
            RoleChangeState::Committed { .. } => Err(RoleChangeError::AlreadyCommitted),
            RoleChangeState::PendingConfirmation { candidate } => {
                if prompt.user != self.user.code || prompt.candidate.id() != candidate {
                    return Err(RoleChangeError::StalePrompt);
                }
                self.state = RoleChangeState::Submitting { candidate };
                Ok(candidate)
            }
        }
    }

    /// Record the backend's answer to the submission.
    ///
    /// On failure the candidate stays selected so the user can retry or cancel.
    ///
    /// # Errors
    ///
    /// `NothingPending` if no submission is in flight.
    pub fn resolve(
        &mut self,
        outcome: Result<UserAccount, Failure>,
    ) -> Result<&RoleChangeState, RoleChangeError> {
        let RoleChangeState::Submitting { candidate } = self.state else {
            return Err(RoleChangeError::NothingPending);
        };
        match outcome {
            Ok(user) => {
                let role = user.role_id;
                self.user = user;
                self.last_failure = None;
                self.state = RoleChangeState::Committed { role };
            }
            Err(failure) => {
                self.last_failure = Some(role_change_message(&failure, self.user.code));
                self.state = RoleChangeState::PendingConfirmation { candidate };
            }
        }
        Ok(&self.state)
    }

    fn ensure_editable(&self) -> Result<(), RoleChangeError> {
        match self.state {
            RoleChangeState::Submitting { .. } => Err(RoleChangeError::InFlight),
            RoleChangeState::Committed { .. } => Err(RoleChangeError::AlreadyCommitted),
            _ => Ok(()),
        }
    }
}

/// Message shown in the dialog for a failed role change.
#[must_use]
pub fn role_change_message(failure: &Failure, user: UserCode) -> String {
    if let Some(detail) = &failure.detail {
        return detail.clone();
    }
    match failure.kind {
        FailureKind::Forbidden => {
            "No tienes permisos para cambiar roles. Solo administradores pueden realizar esta acción."
                .to_owned()
        }
        FailureKind::NotFound => format!("Usuario con código {user} no encontrado."),
        FailureKind::Validation => "Datos inválidos. Verifique el rol seleccionado.".to_owned(),
        FailureKind::Transient => {
            "Error al cambiar el rol del usuario. Por favor, intente nuevamente.".to_owned()
        }
        FailureKind::Inconsistent => {
            "Error al cambiar el rol del usuario. El servidor devolvió datos inconsistentes."
                .to_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles() -> RoleSet {
        RoleSet::new(vec![
            Role::new(RoleId::new(1), "Administrador"),
            Role::new(RoleId::new(2), "Odontólogo"),
            Role::new(RoleId::new(3), "Recepcionista"),
            Role::new(RoleId::new(4), "Paciente"),
        ])
    }

    fn user() -> UserAccount {
        UserAccount {
            code: UserCode::new(7),
            first_name: "Lucía".into(),
            last_name: "Rojas".into(),
            email: "lucia@example.com".into(),
            phone: None,
            role_id: RoleId::new(2),
            role_name: Some("Odontólogo".into()),
        }
    }

    fn guard() -> RoleChangeGuard {
        RoleChangeGuard::new(user(), roles())
    }

    #[test]
    fn selecting_current_role_stays_idle() {
        let mut guard = guard();
        assert_eq!(guard.select(RoleId::new(2)), Ok(&RoleChangeState::Idle));
        assert!(guard.confirmation().is_none());
    }

    #[test]
    fn selecting_current_role_cancels_pending() {
        let mut guard = guard();
        guard.select(RoleId::new(3)).unwrap();
        guard.select(RoleId::new(2)).unwrap();
        assert_eq!(guard.state(), RoleChangeState::Idle);
    }

    #[test]
    fn unknown_role_is_rejected_without_state_change() {
        let mut guard = guard();
        guard.select(RoleId::new(3)).unwrap();
        assert_eq!(
            guard.select(RoleId::new(99)),
            Err(RoleChangeError::UnknownRole(RoleId::new(99)))
        );
        assert_eq!(
            guard.state(),
            RoleChangeState::PendingConfirmation {
                candidate: RoleId::new(3)
            }
        );
    }

    #[test]
    fn confirmed_change_commits() {
        let mut guard = guard();
        guard.select(RoleId::new(1)).unwrap();
        let prompt = guard.confirmation().unwrap();
        assert!(prompt.message().contains("Administrador"));
        assert_eq!(guard.begin_commit(&prompt), Ok(RoleId::new(1)));
        assert_eq!(guard.begin_commit(&prompt), Err(RoleChangeError::InFlight));

        let updated = UserAccount {
            role_id: RoleId::new(1),
            role_name: Some("Administrador".into()),
            ..user()
        };
        guard.resolve(Ok(updated)).unwrap();
        assert_eq!(
            guard.state(),
            RoleChangeState::Committed {
                role: RoleId::new(1)
            }
        );
        assert_eq!(guard.current_role(), RoleId::new(1));
        assert_eq!(guard.select(RoleId::new(3)), Err(RoleChangeError::AlreadyCommitted));
    }

    #[test]
    fn no_op_prompt_fails_fast() {
        let mut guard = guard();
        let prompt = ConfirmationPrompt {
            user: UserCode::new(7),
            user_name: "Lucía Rojas".into(),
            current: None,
            candidate: Role::new(RoleId::new(2), "Odontólogo"),
        };
        assert_eq!(
            guard.begin_commit(&prompt),
            Err(RoleChangeError::NoOp(RoleId::new(2)))
        );
        assert_eq!(guard.state(), RoleChangeState::Idle);
    }

    #[test]
    fn stale_prompt_is_refused() {
        let mut guard = guard();
        guard.select(RoleId::new(1)).unwrap();
        let prompt = guard.confirmation().unwrap();
        guard.select(RoleId::new(3)).unwrap();
        assert_eq!(guard.begin_commit(&prompt), Err(RoleChangeError::StalePrompt));
    }

    #[test]
    fn forbidden_returns_to_pending_with_message() {
        let mut guard = guard();
        guard.select(RoleId::new(1)).unwrap();
        let prompt = guard.confirmation().unwrap();
        guard.begin_commit(&prompt).unwrap();

        guard
            .resolve(Err(Failure::new(FailureKind::Forbidden)))
            .unwrap();
        assert_eq!(
            guard.state(),
            RoleChangeState::PendingConfirmation {
                candidate: RoleId::new(1)
            }
        );
        assert!(guard.last_failure().unwrap().contains("permisos"));
        assert_eq!(guard.current_role(), RoleId::new(2));
    }

    #[test]
    fn backend_detail_wins_over_defaults() {
        let failure = Failure::new(FailureKind::Validation).with_detail("Rol inválido");
        assert_eq!(role_change_message(&failure, UserCode::new(7)), "Rol inválido");
        let failure = Failure::new(FailureKind::NotFound);
        assert!(role_change_message(&failure, UserCode::new(7)).contains('7'));
    }

    #[test]
    fn resolve_without_submission_is_an_error() {
        let mut guard = guard();
        assert_eq!(
            guard.resolve(Ok(user())),
            Err(RoleChangeError::NothingPending)
        );
    }
}
