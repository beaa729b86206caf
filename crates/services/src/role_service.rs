use std::sync::Arc;

use clinic_core::model::{RoleId, RoleSet, UserAccount, UserCode};
use clinic_core::{ConfirmationPrompt, RoleChangeError, RoleChangeGuard};
use storage::repository::RoleStore;

use crate::error::RoleChangeFlowError;

/// Drives role change dialogs against the role store.
///
/// Every rule about when a request may go out lives in [`RoleChangeGuard`];
/// this service only performs the call the guard allows and feeds the answer back.
#[derive(Clone)]
pub struct RoleService {
    roles: Arc<dyn RoleStore>,
}

impl RoleService {
    #[must_use]
    pub fn new(roles: Arc<dyn RoleStore>) -> Self {
        Self { roles }
    }

    /// # Errors
    ///
    /// Returns `RoleChangeFlowError::Storage` if roles cannot be fetched.
    pub async fn roles(&self) -> Result<RoleSet, RoleChangeFlowError> {
        Ok(RoleSet::new(self.roles.list_roles().await?))
    }

    /// # Errors
    ///
    /// Returns `RoleChangeFlowError::Storage` if users cannot be fetched.
    pub async fn search_users(&self, query: &str) -> Result<Vec<UserAccount>, RoleChangeFlowError> {
        Ok(self.roles.search_users(query.trim()).await?)
    }

    /// # Errors
    ///
    /// Returns `RoleChangeFlowError::UnknownUser` if no user has `code`.
    pub async fn find_user(&self, code: UserCode) -> Result<UserAccount, RoleChangeFlowError> {
        self.roles
            .search_users(&code.to_string())
            .await?
            .into_iter()
            .find(|user| user.code == code)
            .ok_or(RoleChangeFlowError::UnknownUser(code))
    }

    /// Open the dialog for `user` with the roles currently defined.
    ///
    /// # Errors
    ///
    /// Returns `RoleChangeFlowError::Storage` if roles cannot be fetched.
    pub async fn open(&self, user: UserAccount) -> Result<RoleChangeGuard, RoleChangeFlowError> {
        let roles = self.roles().await?;
        Ok(RoleChangeGuard::new(user, roles))
    }

    /// Submit a confirmed change.
    ///
    /// The guard refuses no-op and unconfirmed changes before anything is
    /// sent. A refusal from the backend leaves the candidate pending.
    ///
    /// # Errors
    ///
    /// Returns `RoleChangeFlowError::Guard` when the guard refuses the commit
    /// and `Rejected` with the dialog message when the backend refuses it.
    pub async fn commit(
        &self,
        guard: &mut RoleChangeGuard,
        prompt: &ConfirmationPrompt,
    ) -> Result<UserAccount, RoleChangeFlowError> {
        let role = guard.begin_commit(prompt)?;
        let user = guard.user().code;

        match self.roles.update_user_role(user, role).await {
            Ok(updated) => {
                guard.resolve(Ok(updated.clone()))?;
                tracing::info!(%user, %role, "user role changed");
                Ok(updated)
            }
            Err(err) => {
                let failure = err.failure();
                guard.resolve(Err(failure.clone()))?;
                let message = guard
                    .last_failure()
                    .map_or_else(|| failure.user_message(), str::to_owned);
                tracing::warn!(%user, %role, error = %err, "role change refused");
                Err(RoleChangeFlowError::Rejected { message, failure })
            }
        }
    }

    /// Select, confirm and commit in one go, for callers that have already
    /// asked the user (e.g. a `--yes` flag).
    ///
    /// # Errors
    ///
    /// As [`RoleService::commit`], plus `Guard` if `role` is unknown.
    pub async fn change_role(
        &self,
        guard: &mut RoleChangeGuard,
        role: RoleId,
    ) -> Result<UserAccount, RoleChangeFlowError> {
        if role == guard.current_role() {
            return Err(RoleChangeError::NoOp(role).into());
        }
        guard.select(role)?;
        let prompt = guard
            .confirmation()
            .ok_or(RoleChangeError::NothingPending)?;
        self.commit(guard, &prompt).await
    }
}
