use std::sync::Arc;

use clinic_core::model::{
    DateRange, DentistId, DentistStats, ItemProgress, PlanId, PlanItemId, PlanProgress, Session,
};
use storage::repository::SessionStore;

use crate::error::ProgressServiceError;

/// A plan's progress snapshot together with the sessions behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOverview {
    pub progress: PlanProgress,
    pub sessions: Vec<Session>,
}

impl PlanOverview {
    /// Minutes spent across all of the plan's sessions.
    #[must_use]
    pub fn total_minutes(&self) -> u32 {
        self.sessions.iter().map(Session::duration_minutes).sum()
    }
}

/// Read-only treatment progress queries.
#[derive(Clone)]
pub struct ProgressService {
    sessions: Arc<dyn SessionStore>,
}

impl ProgressService {
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
        Self { sessions }
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the plan is missing or the call fails.
    pub async fn plan_progress(&self, plan: PlanId) -> Result<PlanProgress, ProgressServiceError> {
        Ok(self.sessions.progress_of_plan(plan).await?)
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the plan is missing or a call fails.
    pub async fn plan_overview(&self, plan: PlanId) -> Result<PlanOverview, ProgressServiceError> {
        let progress = self.sessions.progress_of_plan(plan).await?;
        let listing = self.sessions.list_by_plan(plan).await?;
        Ok(PlanOverview {
            progress,
            sessions: listing.sessions,
        })
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the item is missing or the call fails.
    pub async fn item_progress(
        &self,
        item: PlanItemId,
    ) -> Result<ItemProgress, ProgressServiceError> {
        Ok(self.sessions.progress_of_item(item).await?)
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the dentist is missing or the call fails.
    pub async fn dentist_stats(
        &self,
        dentist: DentistId,
        dates: DateRange,
    ) -> Result<DentistStats, ProgressServiceError> {
        Ok(self.sessions.dentist_stats(dentist, dates).await?)
    }
}
