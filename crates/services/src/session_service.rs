use std::collections::BTreeMap;
use std::sync::Arc;

use clinic_core::model::{
    ConsultationId, DateRange, PatientId, Percent, PlanId, PlanItemId, Session, SessionDraft,
    SessionId, suggest_next,
};
use storage::repository::{Page, PlanSessions, SessionFilters, SessionStore, StorageError};

use crate::Clock;
use crate::error::SessionServiceError;
use crate::session_form::SessionForm;
use crate::session_table::SessionTable;

/// Where a session lands when a patient's history is grouped by plan.
///
/// Sessions with no plan get their own bucket rather than a sentinel plan id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlanBucket {
    Plan(PlanId),
    Unassigned,
}

impl PlanBucket {
    #[must_use]
    pub fn of(session: &Session) -> Self {
        session.plan().map_or(Self::Unassigned, Self::Plan)
    }
}

/// A patient's sessions grouped by treatment plan, oldest first in each group.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientHistory {
    pub patient: PatientId,
    pub patient_name: Option<String>,
    pub groups: BTreeMap<PlanBucket, Vec<Session>>,
}

impl PatientHistory {
    #[must_use]
    pub fn sessions_in(&self, bucket: PlanBucket) -> &[Session] {
        self.groups.get(&bucket).map(Vec::as_slice).unwrap_or(&[])
    }

    #[must_use]
    pub fn total_sessions(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn total_minutes(&self) -> u32 {
        self.groups
            .values()
            .flatten()
            .map(Session::duration_minutes)
            .sum()
    }
}

#[must_use]
pub fn group_by_plan(sessions: Vec<Session>) -> BTreeMap<PlanBucket, Vec<Session>> {
    let mut groups: BTreeMap<PlanBucket, Vec<Session>> = BTreeMap::new();
    for session in sessions {
        groups.entry(PlanBucket::of(&session)).or_default().push(session);
    }
    for sessions in groups.values_mut() {
        sessions.sort_by_key(|s| (s.date(), s.id()));
    }
    groups
}

/// Reads and deletes treatment sessions and hands out submission forms.
#[derive(Clone)]
pub struct SessionService {
    clock: Clock,
    sessions: Arc<dyn SessionStore>,
}

impl SessionService {
    #[must_use]
    pub fn new(clock: Clock, sessions: Arc<dyn SessionStore>) -> Self {
        Self { clock, sessions }
    }

    /// A fresh submission form; each dialog should own its own.
    #[must_use]
    pub fn form(&self) -> SessionForm {
        SessionForm::new(Arc::clone(&self.sessions))
    }

    /// Blank draft dated today, with progress pre-filled from the item's
    /// current progress when an item is given.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError::Storage` if the item's progress cannot be read.
    pub async fn new_draft(
        &self,
        item: Option<PlanItemId>,
        consultation: Option<ConsultationId>,
    ) -> Result<SessionDraft, SessionServiceError> {
        let mut draft = SessionDraft::new(self.clock.today());
        draft.plan_item = item;
        draft.consultation = consultation;
        if let Some(item) = item.filter(PlanItemId::is_present) {
            let progress = match self.sessions.progress_of_item(item).await {
                Ok(progress) => progress.current,
                Err(StorageError::NotFound(_)) => Percent::ZERO,
                Err(err) => return Err(err.into()),
            };
            draft.current_progress = suggest_next(progress).value();
        }
        Ok(draft)
    }

    /// # Errors
    ///
    /// Returns `SessionServiceError::Storage` if the listing fails.
    pub async fn list(&self, filters: &SessionFilters) -> Result<Page<Session>, SessionServiceError> {
        Ok(self.sessions.list(filters).await?)
    }

    /// Fetch `filters` and replace the table's rows with the result.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError::Storage` if the listing fails; the table
    /// is left untouched.
    pub async fn refresh(
        &self,
        table: &mut SessionTable,
        filters: &SessionFilters,
    ) -> Result<(), SessionServiceError> {
        let page = self.sessions.list(filters).await?;
        table.replace(filters.page.unwrap_or(1), page);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionServiceError::Storage` if the session is missing or the call fails.
    pub async fn get(&self, id: SessionId) -> Result<Session, SessionServiceError> {
        Ok(self.sessions.get(id).await?)
    }

    /// Delete a session and drop its row from `table`.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError::Storage` if the delete fails.
    pub async fn delete(
        &self,
        id: SessionId,
        table: &mut SessionTable,
    ) -> Result<(), SessionServiceError> {
        self.sessions.delete(id).await?;
        table.apply_deleted(id);
        tracing::debug!(session = %id, "session deleted");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionServiceError::Storage` if the plan is missing or the call fails.
    pub async fn plan_sessions(&self, plan: PlanId) -> Result<PlanSessions, SessionServiceError> {
        Ok(self.sessions.list_by_plan(plan).await?)
    }

    /// # Errors
    ///
    /// Returns `SessionServiceError::Storage` if the patient is missing or the call fails.
    pub async fn patient_history(
        &self,
        patient: PatientId,
        dates: DateRange,
    ) -> Result<PatientHistory, SessionServiceError> {
        let listing = self.sessions.list_by_patient(patient, dates).await?;
        Ok(PatientHistory {
            patient: listing.patient,
            patient_name: listing.patient_name,
            groups: group_by_plan(listing.sessions),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn session(id: u64, plan: Option<u64>, day: u32) -> Session {
        Session::from_remote(
            SessionId::new(id),
            PlanItemId::new(7),
            ConsultationId::new(3),
            plan.map(PlanId::new),
            NaiveDate::from_ymd_opt(2025, 10, day).unwrap(),
            None,
            40,
            Percent::ZERO,
            Percent::new(25.0).unwrap(),
            "Control".into(),
        )
        .unwrap()
    }

    #[test]
    fn sessions_without_plan_get_their_own_bucket() {
        let groups = group_by_plan(vec![
            session(3, Some(2), 20),
            session(1, None, 5),
            session(2, Some(2), 10),
        ]);
        let keys: Vec<PlanBucket> = groups.keys().copied().collect();
        assert_eq!(
            keys,
            vec![PlanBucket::Plan(PlanId::new(2)), PlanBucket::Unassigned]
        );
        let planned: Vec<SessionId> = groups[&PlanBucket::Plan(PlanId::new(2))]
            .iter()
            .map(Session::id)
            .collect();
        assert_eq!(planned, vec![SessionId::new(2), SessionId::new(3)]);
    }

    #[test]
    fn history_totals_span_all_buckets() {
        let history = PatientHistory {
            patient: PatientId::new(4),
            patient_name: Some("Ana Pérez".into()),
            groups: group_by_plan(vec![session(1, None, 5), session(2, Some(8), 6)]),
        };
        assert_eq!(history.total_sessions(), 2);
        assert_eq!(history.total_minutes(), 80);
        assert_eq!(history.sessions_in(PlanBucket::Plan(PlanId::new(9))).len(), 0);
    }
}
