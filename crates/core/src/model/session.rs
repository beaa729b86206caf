use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

use crate::model::evidence::EvidenceRef;
use crate::model::ids::{ConsultationId, PlanId, PlanItemId, SessionId};
use crate::model::progress::{InvalidRangeError, Percent};

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session {0} is archived and can no longer be edited")]
    Archived(SessionId),

    #[error("current progress {current} is below prior progress {previous}")]
    ProgressRegression { previous: Percent, current: Percent },

    #[error("duration must be > 0 minutes")]
    ZeroDuration,

    #[error(transparent)]
    InvalidProgress(#[from] InvalidRangeError),
}

/// One recorded clinical encounter advancing a plan item's progress.
///
/// Reference fields (plan item, consultation, prior progress) are fixed at
/// creation; everything else may change through [`SessionPatch`] until the
/// session is archived.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: SessionId,
    plan_item: PlanItemId,
    consultation: ConsultationId,
    plan: Option<PlanId>,
    date: NaiveDate,
    start_time: Option<NaiveTime>,
    duration_minutes: u32,
    previous_progress: Percent,
    current_progress: Percent,
    actions: String,
    notes: Option<String>,
    complications: Option<String>,
    evidence: Vec<EvidenceRef>,
    archived: bool,
    details: SessionDetails,
}

/// Display-only fields the backend joins onto a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDetails {
    pub patient_name: Option<String>,
    pub service_name: Option<String>,
    pub recorded_by: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Rehydrate a session from a backend record.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ProgressRegression` if current progress is below prior progress,
    /// `SessionError::ZeroDuration` for a zero duration.
    #[allow(clippy::too_many_arguments)]
    pub fn from_remote(
        id: SessionId,
        plan_item: PlanItemId,
        consultation: ConsultationId,
        plan: Option<PlanId>,
        date: NaiveDate,
        start_time: Option<NaiveTime>,
        duration_minutes: u32,
        previous_progress: Percent,
        current_progress: Percent,
        actions: String,
    ) -> Result<Self, SessionError> {
        if current_progress < previous_progress {
            return Err(SessionError::ProgressRegression {
                previous: previous_progress,
                current: current_progress,
            });
        }
        if duration_minutes == 0 {
            return Err(SessionError::ZeroDuration);
        }
        Ok(Self {
            id,
            plan_item,
            consultation,
            plan,
            date,
            start_time,
            duration_minutes,
            previous_progress,
            current_progress,
            actions,
            notes: None,
            complications: None,
            evidence: Vec::new(),
            archived: false,
            details: SessionDetails::default(),
        })
    }

    #[must_use]
    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = non_blank(notes);
        self
    }

    #[must_use]
    pub fn with_complications(mut self, complications: Option<String>) -> Self {
        self.complications = non_blank(complications);
        self
    }

    #[must_use]
    pub fn with_evidence(mut self, evidence: Vec<EvidenceRef>) -> Self {
        self.evidence = evidence;
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: SessionDetails) -> Self {
        self.details = details;
        self
    }

    #[must_use]
    pub fn archived(mut self, archived: bool) -> Self {
        self.archived = archived;
        self
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn plan_item(&self) -> PlanItemId {
        self.plan_item
    }

    #[must_use]
    pub fn consultation(&self) -> ConsultationId {
        self.consultation
    }

    #[must_use]
    pub fn plan(&self) -> Option<PlanId> {
        self.plan
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    #[must_use]
    pub fn start_time(&self) -> Option<NaiveTime> {
        self.start_time
    }

    #[must_use]
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    #[must_use]
    pub fn previous_progress(&self) -> Percent {
        self.previous_progress
    }

    #[must_use]
    pub fn current_progress(&self) -> Percent {
        self.current_progress
    }

    #[must_use]
    pub fn increment(&self) -> f64 {
        self.current_progress.value() - self.previous_progress.value()
    }

    #[must_use]
    pub fn actions(&self) -> &str {
        &self.actions
    }

    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    #[must_use]
    pub fn complications(&self) -> Option<&str> {
        self.complications.as_deref()
    }

    #[must_use]
    pub fn evidence(&self) -> &[EvidenceRef] {
        &self.evidence
    }

    #[must_use]
    pub fn is_archived(&self) -> bool {
        self.archived
    }

    #[must_use]
    pub fn details(&self) -> &SessionDetails {
        &self.details
    }

    /// Apply an edit to the mutable fields of this session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Archived` for archived sessions, and the same
    /// invariants as [`Session::from_remote`] for the edited values.
    pub fn apply_patch(&mut self, patch: &SessionPatch) -> Result<(), SessionError> {
        if self.archived {
            return Err(SessionError::Archived(self.id));
        }
        let current = patch.current_progress.map(Percent::new).transpose()?;
        if let Some(current) = current.filter(|c| *c < self.previous_progress) {
            return Err(SessionError::ProgressRegression {
                previous: self.previous_progress,
                current,
            });
        }
        if patch.duration_minutes == Some(0) {
            return Err(SessionError::ZeroDuration);
        }

        if let Some(current) = current {
            self.current_progress = current;
        }
        if let Some(duration) = patch.duration_minutes {
            self.duration_minutes = duration;
        }
        if let Some(actions) = &patch.actions {
            self.actions.clone_from(actions);
        }
        if let Some(notes) = &patch.notes {
            self.notes = non_blank(Some(notes.clone()));
        }
        if let Some(complications) = &patch.complications {
            self.complications = non_blank(Some(complications.clone()));
        }
        if let Some(evidence) = &patch.evidence {
            self.evidence.clone_from(evidence);
        }
        Ok(())
    }
}

/// Form state for recording a new session.
///
/// Fields hold whatever the user typed; nothing here is trusted until the
/// validator and then the backend accept it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDraft {
    pub plan_item: Option<PlanItemId>,
    pub consultation: Option<ConsultationId>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub duration_minutes: i64,
    pub current_progress: f64,
    pub actions: String,
    pub notes: Option<String>,
    pub complications: Option<String>,
    pub evidence: Vec<EvidenceRef>,
}

impl SessionDraft {
    /// A blank form dated `today` with the clinic's usual 30-minute slot.
    #[must_use]
    pub fn new(today: NaiveDate) -> Self {
        Self {
            plan_item: None,
            consultation: None,
            date: Some(today),
            start_time: None,
            duration_minutes: 30,
            current_progress: 0.0,
            actions: String::new(),
            notes: None,
            complications: None,
            evidence: Vec::new(),
        }
    }

    /// Draft for correcting an existing session; mostly useful for revalidation.
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        Self {
            plan_item: Some(session.plan_item()),
            consultation: Some(session.consultation()),
            date: Some(session.date()),
            start_time: session.start_time(),
            duration_minutes: i64::from(session.duration_minutes()),
            current_progress: session.current_progress().value(),
            actions: session.actions().to_owned(),
            notes: session.notes().map(str::to_owned),
            complications: session.complications().map(str::to_owned),
            evidence: session.evidence().to_vec(),
        }
    }
}

/// Partial update of a session's mutable fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub duration_minutes: Option<u32>,
    pub current_progress: Option<f64>,
    pub actions: Option<String>,
    pub notes: Option<String>,
    pub complications: Option<String>,
    pub evidence: Option<Vec<EvidenceRef>>,
}

impl SessionPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.duration_minutes.is_none()
            && self.current_progress.is_none()
            && self.actions.is_none()
            && self.notes.is_none()
            && self.complications.is_none()
            && self.evidence.is_none()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::from_remote(
            SessionId::new(1),
            PlanItemId::new(7),
            ConsultationId::new(3),
            Some(PlanId::new(2)),
            NaiveDate::from_ymd_opt(2025, 10, 27).unwrap(),
            None,
            45,
            Percent::new(40.0).unwrap(),
            Percent::new(60.0).unwrap(),
            "Endodoncia, conducto 2".into(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_regressing_remote_record() {
        let err = Session::from_remote(
            SessionId::new(1),
            PlanItemId::new(7),
            ConsultationId::new(3),
            None,
            NaiveDate::from_ymd_opt(2025, 10, 27).unwrap(),
            None,
            45,
            Percent::new(40.0).unwrap(),
            Percent::new(30.0).unwrap(),
            String::new(),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::ProgressRegression { .. }));
    }

    #[test]
    fn patch_updates_mutable_fields_only() {
        let mut s = session();
        let patch = SessionPatch {
            duration_minutes: Some(50),
            current_progress: Some(80.0),
            notes: Some("control en 7 días".into()),
            ..SessionPatch::default()
        };
        s.apply_patch(&patch).unwrap();
        assert_eq!(s.duration_minutes(), 50);
        assert_eq!(s.current_progress().value(), 80.0);
        assert_eq!(s.previous_progress().value(), 40.0);
        assert_eq!(s.plan_item(), PlanItemId::new(7));
        assert_eq!(s.notes(), Some("control en 7 días"));
        assert!((s.increment() - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn patch_cannot_regress_progress() {
        let mut s = session();
        let patch = SessionPatch {
            current_progress: Some(20.0),
            ..SessionPatch::default()
        };
        assert!(s.apply_patch(&patch).is_err());
        assert_eq!(s.current_progress().value(), 60.0);
    }

    #[test]
    fn archived_sessions_are_read_only() {
        let mut s = session().archived(true);
        let patch = SessionPatch {
            duration_minutes: Some(10),
            ..SessionPatch::default()
        };
        assert_eq!(
            s.apply_patch(&patch),
            Err(SessionError::Archived(SessionId::new(1)))
        );
    }

    #[test]
    fn blank_notes_are_dropped() {
        let s = session().with_notes(Some("   ".into()));
        assert_eq!(s.notes(), None);
    }
}
