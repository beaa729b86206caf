use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use clinic_core::FieldErrors;
use clinic_core::model::{
    ConsultationId, DateRange, DentistId, DentistStats, ItemProgress, ItemStatus, PatientId,
    Percent, PlanId, PlanItemId, PlanProgress, Session, SessionDraft, SessionError, SessionId,
    SessionPatch,
};
use services::{SessionForm, SessionFormError, SessionTable};
use storage::repository::{
    Page, PatientSessions, PlanSessions, SessionFilters, SessionStore, StorageError,
};
use tokio::sync::Notify;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 27).unwrap()
}

fn recorded(previous: f64, current: f64) -> Session {
    Session::from_remote(
        SessionId::new(31),
        PlanItemId::new(11),
        ConsultationId::new(4),
        Some(PlanId::new(2)),
        day(),
        None,
        45,
        Percent::new(previous).unwrap(),
        Percent::new(current).unwrap(),
        "Obturación".into(),
    )
    .unwrap()
}

/// Session store that answers `create`/`update` with a canned reply and counts calls.
struct StubSessions {
    prior: Percent,
    reply: Result<Session, StorageError>,
    writes: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl StubSessions {
    fn new(prior: f64, reply: Result<Session, StorageError>) -> Self {
        Self {
            prior: Percent::new(prior).unwrap(),
            reply,
            writes: AtomicUsize::new(0),
            gate: None,
        }
    }

    fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    async fn answer(&self) -> Result<Session, StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.reply.clone()
    }
}

#[async_trait]
impl SessionStore for StubSessions {
    async fn list(&self, _filters: &SessionFilters) -> Result<Page<Session>, StorageError> {
        Ok(Page::single(Vec::new()))
    }

    async fn create(&self, _draft: &SessionDraft) -> Result<Session, StorageError> {
        self.answer().await
    }

    async fn get(&self, _id: SessionId) -> Result<Session, StorageError> {
        Err(StorageError::NotFound(None))
    }

    async fn update(&self, _id: SessionId, _patch: &SessionPatch) -> Result<Session, StorageError> {
        self.answer().await
    }

    async fn delete(&self, _id: SessionId) -> Result<(), StorageError> {
        Ok(())
    }

    async fn list_by_plan(&self, plan: PlanId) -> Result<PlanSessions, StorageError> {
        Ok(PlanSessions {
            plan,
            sessions: Vec::new(),
        })
    }

    async fn list_by_patient(
        &self,
        patient: PatientId,
        _dates: DateRange,
    ) -> Result<PatientSessions, StorageError> {
        Ok(PatientSessions {
            patient,
            patient_name: None,
            sessions: Vec::new(),
        })
    }

    async fn progress_of_plan(&self, _plan: PlanId) -> Result<PlanProgress, StorageError> {
        Err(StorageError::NotFound(None))
    }

    async fn progress_of_item(&self, item: PlanItemId) -> Result<ItemProgress, StorageError> {
        Ok(ItemProgress {
            item_id: item,
            previous: Percent::ZERO,
            current: self.prior,
            total_sessions: 1,
            last_session_date: Some(day()),
            status: ItemStatus::Active,
            billable: false,
        })
    }

    async fn dentist_stats(
        &self,
        _dentist: DentistId,
        _dates: DateRange,
    ) -> Result<DentistStats, StorageError> {
        Err(StorageError::NotFound(None))
    }
}

fn draft(current: f64) -> SessionDraft {
    SessionDraft {
        plan_item: Some(PlanItemId::new(11)),
        consultation: Some(ConsultationId::new(4)),
        actions: "Obturación".into(),
        current_progress: current,
        ..SessionDraft::new(day())
    }
}

#[tokio::test]
async fn regression_is_refused_before_any_request() {
    let store = Arc::new(StubSessions::new(40.0, Ok(recorded(40.0, 60.0))));
    let form = SessionForm::new(store.clone());

    let err = form.submit(&draft(30.0)).await.unwrap_err();
    let fields = err.fields().expect("field errors");
    assert!(fields.message("progreso_actual").unwrap().contains("40"));
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn missing_duration_and_actions_are_both_reported() {
    let store = Arc::new(StubSessions::new(0.0, Ok(recorded(0.0, 20.0))));
    let form = SessionForm::new(store.clone());

    let mut bad = draft(20.0);
    bad.duration_minutes = 0;
    bad.actions = "   ".into();
    let err = form.submit(&bad).await.unwrap_err();
    let fields = err.fields().expect("field errors");
    assert!(fields.contains("duracion_minutos"));
    assert!(fields.contains("acciones_realizadas"));
    assert_eq!(fields.len(), 2);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn valid_draft_is_sent_once() {
    let store = Arc::new(StubSessions::new(40.0, Ok(recorded(40.0, 60.0))));
    let form = SessionForm::new(store.clone());

    let session = form.submit(&draft(60.0)).await.unwrap();
    assert_eq!(session.increment(), 20.0);
    assert_eq!(store.writes(), 1);
    assert!(!form.is_submitting());
}

#[tokio::test]
async fn backend_field_errors_replace_local_verdict() {
    let mut server = FieldErrors::new();
    server.add("consulta", "La consulta no pertenece al paciente del plan.");
    let store = Arc::new(StubSessions::new(0.0, Err(StorageError::validation(server))));
    let form = SessionForm::new(store.clone());

    let err = form.submit(&draft(25.0)).await.unwrap_err();
    let fields = err.fields().expect("field errors");
    assert_eq!(
        fields.message("consulta"),
        Some("La consulta no pertenece al paciente del plan.")
    );
    assert_eq!(store.writes(), 1);
    assert!(!form.is_submitting(), "flag released after a failed submit");
}

#[tokio::test]
async fn second_submit_while_pending_is_busy() {
    let gate = Arc::new(Notify::new());
    let store = Arc::new(StubSessions::new(0.0, Ok(recorded(0.0, 25.0))).gated(Arc::clone(&gate)));
    let form = SessionForm::new(store.clone());
    let first_draft = draft(25.0);
    let second_draft = draft(25.0);

    let (first, second, ()) = tokio::join!(
        form.submit(&first_draft),
        form.submit(&second_draft),
        async { gate.notify_one() },
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|r| matches!(r, Err(SessionFormError::Busy)))
            .count(),
        1
    );
    assert_eq!(store.writes(), 1);
}

#[tokio::test]
async fn archived_session_cannot_be_edited() {
    let store = Arc::new(StubSessions::new(40.0, Ok(recorded(40.0, 70.0))));
    let form = SessionForm::new(store.clone());
    let archived = recorded(40.0, 60.0).archived(true);

    let err = form
        .update(
            &archived,
            &SessionPatch {
                current_progress: Some(70.0),
                ..SessionPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionFormError::Session(SessionError::Archived(id)) if id == SessionId::new(31)
    ));
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn edit_below_prior_progress_is_refused_locally() {
    let store = Arc::new(StubSessions::new(40.0, Ok(recorded(40.0, 70.0))));
    let form = SessionForm::new(store.clone());

    let err = form
        .update(
            &recorded(40.0, 60.0),
            &SessionPatch {
                current_progress: Some(35.0),
                ..SessionPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.fields().unwrap().contains("progreso_actual"));
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn saved_sessions_patch_the_owning_table() {
    let store = Arc::new(StubSessions::new(40.0, Ok(recorded(40.0, 60.0))));
    let form = SessionForm::new(store.clone());
    let mut table = SessionTable::new();

    let created = form.submit_into(&draft(60.0), &mut table).await.unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.total(), 1);

    let patch = SessionPatch {
        actions: Some("Obturación y pulido".into()),
        ..SessionPatch::default()
    };
    form.update_in(&created, &patch, &mut table).await.unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(store.writes(), 2);

    let rejected = form.submit_into(&draft(30.0), &mut table).await;
    assert!(rejected.is_err());
    assert_eq!(table.total(), 1);
}
