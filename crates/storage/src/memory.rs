//! In-memory stores for tests and offline use.
//!
//! Mirrors the backend's own checks closely enough that service code sees the
//! same rejections it would get from the real API.

use async_trait::async_trait;
use clinic_core::model::{
    AuditEntry, AuditEntryId, AuditFilters, AuditStats, Backup, BackupDetail, BackupId,
    BackupKind, BackupMetadata, BackupStats, BackupStatus, ConsultationId, DateRange, DentistId,
    DentistStats, DownloadLink, ItemProgress, ItemStatus, LastBackup, PatientId, Percent, PlanId,
    PlanItemId, PlanProgress, Role, RoleId, Session, SessionDetails, SessionDraft, SessionId,
    SessionPatch, UserAccount, UserCode,
};
use clinic_core::time::Clock;
use clinic_core::validation::{FieldErrors, SessionField, SessionValidator};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;

use crate::repository::{
    AuditStore, BackupStore, EvidenceFile, EvidenceStore, Page, PatientSessions, PlanSessions,
    RoleStore, SessionFilters, SessionStore, StorageError,
};

const PAGE_SIZE: usize = 20;
const DOWNLOAD_EXPIRY_SECONDS: u64 = 3600;

#[derive(Debug, Clone)]
struct PlanItemRecord {
    plan: PlanId,
    status: ItemStatus,
    billable: bool,
}

#[derive(Debug, Clone, Copy)]
struct ConsultationRecord {
    patient: PatientId,
    dentist: DentistId,
}

#[derive(Debug, Default)]
struct State {
    items: BTreeMap<PlanItemId, PlanItemRecord>,
    consultations: BTreeMap<ConsultationId, ConsultationRecord>,
    patients: BTreeMap<PatientId, String>,
    sessions: BTreeMap<SessionId, Session>,
    roles: Vec<Role>,
    users: BTreeMap<UserCode, UserAccount>,
    backups: BTreeMap<BackupId, BackupDetail>,
    audit: Vec<AuditEntry>,
    uploads: Vec<(EvidenceFile, String)>,
    next_session: u64,
    next_backup: u64,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<State>>,
    clock: Clock,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            state: Arc::default(),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    // ─── seeding ───

    /// Register a plan item so sessions can be recorded against it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store is poisoned.
    pub fn add_plan_item(
        &self,
        plan: PlanId,
        item: PlanItemId,
        status: ItemStatus,
    ) -> Result<(), StorageError> {
        self.lock()?.items.insert(
            item,
            PlanItemRecord {
                plan,
                status,
                billable: status == ItemStatus::Completed,
            },
        );
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store is poisoned.
    pub fn add_consultation(
        &self,
        consultation: ConsultationId,
        patient: PatientId,
        dentist: DentistId,
    ) -> Result<(), StorageError> {
        self.lock()?.consultations.insert(
            consultation,
            ConsultationRecord { patient, dentist },
        );
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store is poisoned.
    pub fn add_patient(&self, patient: PatientId, name: impl Into<String>) -> Result<(), StorageError> {
        self.lock()?.patients.insert(patient, name.into());
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store is poisoned.
    pub fn add_role(&self, role: Role) -> Result<(), StorageError> {
        self.lock()?.roles.push(role);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store is poisoned.
    pub fn add_user(&self, user: UserAccount) -> Result<(), StorageError> {
        self.lock()?.users.insert(user.code, user);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store is poisoned.
    pub fn add_audit_entry(&self, entry: AuditEntry) -> Result<(), StorageError> {
        self.lock()?.audit.push(entry);
        Ok(())
    }

    /// Freeze a session against further edits.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist.
    pub fn archive_session(&self, id: SessionId) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let session = state
            .sessions
            .remove(&id)
            .ok_or(StorageError::NotFound(None))?;
        state.sessions.insert(id, session.archived(true));
        Ok(())
    }

    /// Files uploaded so far, with the category they were filed under.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store is poisoned.
    pub fn uploads(&self) -> Result<Vec<(EvidenceFile, String)>, StorageError> {
        Ok(self.lock()?.uploads.clone())
    }
}

fn latest_progress(state: &State, item: PlanItemId) -> Option<&Session> {
    state
        .sessions
        .values()
        .filter(|s| s.plan_item() == item)
        .max_by(|a, b| {
            a.current_progress()
                .partial_cmp(&b.current_progress())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.date().cmp(&b.date()))
        })
}

fn prior_progress(state: &State, item: PlanItemId) -> Percent {
    latest_progress(state, item).map_or(Percent::ZERO, Session::current_progress)
}

fn patient_of(state: &State, session: &Session) -> Option<PatientId> {
    state
        .consultations
        .get(&session.consultation())
        .map(|c| c.patient)
}

fn paginate<T: Clone>(rows: &[T], page: Option<u32>, page_size: usize) -> Page<T> {
    let page = page.unwrap_or(1).max(1) as usize;
    let start = (page - 1).saturating_mul(page_size);
    let items: Vec<T> = rows.iter().skip(start).take(page_size).cloned().collect();
    Page {
        has_next: start + items.len() < rows.len(),
        total: rows.len() as u64,
        items,
    }
}

fn invalid_reference(field: SessionField, message: &str) -> StorageError {
    let mut fields = FieldErrors::new();
    fields.add(field.as_str(), message);
    StorageError::validation(fields)
}

#[async_trait]
impl SessionStore for InMemoryRepository {
    async fn list(&self, filters: &SessionFilters) -> Result<Page<Session>, StorageError> {
        let state = self.lock()?;
        let rows: Vec<Session> = state
            .sessions
            .values()
            .filter(|s| filters.plan_item.is_none_or(|item| s.plan_item() == item))
            .filter(|s| filters.plan.is_none_or(|plan| s.plan() == Some(plan)))
            .filter(|s| {
                filters
                    .patient
                    .is_none_or(|patient| patient_of(&state, s) == Some(patient))
            })
            .filter(|s| filters.dates.contains(s.date()))
            .cloned()
            .collect();
        Ok(paginate(&rows, filters.page, PAGE_SIZE))
    }

    async fn create(&self, draft: &SessionDraft) -> Result<Session, StorageError> {
        let mut state = self.lock()?;

        let previous = draft
            .plan_item
            .map_or(Percent::ZERO, |item| prior_progress(&state, item));
        SessionValidator::check(draft, previous)
            .into_result()
            .map_err(StorageError::validation)?;

        let (Some(item), Some(consultation), Some(date)) =
            (draft.plan_item, draft.consultation, draft.date)
        else {
            return Err(StorageError::validation(FieldErrors::new()));
        };
        let plan = state
            .items
            .get(&item)
            .map(|record| record.plan)
            .ok_or_else(|| invalid_reference(SessionField::PlanItem, "El ítem del plan no existe"))?;
        if !state.consultations.contains_key(&consultation) {
            return Err(invalid_reference(
                SessionField::Consultation,
                "La consulta no existe",
            ));
        }

        let current = Percent::new(draft.current_progress)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let duration = u32::try_from(draft.duration_minutes)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        state.next_session += 1;
        let id = SessionId::new(state.next_session);
        let patient_name = state
            .consultations
            .get(&consultation)
            .and_then(|c| state.patients.get(&c.patient))
            .cloned();
        let session = Session::from_remote(
            id,
            item,
            consultation,
            Some(plan),
            date,
            draft.start_time,
            duration,
            previous,
            current,
            draft.actions.trim().to_owned(),
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?
        .with_notes(draft.notes.clone())
        .with_complications(draft.complications.clone())
        .with_evidence(draft.evidence.clone())
        .with_details(SessionDetails {
            patient_name,
            recorded_at: Some(self.clock.now()),
            ..SessionDetails::default()
        });

        if let Some(record) = state.items.get_mut(&item) {
            record.status = if current.is_full() {
                ItemStatus::Completed
            } else {
                ItemStatus::Active
            };
            record.billable = current.is_full();
        }
        state.sessions.insert(id, session.clone());
        Ok(session)
    }

    async fn get(&self, id: SessionId) -> Result<Session, StorageError> {
        self.lock()?
            .sessions
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound(None))
    }

    async fn update(&self, id: SessionId, patch: &SessionPatch) -> Result<Session, StorageError> {
        let mut state = self.lock()?;
        let session = state
            .sessions
            .get_mut(&id)
            .ok_or(StorageError::NotFound(None))?;
        SessionValidator::check_patch(patch, session.previous_progress())
            .into_result()
            .map_err(StorageError::validation)?;
        session.apply_patch(patch).map_err(|e| StorageError::Validation {
            detail: Some(e.to_string()),
            fields: FieldErrors::new(),
        })?;
        Ok(session.clone())
    }

    async fn delete(&self, id: SessionId) -> Result<(), StorageError> {
        self.lock()?
            .sessions
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NotFound(None))
    }

    async fn list_by_plan(&self, plan: PlanId) -> Result<PlanSessions, StorageError> {
        let state = self.lock()?;
        if !state.items.values().any(|record| record.plan == plan) {
            return Err(StorageError::NotFound(Some(format!(
                "Plan de tratamiento {plan} no encontrado"
            ))));
        }
        let sessions = state
            .sessions
            .values()
            .filter(|s| s.plan() == Some(plan))
            .cloned()
            .collect();
        Ok(PlanSessions { plan, sessions })
    }

    async fn list_by_patient(
        &self,
        patient: PatientId,
        dates: DateRange,
    ) -> Result<PatientSessions, StorageError> {
        let state = self.lock()?;
        let known = state.patients.contains_key(&patient)
            || state.consultations.values().any(|c| c.patient == patient);
        if !known {
            return Err(StorageError::NotFound(None));
        }
        let sessions = state
            .sessions
            .values()
            .filter(|s| patient_of(&state, s) == Some(patient) && dates.contains(s.date()))
            .cloned()
            .collect();
        Ok(PatientSessions {
            patient,
            patient_name: state.patients.get(&patient).cloned(),
            sessions,
        })
    }

    async fn progress_of_plan(&self, plan: PlanId) -> Result<PlanProgress, StorageError> {
        let state = self.lock()?;
        let statuses: Vec<ItemStatus> = state
            .items
            .values()
            .filter(|record| record.plan == plan)
            .map(|record| record.status)
            .collect();
        if statuses.is_empty() {
            return Err(StorageError::NotFound(None));
        }
        Ok(PlanProgress::from_statuses(plan, &statuses))
    }

    async fn progress_of_item(&self, item: PlanItemId) -> Result<ItemProgress, StorageError> {
        let state = self.lock()?;
        let record = state.items.get(&item).ok_or(StorageError::NotFound(None))?;
        let sessions: Vec<&Session> = state
            .sessions
            .values()
            .filter(|s| s.plan_item() == item)
            .collect();
        let latest = latest_progress(&state, item);
        Ok(ItemProgress {
            item_id: item,
            previous: latest.map_or(Percent::ZERO, Session::previous_progress),
            current: latest.map_or(Percent::ZERO, Session::current_progress),
            total_sessions: u32::try_from(sessions.len()).unwrap_or(u32::MAX),
            last_session_date: sessions.iter().map(|s| s.date()).max(),
            status: record.status,
            billable: record.billable,
        })
    }

    async fn dentist_stats(
        &self,
        dentist: DentistId,
        dates: DateRange,
    ) -> Result<DentistStats, StorageError> {
        let state = self.lock()?;
        if !state.consultations.values().any(|c| c.dentist == dentist) {
            return Err(StorageError::NotFound(None));
        }
        let mut patients = HashSet::new();
        let mut total_sessions = 0_u32;
        let mut total_duration = 0_u32;
        let mut total_increment = 0.0_f64;
        for session in state.sessions.values() {
            let Some(consultation) = state.consultations.get(&session.consultation()) else {
                continue;
            };
            if consultation.dentist != dentist || !dates.contains(session.date()) {
                continue;
            }
            patients.insert(consultation.patient);
            total_sessions += 1;
            total_duration = total_duration.saturating_add(session.duration_minutes());
            total_increment += session.increment();
        }
        let average = |sum: f64| {
            if total_sessions == 0 {
                0.0
            } else {
                sum / f64::from(total_sessions)
            }
        };
        Ok(DentistStats {
            dentist,
            total_sessions,
            total_patients: u32::try_from(patients.len()).unwrap_or(u32::MAX),
            average_duration_minutes: average(f64::from(total_duration)),
            total_duration_minutes: total_duration,
            average_increment: average(total_increment),
            period: dates,
        })
    }
}

#[async_trait]
impl RoleStore for InMemoryRepository {
    async fn list_roles(&self) -> Result<Vec<Role>, StorageError> {
        Ok(self.lock()?.roles.clone())
    }

    async fn search_users(&self, query: &str) -> Result<Vec<UserAccount>, StorageError> {
        let needle = query.trim().to_lowercase();
        Ok(self
            .lock()?
            .users
            .values()
            .filter(|user| {
                needle.is_empty()
                    || user.full_name().to_lowercase().contains(&needle)
                    || user.email.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }

    async fn update_user_role(
        &self,
        user: UserCode,
        role: RoleId,
    ) -> Result<UserAccount, StorageError> {
        let mut state = self.lock()?;
        let role_name = state
            .roles
            .iter()
            .find(|r| r.id() == role)
            .map(|r| r.name().to_owned())
            .ok_or_else(|| {
                let mut fields = FieldErrors::new();
                fields.add("idtipousuario", format!("Rol {role} inválido"));
                StorageError::validation(fields)
            })?;
        let account = state.users.get_mut(&user).ok_or_else(|| {
            StorageError::NotFound(Some(format!("Usuario con código {user} no encontrado.")))
        })?;
        account.role_id = role;
        account.role_name = Some(role_name);
        Ok(account.clone())
    }
}

#[async_trait]
impl EvidenceStore for InMemoryRepository {
    async fn upload(&self, file: &EvidenceFile, kind: &str) -> Result<Url, StorageError> {
        let mut state = self.lock()?;
        state.uploads.push((file.clone(), kind.to_owned()));
        let mut url = Url::parse("https://evidencias.local/")
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| StorageError::Serialization("base url cannot hold a path".into()))?
            .push(kind)
            .push(&state.uploads.len().to_string())
            .push(&file.file_name);
        Ok(url)
    }
}

#[async_trait]
impl BackupStore for InMemoryRepository {
    async fn list(&self) -> Result<Vec<Backup>, StorageError> {
        let state = self.lock()?;
        let mut backups: Vec<Backup> = state
            .backups
            .values()
            .map(|detail| detail.backup.clone())
            .collect();
        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(backups)
    }

    async fn create(&self, description: Option<&str>) -> Result<BackupDetail, StorageError> {
        let mut state = self.lock()?;
        state.next_backup += 1;
        let id = BackupId::new(state.next_backup);
        let now = self.clock.now();
        let record_count = (state.sessions.len() + state.users.len() + state.audit.len()) as u64;
        #[allow(clippy::cast_precision_loss)]
        let size_mb = record_count as f64 * 0.001;
        let detail = BackupDetail {
            backup: Backup {
                id,
                created_at: now,
                size_mb,
                record_count,
                status: BackupStatus::Completed,
                kind: BackupKind::Manual,
                description: description.unwrap_or_default().to_owned(),
                restorable: true,
            },
            storage_key: format!("backups/respaldo_{id}.json.gz"),
            checksum_md5: format!("{:032x}", u128::from(id.value())),
            execution_seconds: 0.0,
            metadata: BackupMetadata {
                models: vec!["sesiones".into(), "usuarios".into(), "bitacora".into()],
                records_per_model: BTreeMap::from([
                    ("sesiones".to_owned(), state.sessions.len() as u64),
                    ("usuarios".to_owned(), state.users.len() as u64),
                    ("bitacora".to_owned(), state.audit.len() as u64),
                ]),
                original_size_mb: size_mb,
                compressed_size_mb: size_mb,
                compression_percent: 0.0,
            },
            created_by: None,
            updated_at: Some(now),
        };
        state.backups.insert(id, detail.clone());
        Ok(detail)
    }

    async fn get(&self, id: BackupId) -> Result<BackupDetail, StorageError> {
        self.lock()?
            .backups
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound(None))
    }

    async fn delete(&self, id: BackupId) -> Result<(), StorageError> {
        self.lock()?
            .backups
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NotFound(None))
    }

    async fn download_link(&self, id: BackupId) -> Result<DownloadLink, StorageError> {
        let state = self.lock()?;
        let detail = state.backups.get(&id).ok_or(StorageError::NotFound(None))?;
        let url = Url::parse("https://respaldos.local/")
            .and_then(|base| base.join(&detail.storage_key))
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(DownloadLink {
            url,
            expiry_seconds: DOWNLOAD_EXPIRY_SECONDS,
        })
    }

    async fn stats(&self) -> Result<BackupStats, StorageError> {
        let state = self.lock()?;
        let backups: Vec<&Backup> = state.backups.values().map(|d| &d.backup).collect();
        let count = |status: BackupStatus| backups.iter().filter(|b| b.status == status).count() as u64;
        let last_backup = backups
            .iter()
            .filter(|b| b.status == BackupStatus::Completed)
            .max_by_key(|b| b.created_at)
            .map(|b| LastBackup {
                id: b.id,
                created_at: b.created_at,
                size_mb: b.size_mb,
            });
        Ok(BackupStats {
            total: backups.len() as u64,
            completed: count(BackupStatus::Completed),
            failed: count(BackupStatus::Failed),
            total_size_mb: backups.iter().map(|b| b.size_mb).sum(),
            last_backup,
        })
    }
}

#[async_trait]
impl AuditStore for InMemoryRepository {
    async fn list(&self, filters: &AuditFilters) -> Result<Page<AuditEntry>, StorageError> {
        let state = self.lock()?;
        let mut rows: Vec<AuditEntry> = state
            .audit
            .iter()
            .filter(|entry| filters.matches(entry))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.at.cmp(&a.at).then(b.id.cmp(&a.id)));
        let page_size = filters
            .page_size
            .map_or(PAGE_SIZE, |size| (size as usize).max(1));
        Ok(paginate(&rows, filters.page, page_size))
    }

    async fn get(&self, id: AuditEntryId) -> Result<AuditEntry, StorageError> {
        self.lock()?
            .audit
            .iter()
            .find(|entry| entry.id == id)
            .cloned()
            .ok_or(StorageError::NotFound(None))
    }

    async fn stats(&self, dates: &DateRange) -> Result<AuditStats, StorageError> {
        let state = self.lock()?;
        let rows: Vec<AuditEntry> = state
            .audit
            .iter()
            .filter(|entry| dates.contains(entry.at.date_naive()))
            .cloned()
            .collect();
        Ok(AuditStats::from_entries(&rows, self.clock.today()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use clinic_core::time::fixed_clock;

    fn seeded() -> InMemoryRepository {
        let repo = InMemoryRepository::with_clock(fixed_clock());
        repo.add_plan_item(PlanId::new(1), PlanItemId::new(10), ItemStatus::Pending)
            .unwrap();
        repo.add_plan_item(PlanId::new(1), PlanItemId::new(11), ItemStatus::Pending)
            .unwrap();
        repo.add_consultation(ConsultationId::new(5), PatientId::new(3), DentistId::new(8))
            .unwrap();
        repo.add_patient(PatientId::new(3), "Ana Pérez").unwrap();
        repo
    }

    fn draft(item: u64, progress: f64) -> SessionDraft {
        SessionDraft {
            plan_item: Some(PlanItemId::new(item)),
            consultation: Some(ConsultationId::new(5)),
            actions: "Obturación".into(),
            current_progress: progress,
            ..SessionDraft::new(NaiveDate::from_ymd_opt(2025, 10, 27).unwrap())
        }
    }

    #[tokio::test]
    async fn create_tracks_prior_progress() {
        let repo = seeded();
        let first = SessionStore::create(&repo, &draft(10, 40.0)).await.unwrap();
        assert_eq!(first.previous_progress(), Percent::ZERO);
        assert_eq!(first.plan(), Some(PlanId::new(1)));

        let second = SessionStore::create(&repo, &draft(10, 70.0)).await.unwrap();
        assert_eq!(second.previous_progress().value(), 40.0);
        assert_eq!(second.increment(), 30.0);
    }

    #[tokio::test]
    async fn create_rejects_regression_like_the_backend() {
        let repo = seeded();
        SessionStore::create(&repo, &draft(10, 40.0)).await.unwrap();
        let err = SessionStore::create(&repo, &draft(10, 30.0)).await.unwrap_err();
        let StorageError::Validation { fields, .. } = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(fields.message("progreso_actual").unwrap().contains("40"));
    }

    #[tokio::test]
    async fn unknown_item_is_a_field_error() {
        let repo = seeded();
        let err = SessionStore::create(&repo, &draft(99, 10.0)).await.unwrap_err();
        let StorageError::Validation { fields, .. } = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(fields.contains("item_plan"));
    }

    #[tokio::test]
    async fn plan_progress_follows_sessions() {
        let repo = seeded();
        SessionStore::create(&repo, &draft(10, 100.0)).await.unwrap();
        SessionStore::create(&repo, &draft(11, 20.0)).await.unwrap();
        let progress = repo.progress_of_plan(PlanId::new(1)).await.unwrap();
        assert_eq!(progress.total_items(), 2);
        assert_eq!(progress.completed(), 1);
        assert_eq!(progress.active(), 1);
        assert_eq!(progress.overall().value(), 50.0);

        let item = repo.progress_of_item(PlanItemId::new(10)).await.unwrap();
        assert!(item.is_done());
        assert!(item.billable);
    }

    #[tokio::test]
    async fn archived_sessions_reject_patches() {
        let repo = seeded();
        let session = SessionStore::create(&repo, &draft(10, 40.0)).await.unwrap();
        repo.archive_session(session.id()).unwrap();
        let patch = SessionPatch {
            notes: Some("tarde".into()),
            ..SessionPatch::default()
        };
        assert!(matches!(
            repo.update(session.id(), &patch).await,
            Err(StorageError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn patient_history_is_filtered_by_date() {
        let repo = seeded();
        SessionStore::create(&repo, &draft(10, 40.0)).await.unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 10, 28).unwrap();
        let history = repo
            .list_by_patient(PatientId::new(3), DateRange::new(Some(day), None))
            .await
            .unwrap();
        assert!(history.sessions.is_empty());
        assert_eq!(history.patient_name.as_deref(), Some("Ana Pérez"));
    }

    #[tokio::test]
    async fn dentist_stats_average_over_sessions() {
        let repo = seeded();
        SessionStore::create(&repo, &draft(10, 40.0)).await.unwrap();
        SessionStore::create(&repo, &draft(11, 20.0)).await.unwrap();
        let stats = repo
            .dentist_stats(DentistId::new(8), DateRange::default())
            .await
            .unwrap();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.total_patients, 1);
        assert_eq!(stats.average_duration_minutes, 30.0);
        assert_eq!(stats.average_increment, 30.0);
    }

    #[tokio::test]
    async fn backups_round_trip_through_stats() {
        let repo = seeded();
        let detail = BackupStore::create(&repo, Some("antes de migrar")).await.unwrap();
        let stats = BackupStore::stats(&repo).await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.last_backup.unwrap().id, detail.backup.id);

        let link = repo.download_link(detail.backup.id).await.unwrap();
        assert_eq!(link.file_name(detail.backup.id), "respaldo_1.json.gz");

        BackupStore::delete(&repo, detail.backup.id).await.unwrap();
        assert!(matches!(
            BackupStore::get(&repo, detail.backup.id).await,
            Err(StorageError::NotFound(_))
        ));
    }
}
