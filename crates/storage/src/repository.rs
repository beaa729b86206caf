use async_trait::async_trait;
use clinic_core::failure::{Failure, FailureKind};
use clinic_core::model::{
    AuditEntry, AuditEntryId, AuditFilters, AuditStats, Backup, BackupDetail, BackupId,
    BackupStats, DateRange, DentistId, DentistStats, DownloadLink, ItemProgress, PatientId, PlanId,
    PlanItemId, PlanProgress, Role, RoleId, Session, SessionDraft, SessionId, SessionPatch,
    UserAccount, UserCode,
};
use clinic_core::validation::FieldErrors;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

use crate::memory::InMemoryRepository;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound(Option<String>),

    #[error("forbidden")]
    Forbidden(Option<String>),

    #[error("rejected: {fields}")]
    Validation {
        detail: Option<String>,
        fields: FieldErrors,
    },

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// The response decoded but contradicts itself.
    #[error("inconsistent response: {0}")]
    Inconsistent(String),
}

impl StorageError {
    #[must_use]
    pub fn validation(fields: FieldErrors) -> Self {
        Self::Validation {
            detail: None,
            fields,
        }
    }

    /// Classify for display.
    #[must_use]
    pub fn failure(&self) -> Failure {
        match self {
            Self::NotFound(detail) => with_detail(Failure::new(FailureKind::NotFound), detail),
            Self::Forbidden(detail) => with_detail(Failure::new(FailureKind::Forbidden), detail),
            Self::Validation { detail, fields } => {
                with_detail(Failure::validation(fields.clone()), detail)
            }
            Self::Unavailable(_) | Self::Connection(_) | Self::Serialization(_) => {
                Failure::new(FailureKind::Transient)
            }
            Self::Inconsistent(_) => Failure::new(FailureKind::Inconsistent),
        }
    }
}

fn with_detail(failure: Failure, detail: &Option<String>) -> Failure {
    match detail {
        Some(detail) => failure.with_detail(detail.clone()),
        None => failure,
    }
}

impl From<StorageError> for Failure {
    fn from(err: StorageError) -> Self {
        err.failure()
    }
}

//
// ─── QUERY AND RESULT SHAPES ───────────────────────────────────────────────────
//

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total matching rows across all pages.
    pub total: u64,
    pub has_next: bool,
}

impl<T> Page<T> {
    #[must_use]
    pub fn single(items: Vec<T>) -> Self {
        Self {
            total: items.len() as u64,
            items,
            has_next: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilters {
    pub plan_item: Option<PlanItemId>,
    pub plan: Option<PlanId>,
    pub patient: Option<PatientId>,
    pub dates: DateRange,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanSessions {
    pub plan: PlanId,
    pub sessions: Vec<Session>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatientSessions {
    pub patient: PatientId,
    pub patient_name: Option<String>,
    pub sessions: Vec<Session>,
}

/// Upload category the backend files evidence under unless told otherwise.
pub const DEFAULT_EVIDENCE_KIND: &str = "evidencia_sesion";

/// A file picked for upload as session evidence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceFile {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Treatment sessions and the progress derived from them.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the listing cannot be fetched.
    async fn list(&self, filters: &SessionFilters) -> Result<Page<Session>, StorageError>;

    /// Record a new session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Validation` with per-field messages when the
    /// backend rejects the form, or other storage errors.
    async fn create(&self, draft: &SessionDraft) -> Result<Session, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get(&self, id: SessionId) -> Result<Session, StorageError>;

    /// Apply a partial update to a session's mutable fields.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Validation` when rejected, `NotFound` if missing.
    async fn update(&self, id: SessionId, patch: &SessionPatch) -> Result<Session, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn delete(&self, id: SessionId) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the plan does not exist.
    async fn list_by_plan(&self, plan: PlanId) -> Result<PlanSessions, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the patient does not exist.
    async fn list_by_patient(
        &self,
        patient: PatientId,
        dates: DateRange,
    ) -> Result<PatientSessions, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the plan does not exist.
    async fn progress_of_plan(&self, plan: PlanId) -> Result<PlanProgress, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the item does not exist.
    async fn progress_of_item(&self, item: PlanItemId) -> Result<ItemProgress, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the dentist does not exist.
    async fn dentist_stats(
        &self,
        dentist: DentistId,
        dates: DateRange,
    ) -> Result<DentistStats, StorageError>;
}

/// Roles (user types) and user role assignment.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if roles cannot be fetched.
    async fn list_roles(&self) -> Result<Vec<Role>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if users cannot be fetched.
    async fn search_users(&self, query: &str) -> Result<Vec<UserAccount>, StorageError>;

    /// Replace the user's role.
    ///
    /// # Errors
    ///
    /// `Forbidden` when the caller may not change roles, `NotFound` for an
    /// unknown user, `Validation` for a rejected role.
    async fn update_user_role(
        &self,
        user: UserCode,
        role: RoleId,
    ) -> Result<UserAccount, StorageError>;
}

/// Durable storage for session evidence files.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Upload a file and return where it can be fetched from.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the upload is rejected or fails.
    async fn upload(&self, file: &EvidenceFile, kind: &str) -> Result<Url, StorageError>;
}

/// Cloud backup administration. Backup and restore run on the backend.
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the listing cannot be fetched.
    async fn list(&self) -> Result<Vec<Backup>, StorageError>;

    /// Ask the backend for a manual backup.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend refuses or fails.
    async fn create(&self, description: Option<&str>) -> Result<BackupDetail, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn get(&self, id: BackupId) -> Result<BackupDetail, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn delete(&self, id: BackupId) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn download_link(&self, id: BackupId) -> Result<DownloadLink, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if stats cannot be fetched.
    async fn stats(&self) -> Result<BackupStats, StorageError>;
}

/// Read-only view of the backend's activity log.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the listing cannot be fetched.
    async fn list(&self, filters: &AuditFilters) -> Result<Page<AuditEntry>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn get(&self, id: AuditEntryId) -> Result<AuditEntry, StorageError>;

    /// Activity summary over `dates`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the summary cannot be fetched.
    async fn stats(&self, dates: &DateRange) -> Result<AuditStats, StorageError>;
}

/// Aggregates the stores behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionStore>,
    pub roles: Arc<dyn RoleStore>,
    pub evidence: Arc<dyn EvidenceStore>,
    pub backups: Arc<dyn BackupStore>,
    pub audit: Arc<dyn AuditStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_memory(InMemoryRepository::new())
    }

    /// Wrap an existing in-memory repository, e.g. one seeded by a test.
    #[must_use]
    pub fn from_memory(repo: InMemoryRepository) -> Self {
        let sessions: Arc<dyn SessionStore> = Arc::new(repo.clone());
        let roles: Arc<dyn RoleStore> = Arc::new(repo.clone());
        let evidence: Arc<dyn EvidenceStore> = Arc::new(repo.clone());
        let backups: Arc<dyn BackupStore> = Arc::new(repo.clone());
        let audit: Arc<dyn AuditStore> = Arc::new(repo);
        Self {
            sessions,
            roles,
            evidence,
            backups,
            audit,
        }
    }
}
