use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::audit_service::AuditService;
use crate::backup_service::BackupService;
use crate::config::{AppConfig, UploadMode};
use crate::error::AppServicesError;
use crate::evidence_service::EvidenceService;
use crate::progress_service::ProgressService;
use crate::role_service::RoleService;
use crate::session_service::SessionService;

/// Assembles app-facing services over one set of stores.
#[derive(Clone)]
pub struct AppServices {
    sessions: Arc<SessionService>,
    progress: Arc<ProgressService>,
    roles: Arc<RoleService>,
    evidence: Arc<EvidenceService>,
    backups: Arc<BackupService>,
    audit: Arc<AuditService>,
}

impl AppServices {
    /// Build services backed by the clinic's REST API.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Http` if the HTTP client cannot be built.
    pub fn http(config: &AppConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::http(config.api.clone())?;
        Ok(Self::from_storage(&storage, clock, config.upload_mode))
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, upload_mode: UploadMode) -> Self {
        Self {
            sessions: Arc::new(SessionService::new(clock, Arc::clone(&storage.sessions))),
            progress: Arc::new(ProgressService::new(Arc::clone(&storage.sessions))),
            roles: Arc::new(RoleService::new(Arc::clone(&storage.roles))),
            evidence: Arc::new(EvidenceService::new(
                Arc::clone(&storage.evidence),
                upload_mode,
            )),
            backups: Arc::new(BackupService::new(Arc::clone(&storage.backups))),
            audit: Arc::new(AuditService::new(Arc::clone(&storage.audit))),
        }
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<SessionService> {
        Arc::clone(&self.sessions)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn roles(&self) -> Arc<RoleService> {
        Arc::clone(&self.roles)
    }

    #[must_use]
    pub fn evidence(&self) -> Arc<EvidenceService> {
        Arc::clone(&self.evidence)
    }

    #[must_use]
    pub fn backups(&self) -> Arc<BackupService> {
        Arc::clone(&self.backups)
    }

    #[must_use]
    pub fn audit(&self) -> Arc<AuditService> {
        Arc::clone(&self.audit)
    }
}
