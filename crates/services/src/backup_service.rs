use std::sync::Arc;

use clinic_core::model::{Backup, BackupDetail, BackupId, BackupStats, DownloadLink};
use storage::repository::BackupStore;

use crate::error::BackupServiceError;

/// Download link plus the file name to save it under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupDownload {
    pub link: DownloadLink,
    pub file_name: String,
}

/// Backup administration. Creating and restoring backups happens on the
/// backend; this only asks for it and reports what it says.
#[derive(Clone)]
pub struct BackupService {
    backups: Arc<dyn BackupStore>,
}

impl BackupService {
    #[must_use]
    pub fn new(backups: Arc<dyn BackupStore>) -> Self {
        Self { backups }
    }

    /// Backups, newest first.
    ///
    /// # Errors
    ///
    /// Returns `BackupServiceError::Storage` if the listing fails.
    pub async fn list(&self) -> Result<Vec<Backup>, BackupServiceError> {
        let mut backups = self.backups.list().await?;
        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(backups)
    }

    /// # Errors
    ///
    /// Returns `BackupServiceError::Storage` if the backend refuses or fails.
    pub async fn create(&self, description: Option<&str>) -> Result<BackupDetail, BackupServiceError> {
        let description = description.map(str::trim).filter(|d| !d.is_empty());
        let detail = self.backups.create(description).await?;
        tracing::info!(
            backup = %detail.backup.id,
            size_mb = detail.backup.size_mb,
            "manual backup created"
        );
        Ok(detail)
    }

    /// # Errors
    ///
    /// Returns `BackupServiceError::Storage` if missing or the call fails.
    pub async fn get(&self, id: BackupId) -> Result<BackupDetail, BackupServiceError> {
        Ok(self.backups.get(id).await?)
    }

    /// # Errors
    ///
    /// Returns `BackupServiceError::Storage` if missing or the call fails.
    pub async fn delete(&self, id: BackupId) -> Result<(), BackupServiceError> {
        self.backups.delete(id).await?;
        tracing::info!(backup = %id, "backup deleted");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `BackupServiceError::Storage` if missing or the call fails.
    pub async fn download(&self, id: BackupId) -> Result<BackupDownload, BackupServiceError> {
        let link = self.backups.download_link(id).await?;
        let file_name = link.file_name(id);
        Ok(BackupDownload { link, file_name })
    }

    /// # Errors
    ///
    /// Returns `BackupServiceError::Storage` if stats cannot be fetched.
    pub async fn stats(&self) -> Result<BackupStats, BackupServiceError> {
        Ok(self.backups.stats().await?)
    }
}
