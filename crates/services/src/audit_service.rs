use std::sync::Arc;

use clinic_core::model::{AuditEntry, AuditEntryId, AuditFilters, AuditStats, DateRange};
use storage::repository::{AuditStore, Page};

use crate::error::AuditServiceError;

#[derive(Clone)]
pub struct AuditService {
    audit: Arc<dyn AuditStore>,
}

impl AuditService {
    #[must_use]
    pub fn new(audit: Arc<dyn AuditStore>) -> Self {
        Self { audit }
    }

    /// # Errors
    ///
    /// Returns `AuditServiceError::InvertedRange` without calling the store
    /// when the date range is backwards, or `Storage` if the listing fails.
    pub async fn list(&self, filters: &AuditFilters) -> Result<Page<AuditEntry>, AuditServiceError> {
        if filters.dates.is_inverted() {
            return Err(AuditServiceError::InvertedRange);
        }
        Ok(self.audit.list(filters).await?)
    }

    /// # Errors
    ///
    /// Returns `AuditServiceError::Storage` if missing or the call fails.
    pub async fn get(&self, id: AuditEntryId) -> Result<AuditEntry, AuditServiceError> {
        Ok(self.audit.get(id).await?)
    }

    /// Activity summary for the period.
    ///
    /// # Errors
    ///
    /// Returns `AuditServiceError::InvertedRange` without calling the store
    /// when the period is backwards, or `Storage` if the summary fails.
    pub async fn stats(&self, dates: DateRange) -> Result<AuditStats, AuditServiceError> {
        if dates.is_inverted() {
            return Err(AuditServiceError::InvertedRange);
        }
        Ok(self.audit.stats(&dates).await?)
    }
}
