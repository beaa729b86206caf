use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use url::Url;

use crate::model::ids::BackupId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackupStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl BackupStatus {
    /// A backup in this state will not change without further action.
    #[must_use]
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackupKind {
    Manual,
    Automatic,
    OnDemand,
}

/// Cloud backup of the clinic's data, as listed by the backup admin endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Backup {
    pub id: BackupId,
    pub created_at: DateTime<Utc>,
    pub size_mb: f64,
    pub record_count: u64,
    pub status: BackupStatus,
    pub kind: BackupKind,
    pub description: String,
    pub restorable: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackupMetadata {
    pub models: Vec<String>,
    pub records_per_model: BTreeMap<String, u64>,
    pub original_size_mb: f64,
    pub compressed_size_mb: f64,
    pub compression_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackupDetail {
    pub backup: Backup,
    pub storage_key: String,
    pub checksum_md5: String,
    pub execution_seconds: f64,
    pub metadata: BackupMetadata,
    pub created_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Temporary pre-signed download location for a backup archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadLink {
    pub url: Url,
    pub expiry_seconds: u64,
}

impl DownloadLink {
    /// File name to offer when saving the archive locally.
    #[must_use]
    pub fn file_name(&self, id: BackupId) -> String {
        self.url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .map_or_else(|| format!("respaldo_{id}.json.gz"), str::to_owned)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LastBackup {
    pub id: BackupId,
    pub created_at: DateTime<Utc>,
    pub size_mb: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackupStats {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    pub total_size_mb: f64,
    pub last_backup: Option<LastBackup>,
}

impl BackupStats {
    /// Share of backups that completed, as a percentage; `None` when there are none.
    #[must_use]
    pub fn success_rate(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        Some(self.completed as f64 / self.total as f64 * 100.0)
    }
}
