mod audit;
mod backup;
mod evidence;
mod ids;
mod progress;
mod role;
mod session;
mod stats;

pub use ids::{
    AuditEntryId, BackupId, ConsultationId, DentistId, ParseIdError, PatientId, PlanId,
    PlanItemId, RoleId, SessionId, UserCode,
};

pub use audit::{
    ActionCount, AuditActor, AuditEntry, AuditFilters, AuditLevel, AuditStats, DateRange, DayCount,
    FieldChange, LevelCount, TableCount, UserCount,
};
pub use backup::{
    Backup, BackupDetail, BackupKind, BackupMetadata, BackupStats, BackupStatus, DownloadLink,
    LastBackup,
};
pub use evidence::{EvidenceRef, EvidenceRefError};
pub use progress::{
    InvalidRangeError, ItemProgress, ItemStatus, Percent, PlanProgress, ProgressError,
    ProgressTier, increment, overall_percentage, suggest_next,
};
pub use role::{BadgeTone, Role, RoleDisplay, RoleKind, RoleSet, UserAccount};
pub use session::{Session, SessionDetails, SessionDraft, SessionError, SessionPatch};
pub use stats::DentistStats;
