#![forbid(unsafe_code)]

pub mod app_services;
pub mod audit_service;
pub mod backup_service;
pub mod config;
pub mod error;
pub mod evidence_service;
pub mod in_flight;
pub mod progress_service;
pub mod role_service;
pub mod session_form;
pub mod session_service;
pub mod session_table;

pub use clinic_core::Clock;

pub use app_services::AppServices;
pub use audit_service::AuditService;
pub use backup_service::{BackupDownload, BackupService};
pub use config::{AppConfig, UploadMode};
pub use error::{
    AppServicesError, AuditServiceError, BackupServiceError, ConfigError, EvidenceError,
    ProgressServiceError, RoleChangeFlowError, SessionFormError, SessionServiceError,
};
pub use evidence_service::{EvidenceService, mime_for};
pub use progress_service::{PlanOverview, ProgressService};
pub use role_service::RoleService;
pub use session_form::SessionForm;
pub use session_service::{PatientHistory, PlanBucket, SessionService};
pub use session_table::SessionTable;
