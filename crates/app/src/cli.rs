use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use clinic_core::model::{
    AuditEntryId, AuditLevel, BackupId, ConsultationId, DateRange, DentistId, PatientId, PlanId,
    PlanItemId, RoleId, SessionId, UserCode,
};
use services::UploadMode;

#[derive(Parser, Debug)]
#[command(name = "clinic")]
#[command(about = "Treatment sessions, roles, backups and audit log of a dental clinic")]
#[command(version)]
pub struct Cli {
    /// Base URL of the clinic API; overrides `CLINIC_API_URL`
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// API token sent as `Authorization: Token <token>`; overrides `CLINIC_API_TOKEN`
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Clinic subdomain (tenant); overrides `CLINIC_TENANT`
    #[arg(long, global = true)]
    pub tenant: Option<String>,

    /// Request timeout in seconds; overrides `CLINIC_API_TIMEOUT_SECS`
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Where session evidence goes, `durable` or `inline`; overrides `CLINIC_UPLOAD_MODE`
    #[arg(long, global = true, value_parser = parse_upload_mode)]
    pub upload_mode: Option<UploadMode>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Progress snapshot of a treatment plan
    PlanProgress { plan: PlanId },
    /// Sessions recorded against a treatment plan
    PlanSessions { plan: PlanId },
    /// A patient's sessions grouped by plan
    PatientHistory {
        patient: PatientId,
        #[command(flatten)]
        dates: DateArgs,
    },
    /// Progress of one plan item
    ItemProgress { item: PlanItemId },
    /// Session activity of a dentist
    DentistStats {
        dentist: DentistId,
        #[command(flatten)]
        dates: DateArgs,
    },
    /// Paginated session listing
    Sessions {
        #[arg(long)]
        item: Option<PlanItemId>,
        #[arg(long)]
        plan: Option<PlanId>,
        #[arg(long)]
        patient: Option<PatientId>,
        #[arg(long)]
        page: Option<u32>,
        #[command(flatten)]
        dates: DateArgs,
    },
    /// Record a new treatment session
    RecordSession(RecordSessionArgs),
    /// Correct an existing session
    EditSession(EditSessionArgs),
    /// Delete a session
    DeleteSession { id: SessionId },
    /// Upload a file as session evidence and print its reference
    Evidence { path: PathBuf },
    /// Roles defined in the clinic
    Roles,
    /// Users, optionally filtered
    Users {
        #[arg(long)]
        search: Option<String>,
    },
    /// Change a user's role
    ChangeRole {
        user: UserCode,
        role: RoleId,
        /// Role the user holds now, when the backend's user lookup is not available
        #[arg(long)]
        current: Option<RoleId>,
        /// Confirm the change; without it only the confirmation prompt is shown
        #[arg(long)]
        yes: bool,
    },
    /// Cloud backup administration
    Backups {
        #[command(subcommand)]
        command: BackupCommand,
    },
    /// Activity log
    Audit {
        #[command(subcommand)]
        command: AuditCommand,
    },
}

#[derive(Args, Debug, Clone, Copy, Default)]
pub struct DateArgs {
    /// First day included (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,
    /// Last day included (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,
}

impl From<DateArgs> for DateRange {
    fn from(args: DateArgs) -> Self {
        DateRange::new(args.from, args.to)
    }
}

#[derive(Args, Debug)]
pub struct RecordSessionArgs {
    #[arg(long)]
    pub item: PlanItemId,
    #[arg(long)]
    pub consultation: ConsultationId,
    /// Progress after this session, 0-100; defaults to the suggested next step
    #[arg(long)]
    pub progress: Option<f64>,
    /// What was done in the session
    #[arg(long)]
    pub actions: String,
    #[arg(long)]
    pub duration: Option<i64>,
    /// Session date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,
    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long)]
    pub complications: Option<String>,
    /// Files to attach as evidence
    #[arg(long = "evidence")]
    pub evidence: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct EditSessionArgs {
    pub id: SessionId,
    #[arg(long)]
    pub progress: Option<f64>,
    #[arg(long)]
    pub duration: Option<u32>,
    #[arg(long)]
    pub actions: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long)]
    pub complications: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum BackupCommand {
    List,
    Stats,
    Create {
        #[arg(long)]
        description: Option<String>,
    },
    Show { id: BackupId },
    DownloadUrl { id: BackupId },
    Delete { id: BackupId },
}

#[derive(Subcommand, Debug)]
pub enum AuditCommand {
    List {
        /// Acting user id
        #[arg(long)]
        user: Option<u64>,
        #[arg(long)]
        action: Option<String>,
        /// Model the action touched
        #[arg(long)]
        table: Option<String>,
        /// info, warning, error or critical
        #[arg(long, value_parser = parse_audit_level)]
        level: Option<AuditLevel>,
        #[arg(long)]
        ip: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        page: Option<u32>,
        #[command(flatten)]
        dates: DateArgs,
    },
    Show { id: AuditEntryId },
    /// Activity summary by action, model, user and level
    Stats {
        #[command(flatten)]
        dates: DateArgs,
    },
}

fn parse_upload_mode(raw: &str) -> Result<UploadMode, String> {
    raw.parse().map_err(|e: services::ConfigError| e.to_string())
}

fn parse_audit_level(raw: &str) -> Result<AuditLevel, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "info" => Ok(AuditLevel::Info),
        "warning" => Ok(AuditLevel::Warning),
        "error" => Ok(AuditLevel::Error),
        "critical" => Ok(AuditLevel::Critical),
        other => Err(format!("unknown audit level `{other}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_change_role() {
        let cli = Cli::try_parse_from(["clinic", "change-role", "7", "1", "--yes"]).unwrap();
        let Command::ChangeRole {
            user, role, yes, ..
        } = cli.command
        else {
            panic!("expected change-role");
        };
        assert_eq!(user, UserCode::new(7));
        assert_eq!(role, RoleId::new(1));
        assert!(yes);
    }

    #[test]
    fn parses_nested_backup_command() {
        let cli = Cli::try_parse_from(["clinic", "backups", "download-url", "9"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Backups {
                command: BackupCommand::DownloadUrl { id }
            } if id == BackupId::new(9)
        ));
    }

    #[test]
    fn rejects_unknown_upload_mode() {
        assert!(Cli::try_parse_from(["clinic", "--upload-mode", "s3", "roles"]).is_err());
    }

    #[test]
    fn parses_audit_filters_and_stats() {
        let cli = Cli::try_parse_from([
            "clinic", "audit", "list", "--table", "Usuario", "--level", "WARNING", "--ip",
            "10.0.0.4",
        ])
        .unwrap();
        let Command::Audit {
            command: AuditCommand::List {
                table, level, ip, ..
            },
        } = cli.command
        else {
            panic!("expected audit list");
        };
        assert_eq!(table.as_deref(), Some("Usuario"));
        assert_eq!(level, Some(AuditLevel::Warning));
        assert_eq!(ip.as_deref(), Some("10.0.0.4"));

        let cli = Cli::try_parse_from(["clinic", "audit", "stats", "--from", "2025-10-01"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Audit {
                command: AuditCommand::Stats { dates }
            } if dates.from == NaiveDate::from_ymd_opt(2025, 10, 1)
        ));
    }
}
