use std::path::Path;
use std::time::Duration;

use clap::Parser;
use clinic_core::model::{AuditFilters, RoleId, SessionPatch, UserAccount, UserCode};
use clinic_core::validation::FieldErrors;
use services::{
    AppConfig, AppServices, Clock, RoleChangeFlowError, SessionFormError, SessionTable, mime_for,
};
use storage::repository::{EvidenceFile, Page, SessionFilters};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod render;

use cli::{AuditCommand, BackupCommand, Cli, Command, EditSessionArgs, RecordSessionArgs};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Environment first, then whatever the command line overrides.
fn app_config(cli: &Cli) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = AppConfig::from_env()?;
    if let Some(url) = &cli.api_url {
        config.api = config.api.with_base_url(url)?;
    }
    if cli.token.is_some() {
        config.api = config.api.with_token(cli.token.clone());
    }
    if cli.tenant.is_some() {
        config.api = config.api.with_tenant(cli.tenant.clone());
    }
    if let Some(secs) = cli.timeout_secs {
        config.api = config.api.with_timeout(Duration::from_secs(secs));
    }
    if let Some(mode) = cli.upload_mode {
        config = config.with_upload_mode(mode);
    }
    Ok(config)
}

fn read_evidence(path: &Path) -> Result<EvidenceFile, Box<dyn std::error::Error>> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| format!("invalid evidence path: {}", path.display()))?
        .to_owned();
    let mime = mime_for(&file_name)
        .ok_or_else(|| format!("unsupported evidence type: {file_name}"))?
        .to_owned();
    let bytes = std::fs::read(path)?;
    Ok(EvidenceFile {
        file_name,
        mime,
        bytes,
    })
}

fn print_field_errors(fields: &FieldErrors) {
    for (field, messages) in fields.iter() {
        for message in messages {
            eprintln!("  {field}: {message}");
        }
    }
}

/// Report a rejected session form field by field; other errors propagate.
fn report_form_error(err: SessionFormError) -> CliResult {
    if let Some(fields) = err.fields() {
        eprintln!("{}", err.failure().user_message());
        print_field_errors(fields);
        return Err("session rejected".into());
    }
    Err(err.into())
}

async fn record_session(app: &AppServices, args: RecordSessionArgs) -> CliResult {
    let sessions = app.sessions();
    let mut draft = sessions
        .new_draft(Some(args.item), Some(args.consultation))
        .await?;
    if let Some(progress) = args.progress {
        draft.current_progress = progress;
    }
    if let Some(duration) = args.duration {
        draft.duration_minutes = duration;
    }
    if let Some(date) = args.date {
        draft.date = Some(date);
    }
    draft.actions = args.actions;
    draft.notes = args.notes;
    draft.complications = args.complications;

    let files = args
        .evidence
        .iter()
        .map(|path| read_evidence(path))
        .collect::<Result<Vec<_>, _>>()?;
    draft.evidence = app.evidence().attach_all(&files).await?;

    let mut table = SessionTable::new();
    match sessions.form().submit_into(&draft, &mut table).await {
        Ok(_) => {
            for session in table.rows() {
                println!("{}", render::session_row(session));
            }
            Ok(())
        }
        Err(err) => report_form_error(err),
    }
}

async fn edit_session(app: &AppServices, args: EditSessionArgs) -> CliResult {
    let sessions = app.sessions();
    let session = sessions.get(args.id).await?;
    let patch = SessionPatch {
        duration_minutes: args.duration,
        current_progress: args.progress,
        actions: args.actions,
        notes: args.notes,
        complications: args.complications,
        evidence: None,
    };
    let mut table = SessionTable::new();
    table.replace(1, Page::single(vec![session.clone()]));
    match sessions.form().update_in(&session, &patch, &mut table).await {
        Ok(_) => {
            for row in table.rows() {
                println!("{}", render::session_row(row));
            }
            Ok(())
        }
        Err(err) => report_form_error(err),
    }
}

async fn change_role(
    app: &AppServices,
    user: UserCode,
    role: RoleId,
    current: Option<RoleId>,
    yes: bool,
) -> CliResult {
    let roles = app.roles();
    let account = match roles.find_user(user).await {
        Ok(account) => account,
        Err(RoleChangeFlowError::UnknownUser(code)) => {
            let Some(current) = current else {
                return Err(RoleChangeFlowError::UnknownUser(code).into());
            };
            UserAccount {
                code,
                first_name: format!("Usuario {code}"),
                last_name: String::new(),
                email: String::new(),
                phone: None,
                role_id: current,
                role_name: None,
            }
        }
        Err(err) => return Err(err.into()),
    };

    let mut guard = roles.open(account).await?;
    guard.select(role)?;
    let Some(prompt) = guard.confirmation() else {
        println!("{} ya tiene ese rol; no hay cambios.", guard.user().full_name());
        return Ok(());
    };
    println!("{}", prompt.message());
    if !yes {
        println!("Repita con --yes para confirmar.");
        return Ok(());
    }
    match roles.commit(&mut guard, &prompt).await {
        Ok(updated) => {
            println!("{}", render::user(&updated));
            Ok(())
        }
        Err(RoleChangeFlowError::Rejected { message, .. }) => Err(message.into()),
        Err(err) => Err(err.into()),
    }
}

async fn backups(app: &AppServices, command: BackupCommand) -> CliResult {
    let backups = app.backups();
    match command {
        BackupCommand::List => {
            for backup in backups.list().await? {
                println!("{}", render::backup_row(&backup));
            }
        }
        BackupCommand::Stats => println!("{}", render::backup_stats(&backups.stats().await?)),
        BackupCommand::Create { description } => {
            let detail = backups.create(description.as_deref()).await?;
            println!("{}", render::backup_row(&detail.backup));
        }
        BackupCommand::Show { id } => {
            for line in render::backup_detail(&backups.get(id).await?) {
                println!("{line}");
            }
        }
        BackupCommand::DownloadUrl { id } => {
            let download = backups.download(id).await?;
            println!("{}", download.link.url);
            println!(
                "archivo: {} (expira en {} s)",
                download.file_name, download.link.expiry_seconds
            );
        }
        BackupCommand::Delete { id } => {
            backups.delete(id).await?;
            println!("Respaldo {id} eliminado.");
        }
    }
    Ok(())
}

async fn audit(app: &AppServices, command: AuditCommand) -> CliResult {
    let audit = app.audit();
    match command {
        AuditCommand::List {
            user,
            action,
            table,
            level,
            ip,
            search,
            page,
            dates,
        } => {
            let filters = AuditFilters {
                user,
                action,
                table,
                level,
                ip_address: ip,
                search,
                page,
                dates: dates.into(),
                ..AuditFilters::default()
            };
            let listing = audit.list(&filters).await?;
            for entry in &listing.items {
                println!("{}", render::audit_row(entry));
            }
            println!(
                "{} de {} registros{}",
                listing.items.len(),
                listing.total,
                if listing.has_next { " (hay más páginas)" } else { "" }
            );
        }
        AuditCommand::Show { id } => {
            for line in render::audit_detail(&audit.get(id).await?) {
                println!("{line}");
            }
        }
        AuditCommand::Stats { dates } => {
            for line in render::audit_stats(&audit.stats(dates.into()).await?) {
                println!("{line}");
            }
        }
    }
    Ok(())
}

async fn run() -> CliResult {
    let cli = Cli::parse();
    let config = app_config(&cli)?;
    tracing::debug!(api = %config.api.base_url, upload_mode = %config.upload_mode, "starting");
    let app = AppServices::http(&config, Clock::default_clock())?;

    match cli.command {
        Command::PlanProgress { plan } => {
            let progress = app.progress().plan_progress(plan).await?;
            println!("{}", render::plan_progress(&progress));
        }
        Command::PlanSessions { plan } => {
            let overview = app.progress().plan_overview(plan).await?;
            println!("{}", render::plan_progress(&overview.progress));
            for session in &overview.sessions {
                println!("  {}", render::session_row(session));
            }
        }
        Command::PatientHistory { patient, dates } => {
            let history = app.sessions().patient_history(patient, dates.into()).await?;
            for line in render::patient_history(&history) {
                println!("{line}");
            }
        }
        Command::ItemProgress { item } => {
            let progress = app.progress().item_progress(item).await?;
            println!("{}", render::item_progress(&progress));
        }
        Command::DentistStats { dentist, dates } => {
            let stats = app.progress().dentist_stats(dentist, dates.into()).await?;
            println!("{}", render::dentist_stats(&stats));
        }
        Command::Sessions {
            item,
            plan,
            patient,
            page,
            dates,
        } => {
            let filters = SessionFilters {
                plan_item: item,
                plan,
                patient,
                dates: dates.into(),
                page,
            };
            let mut table = SessionTable::new();
            app.sessions().refresh(&mut table, &filters).await?;
            for session in table.rows() {
                println!("{}", render::session_row(session));
            }
            println!(
                "página {} | {} de {} sesiones{}",
                table.page(),
                table.len(),
                table.total(),
                if table.has_next() { " (hay más páginas)" } else { "" }
            );
        }
        Command::RecordSession(args) => record_session(&app, args).await?,
        Command::EditSession(args) => edit_session(&app, args).await?,
        Command::DeleteSession { id } => {
            let mut table = SessionTable::new();
            app.sessions().delete(id, &mut table).await?;
            println!("Sesión {id} eliminada.");
        }
        Command::Evidence { path } => {
            let file = read_evidence(&path)?;
            let evidence = app.evidence().attach(&file).await?;
            println!("{evidence}");
            if !evidence.is_durable() {
                eprintln!("Aviso: la evidencia quedó embebida y no se guardó en el servidor.");
            }
        }
        Command::Roles => {
            for role in app.roles().roles().await?.iter() {
                println!("{}", render::role(role));
            }
        }
        Command::Users { search } => {
            let users = app
                .roles()
                .search_users(search.as_deref().unwrap_or_default())
                .await?;
            for user in &users {
                println!("{}", render::user(user));
            }
        }
        Command::ChangeRole {
            user,
            role,
            current,
            yes,
        } => change_role(&app, user, role, current, yes).await?,
        Command::Backups { command } => backups(&app, command).await?,
        Command::Audit { command } => audit(&app, command).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clinic=info,services=info,storage=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
