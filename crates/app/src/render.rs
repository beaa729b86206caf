//! Plain-text rendering of service results for the terminal.

use clinic_core::format::{format_date, format_datetime, format_duration, format_size_mb};
use clinic_core::model::{
    AuditEntry, AuditLevel, AuditStats, Backup, BackupDetail, BackupKind, BackupStats,
    BackupStatus, DentistStats, ItemProgress, ItemStatus, PlanProgress, Role, Session,
    UserAccount,
};
use services::{PatientHistory, PlanBucket};

pub fn plan_progress(progress: &PlanProgress) -> String {
    format!(
        "Plan {}: {} ({}) | {}/{} completados, {} activos, {} pendientes{}",
        progress.plan_id(),
        progress.overall(),
        progress.tier().as_str(),
        progress.completed(),
        progress.total_items(),
        progress.active(),
        progress.pending(),
        if progress.is_completed() { " | plan completado" } else { "" }
    )
}

pub fn item_progress(progress: &ItemProgress) -> String {
    let last = progress
        .last_session_date
        .map_or_else(|| "sin sesiones".to_owned(), format_date);
    format!(
        "Ítem {}: {} -> {} (+{:.1}) | {} | {} sesiones, última: {}{}",
        progress.item_id,
        progress.previous,
        progress.current,
        progress.increment(),
        item_status(progress.status),
        progress.total_sessions,
        last,
        if progress.billable { " | facturable" } else { "" }
    )
}

fn item_status(status: ItemStatus) -> &'static str {
    match status {
        ItemStatus::Pending => "pendiente",
        ItemStatus::Active => "activo",
        ItemStatus::Completed => "completado",
        ItemStatus::Cancelled => "cancelado",
    }
}

pub fn session_row(session: &Session) -> String {
    let mut line = format!(
        "#{} {} ítem {} | {} -> {} | {} | {}",
        session.id(),
        format_date(session.date()),
        session.plan_item(),
        session.previous_progress(),
        session.current_progress(),
        format_duration(session.duration_minutes()),
        session.actions()
    );
    if !session.evidence().is_empty() {
        line.push_str(&format!(" | {} evidencias", session.evidence().len()));
    }
    if session.is_archived() {
        line.push_str(" | archivada");
    }
    line
}

pub fn patient_history(history: &PatientHistory) -> Vec<String> {
    let mut lines = vec![format!(
        "Paciente {}{}: {} sesiones, {}",
        history.patient,
        history
            .patient_name
            .as_deref()
            .map(|name| format!(" ({name})"))
            .unwrap_or_default(),
        history.total_sessions(),
        format_duration(history.total_minutes())
    )];
    for (bucket, sessions) in &history.groups {
        lines.push(match bucket {
            PlanBucket::Plan(plan) => format!("Plan {plan}:"),
            PlanBucket::Unassigned => "Sin plan:".to_owned(),
        });
        lines.extend(sessions.iter().map(|s| format!("  {}", session_row(s))));
    }
    lines
}

pub fn dentist_stats(stats: &DentistStats) -> String {
    format!(
        "Odontólogo {}: {} sesiones, {} pacientes, {} en total (promedio {:.0} min), incremento medio {:.1}%",
        stats.dentist,
        stats.total_sessions,
        stats.total_patients,
        format_duration(stats.total_duration_minutes),
        stats.average_duration_minutes,
        stats.average_increment
    )
}

pub fn role(role: &Role) -> String {
    let display = role.display();
    format!("{} {} | {}", role.id(), role.name(), display.description)
}

pub fn user(user: &UserAccount) -> String {
    format!(
        "{} {} <{}> | {}",
        user.code,
        user.full_name(),
        user.email,
        user.role_name
            .clone()
            .unwrap_or_else(|| user.role_kind().display().label.to_owned())
    )
}

fn backup_status(status: BackupStatus) -> &'static str {
    match status {
        BackupStatus::Pending => "pendiente",
        BackupStatus::Processing => "procesando",
        BackupStatus::Completed => "completado",
        BackupStatus::Failed => "fallido",
        BackupStatus::Cancelled => "cancelado",
    }
}

fn backup_kind(kind: BackupKind) -> &'static str {
    match kind {
        BackupKind::Manual => "manual",
        BackupKind::Automatic => "automático",
        BackupKind::OnDemand => "bajo demanda",
    }
}

pub fn backup_row(backup: &Backup) -> String {
    format!(
        "#{} {} | {} | {} | {} registros | {}{}",
        backup.id,
        format_datetime(backup.created_at),
        backup_kind(backup.kind),
        backup_status(backup.status),
        backup.record_count,
        format_size_mb(backup.size_mb),
        if backup.description.is_empty() {
            String::new()
        } else {
            format!(" | {}", backup.description)
        }
    )
}

pub fn backup_detail(detail: &BackupDetail) -> Vec<String> {
    let mut lines = vec![
        backup_row(&detail.backup),
        format!("  clave: {}", detail.storage_key),
        format!("  md5: {}", detail.checksum_md5),
        format!("  duración: {:.1} s", detail.execution_seconds),
    ];
    if let Some(by) = &detail.created_by {
        lines.push(format!("  creado por: {by}"));
    }
    for (model, count) in &detail.metadata.records_per_model {
        lines.push(format!("  {model}: {count}"));
    }
    lines
}

pub fn backup_stats(stats: &BackupStats) -> String {
    let rate = stats
        .success_rate()
        .map_or_else(|| "-".to_owned(), |rate| format!("{rate:.0}%"));
    let last = stats.last_backup.as_ref().map_or_else(
        || "ninguno".to_owned(),
        |last| format!("#{} {}", last.id, format_datetime(last.created_at)),
    );
    format!(
        "{} respaldos ({} completados, {} fallidos, éxito {rate}) | {} | último: {last}",
        stats.total,
        stats.completed,
        stats.failed,
        format_size_mb(stats.total_size_mb)
    )
}

fn audit_level(level: AuditLevel) -> &'static str {
    match level {
        AuditLevel::Info => "INFO",
        AuditLevel::Warning => "WARN",
        AuditLevel::Error => "ERROR",
        AuditLevel::Critical => "CRIT",
    }
}

pub fn audit_row(entry: &AuditEntry) -> String {
    format!(
        "#{} {} {:5} {} | {}{} | {}",
        entry.id,
        format_datetime(entry.at),
        audit_level(entry.level),
        entry
            .actor
            .as_ref()
            .map_or("sistema", |actor| actor.name.as_str()),
        entry.action,
        entry
            .table
            .as_deref()
            .map(|table| format!(" en {table}"))
            .unwrap_or_default(),
        entry.description
    )
}

pub fn audit_detail(entry: &AuditEntry) -> Vec<String> {
    let mut lines = vec![audit_row(entry)];
    if let Some(record) = entry.record_id {
        let repr = entry
            .record_repr
            .as_deref()
            .map(|repr| format!(" ({repr})"))
            .unwrap_or_default();
        lines.push(format!("  registro: {record}{repr}"));
    }
    if let Some(email) = entry.actor.as_ref().and_then(|actor| actor.email.as_deref()) {
        lines.push(format!("  correo: {email}"));
    }
    if let Some(ip) = &entry.ip_address {
        lines.push(format!("  ip: {ip}"));
    }
    if let Some(agent) = &entry.user_agent {
        lines.push(format!("  agente: {agent}"));
    }
    let changes = entry.changes();
    if !changes.is_empty() {
        lines.push("  cambios:".to_owned());
        for change in &changes {
            let before = change
                .before
                .as_ref()
                .map_or_else(|| "-".to_owned(), ToString::to_string);
            lines.push(format!("    {}: {before} -> {}", change.field, change.after));
        }
    }
    lines
}

pub fn audit_stats(stats: &AuditStats) -> Vec<String> {
    let mut lines = vec![format!("{} registros", stats.total)];
    lines.push("Por acción:".to_owned());
    for row in &stats.by_action {
        lines.push(format!("  {}: {} ({:.1}%)", row.action, row.count, row.percentage));
    }
    lines.push("Por modelo:".to_owned());
    for row in &stats.by_table {
        lines.push(format!("  {}: {} ({:.1}%)", row.table, row.count, row.percentage));
    }
    lines.push("Por usuario:".to_owned());
    for row in &stats.by_user {
        lines.push(format!("  {} #{}: {}", row.user_name, row.user_id, row.count));
    }
    lines.push("Por nivel:".to_owned());
    for row in &stats.by_level {
        lines.push(format!("  {}: {}", audit_level(row.level), row.count));
    }
    lines.push("Últimos 7 días:".to_owned());
    for day in &stats.last_days {
        lines.push(format!("  {}: {}", format_date(day.date), day.count));
    }
    lines
}
