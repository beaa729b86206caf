//! Wire shapes of the REST API and their conversion into domain types.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clinic_core::model::{
    ActionCount, AuditActor, AuditEntry, AuditEntryId, AuditLevel, AuditStats, Backup,
    BackupDetail, BackupId, BackupKind, BackupMetadata, BackupStats, BackupStatus,
    ConsultationId, DateRange, DayCount, DentistId, DentistStats, DownloadLink, EvidenceRef,
    ItemProgress, ItemStatus, LastBackup, LevelCount, Percent, PlanId, PlanItemId, PlanProgress,
    Role, RoleId, Session, SessionDetails, SessionDraft, SessionId, SessionPatch, TableCount,
    UserAccount, UserCode, UserCount,
};
use clinic_core::validation::FieldErrors;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::repository::{Page, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

const DETAIL_KEYS: [&str; 3] = ["detail", "message", "error"];

/// Turn a non-success response into a `StorageError`.
///
/// Bodies look like `{"detail": "..."}` or `{"campo": ["mensaje"]}`; anything
/// else is kept only as far as the status goes.
pub(crate) fn error_from_status(status: StatusCode, body: &str) -> StorageError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let detail = parsed.as_ref().and_then(detail_of);
    match status {
        StatusCode::BAD_REQUEST => StorageError::Validation {
            fields: parsed.as_ref().map(fields_of).unwrap_or_default(),
            detail,
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageError::Forbidden(detail),
        StatusCode::NOT_FOUND => StorageError::NotFound(detail),
        s if s.is_server_error() => {
            StorageError::Unavailable(detail.unwrap_or_else(|| s.to_string()))
        }
        s => StorageError::Connection(detail.unwrap_or_else(|| s.to_string())),
    }
}

fn detail_of(body: &Value) -> Option<String> {
    let object = body.as_object()?;
    DETAIL_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::to_owned)
        .or_else(|| {
            object
                .get("non_field_errors")
                .and_then(messages_of)
                .map(|messages| messages.join(" "))
        })
}

fn fields_of(body: &Value) -> FieldErrors {
    let mut fields = FieldErrors::new();
    let Some(object) = body.as_object() else {
        return fields;
    };
    for (key, value) in object {
        if DETAIL_KEYS.contains(&key.as_str()) || key == "non_field_errors" {
            continue;
        }
        for message in messages_of(value).unwrap_or_default() {
            fields.add(key.clone(), message);
        }
    }
    fields
}

fn messages_of(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect(),
        ),
        _ => None,
    }
}

//
// ─── LISTINGS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
pub(crate) struct PageDto<T> {
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    next: Option<String>,
    results: Vec<T>,
}

impl<T> PageDto<T> {
    pub(crate) fn try_map<U>(
        self,
        f: impl FnMut(T) -> Result<U, StorageError>,
    ) -> Result<Page<U>, StorageError> {
        let items = self
            .results
            .into_iter()
            .map(f)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page {
            total: self.count.unwrap_or(items.len() as u64),
            has_next: self.next.is_some(),
            items,
        })
    }
}

/// Some endpoints answer with a bare array, others with a page.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListOrPage<T> {
    List(Vec<T>),
    Page { results: Vec<T> },
}

impl<T> ListOrPage<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            Self::List(items) | Self::Page { results: items } => items,
        }
    }
}

//
// ─── SESSIONS ──────────────────────────────────────────────────────────────────
//

/// Related rows arrive either as a bare id or expanded into an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum IdOrNested {
    Id(u64),
    Nested { id: u64 },
}

impl IdOrNested {
    fn id(&self) -> u64 {
        match self {
            Self::Id(id) | Self::Nested { id } => *id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlanInfoDto {
    id: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionDto {
    id: u64,
    item_plan: IdOrNested,
    consulta: IdOrNested,
    #[serde(default)]
    plan_tratamiento: Option<u64>,
    #[serde(default)]
    plan_tratamiento_info: Option<PlanInfoDto>,
    fecha_sesion: NaiveDate,
    #[serde(default)]
    hora_inicio: Option<NaiveTime>,
    duracion_minutos: u32,
    progreso_anterior: Percent,
    progreso_actual: Percent,
    acciones_realizadas: String,
    #[serde(default)]
    notas_sesion: Option<String>,
    #[serde(default)]
    complicaciones: Option<String>,
    #[serde(default)]
    evidencias: Vec<EvidenceRef>,
    #[serde(default)]
    paciente_nombre: Option<String>,
    #[serde(default)]
    servicio_nombre: Option<String>,
    #[serde(default)]
    usuario_registro_nombre: Option<String>,
    #[serde(default)]
    fecha_registro: Option<DateTime<Utc>>,
}

impl SessionDto {
    /// `plan_hint` fills in the plan when the record comes from a per-plan listing.
    pub(crate) fn into_session(self, plan_hint: Option<PlanId>) -> Result<Session, StorageError> {
        let plan = self
            .plan_tratamiento
            .or(self.plan_tratamiento_info.map(|info| info.id))
            .map(PlanId::new)
            .filter(PlanId::is_present)
            .or(plan_hint);
        Session::from_remote(
            SessionId::new(self.id),
            PlanItemId::new(self.item_plan.id()),
            ConsultationId::new(self.consulta.id()),
            plan,
            self.fecha_sesion,
            self.hora_inicio,
            self.duracion_minutos,
            self.progreso_anterior,
            self.progreso_actual,
            self.acciones_realizadas,
        )
        .map_err(ser)
        .map(|session| {
            session
                .with_notes(self.notas_sesion)
                .with_complications(self.complicaciones)
                .with_evidence(self.evidencias)
                .with_details(SessionDetails {
                    patient_name: self.paciente_nombre,
                    service_name: self.servicio_nombre,
                    recorded_by: self.usuario_registro_nombre,
                    recorded_at: self.fecha_registro,
                })
        })
    }
}

/// Create body. Unselected references go out as `0` so the backend reports them.
#[derive(Debug, Serialize)]
pub(crate) struct SessionFormDto<'a> {
    item_plan: u64,
    consulta: u64,
    fecha_sesion: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hora_inicio: Option<NaiveTime>,
    duracion_minutos: i64,
    progreso_actual: f64,
    acciones_realizadas: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notas_sesion: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    complicaciones: Option<&'a str>,
    evidencias: Vec<String>,
}

impl<'a> From<&'a SessionDraft> for SessionFormDto<'a> {
    fn from(draft: &'a SessionDraft) -> Self {
        Self {
            item_plan: draft.plan_item.map_or(0, |id| id.value()),
            consulta: draft.consultation.map_or(0, |id| id.value()),
            fecha_sesion: draft.date,
            hora_inicio: draft.start_time,
            duracion_minutos: draft.duration_minutes,
            progreso_actual: draft.current_progress,
            acciones_realizadas: draft.actions.trim(),
            notas_sesion: non_blank(draft.notes.as_deref()),
            complicaciones: non_blank(draft.complications.as_deref()),
            evidencias: draft.evidence.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionPatchDto<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    duracion_minutos: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    progreso_actual: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    acciones_realizadas: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notas_sesion: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    complicaciones: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    evidencias: Option<Vec<String>>,
}

impl<'a> From<&'a SessionPatch> for SessionPatchDto<'a> {
    fn from(patch: &'a SessionPatch) -> Self {
        Self {
            duracion_minutos: patch.duration_minutes,
            progreso_actual: patch.current_progress,
            acciones_realizadas: patch.actions.as_deref().map(str::trim),
            notas_sesion: patch.notes.as_deref(),
            complicaciones: patch.complications.as_deref(),
            evidencias: patch
                .evidence
                .as_ref()
                .map(|refs| refs.iter().map(ToString::to_string).collect()),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlanSessionsDto {
    #[serde(default)]
    pub(crate) plan_id: Option<u64>,
    pub(crate) sesiones: Vec<SessionDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PatientSessionsDto {
    #[serde(default)]
    pub(crate) paciente_id: Option<u64>,
    #[serde(default)]
    pub(crate) nombre_paciente: Option<String>,
    pub(crate) sesiones: Vec<SessionDto>,
}

#[derive(Debug, Deserialize)]
struct PeriodDto {
    #[serde(default)]
    desde: Option<NaiveDate>,
    #[serde(default)]
    hasta: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct DentistStatsDto {
    total_sesiones: u32,
    total_pacientes: u32,
    #[serde(default)]
    duracion_promedio_minutos: f64,
    #[serde(default)]
    duracion_total_minutos: u32,
    #[serde(default)]
    progreso_promedio_incremento: f64,
    #[serde(default)]
    periodo: Option<PeriodDto>,
}

/// Stats arrive flat or nested under `estadisticas`.
pub(crate) fn dentist_stats_from(
    body: Value,
    dentist: DentistId,
    requested: DateRange,
) -> Result<DentistStats, StorageError> {
    let stats = match body {
        Value::Object(mut object) if object.contains_key("estadisticas") => object
            .remove("estadisticas")
            .unwrap_or(Value::Null),
        other => other,
    };
    let dto: DentistStatsDto = serde_json::from_value(stats).map_err(ser)?;
    let period = dto.periodo.map_or(requested, |p| DateRange::new(p.desde, p.hasta));
    Ok(DentistStats {
        dentist,
        total_sessions: dto.total_sesiones,
        total_patients: dto.total_pacientes,
        average_duration_minutes: dto.duracion_promedio_minutos,
        total_duration_minutes: dto.duracion_total_minutos,
        average_increment: dto.progreso_promedio_incremento,
        period,
    })
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
pub(crate) struct PlanProgressDto {
    #[serde(default)]
    plan_id: Option<u64>,
    #[serde(default)]
    progreso_general: Option<f64>,
    total_items: u32,
    items_completados: u32,
    items_activos: u32,
    items_pendientes: u32,
}

impl PlanProgressDto {
    /// The backend's own percentage is only cross-checked; the snapshot is recomputed.
    pub(crate) fn into_progress(self, plan: PlanId) -> Result<PlanProgress, StorageError> {
        let plan = self.plan_id.map(PlanId::new).filter(PlanId::is_present).unwrap_or(plan);
        let progress = PlanProgress::derive(
            plan,
            self.total_items,
            self.items_completados,
            self.items_activos,
            self.items_pendientes,
        )
        .map_err(|e| StorageError::Inconsistent(format!("plan {plan}: {e}")))?;
        let derived = progress.overall().value();
        if let Some(reported) = self
            .progreso_general
            .filter(|reported| (reported - derived).abs() > 0.5)
        {
            tracing::debug!(%plan, reported, derived, "plan progress differs from backend");
        }
        Ok(progress)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ItemProgressDto {
    #[serde(default)]
    item_plan_id: Option<u64>,
    #[serde(default)]
    progreso_anterior: Option<Percent>,
    progreso_actual: Percent,
    #[serde(default)]
    total_sesiones: u32,
    #[serde(default)]
    ultima_sesion_fecha: Option<NaiveDate>,
    estado_item: String,
    #[serde(default)]
    puede_facturar: bool,
}

impl ItemProgressDto {
    pub(crate) fn into_progress(self, item: PlanItemId) -> Result<ItemProgress, StorageError> {
        Ok(ItemProgress {
            item_id: self
                .item_plan_id
                .map(PlanItemId::new)
                .filter(PlanItemId::is_present)
                .unwrap_or(item),
            previous: self.progreso_anterior.unwrap_or(self.progreso_actual),
            current: self.progreso_actual,
            total_sessions: self.total_sesiones,
            last_session_date: self.ultima_sesion_fecha,
            status: parse_item_status(&self.estado_item)?,
            billable: self.puede_facturar,
        })
    }
}

pub(crate) fn parse_item_status(raw: &str) -> Result<ItemStatus, StorageError> {
    match raw.trim().to_lowercase().as_str() {
        "pendiente" => Ok(ItemStatus::Pending),
        "activo" | "en_progreso" | "en progreso" => Ok(ItemStatus::Active),
        "completado" => Ok(ItemStatus::Completed),
        "cancelado" => Ok(ItemStatus::Cancelled),
        other => Err(StorageError::Serialization(format!(
            "invalid item status: {other}"
        ))),
    }
}

//
// ─── ROLES ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
pub(crate) struct RoleDto {
    #[serde(alias = "id")]
    identificacion: u64,
    rol: String,
}

impl From<RoleDto> for Role {
    fn from(dto: RoleDto) -> Self {
        Role::new(RoleId::new(dto.identificacion), dto.rol)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserDto {
    codigo: u64,
    #[serde(default)]
    nombre: String,
    #[serde(default)]
    apellido: String,
    #[serde(default)]
    correoelectronico: Option<String>,
    #[serde(default)]
    telefono: Option<String>,
    idtipousuario: u64,
    #[serde(default)]
    tipo_usuario_nombre: Option<String>,
}

impl From<UserDto> for UserAccount {
    fn from(dto: UserDto) -> Self {
        UserAccount {
            code: UserCode::new(dto.codigo),
            first_name: dto.nombre,
            last_name: dto.apellido,
            email: dto.correoelectronico.unwrap_or_default(),
            phone: dto.telefono.filter(|p| !p.trim().is_empty()),
            role_id: RoleId::new(dto.idtipousuario),
            role_name: dto.tipo_usuario_nombre,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RoleUpdateDto {
    pub(crate) idtipousuario: u64,
}

//
// ─── EVIDENCE ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
pub(crate) struct UploadDto {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    file_url: Option<String>,
}

impl UploadDto {
    pub(crate) fn into_url(self) -> Result<Url, StorageError> {
        let raw = self
            .url
            .or(self.file_url)
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| StorageError::Serialization("upload response has no url".into()))?;
        Url::parse(&raw).map_err(ser)
    }
}

//
// ─── BACKUPS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
pub(crate) struct BackupDto {
    id: u64,
    fecha_respaldo: DateTime<Utc>,
    #[serde(rename = "tamaño_mb", default)]
    size_mb: f64,
    #[serde(default)]
    numero_registros: u64,
    estado: String,
    tipo_respaldo: String,
    #[serde(default)]
    descripcion: Option<String>,
    #[serde(default)]
    puede_restaurar: bool,
}

impl BackupDto {
    pub(crate) fn into_backup(self) -> Result<Backup, StorageError> {
        Ok(Backup {
            id: BackupId::new(self.id),
            created_at: self.fecha_respaldo,
            size_mb: self.size_mb,
            record_count: self.numero_registros,
            status: parse_backup_status(&self.estado)?,
            kind: parse_backup_kind(&self.tipo_respaldo)?,
            description: self.descripcion.unwrap_or_default(),
            restorable: self.puede_restaurar,
        })
    }
}

fn parse_backup_status(raw: &str) -> Result<BackupStatus, StorageError> {
    match raw {
        "pendiente" => Ok(BackupStatus::Pending),
        "procesando" => Ok(BackupStatus::Processing),
        "completado" => Ok(BackupStatus::Completed),
        "fallido" => Ok(BackupStatus::Failed),
        "cancelado" => Ok(BackupStatus::Cancelled),
        other => Err(StorageError::Serialization(format!(
            "invalid backup status: {other}"
        ))),
    }
}

fn parse_backup_kind(raw: &str) -> Result<BackupKind, StorageError> {
    match raw {
        "manual" => Ok(BackupKind::Manual),
        "automatico" => Ok(BackupKind::Automatic),
        "por_demanda" => Ok(BackupKind::OnDemand),
        other => Err(StorageError::Serialization(format!(
            "invalid backup kind: {other}"
        ))),
    }
}

#[derive(Debug, Default, Deserialize)]
struct BackupMetadataDto {
    #[serde(default)]
    modelos_respaldados: Vec<String>,
    #[serde(default)]
    detalles_registros: BTreeMap<String, u64>,
    #[serde(rename = "tamaño_original_mb", default)]
    original_size_mb: f64,
    #[serde(rename = "tamaño_comprimido_mb", default)]
    compressed_size_mb: f64,
    #[serde(default)]
    compresion_porcentaje: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BackupDetailDto {
    #[serde(flatten)]
    backup: BackupDto,
    #[serde(default)]
    archivo_s3: String,
    #[serde(default)]
    hash_md5: String,
    #[serde(default)]
    tiempo_ejecucion_segundos: f64,
    #[serde(default)]
    metadata: Option<BackupMetadataDto>,
    #[serde(default)]
    usuario_nombre: Option<String>,
    #[serde(default)]
    fecha_actualizacion: Option<DateTime<Utc>>,
}

impl BackupDetailDto {
    pub(crate) fn into_detail(self) -> Result<BackupDetail, StorageError> {
        let metadata = self.metadata.unwrap_or_default();
        Ok(BackupDetail {
            backup: self.backup.into_backup()?,
            storage_key: self.archivo_s3,
            checksum_md5: self.hash_md5,
            execution_seconds: self.tiempo_ejecucion_segundos,
            metadata: BackupMetadata {
                models: metadata.modelos_respaldados,
                records_per_model: metadata.detalles_registros,
                original_size_mb: metadata.original_size_mb,
                compressed_size_mb: metadata.compressed_size_mb,
                compression_percent: metadata.compresion_porcentaje,
            },
            created_by: self.usuario_nombre,
            updated_at: self.fecha_actualizacion,
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateBackupDto<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) descripcion: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedBackupDto {
    pub(crate) respaldo: BackupDetailDto,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DownloadDto {
    url: String,
    #[serde(default)]
    expira_en_segundos: u64,
}

impl DownloadDto {
    pub(crate) fn into_link(self) -> Result<DownloadLink, StorageError> {
        Ok(DownloadLink {
            url: Url::parse(&self.url).map_err(ser)?,
            expiry_seconds: self.expira_en_segundos,
        })
    }
}

#[derive(Debug, Deserialize)]
struct LastBackupDto {
    id: u64,
    fecha: DateTime<Utc>,
    #[serde(rename = "tamaño_mb", default)]
    size_mb: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BackupStatsDto {
    total_respaldos: u64,
    #[serde(default)]
    completados: u64,
    #[serde(default)]
    fallidos: u64,
    #[serde(rename = "tamaño_total_mb", default)]
    total_size_mb: f64,
    #[serde(default)]
    ultimo_respaldo: Option<LastBackupDto>,
}

impl From<BackupStatsDto> for BackupStats {
    fn from(dto: BackupStatsDto) -> Self {
        BackupStats {
            total: dto.total_respaldos,
            completed: dto.completados,
            failed: dto.fallidos,
            total_size_mb: dto.total_size_mb,
            last_backup: dto.ultimo_respaldo.map(|last| LastBackup {
                id: BackupId::new(last.id),
                created_at: last.fecha,
                size_mb: last.size_mb,
            }),
        }
    }
}

//
// ─── AUDIT ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
struct AuditActorDto {
    id: u64,
    #[serde(default, alias = "nombre_completo")]
    nombre: String,
    #[serde(default, alias = "correo")]
    email: Option<String>,
}

/// The log sends the acting user either as a bare id (with the name in
/// sibling fields) or as a nested object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AuditUserDto {
    Id(u64),
    Nested(AuditActorDto),
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuditEntryDto {
    id: u64,
    #[serde(default)]
    usuario: Option<AuditUserDto>,
    #[serde(default)]
    usuario_nombre: Option<String>,
    #[serde(default)]
    usuario_correo: Option<String>,
    accion: String,
    #[serde(default, alias = "modelo")]
    tabla_afectada: Option<String>,
    #[serde(default, alias = "objeto_id")]
    registro_id: Option<u64>,
    #[serde(default)]
    objeto_repr: Option<String>,
    #[serde(default)]
    descripcion: String,
    #[serde(default)]
    ip_address: Option<String>,
    #[serde(default)]
    user_agent: Option<String>,
    #[serde(alias = "fecha_hora")]
    fecha: DateTime<Utc>,
    #[serde(default)]
    nivel: Option<String>,
    #[serde(default)]
    datos_anteriores: Option<Value>,
    #[serde(default)]
    datos_nuevos: Option<Value>,
}

fn non_blank_owned(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn present(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

impl AuditEntryDto {
    pub(crate) fn into_entry(self) -> Result<AuditEntry, StorageError> {
        let actor = match self.usuario {
            Some(AuditUserDto::Id(id)) => Some(AuditActor {
                id,
                name: non_blank_owned(self.usuario_nombre).unwrap_or_else(|| format!("Usuario {id}")),
                email: non_blank_owned(self.usuario_correo),
            }),
            Some(AuditUserDto::Nested(user)) => Some(AuditActor {
                id: user.id,
                name: non_blank_owned(Some(user.nombre))
                    .or(non_blank_owned(self.usuario_nombre))
                    .unwrap_or_else(|| format!("Usuario {}", user.id)),
                email: non_blank_owned(user.email).or(non_blank_owned(self.usuario_correo)),
            }),
            None => None,
        };
        Ok(AuditEntry {
            id: AuditEntryId::new(self.id),
            actor,
            action: self.accion,
            table: non_blank_owned(self.tabla_afectada),
            record_id: self.registro_id,
            record_repr: non_blank_owned(self.objeto_repr),
            description: self.descripcion,
            ip_address: non_blank_owned(self.ip_address),
            user_agent: non_blank_owned(self.user_agent),
            at: self.fecha,
            level: self
                .nivel
                .as_deref()
                .map_or(Ok(AuditLevel::Info), parse_audit_level)?,
            before: present(self.datos_anteriores),
            after: present(self.datos_nuevos),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ActionCountDto {
    accion: String,
    cantidad: u64,
    #[serde(default)]
    porcentaje: f64,
}

#[derive(Debug, Deserialize)]
struct TableCountDto {
    modelo: String,
    cantidad: u64,
    #[serde(default)]
    porcentaje: f64,
}

#[derive(Debug, Deserialize)]
struct UserCountDto {
    usuario_id: u64,
    #[serde(default)]
    usuario_nombre: String,
    cantidad: u64,
}

#[derive(Debug, Deserialize)]
struct LevelCountDto {
    nivel: String,
    cantidad: u64,
}

#[derive(Debug, Deserialize)]
struct DayCountDto {
    fecha: NaiveDate,
    cantidad: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuditStatsDto {
    #[serde(default)]
    total_logs: u64,
    #[serde(default)]
    por_accion: Vec<ActionCountDto>,
    #[serde(default)]
    por_modelo: Vec<TableCountDto>,
    #[serde(default)]
    por_usuario: Vec<UserCountDto>,
    #[serde(default)]
    por_nivel: Vec<LevelCountDto>,
    #[serde(default)]
    ultimos_7_dias: Vec<DayCountDto>,
}

impl AuditStatsDto {
    pub(crate) fn into_stats(self) -> Result<AuditStats, StorageError> {
        let mut last_days: Vec<DayCount> = self
            .ultimos_7_dias
            .into_iter()
            .map(|d| DayCount {
                date: d.fecha,
                count: d.cantidad,
            })
            .collect();
        last_days.sort_by_key(|d| d.date);
        Ok(AuditStats {
            total: self.total_logs,
            by_action: self
                .por_accion
                .into_iter()
                .map(|a| ActionCount {
                    action: a.accion,
                    count: a.cantidad,
                    percentage: a.porcentaje,
                })
                .collect(),
            by_table: self
                .por_modelo
                .into_iter()
                .map(|t| TableCount {
                    table: t.modelo,
                    count: t.cantidad,
                    percentage: t.porcentaje,
                })
                .collect(),
            by_user: self
                .por_usuario
                .into_iter()
                .map(|u| UserCount {
                    user_id: u.usuario_id,
                    user_name: u.usuario_nombre,
                    count: u.cantidad,
                })
                .collect(),
            by_level: self
                .por_nivel
                .into_iter()
                .map(|l| {
                    Ok(LevelCount {
                        level: parse_audit_level(&l.nivel)?,
                        count: l.cantidad,
                    })
                })
                .collect::<Result<_, StorageError>>()?,
            last_days,
        })
    }
}

fn parse_audit_level(raw: &str) -> Result<AuditLevel, StorageError> {
    match raw {
        "info" => Ok(AuditLevel::Info),
        "warning" => Ok(AuditLevel::Warning),
        "error" => Ok(AuditLevel::Error),
        "critical" => Ok(AuditLevel::Critical),
        other => Err(StorageError::Serialization(format!(
            "invalid audit level: {other}"
        ))),
    }
}

pub(crate) fn audit_level_param(level: AuditLevel) -> &'static str {
    match level {
        AuditLevel::Info => "info",
        AuditLevel::Warning => "warning",
        AuditLevel::Error => "error",
        AuditLevel::Critical => "critical",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_keeps_field_messages() {
        let err = error_from_status(
            StatusCode::BAD_REQUEST,
            r#"{"progreso_actual": ["El progreso no puede ser menor a 40%"], "consulta": "requerida"}"#,
        );
        let StorageError::Validation { detail, fields } = err else {
            panic!("expected validation error");
        };
        assert_eq!(detail, None);
        assert_eq!(
            fields.message("progreso_actual"),
            Some("El progreso no puede ser menor a 40%")
        );
        assert_eq!(fields.message("consulta"), Some("requerida"));
    }

    #[test]
    fn detail_and_message_bodies() {
        assert_eq!(
            error_from_status(StatusCode::FORBIDDEN, r#"{"detail": "No autorizado"}"#),
            StorageError::Forbidden(Some("No autorizado".into()))
        );
        assert_eq!(
            error_from_status(StatusCode::NOT_FOUND, r#"{"message": "No existe"}"#),
            StorageError::NotFound(Some("No existe".into()))
        );
        assert_eq!(
            error_from_status(StatusCode::UNAUTHORIZED, "<html>"),
            StorageError::Forbidden(None)
        );
    }

    #[test]
    fn non_field_errors_become_detail() {
        let err = error_from_status(
            StatusCode::BAD_REQUEST,
            r#"{"non_field_errors": ["Sesión duplicada"]}"#,
        );
        let StorageError::Validation { detail, fields } = err else {
            panic!("expected validation error");
        };
        assert_eq!(detail.as_deref(), Some("Sesión duplicada"));
        assert!(fields.is_empty());
    }

    #[test]
    fn server_errors_are_unavailable() {
        assert!(matches!(
            error_from_status(StatusCode::BAD_GATEWAY, ""),
            StorageError::Unavailable(_)
        ));
        assert!(matches!(
            error_from_status(StatusCode::CONFLICT, ""),
            StorageError::Connection(_)
        ));
    }

    #[test]
    fn session_record_with_nested_refs() {
        let dto: SessionDto = serde_json::from_value(serde_json::json!({
            "id": 3,
            "item_plan": {"id": 11, "estado_item": "Activo"},
            "consulta": 4,
            "fecha_sesion": "2025-10-27",
            "hora_inicio": "09:30:00",
            "duracion_minutos": 45,
            "progreso_anterior": "40.00",
            "progreso_actual": "65.50",
            "acciones_realizadas": "Endodoncia",
            "notas_sesion": "",
            "complicaciones": null,
            "evidencias": ["https://cdn.example.com/e/1.jpg"],
            "paciente_nombre": "Ana Pérez"
        }))
        .unwrap();
        let session = dto.into_session(Some(PlanId::new(2))).unwrap();
        assert_eq!(session.plan_item(), PlanItemId::new(11));
        assert_eq!(session.plan(), Some(PlanId::new(2)));
        assert_eq!(session.increment(), 25.5);
        assert_eq!(session.notes(), None);
        assert!(session.evidence()[0].is_durable());
        assert_eq!(session.details().patient_name.as_deref(), Some("Ana Pérez"));
    }

    #[test]
    fn unselected_references_are_sent_as_zero() {
        let draft = SessionDraft::new(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        let body = serde_json::to_value(SessionFormDto::from(&draft)).unwrap();
        assert_eq!(body["item_plan"], 0);
        assert_eq!(body["consulta"], 0);
        assert_eq!(body["fecha_sesion"], "2025-01-02");
        assert!(body.get("notas_sesion").is_none());
    }

    #[test]
    fn stats_accept_nested_shape() {
        let body = serde_json::json!({
            "odontologo_id": 8,
            "estadisticas": {
                "total_sesiones": 4,
                "total_pacientes": 2,
                "duracion_promedio_minutos": 37.5,
                "duracion_total_minutos": 150,
                "progreso_promedio_incremento": 20.0,
                "periodo": {"desde": "2025-01-01", "hasta": "2025-01-31"}
            }
        });
        let stats = dentist_stats_from(body, DentistId::new(8), DateRange::default()).unwrap();
        assert_eq!(stats.total_sessions, 4);
        assert_eq!(
            stats.period.from,
            NaiveDate::from_ymd_opt(2025, 1, 1)
        );
    }

    #[test]
    fn item_statuses() {
        assert_eq!(parse_item_status("Completado").unwrap(), ItemStatus::Completed);
        assert_eq!(parse_item_status("activo").unwrap(), ItemStatus::Active);
        assert!(parse_item_status("borrado").is_err());
    }

    #[test]
    fn audit_entry_with_bare_user_id() {
        let dto: AuditEntryDto = serde_json::from_value(serde_json::json!({
            "id": 1,
            "usuario": 5,
            "usuario_nombre": "Ana Pérez",
            "usuario_correo": "ana@clinica.bo",
            "accion": "actualizar",
            "modelo": "Usuario",
            "objeto_id": 7,
            "objeto_repr": "Lucía Rojas",
            "descripcion": "Se actualizó Usuario \"Lucía Rojas\"",
            "fecha_hora": "2025-10-27T10:00:00Z",
            "ip_address": "",
            "datos_anteriores": {"idtipousuario": 2},
            "datos_nuevos": {"idtipousuario": 3},
            "nivel": "info"
        }))
        .unwrap();
        let entry = dto.into_entry().unwrap();
        let actor = entry.actor.as_ref().unwrap();
        assert_eq!((actor.id, actor.name.as_str()), (5, "Ana Pérez"));
        assert_eq!(actor.email.as_deref(), Some("ana@clinica.bo"));
        assert_eq!(entry.table.as_deref(), Some("Usuario"));
        assert_eq!(entry.record_id, Some(7));
        assert_eq!(entry.record_repr.as_deref(), Some("Lucía Rojas"));
        assert_eq!(entry.ip_address, None);
        assert_eq!(entry.changes()[0].field, "idtipousuario");
    }

    #[test]
    fn audit_entry_with_nested_user() {
        let dto: AuditEntryDto = serde_json::from_value(serde_json::json!({
            "id": 2,
            "usuario": {"id": 4, "nombre": "Admin", "email": "admin@clinica.bo"},
            "accion": "login",
            "tabla_afectada": null,
            "fecha": "2025-10-27T10:00:00Z",
            "datos_nuevos": null
        }))
        .unwrap();
        let entry = dto.into_entry().unwrap();
        assert_eq!(entry.actor.unwrap().name, "Admin");
        assert_eq!(entry.level, AuditLevel::Info);
        assert_eq!(entry.after, None);
    }

    #[test]
    fn mismatched_plan_counts_are_inconsistent() {
        let dto: PlanProgressDto = serde_json::from_value(serde_json::json!({
            "plan_id": 2,
            "total_items": 5,
            "items_completados": 2,
            "items_activos": 1,
            "items_pendientes": 1
        }))
        .unwrap();
        let err = dto.into_progress(PlanId::new(2)).unwrap_err();
        assert!(matches!(err, StorageError::Inconsistent(_)));
        let failure = err.failure();
        assert!(!failure.retryable());
        assert!(failure.user_message().contains("inconsistentes"));
    }
}
