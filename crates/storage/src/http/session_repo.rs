use async_trait::async_trait;
use clinic_core::model::{
    DateRange, DentistId, DentistStats, ItemProgress, PatientId, PlanId, PlanItemId,
    PlanProgress, Session, SessionDraft, SessionId, SessionPatch,
};
use reqwest::Method;
use serde_json::Value;

use super::HttpRepository;
use super::mapping::{
    ItemProgressDto, PageDto, PatientSessionsDto, PlanProgressDto, PlanSessionsDto, SessionDto,
    SessionFormDto, SessionPatchDto, dentist_stats_from,
};
use crate::repository::{
    Page, PatientSessions, PlanSessions, SessionFilters, SessionStore, StorageError,
};

const SESSIONS: &str = "tratamientos/sesiones-tratamiento/";

fn date_params(dates: DateRange) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(from) = dates.from {
        params.push(("fecha_desde", from.to_string()));
    }
    if let Some(to) = dates.to {
        params.push(("fecha_hasta", to.to_string()));
    }
    params
}

#[async_trait]
impl SessionStore for HttpRepository {
    async fn list(&self, filters: &SessionFilters) -> Result<Page<Session>, StorageError> {
        let mut params = date_params(filters.dates);
        if let Some(item) = filters.plan_item {
            params.push(("item_plan", item.to_string()));
        }
        if let Some(plan) = filters.plan {
            params.push(("plan", plan.to_string()));
        }
        if let Some(patient) = filters.patient {
            params.push(("paciente", patient.to_string()));
        }
        if let Some(page) = filters.page {
            params.push(("page", page.to_string()));
        }
        let request = self.request(Method::GET, SESSIONS)?.query(&params);
        let page: PageDto<SessionDto> = self.fetch(request).await?;
        page.try_map(|dto| dto.into_session(filters.plan))
    }

    async fn create(&self, draft: &SessionDraft) -> Result<Session, StorageError> {
        let request = self
            .request(Method::POST, SESSIONS)?
            .json(&SessionFormDto::from(draft));
        let dto: SessionDto = self.fetch(request).await?;
        dto.into_session(None)
    }

    async fn get(&self, id: SessionId) -> Result<Session, StorageError> {
        let request = self.request(Method::GET, &format!("{SESSIONS}{id}/"))?;
        let dto: SessionDto = self.fetch(request).await?;
        dto.into_session(None)
    }

    async fn update(&self, id: SessionId, patch: &SessionPatch) -> Result<Session, StorageError> {
        let request = self
            .request(Method::PATCH, &format!("{SESSIONS}{id}/"))?
            .json(&SessionPatchDto::from(patch));
        let dto: SessionDto = self.fetch(request).await?;
        dto.into_session(None)
    }

    async fn delete(&self, id: SessionId) -> Result<(), StorageError> {
        let request = self.request(Method::DELETE, &format!("{SESSIONS}{id}/"))?;
        self.execute(request).await
    }

    async fn list_by_plan(&self, plan: PlanId) -> Result<PlanSessions, StorageError> {
        let request = self.request(Method::GET, &format!("{SESSIONS}por-plan/{plan}/"))?;
        let dto: PlanSessionsDto = self.fetch(request).await?;
        let plan = dto
            .plan_id
            .map(PlanId::new)
            .filter(PlanId::is_present)
            .unwrap_or(plan);
        let sessions = dto
            .sesiones
            .into_iter()
            .map(|s| s.into_session(Some(plan)))
            .collect::<Result<_, _>>()?;
        Ok(PlanSessions { plan, sessions })
    }

    async fn list_by_patient(
        &self,
        patient: PatientId,
        dates: DateRange,
    ) -> Result<PatientSessions, StorageError> {
        let request = self
            .request(Method::GET, &format!("{SESSIONS}paciente/{patient}/"))?
            .query(&date_params(dates));
        let dto: PatientSessionsDto = self.fetch(request).await?;
        let sessions = dto
            .sesiones
            .into_iter()
            .map(|s| s.into_session(None))
            .collect::<Result<_, _>>()?;
        Ok(PatientSessions {
            patient: dto
                .paciente_id
                .map(PatientId::new)
                .filter(PatientId::is_present)
                .unwrap_or(patient),
            patient_name: dto.nombre_paciente,
            sessions,
        })
    }

    async fn progress_of_plan(&self, plan: PlanId) -> Result<PlanProgress, StorageError> {
        let request = self.request(
            Method::GET,
            &format!("tratamientos/planes-tratamiento/{plan}/progreso-detallado/"),
        )?;
        let dto: PlanProgressDto = self.fetch(request).await?;
        dto.into_progress(plan)
    }

    async fn progress_of_item(&self, item: PlanItemId) -> Result<ItemProgress, StorageError> {
        let request = self.request(
            Method::GET,
            &format!("tratamientos/procedimientos/{item}/progreso/"),
        )?;
        let dto: ItemProgressDto = self.fetch(request).await?;
        dto.into_progress(item)
    }

    async fn dentist_stats(
        &self,
        dentist: DentistId,
        dates: DateRange,
    ) -> Result<DentistStats, StorageError> {
        let request = self
            .request(
                Method::GET,
                &format!("{SESSIONS}estadisticas/odontologo/{dentist}/"),
            )?
            .query(&date_params(dates));
        let body: Value = self.fetch(request).await?;
        dentist_stats_from(body, dentist, dates)
    }
}
