use async_trait::async_trait;
use clinic_core::model::{AuditEntry, AuditEntryId, AuditFilters, AuditStats, DateRange};
use reqwest::Method;

use super::HttpRepository;
use super::mapping::{AuditEntryDto, AuditStatsDto, PageDto, audit_level_param};
use crate::repository::{AuditStore, Page, StorageError};

const LOGS: &str = "auditoria/logs/";
const STATS: &str = "auditoria/logs/estadisticas/";

fn date_params(dates: &DateRange) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(from) = dates.from {
        params.push(("fecha_desde", from.to_string()));
    }
    if let Some(to) = dates.to {
        params.push(("fecha_hasta", to.to_string()));
    }
    params
}

fn filter_params(filters: &AuditFilters) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(user) = filters.user {
        params.push(("usuario", user.to_string()));
    }
    if let Some(action) = &filters.action {
        params.push(("accion", action.clone()));
    }
    if let Some(table) = &filters.table {
        params.push(("modelo", table.clone()));
    }
    params.extend(date_params(&filters.dates));
    if let Some(search) = filters.search.as_deref().filter(|s| !s.trim().is_empty()) {
        params.push(("search", search.trim().to_owned()));
    }
    if let Some(level) = filters.level {
        params.push(("nivel", audit_level_param(level).to_owned()));
    }
    if let Some(ip) = filters.ip_address.as_deref().filter(|ip| !ip.trim().is_empty()) {
        params.push(("ip_address", ip.trim().to_owned()));
    }
    if let Some(page) = filters.page {
        params.push(("page", page.to_string()));
    }
    if let Some(size) = filters.page_size {
        params.push(("page_size", size.to_string()));
    }
    params
}

#[async_trait]
impl AuditStore for HttpRepository {
    async fn list(&self, filters: &AuditFilters) -> Result<Page<AuditEntry>, StorageError> {
        let request = self
            .request(Method::GET, LOGS)?
            .query(&filter_params(filters));
        let page: PageDto<AuditEntryDto> = self.fetch(request).await?;
        page.try_map(AuditEntryDto::into_entry)
    }

    async fn get(&self, id: AuditEntryId) -> Result<AuditEntry, StorageError> {
        let request = self.request(Method::GET, &format!("{LOGS}{id}/"))?;
        let dto: AuditEntryDto = self.fetch(request).await?;
        dto.into_entry()
    }

    async fn stats(&self, dates: &DateRange) -> Result<AuditStats, StorageError> {
        let request = self.request(Method::GET, STATS)?.query(&date_params(dates));
        let dto: AuditStatsDto = self.fetch(request).await?;
        dto.into_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use clinic_core::model::AuditLevel;

    #[test]
    fn only_set_filters_become_params() {
        let filters = AuditFilters {
            action: Some("eliminar".into()),
            dates: DateRange::new(NaiveDate::from_ymd_opt(2025, 3, 1), None),
            search: Some("  ".into()),
            level: Some(AuditLevel::Critical),
            table: Some("Usuario".into()),
            ip_address: Some(" 10.0.0.4 ".into()),
            ..AuditFilters::default()
        };
        let params = filter_params(&filters);
        assert_eq!(
            params,
            vec![
                ("accion", "eliminar".to_owned()),
                ("modelo", "Usuario".to_owned()),
                ("fecha_desde", "2025-03-01".to_owned()),
                ("nivel", "critical".to_owned()),
                ("ip_address", "10.0.0.4".to_owned()),
            ]
        );
    }
}
