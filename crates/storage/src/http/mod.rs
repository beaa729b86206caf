//! Stores backed by the clinic's REST API.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::repository::{
    AuditStore, BackupStore, EvidenceStore, RoleStore, SessionStore, Storage, StorageError,
};

mod audit_repo;
mod backup_repo;
mod evidence_repo;
mod mapping;
mod role_repo;
mod session_repo;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Header the backend uses to pick the clinic (tenant) a request belongs to.
pub const TENANT_HEADER: &str = "X-Tenant-Subdomain";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HttpInitError {
    #[error("invalid API url `{0}`: {1}")]
    InvalidUrl(String, url::ParseError),

    #[error("invalid timeout `{0}`: expected a whole number of seconds")]
    InvalidTimeout(String),

    #[error(transparent)]
    Client(#[from] reqwest::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: Url,
    pub token: Option<String>,
    pub tenant: Option<String>,
    pub timeout: Duration,
}

impl ApiConfig {
    /// Config for `base_url`; a trailing slash is added so relative paths join under it.
    ///
    /// # Errors
    ///
    /// Returns `HttpInitError::InvalidUrl` if `base_url` does not parse.
    pub fn new(base_url: &str) -> Result<Self, HttpInitError> {
        let mut normalized = base_url.trim().to_owned();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base_url = Url::parse(&normalized)
            .map_err(|e| HttpInitError::InvalidUrl(base_url.to_owned(), e))?;
        Ok(Self {
            base_url,
            token: None,
            tenant: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Read `CLINIC_API_URL`, `CLINIC_API_TOKEN`, `CLINIC_TENANT` and
    /// `CLINIC_API_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns `HttpInitError` if the url or timeout is malformed.
    pub fn from_env() -> Result<Self, HttpInitError> {
        let base_url = env::var("CLINIC_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let mut config = Self::new(&base_url)?
            .with_token(env::var("CLINIC_API_TOKEN").ok())
            .with_tenant(env::var("CLINIC_TENANT").ok());
        if let Ok(raw) = env::var("CLINIC_API_TIMEOUT_SECS") {
            let secs = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| HttpInitError::InvalidTimeout(raw.clone()))?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Same settings against another base url.
    ///
    /// # Errors
    ///
    /// Returns `HttpInitError::InvalidUrl` if `base_url` does not parse.
    pub fn with_base_url(self, base_url: &str) -> Result<Self, HttpInitError> {
        let base_url = Self::new(base_url)?.base_url;
        Ok(Self { base_url, ..self })
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_tenant(mut self, tenant: Option<String>) -> Self {
        self.tenant = tenant.filter(|t| !t.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, StorageError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| StorageError::Connection(format!("invalid endpoint {path}: {e}")))
    }
}

#[derive(Clone)]
pub struct HttpRepository {
    client: Client,
    config: ApiConfig,
}

impl HttpRepository {
    /// # Errors
    ///
    /// Returns `HttpInitError::Client` if the HTTP client cannot be built.
    pub fn new(config: ApiConfig) -> Result<Self, HttpInitError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, StorageError> {
        let url = self.config.endpoint(path)?;
        tracing::debug!(%method, %url, "api request");
        let mut request = self.client.request(method, url);
        if let Some(token) = &self.config.token {
            request = request.header(AUTHORIZATION, format!("Token {token}"));
        }
        if let Some(tenant) = &self.config.tenant {
            request = request.header(TENANT_HEADER, tenant);
        }
        Ok(request)
    }

    pub(crate) async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, StorageError> {
        let response = send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    pub(crate) async fn execute(&self, request: RequestBuilder) -> Result<(), StorageError> {
        send(request).await.map(|_| ())
    }
}

async fn send(request: RequestBuilder) -> Result<Response, StorageError> {
    let response = request
        .send()
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let path = response.url().path().to_owned();
    let body = response.text().await.unwrap_or_default();
    let err = mapping::error_from_status(status, &body);
    if status == StatusCode::BAD_REQUEST {
        tracing::debug!(status = status.as_u16(), %path, error = %err, "request rejected");
    } else {
        tracing::warn!(status = status.as_u16(), %path, error = %err, "api call failed");
    }
    Err(err)
}

impl Storage {
    /// Build a `Storage` backed by the REST API.
    ///
    /// # Errors
    ///
    /// Returns `HttpInitError` if the HTTP client cannot be built.
    pub fn http(config: ApiConfig) -> Result<Self, HttpInitError> {
        let repo = HttpRepository::new(config)?;
        let sessions: Arc<dyn SessionStore> = Arc::new(repo.clone());
        let roles: Arc<dyn RoleStore> = Arc::new(repo.clone());
        let evidence: Arc<dyn EvidenceStore> = Arc::new(repo.clone());
        let backups: Arc<dyn BackupStore> = Arc::new(repo.clone());
        let audit: Arc<dyn AuditStore> = Arc::new(repo);
        Ok(Self {
            sessions,
            roles,
            evidence,
            backups,
            audit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let config = ApiConfig::new("https://clinica.example.com/api/v1").unwrap();
        let url = config.endpoint("usuarios/tipos-usuario/").unwrap();
        assert_eq!(
            url.as_str(),
            "https://clinica.example.com/api/v1/usuarios/tipos-usuario/"
        );
        let url = config.endpoint("/respaldos/").unwrap();
        assert_eq!(url.as_str(), "https://clinica.example.com/api/v1/respaldos/");
    }

    #[test]
    fn blank_credentials_are_dropped() {
        let config = ApiConfig::new(DEFAULT_API_URL)
            .unwrap()
            .with_token(Some("  ".into()))
            .with_tenant(Some("norte".into()));
        assert_eq!(config.token, None);
        assert_eq!(config.tenant.as_deref(), Some("norte"));
    }

    #[test]
    fn switching_base_url_keeps_credentials() {
        let config = ApiConfig::new(DEFAULT_API_URL)
            .unwrap()
            .with_token(Some("abc123".into()))
            .with_base_url("https://sur.clinica.example.com/api/v1")
            .unwrap();
        assert_eq!(config.base_url.as_str(), "https://sur.clinica.example.com/api/v1/");
        assert_eq!(config.token.as_deref(), Some("abc123"));
    }

    #[test]
    fn malformed_url_is_rejected() {
        assert!(matches!(
            ApiConfig::new("not a url"),
            Err(HttpInitError::InvalidUrl(..))
        ));
    }

    #[test]
    fn repository_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HttpRepository>();
    }
}
