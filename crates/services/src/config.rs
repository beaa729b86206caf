use std::env;
use std::fmt;
use std::str::FromStr;

use storage::ApiConfig;

use crate::error::ConfigError;

/// How session evidence is stored once picked.
///
/// `InlineEphemeral` keeps the file inside the session record as a `data:`
/// reference; it never reaches durable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadMode {
    #[default]
    Durable,
    InlineEphemeral,
}

impl UploadMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Durable => "durable",
            Self::InlineEphemeral => "inline",
        }
    }
}

impl fmt::Display for UploadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "durable" => Ok(Self::Durable),
            "inline" => Ok(Self::InlineEphemeral),
            _ => Err(ConfigError::InvalidUploadMode(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub upload_mode: UploadMode,
}

impl AppConfig {
    #[must_use]
    pub fn new(api: ApiConfig) -> Self {
        Self {
            api,
            upload_mode: UploadMode::default(),
        }
    }

    /// Read the API settings plus `CLINIC_UPLOAD_MODE`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any variable holds a malformed value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api = ApiConfig::from_env()?;
        let upload_mode = match env::var("CLINIC_UPLOAD_MODE") {
            Ok(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => UploadMode::default(),
        };
        Ok(Self { api, upload_mode })
    }

    #[must_use]
    pub fn with_upload_mode(mut self, upload_mode: UploadMode) -> Self {
        self.upload_mode = upload_mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_mode_parses_known_values() {
        assert_eq!("durable".parse::<UploadMode>().unwrap(), UploadMode::Durable);
        assert_eq!(" Inline ".parse::<UploadMode>().unwrap(), UploadMode::InlineEphemeral);
        assert!(matches!(
            "s3".parse::<UploadMode>(),
            Err(ConfigError::InvalidUploadMode(raw)) if raw == "s3"
        ));
    }

    #[test]
    fn durable_is_the_default() {
        let config = AppConfig::new(ApiConfig::new("http://localhost:8000/api/v1").unwrap());
        assert_eq!(config.upload_mode, UploadMode::Durable);
        let config = config.with_upload_mode(UploadMode::InlineEphemeral);
        assert_eq!(config.upload_mode.to_string(), "inline");
    }
}
