use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EvidenceRefError {
    #[error("evidence reference is empty")]
    Empty,

    #[error("malformed inline evidence reference")]
    MalformedInline,

    #[error("invalid evidence url: {0}")]
    InvalidUrl(String),
}

/// Where a piece of session evidence (photo, x-ray, PDF) lives.
///
/// `Remote` points at durable storage behind the upload endpoint. `Inline`
/// embeds the file itself as a `data:` reference; it is only ever produced
/// when inline uploads are configured and must not be relied on for durability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EvidenceRef {
    Remote(Url),
    Inline { mime: String, data: String },
}

impl EvidenceRef {
    #[must_use]
    pub fn inline(mime: impl Into<String>, base64_data: impl Into<String>) -> Self {
        Self::Inline {
            mime: mime.into(),
            data: base64_data.into(),
        }
    }

    #[must_use]
    pub fn is_durable(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    #[must_use]
    pub fn mime(&self) -> Option<&str> {
        match self {
            Self::Remote(_) => None,
            Self::Inline { mime, .. } => Some(mime),
        }
    }
}

impl fmt::Display for EvidenceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => write!(f, "{url}"),
            Self::Inline { mime, data } => write!(f, "data:{mime};base64,{data}"),
        }
    }
}

impl FromStr for EvidenceRef {
    type Err = EvidenceRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EvidenceRefError::Empty);
        }
        if let Some(rest) = s.strip_prefix("data:") {
            let (mime, data) = rest
                .split_once(";base64,")
                .ok_or(EvidenceRefError::MalformedInline)?;
            if mime.is_empty() {
                return Err(EvidenceRefError::MalformedInline);
            }
            return Ok(Self::inline(mime, data));
        }
        Url::parse(s)
            .map(Self::Remote)
            .map_err(|e| EvidenceRefError::InvalidUrl(e.to_string()))
    }
}

impl TryFrom<String> for EvidenceRef {
    type Error = EvidenceRefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EvidenceRef> for String {
    fn from(value: EvidenceRef) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_remote_urls() {
        let r: EvidenceRef = "https://cdn.example.com/evidencias/2025/x.jpg"
            .parse()
            .unwrap();
        assert!(r.is_durable());
        assert_eq!(r.mime(), None);
    }

    #[test]
    fn parses_inline_data_references() {
        let r: EvidenceRef = "data:image/png;base64,iVBORw0KGgo=".parse().unwrap();
        assert!(!r.is_durable());
        assert_eq!(r.mime(), Some("image/png"));
        assert_eq!(r.to_string(), "data:image/png;base64,iVBORw0KGgo=");
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!("".parse::<EvidenceRef>(), Err(EvidenceRefError::Empty));
        assert_eq!(
            "data:;base64,abc".parse::<EvidenceRef>(),
            Err(EvidenceRefError::MalformedInline)
        );
        assert!(matches!(
            "not a url".parse::<EvidenceRef>(),
            Err(EvidenceRefError::InvalidUrl(_))
        ));
    }

    #[test]
    fn serializes_as_string() {
        let r = EvidenceRef::inline("application/pdf", "JVBERi0=");
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, "\"data:application/pdf;base64,JVBERi0=\"");
    }
}
