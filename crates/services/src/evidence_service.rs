use std::path::Path;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use clinic_core::model::EvidenceRef;
use storage::repository::{DEFAULT_EVIDENCE_KIND, EvidenceFile, EvidenceStore};

use crate::config::UploadMode;
use crate::error::EvidenceError;

pub const MAX_EVIDENCE_BYTES: usize = 5 * 1024 * 1024;

pub const ALLOWED_EVIDENCE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
];

/// Content type for a file name, by extension. `None` for anything not accepted as evidence.
#[must_use]
pub fn mime_for(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

/// Turns picked files into evidence references for a session.
#[derive(Clone)]
pub struct EvidenceService {
    store: Arc<dyn EvidenceStore>,
    mode: UploadMode,
    max_bytes: usize,
}

impl EvidenceService {
    #[must_use]
    pub fn new(store: Arc<dyn EvidenceStore>, mode: UploadMode) -> Self {
        Self {
            store,
            mode,
            max_bytes: MAX_EVIDENCE_BYTES,
        }
    }

    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    #[must_use]
    pub fn mode(&self) -> UploadMode {
        self.mode
    }

    /// # Errors
    ///
    /// Returns `EvidenceError` for empty, oversized or unsupported files.
    pub fn check(&self, file: &EvidenceFile) -> Result<(), EvidenceError> {
        if file.bytes.is_empty() {
            return Err(EvidenceError::Empty(file.file_name.clone()));
        }
        if file.bytes.len() > self.max_bytes {
            return Err(EvidenceError::TooLarge {
                name: file.file_name.clone(),
                size: file.bytes.len(),
                max: self.max_bytes,
            });
        }
        if !ALLOWED_EVIDENCE_TYPES.contains(&file.mime.as_str()) {
            return Err(EvidenceError::UnsupportedType {
                name: file.file_name.clone(),
                mime: file.mime.clone(),
            });
        }
        Ok(())
    }

    /// Store one file according to the configured mode.
    ///
    /// Inline references are never durable; nothing is uploaded for them.
    ///
    /// # Errors
    ///
    /// Returns `EvidenceError` if the file is rejected or the upload fails.
    pub async fn attach(&self, file: &EvidenceFile) -> Result<EvidenceRef, EvidenceError> {
        self.check(file)?;
        match self.mode {
            UploadMode::Durable => {
                let url = self.store.upload(file, DEFAULT_EVIDENCE_KIND).await?;
                tracing::debug!(file = %file.file_name, %url, "evidence uploaded");
                Ok(EvidenceRef::Remote(url))
            }
            UploadMode::InlineEphemeral => {
                tracing::warn!(file = %file.file_name, "evidence kept inline; it is not stored durably");
                Ok(EvidenceRef::inline(file.mime.clone(), STANDARD.encode(&file.bytes)))
            }
        }
    }

    /// Attach files in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// As [`EvidenceService::attach`].
    pub async fn attach_all(&self, files: &[EvidenceFile]) -> Result<Vec<EvidenceRef>, EvidenceError> {
        for file in files {
            self.check(file)?;
        }
        let mut refs = Vec::with_capacity(files.len());
        for file in files {
            refs.push(self.attach(file).await?);
        }
        Ok(refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_comes_from_extension() {
        assert_eq!(mime_for("rx_molar.JPG"), Some("image/jpeg"));
        assert_eq!(mime_for("informe.pdf"), Some("application/pdf"));
        assert_eq!(mime_for("notas.docx"), None);
        assert_eq!(mime_for("sin_extension"), None);
    }
}
