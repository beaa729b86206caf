use async_trait::async_trait;
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use url::Url;

use super::HttpRepository;
use super::mapping::{UploadDto, ser};
use crate::repository::{EvidenceFile, EvidenceStore, StorageError};

#[async_trait]
impl EvidenceStore for HttpRepository {
    async fn upload(&self, file: &EvidenceFile, kind: &str) -> Result<Url, StorageError> {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.mime)
            .map_err(ser)?;
        let form = Form::new().part("file", part).text("tipo", kind.to_owned());
        let request = self
            .request(Method::POST, "upload/evidencias/")?
            .multipart(form);
        let dto: UploadDto = self.fetch(request).await?;
        dto.into_url()
    }
}
