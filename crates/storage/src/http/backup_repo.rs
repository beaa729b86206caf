use async_trait::async_trait;
use clinic_core::model::{Backup, BackupDetail, BackupId, BackupStats, DownloadLink};
use reqwest::Method;

use super::HttpRepository;
use super::mapping::{
    BackupDetailDto, BackupDto, BackupStatsDto, CreateBackupDto, CreatedBackupDto, DownloadDto,
    ListOrPage,
};
use crate::repository::{BackupStore, StorageError};

const BACKUPS: &str = "respaldos/";

#[async_trait]
impl BackupStore for HttpRepository {
    async fn list(&self) -> Result<Vec<Backup>, StorageError> {
        let request = self.request(Method::GET, BACKUPS)?;
        let backups: ListOrPage<BackupDto> = self.fetch(request).await?;
        backups
            .into_vec()
            .into_iter()
            .map(BackupDto::into_backup)
            .collect()
    }

    async fn create(&self, description: Option<&str>) -> Result<BackupDetail, StorageError> {
        let request = self
            .request(Method::POST, &format!("{BACKUPS}crear_respaldo_manual/"))?
            .json(&CreateBackupDto {
                descripcion: description.map(str::trim).filter(|d| !d.is_empty()),
            });
        let created: CreatedBackupDto = self.fetch(request).await?;
        created.respaldo.into_detail()
    }

    async fn get(&self, id: BackupId) -> Result<BackupDetail, StorageError> {
        let request = self.request(Method::GET, &format!("{BACKUPS}{id}/"))?;
        let dto: BackupDetailDto = self.fetch(request).await?;
        dto.into_detail()
    }

    async fn delete(&self, id: BackupId) -> Result<(), StorageError> {
        let request = self.request(Method::DELETE, &format!("{BACKUPS}{id}/"))?;
        self.execute(request).await
    }

    async fn download_link(&self, id: BackupId) -> Result<DownloadLink, StorageError> {
        let request = self.request(Method::GET, &format!("{BACKUPS}{id}/descargar/"))?;
        let dto: DownloadDto = self.fetch(request).await?;
        dto.into_link()
    }

    async fn stats(&self) -> Result<BackupStats, StorageError> {
        let request = self.request(Method::GET, &format!("{BACKUPS}estadisticas/"))?;
        let dto: BackupStatsDto = self.fetch(request).await?;
        Ok(dto.into())
    }
}
