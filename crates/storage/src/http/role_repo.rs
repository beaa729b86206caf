use async_trait::async_trait;
use clinic_core::model::{Role, RoleId, UserAccount, UserCode};
use reqwest::Method;

use super::HttpRepository;
use super::mapping::{ListOrPage, RoleDto, RoleUpdateDto, UserDto};
use crate::repository::{RoleStore, StorageError};

#[async_trait]
impl RoleStore for HttpRepository {
    async fn list_roles(&self) -> Result<Vec<Role>, StorageError> {
        let request = self.request(Method::GET, "usuarios/tipos-usuario/")?;
        let roles: ListOrPage<RoleDto> = self.fetch(request).await?;
        Ok(roles.into_vec().into_iter().map(Role::from).collect())
    }

    async fn search_users(&self, query: &str) -> Result<Vec<UserAccount>, StorageError> {
        let mut request = self.request(Method::GET, "usuarios/usuarios/")?;
        let query = query.trim();
        if !query.is_empty() {
            request = request.query(&[("search", query)]);
        }
        let users: ListOrPage<UserDto> = self.fetch(request).await?;
        Ok(users.into_vec().into_iter().map(UserAccount::from).collect())
    }

    async fn update_user_role(
        &self,
        user: UserCode,
        role: RoleId,
    ) -> Result<UserAccount, StorageError> {
        let request = self
            .request(Method::PATCH, &format!("usuarios/{user}/"))?
            .json(&RoleUpdateDto {
                idtipousuario: role.value(),
            });
        let dto: UserDto = self.fetch(request).await?;
        Ok(dto.into())
    }
}
