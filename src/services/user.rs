// src/services/user.rs - Accounts and role administration
use std::sync::Arc;
use std::time::Duration;

use log::info;
use uuid::Uuid;

use super::with_deadline;
use crate::errors::ServiceError;
use crate::models::{AdminScope, GoogleProfile, Page, PageQuery, Role, UpdateRoleRequest, User};
use crate::repositories::{UserFilter, UserRepositoryTrait};

type Result<T> = std::result::Result<T, ServiceError>;

pub struct UserService {
    repository: Arc<dyn UserRepositoryTrait>,
    timeout: Duration,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepositoryTrait>, timeout: Duration) -> Self {
        Self {
            repository,
            timeout,
        }
    }

    fn ensure_scope(actor: &User, scope: AdminScope) -> Result<()> {
        if actor.can(scope.required_capability()) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden("Insufficient permissions".to_string()))
        }
    }

    /// Records a successful Google sign-in
    pub async fn login(&self, profile: GoogleProfile) -> Result<User> {
        let user = with_deadline(self.timeout, self.repository.upsert_from_google(profile)).await?;
        info!("User {} signed in with role {}", user.id, user.role);
        Ok(user)
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<User>> {
        with_deadline(self.timeout, self.repository.find_by_id(id)).await
    }

    pub async fn list_users(
        &self,
        actor: &User,
        scope: AdminScope,
        query: &PageQuery,
    ) -> Result<Page<User>> {
        Self::ensure_scope(actor, scope)?;

        let role = match query.role.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                raw.parse::<Role>()
                    .map_err(|e| ServiceError::Validation(e.to_string()))?,
            ),
        };

        let filter = UserFilter {
            search: query.search_term(),
            role,
            exclude_role: scope.hidden_role(),
        };
        let page = query.page_request();
        let (users, total) = with_deadline(self.timeout, self.repository.list(filter, page)).await?;

        Ok(Page::new(users, page, total))
    }

    /// A user visible through `scope`; hidden roles look like missing users
    pub async fn detail(&self, actor: &User, scope: AdminScope, id: Uuid) -> Result<User> {
        Self::ensure_scope(actor, scope)?;

        self.find(id)
            .await?
            .filter(|user| scope.hidden_role() != Some(user.role))
            .ok_or_else(|| ServiceError::NotFound(format!("User with ID {} not found", id)))
    }

    pub async fn change_role(
        &self,
        actor: &User,
        scope: AdminScope,
        id: Uuid,
        request: UpdateRoleRequest,
    ) -> Result<User> {
        let new_role = request
            .role
            .parse::<Role>()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;
        let target = self.detail(actor, scope, id).await?;

        if !actor.role.may_assign(target.role, new_role) {
            return Err(ServiceError::Forbidden(format!(
                "{} may not change a {} to {}",
                actor.role, target.role, new_role
            )));
        }

        let updated = with_deadline(self.timeout, self.repository.update_role(id, new_role))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User with ID {} not found", id)))?;

        info!(
            "User {} changed role of {} from {} to {}",
            actor.id, id, target.role, new_role
        );
        Ok(updated)
    }

    /// Members may only delete their own account
    pub async fn delete_account(&self, actor: &User, id: Uuid) -> Result<()> {
        if actor.id != id {
            return Err(ServiceError::Forbidden(
                "You can only delete your own account".to_string(),
            ));
        }

        if !with_deadline(self.timeout, self.repository.delete(id)).await? {
            return Err(ServiceError::NotFound(format!("User with ID {} not found", id)));
        }
        info!("User {} deleted their account", id);
        Ok(())
    }
}
