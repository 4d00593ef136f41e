//! Role administration and the persisted user ↔ role relation.
//!
//! Persisted roles only grant permissions when their name matches a catalog
//! entry; custom roles can be created and assigned but resolve to nothing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use loanops_auth::{permissions as p, PermissionSet, RequestContext, Role, RoleCatalog, RoleName, User, UserRoleMap};
use loanops_core::{RoleId, UserId};

use crate::error::{ServiceError, ServiceResult};
use crate::gate::require;
use crate::store::{Store, StoreError};

#[derive(Clone)]
pub struct RoleAdmin {
    store: Arc<dyn Store>,
    catalog: Arc<RoleCatalog>,
}

fn role_name(raw: &str) -> ServiceResult<RoleName> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ServiceError::validation("role name must not be blank"));
    }
    Ok(RoleName::new(name.to_string()))
}

impl RoleAdmin {
    pub fn new(store: Arc<dyn Store>, catalog: Arc<RoleCatalog>) -> Self {
        Self { store, catalog }
    }

    /// Insert every catalog role that is not persisted yet. Idempotent.
    #[instrument(skip(self), err)]
    pub async fn seed_builtin_roles(&self, now: DateTime<Utc>) -> ServiceResult<()> {
        for def in self.catalog.definitions() {
            if self.store.role_by_name(def.name.as_str()).await?.is_some() {
                continue;
            }
            let role = Role::new(def.name.clone(), def.description.clone(), now);
            match self.store.insert_role(&role).await {
                Ok(()) => info!(role = %role.name, "seeded role"),
                // Lost a race with another instance seeding the same name.
                Err(StoreError::Duplicate { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Startup-only: make sure `user` holds the `admin` role.
    pub async fn bootstrap_admin(&self, user: &User, now: DateTime<Utc>) -> ServiceResult<()> {
        let admin = self
            .store
            .role_by_name(loanops_auth::roles::ADMIN.as_str())
            .await?
            .ok_or_else(|| ServiceError::not_found("role admin"))?;
        match self
            .store
            .insert_user_role(&UserRoleMap::active(user.id, admin.id, now))
            .await
        {
            Ok(()) => {
                info!(user_id = %user.id, "bootstrap admin granted");
                Ok(())
            }
            Err(StoreError::Duplicate { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_roles(&self, ctx: &RequestContext) -> ServiceResult<Vec<Role>> {
        require(ctx, &p::VIEW_ROLES)?;
        Ok(self.store.list_roles().await?)
    }

    pub async fn create_role(
        &self,
        ctx: &RequestContext,
        name: &str,
        description: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<Role> {
        require(ctx, &p::CREATE_ROLE)?;
        let role = Role::new(role_name(name)?, description.trim(), now);
        self.store.insert_role(&role).await?;
        info!(role = %role.name, by = %ctx.user_id(), "role created");
        Ok(role)
    }

    pub async fn update_role(
        &self,
        ctx: &RequestContext,
        id: RoleId,
        name: Option<&str>,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> ServiceResult<Role> {
        require(ctx, &p::UPDATE_ROLE)?;
        let mut role = self
            .store
            .role_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("role {id}")))?;

        if let Some(name) = name {
            role.name = role_name(name)?;
        }
        if let Some(description) = description {
            role.description = description.trim().to_string();
        }
        role.updated_at = now;

        if !self.store.update_role(&role).await? {
            return Err(ServiceError::not_found(format!("role {id}")));
        }
        Ok(role)
    }

    /// Deletes the role and detaches it from every user.
    pub async fn delete_role(&self, ctx: &RequestContext, id: RoleId) -> ServiceResult<()> {
        require(ctx, &p::DELETE_ROLE)?;
        if !self.store.delete_role(id).await? {
            return Err(ServiceError::not_found(format!("role {id}")));
        }
        info!(role_id = %id, by = %ctx.user_id(), "role deleted");
        Ok(())
    }

    pub async fn assign_role_to_user(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
        role_id: RoleId,
        now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        require(ctx, &p::ASSIGN_ROLE_TO_USER)?;
        self.ensure_user(user_id).await?;
        let role = self
            .store
            .role_by_id(role_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("role {role_id}")))?;

        self.store
            .insert_user_role(&UserRoleMap::active(user_id, role_id, now))
            .await?;
        info!(user_id = %user_id, role = %role.name, by = %ctx.user_id(), "role assigned");
        Ok(())
    }

    pub async fn remove_role_from_user(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
        role_id: RoleId,
    ) -> ServiceResult<()> {
        require(ctx, &p::REMOVE_ROLE_FROM_USER)?;
        if !self.store.deactivate_user_role(user_id, role_id).await? {
            warn!(user_id = %user_id, role_id = %role_id, "no active role edge to remove");
            return Err(ServiceError::not_found(format!(
                "user {user_id} does not hold role {role_id}"
            )));
        }
        info!(user_id = %user_id, role_id = %role_id, by = %ctx.user_id(), "role removed");
        Ok(())
    }

    pub async fn roles_for_user(&self, ctx: &RequestContext, user_id: UserId) -> ServiceResult<Vec<Role>> {
        require(ctx, &p::VIEW_ROLES)?;
        self.ensure_user(user_id).await?;
        Ok(self.store.active_roles_for_user(user_id).await?)
    }

    pub async fn my_roles(&self, ctx: &RequestContext) -> ServiceResult<Vec<Role>> {
        require(ctx, &p::VIEW_MY_PERMISSIONS)?;
        Ok(self.store.active_roles_for_user(ctx.user_id()).await?)
    }

    /// The permission set resolved for this request.
    pub fn my_permissions(&self, ctx: &RequestContext) -> ServiceResult<PermissionSet> {
        require(ctx, &p::VIEW_MY_PERMISSIONS)?;
        Ok(ctx.permissions.clone())
    }

    async fn ensure_user(&self, user_id: UserId) -> ServiceResult<()> {
        match self.store.user_by_id(user_id).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::not_found(format!("user {user_id}"))),
        }
    }
}
