use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use loanops_auth::{permissions as p, RequestContext, User};
use loanops_core::UserId;

use crate::authn::Authenticator;
use crate::error::{ServiceError, ServiceResult};
use crate::gate::require;
use crate::store::Store;

/// Administrative user management. Users are deactivated, never deleted.
#[derive(Clone)]
pub struct UserAdmin {
    store: Arc<dyn Store>,
    authn: Authenticator,
}

impl UserAdmin {
    pub fn new(store: Arc<dyn Store>, authn: Authenticator) -> Self {
        Self { store, authn }
    }

    pub async fn list_users(&self, ctx: &RequestContext) -> ServiceResult<Vec<User>> {
        require(ctx, &p::VIEW_USERS)?;
        Ok(self.store.list_users().await?)
    }

    /// Same rules as self-registration.
    pub async fn create_user(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
        email: Option<String>,
        now: DateTime<Utc>,
    ) -> ServiceResult<User> {
        require(ctx, &p::CREATE_USER)?;
        self.authn.register_user(username, password, email, now).await
    }

    pub async fn deactivate_user(&self, ctx: &RequestContext, user_id: UserId, now: DateTime<Utc>) -> ServiceResult<()> {
        require(ctx, &p::DELETE_USER)?;
        if user_id == ctx.user_id() {
            return Err(ServiceError::conflict("cannot deactivate your own account"));
        }
        self.set_active(user_id, false, now).await?;
        info!(user_id = %user_id, by = %ctx.user_id(), "user deactivated");
        Ok(())
    }

    pub async fn activate_user(&self, ctx: &RequestContext, user_id: UserId, now: DateTime<Utc>) -> ServiceResult<()> {
        require(ctx, &p::UPDATE_USER)?;
        self.set_active(user_id, true, now).await?;
        info!(user_id = %user_id, by = %ctx.user_id(), "user activated");
        Ok(())
    }

    async fn set_active(&self, user_id: UserId, active: bool, now: DateTime<Utc>) -> ServiceResult<()> {
        if self.store.set_user_active(user_id, active, now).await? {
            Ok(())
        } else {
            Err(ServiceError::not_found(format!("user {user_id}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;

    #[tokio::test]
    async fn deactivation_blocks_login() {
        let fx = Fixture::new().await;
        let admin = fx.admin_ctx().await;
        let user = fx.user_with_roles("temp", &["agent"]).await;

        fx.users.deactivate_user(&admin, user.id, fx.now).await.unwrap();
        assert_eq!(
            fx.authn.authenticate("temp", crate::testing::PASSWORD, fx.now).await.unwrap_err(),
            ServiceError::InvalidCredentials
        );

        fx.users.activate_user(&admin, user.id, fx.now).await.unwrap();
        assert!(fx.authn.authenticate("temp", crate::testing::PASSWORD, fx.now).await.is_ok());
    }

    #[tokio::test]
    async fn agents_cannot_manage_users() {
        let fx = Fixture::new().await;
        let agent = fx.ctx_with_roles("field", &["agent"]).await;
        assert!(matches!(fx.users.list_users(&agent).await, Err(ServiceError::Forbidden { .. })));
        assert!(matches!(
            fx.users.create_user(&agent, "x", "long-enough", None, fx.now).await,
            Err(ServiceError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let fx = Fixture::new().await;
        let admin = fx.admin_ctx().await;
        assert!(matches!(
            fx.users.deactivate_user(&admin, UserId::new(), fx.now).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
