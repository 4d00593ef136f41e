//! Authorization gate: token → identity → permission set → allow/deny.
//!
//! Nothing here is cached. `begin_request` re-reads the user and its active
//! role edges for every request, so deactivation and role removal take effect
//! on the next call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{instrument, warn};

use loanops_auth::{
    authorize, explain_authorization, AuthorizationExplanation, Identity, Permission,
    PermissionSet, RequestContext, RoleCatalog, RoleName, TokenCodec,
};
use loanops_core::UserId;

use crate::error::{ServiceError, ServiceResult};
use crate::store::Store;

/// Run the single permission check an operation declares.
///
/// Denials are logged with the caller and the missing permission.
pub fn require(ctx: &RequestContext, permission: &Permission) -> ServiceResult<()> {
    authorize(ctx, permission).map_err(|e| {
        warn!(
            user_id = %ctx.user_id(),
            permission = permission.as_str(),
            "authorization denied"
        );
        ServiceError::from(e)
    })
}

#[derive(Clone)]
pub struct AuthorizationGate {
    store: Arc<dyn Store>,
    tokens: Arc<dyn TokenCodec>,
    catalog: Arc<RoleCatalog>,
}

impl AuthorizationGate {
    pub fn new(store: Arc<dyn Store>, tokens: Arc<dyn TokenCodec>, catalog: Arc<RoleCatalog>) -> Self {
        Self {
            store,
            tokens,
            catalog,
        }
    }

    pub fn catalog(&self) -> &RoleCatalog {
        &self.catalog
    }

    /// Verify the token and re-fetch its subject. Missing or inactive users
    /// are `Unauthorized`.
    pub async fn resolve_identity(&self, token: &str, now: DateTime<Utc>) -> ServiceResult<Identity> {
        let claims = self
            .tokens
            .verify(token, now)
            .map_err(|e| ServiceError::Unauthorized(e.to_string()))?;

        let user = self
            .store
            .user_by_id(claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| ServiceError::Unauthorized("unknown or inactive user".to_string()))?;

        Ok(Identity::from(&user))
    }

    /// Union of catalog permissions over the user's active roles.
    pub async fn permissions_for(&self, user_id: UserId) -> ServiceResult<PermissionSet> {
        let (_, permissions) = self.roles_and_permissions(user_id).await?;
        Ok(permissions)
    }

    async fn roles_and_permissions(&self, user_id: UserId) -> ServiceResult<(Vec<RoleName>, PermissionSet)> {
        let roles: Vec<RoleName> = self
            .store
            .active_roles_for_user(user_id)
            .await?
            .into_iter()
            .map(|r| r.name)
            .collect();
        let permissions = self.catalog.resolve(roles.iter().map(|r| r.as_str()));
        Ok((roles, permissions))
    }

    /// Build the request-scoped context. Call once per request.
    #[instrument(skip(self, token), err)]
    pub async fn begin_request(&self, token: &str, now: DateTime<Utc>) -> ServiceResult<RequestContext> {
        let identity = self.resolve_identity(token, now).await?;
        let (roles, permissions) = self.roles_and_permissions(identity.user_id).await?;
        Ok(RequestContext::new(identity, roles, permissions))
    }

    pub fn authorize(&self, ctx: &RequestContext, permission: &Permission) -> ServiceResult<()> {
        require(ctx, permission)
    }

    pub fn explain(&self, ctx: &RequestContext, permission: &Permission) -> AuthorizationExplanation {
        explain_authorization(ctx, permission, &self.catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use chrono::Duration;
    use loanops_auth::permissions as p;

    #[tokio::test]
    async fn permissions_are_union_of_active_roles() {
        let fx = Fixture::new().await;
        let user = fx.user_with_roles("mixed", &["agent", "manager"]).await;

        let perms = fx.gate.permissions_for(user.id).await.unwrap();
        let expected = fx.gate.catalog().resolve(["agent", "manager"]);
        assert_eq!(perms, expected);
        assert!(perms.contains(&p::ADD_TRAIL));
        assert!(perms.contains(&p::ASSIGN_CASE));
    }

    #[tokio::test]
    async fn no_roles_means_empty_set() {
        let fx = Fixture::new().await;
        let user = fx.user_with_roles("bare", &[]).await;
        assert!(fx.gate.permissions_for(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_role_names_contribute_nothing() {
        let fx = Fixture::new().await;
        let admin = fx.admin_ctx().await;
        fx.roles.create_role(&admin, "auditor", "custom", fx.now).await.unwrap();
        let user = fx.user_with_roles("aud", &["auditor"]).await;
        assert!(fx.gate.permissions_for(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn begin_request_resolves_context() {
        let fx = Fixture::new().await;
        let user = fx.user_with_roles("agent-ctx", &["agent"]).await;
        let token = fx.token_for("agent-ctx").await;

        let ctx = fx.gate.begin_request(&token, fx.now).await.unwrap();
        assert_eq!(ctx.user_id(), user.id);
        assert_eq!(ctx.roles, vec![RoleName::new("agent")]);
        assert!(fx.gate.authorize(&ctx, &p::VIEW_CASES).is_ok());
        assert_eq!(
            fx.gate.authorize(&ctx, &p::CREATE_AGENCY),
            Err(ServiceError::Forbidden {
                permission: "create_agency".into()
            })
        );
    }

    #[tokio::test]
    async fn deactivated_user_token_is_unauthorized() {
        let fx = Fixture::new().await;
        let user = fx.user_with_roles("leaver", &["agent"]).await;
        let token = fx.token_for("leaver").await;

        fx.store.set_user_active(user.id, false, fx.now).await.unwrap();
        assert!(matches!(
            fx.gate.begin_request(&token, fx.now).await,
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn expired_and_garbage_tokens_are_unauthorized() {
        let fx = Fixture::new().await;
        fx.user_with_roles("late", &["agent"]).await;
        let token = fx.token_for("late").await;

        assert!(fx.gate.begin_request(&token, fx.now + Duration::minutes(23 * 60 + 59)).await.is_ok());
        assert!(matches!(
            fx.gate.begin_request(&token, fx.now + Duration::minutes(24 * 60 + 1)).await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(matches!(
            fx.gate.begin_request("not.a.token", fx.now).await,
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn role_removal_applies_to_next_request() {
        let fx = Fixture::new().await;
        let admin = fx.admin_ctx().await;
        let user = fx.user_with_roles("demoted", &["agent"]).await;
        let token = fx.token_for("demoted").await;

        let agent_role = fx.store.role_by_name("agent").await.unwrap().unwrap();
        fx.roles.remove_role_from_user(&admin, user.id, agent_role.id).await.unwrap();

        let ctx = fx.gate.begin_request(&token, fx.now).await.unwrap();
        assert!(ctx.permissions.is_empty());
    }
}
