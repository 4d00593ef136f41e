use serde::Serialize;
use thiserror::Error;

use loanops_core::UserId;

use crate::catalog::RoleCatalog;
use crate::permissions::Permission;
use crate::principal::RequestContext;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Allow/deny for a resolved request context.
///
/// - No IO
/// - No panics
/// - Exact membership: no wildcard, no hierarchy
pub fn authorize(ctx: &RequestContext, required: &Permission) -> Result<(), AuthzError> {
    if ctx.permissions.contains(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation
// ─────────────────────────────────────────────────────────────────────────────

/// Why a request would be allowed or denied.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required_permission: String,
    pub granted: bool,
    pub reason: String,
    pub principal: PrincipalState,
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrincipalState {
    pub user_id: UserId,
    pub roles: Vec<String>,
    pub effective_permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub message: String,
    /// Catalog roles that would grant the permission.
    pub granting_roles: Vec<String>,
    pub suggestions: Vec<String>,
}

pub fn explain_authorization(
    ctx: &RequestContext,
    required: &Permission,
    catalog: &RoleCatalog,
) -> AuthorizationExplanation {
    let required_str = required.as_str();
    let principal = PrincipalState {
        user_id: ctx.user_id(),
        roles: ctx.roles.iter().map(|r| r.as_str().to_string()).collect(),
        effective_permissions: ctx.permissions.iter().map(|p| p.as_str().to_string()).collect(),
    };

    if authorize(ctx, required).is_ok() {
        let via: Vec<String> = ctx
            .roles
            .iter()
            .filter(|role| catalog.permissions_of(role.as_str()).contains(required))
            .map(|role| role.as_str().to_string())
            .collect();

        return AuthorizationExplanation {
            required_permission: required_str.to_string(),
            granted: true,
            reason: format!("permission '{required_str}' granted by role(s) {via:?}"),
            principal,
            denial_reason: None,
        };
    }

    let granting_roles: Vec<String> = catalog
        .roles_granting(required)
        .into_iter()
        .map(|r| r.as_str().to_string())
        .collect();

    let suggestions = if granting_roles.is_empty() {
        vec![format!("No catalog role grants '{required_str}'")]
    } else {
        granting_roles
            .iter()
            .map(|role| format!("Assign the '{role}' role"))
            .collect()
    };

    AuthorizationExplanation {
        required_permission: required_str.to_string(),
        granted: false,
        reason: format!(
            "caller lacks permission '{}'. Current permissions: {:?}",
            required_str, principal.effective_permissions
        ),
        principal,
        denial_reason: Some(DenialReason {
            message: format!("Missing required permission: '{required_str}'"),
            granting_roles,
            suggestions,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{self as p, PermissionSet};
    use crate::principal::Identity;
    use crate::roles::{self, RoleName};

    fn ctx_with(roles: &[RoleName]) -> RequestContext {
        let catalog = RoleCatalog::builtin();
        let identity = Identity {
            user_id: UserId::new(),
            username: "u".into(),
            email: None,
        };
        let permissions = catalog.resolve(roles.iter().map(|r| r.as_str()));
        RequestContext::new(identity, roles.to_vec(), permissions)
    }

    #[test]
    fn agent_only_user() {
        let ctx = ctx_with(&[roles::AGENT]);
        assert_eq!(
            authorize(&ctx, &p::CREATE_AGENCY),
            Err(AuthzError::Forbidden("create_agency".into()))
        );
        assert_eq!(authorize(&ctx, &p::VIEW_CASES), Ok(()));
    }

    #[test]
    fn star_is_not_a_wildcard() {
        let identity = Identity {
            user_id: UserId::new(),
            username: "u".into(),
            email: None,
        };
        let perms: PermissionSet = [Permission::new("*")].into_iter().collect();
        let ctx = RequestContext::new(identity, vec![], perms);
        assert!(authorize(&ctx, &p::VIEW_USERS).is_err());
    }

    #[test]
    fn no_roles_means_nothing_is_allowed() {
        let ctx = ctx_with(&[]);
        assert!(authorize(&ctx, &p::VIEW_MY_PERMISSIONS).is_err());
    }

    #[test]
    fn explanation_names_granting_roles() {
        let ctx = ctx_with(&[roles::AGENT]);
        let catalog = RoleCatalog::builtin();

        let denied = explain_authorization(&ctx, &p::ASSIGN_CASE, &catalog);
        assert!(!denied.granted);
        let denial = denied.denial_reason.unwrap();
        assert_eq!(denial.granting_roles, vec!["admin".to_string(), "manager".to_string()]);

        let granted = explain_authorization(&ctx, &p::ADD_TRAIL, &catalog);
        assert!(granted.granted);
        assert!(granted.reason.contains("agent"));
    }
}
