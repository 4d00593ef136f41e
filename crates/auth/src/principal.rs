use serde::Serialize;

use loanops_core::UserId;

use crate::permissions::{Permission, PermissionSet};
use crate::roles::RoleName;
use crate::user::User;

/// Authenticated identity, resolved from a verified token and a fresh user
/// lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
    pub email: Option<String>,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

/// Request-scoped authorization context.
///
/// Built once per request and passed explicitly to every operation; never
/// cached across requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub identity: Identity,
    pub roles: Vec<RoleName>,
    pub permissions: PermissionSet,
}

impl RequestContext {
    pub fn new(identity: Identity, roles: Vec<RoleName>, permissions: PermissionSet) -> Self {
        Self {
            identity,
            roles,
            permissions,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.identity.user_id
    }

    pub fn has(&self, permission: &Permission) -> bool {
        self.permissions.contains(permission)
    }
}
