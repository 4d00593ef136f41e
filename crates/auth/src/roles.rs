use std::borrow::{Borrow, Cow};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use loanops_core::{Entity, RoleId, UserId};

/// Role name used for RBAC.
///
/// Role names are opaque strings at this layer; a name only grants permissions
/// when the [`RoleCatalog`](crate::RoleCatalog) knows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleName(Cow<'static, str>);

impl RoleName {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RoleName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RoleName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub const ADMIN: RoleName = RoleName::from_static("admin");
pub const MANAGER: RoleName = RoleName::from_static("manager");
pub const AGENT: RoleName = RoleName::from_static("agent");
pub const DEFAULT: RoleName = RoleName::from_static("default");

/// Persisted role record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: RoleName,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn new(name: RoleName, description: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: RoleId::new(),
            name,
            description: description.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for Role {
    type Id = RoleId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// (user, role) edge. Only active edges contribute permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRoleMap {
    pub user_id: UserId,
    pub role_id: RoleId,
    pub is_active: bool,
    pub assigned_at: DateTime<Utc>,
}

impl UserRoleMap {
    pub fn active(user_id: UserId, role_id: RoleId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            role_id,
            is_active: true,
            assigned_at: now,
        }
    }
}
