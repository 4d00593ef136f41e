//! Compiled-in role → permission table.
//!
//! The catalog is immutable once built. Services receive it behind an `Arc`
//! and resolve a user's active role names into a flat [`PermissionSet`] on
//! every request.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::permissions::{self as p, Permission, PermissionSet};
use crate::roles::{self, RoleName};

/// Role definition with its granted permissions (for audit/display).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleDefinition {
    pub name: RoleName,
    pub description: String,
    pub permissions: PermissionSet,
}

#[derive(Debug, Clone, Default)]
pub struct RoleCatalog {
    roles: BTreeMap<RoleName, RoleDefinition>,
}

impl RoleCatalog {
    pub fn from_definitions(definitions: impl IntoIterator<Item = RoleDefinition>) -> Self {
        let roles = definitions
            .into_iter()
            .map(|def| (def.name.clone(), def))
            .collect();
        Self { roles }
    }

    /// The built-in roles: `admin`, `manager`, `agent` and `default`.
    pub fn builtin() -> Self {
        Self::from_definitions([
            RoleDefinition {
                name: roles::ADMIN,
                description: "Back-office administrator: users, roles, agencies and case intake".into(),
                permissions: [
                    p::VIEW_USERS,
                    p::CREATE_USER,
                    p::UPDATE_USER,
                    p::DELETE_USER,
                    p::VIEW_ROLES,
                    p::CREATE_ROLE,
                    p::UPDATE_ROLE,
                    p::DELETE_ROLE,
                    p::ASSIGN_ROLE_TO_USER,
                    p::REMOVE_ROLE_FROM_USER,
                    p::VIEW_AGENCIES,
                    p::CREATE_AGENCY,
                    p::DELETE_AGENCY,
                    p::VIEW_AGENCY_USERS,
                    p::VIEW_UNASSIGNED_USERS,
                    p::ASSIGN_USER_TO_AGENCY,
                    p::UPLOAD_CASES,
                    p::VIEW_UNASSIGNED_CASES,
                    p::ASSIGN_CASES,
                    p::VIEW_ALL_CASES,
                    p::ASSIGN_CASE,
                    p::VIEW_AGENCY_CASES,
                    p::VIEW_CASES,
                    p::VIEW_TRAILS,
                    p::VIEW_MY_PERMISSIONS,
                ]
                .into_iter()
                .collect(),
            },
            RoleDefinition {
                name: roles::MANAGER,
                description: "Agency manager: sees the agency's cases and hands them to agents".into(),
                permissions: [
                    p::VIEW_AGENCY_CASES,
                    p::VIEW_AGENCY_USERS,
                    p::ASSIGN_CASE,
                    p::VIEW_CASES,
                    p::VIEW_TRAILS,
                    p::VIEW_MY_PERMISSIONS,
                ]
                .into_iter()
                .collect(),
            },
            RoleDefinition {
                name: roles::AGENT,
                description: "Field agent: works assigned cases and records trails".into(),
                permissions: [
                    p::VIEW_CASES,
                    p::VIEW_TRAILS,
                    p::ADD_TRAIL,
                    p::GENERATE_PAYMENT_LINK,
                    p::VIEW_MY_PERMISSIONS,
                ]
                .into_iter()
                .collect(),
            },
            RoleDefinition {
                name: roles::DEFAULT,
                description: "Baseline role".into(),
                permissions: [p::VIEW_MY_PERMISSIONS].into_iter().collect(),
            },
        ])
    }

    pub fn get(&self, role: &str) -> Option<&RoleDefinition> {
        self.roles.get(role)
    }

    /// Permissions granted by a single role. Unknown roles grant nothing.
    pub fn permissions_of(&self, role: &str) -> PermissionSet {
        self.roles
            .get(role)
            .map(|def| def.permissions.clone())
            .unwrap_or_default()
    }

    /// Union of the permissions of every given role name.
    pub fn resolve<'a, I>(&self, roles: I) -> PermissionSet
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut out = PermissionSet::new();
        for role in roles {
            if let Some(def) = self.roles.get(role) {
                out.extend(&def.permissions);
            }
        }
        out
    }

    /// Catalog roles that grant `permission`, sorted by name.
    pub fn roles_granting(&self, permission: &Permission) -> Vec<RoleName> {
        self.roles
            .values()
            .filter(|def| def.permissions.contains(permission))
            .map(|def| def.name.clone())
            .collect()
    }

    pub fn role_names(&self) -> impl Iterator<Item = &RoleName> {
        self.roles.keys()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &RoleDefinition> {
        self.roles.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn builtin_has_four_roles() {
        let catalog = RoleCatalog::builtin();
        let names: Vec<&str> = catalog.role_names().map(|r| r.as_str()).collect();
        assert_eq!(names, vec!["admin", "agent", "default", "manager"]);
    }

    #[test]
    fn agent_cannot_create_agencies() {
        let perms = RoleCatalog::builtin().permissions_of("agent");
        assert!(perms.contains(&p::VIEW_CASES));
        assert!(!perms.contains(&p::CREATE_AGENCY));
    }

    #[test]
    fn unknown_roles_resolve_to_nothing() {
        let catalog = RoleCatalog::builtin();
        assert!(catalog.resolve(["auditor", "root"]).is_empty());
        assert!(catalog.resolve(std::iter::empty()).is_empty());
    }

    #[test]
    fn roles_granting_lists_every_holder() {
        let catalog = RoleCatalog::builtin();
        let granting = catalog.roles_granting(&p::VIEW_MY_PERMISSIONS);
        assert_eq!(granting.len(), 4);
        assert_eq!(catalog.roles_granting(&p::ADD_TRAIL), vec![roles::AGENT]);
        assert_eq!(catalog.roles_granting(&p::ASSIGN_CASE), vec![roles::ADMIN, roles::MANAGER]);
    }

    fn role_subset() -> impl Strategy<Value = Vec<&'static str>> {
        proptest::sample::subsequence(vec!["admin", "manager", "agent", "default", "ghost"], 0..=5)
    }

    proptest! {
        #[test]
        fn resolve_is_union_of_single_roles(roles in role_subset()) {
            let catalog = RoleCatalog::builtin();
            let resolved = catalog.resolve(roles.iter().copied());

            let mut expected = PermissionSet::new();
            for role in &roles {
                expected.extend(&catalog.permissions_of(role));
            }
            prop_assert_eq!(resolved.clone(), expected);

            for role in &roles {
                for perm in catalog.permissions_of(role).iter() {
                    prop_assert!(resolved.contains(perm));
                }
            }
        }
    }
}
