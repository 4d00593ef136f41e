use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are flat, opaque strings (e.g. "assign_cases") compared for
/// exact equality. There is no wildcard and no hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
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

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Flattened, deduplicated permission set of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, permission: Permission) {
        self.0.insert(permission);
    }

    pub fn extend(&mut self, other: &PermissionSet) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn contains(&self, permission: &Permission) -> bool {
        self.0.contains(permission)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Sorted iteration.
    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.0.iter()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// Permission names used by the compiled-in catalog and by every protected
// operation.

pub const VIEW_USERS: Permission = Permission::from_static("view_users");
pub const CREATE_USER: Permission = Permission::from_static("create_user");
pub const UPDATE_USER: Permission = Permission::from_static("update_user");
pub const DELETE_USER: Permission = Permission::from_static("delete_user");

pub const VIEW_ROLES: Permission = Permission::from_static("view_roles");
pub const CREATE_ROLE: Permission = Permission::from_static("create_role");
pub const UPDATE_ROLE: Permission = Permission::from_static("update_role");
pub const DELETE_ROLE: Permission = Permission::from_static("delete_role");
pub const ASSIGN_ROLE_TO_USER: Permission = Permission::from_static("assign_role_to_user");
pub const REMOVE_ROLE_FROM_USER: Permission = Permission::from_static("remove_role_from_user");
pub const VIEW_MY_PERMISSIONS: Permission = Permission::from_static("view_my_permissions");

pub const VIEW_AGENCIES: Permission = Permission::from_static("view_agencies");
pub const CREATE_AGENCY: Permission = Permission::from_static("create_agency");
pub const DELETE_AGENCY: Permission = Permission::from_static("delete_agency");
pub const VIEW_AGENCY_USERS: Permission = Permission::from_static("view_agency_users");
pub const VIEW_UNASSIGNED_USERS: Permission = Permission::from_static("view_unassigned_users");
pub const ASSIGN_USER_TO_AGENCY: Permission = Permission::from_static("assign_user_to_agency");

pub const UPLOAD_CASES: Permission = Permission::from_static("upload_cases");
pub const VIEW_UNASSIGNED_CASES: Permission = Permission::from_static("view_unassigned_cases");
pub const ASSIGN_CASES: Permission = Permission::from_static("assign_cases");
pub const VIEW_ALL_CASES: Permission = Permission::from_static("view_all_cases");
pub const VIEW_AGENCY_CASES: Permission = Permission::from_static("view_agency_cases");
pub const ASSIGN_CASE: Permission = Permission::from_static("assign_case");
pub const VIEW_CASES: Permission = Permission::from_static("view_cases");

pub const VIEW_TRAILS: Permission = Permission::from_static("view_trails");
pub const ADD_TRAIL: Permission = Permission::from_static("add_trail");
pub const GENERATE_PAYMENT_LINK: Permission = Permission::from_static("generate_payment_link");
