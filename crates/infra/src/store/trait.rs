use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use loanops_auth::{Role, User, UserRoleMap};
use loanops_cases::{Agency, AgencyCaseMap, AgencyUserMap, Case, CaseUserMap, Trail};
use loanops_core::{AgencyId, CaseId, RoleId, UserId};

/// Storage operation error.
///
/// Every variant carries the failing operation name so the service layer can
/// report it without knowing which backend is in use.
///
/// - **Duplicate**: a uniqueness rule rejected the write
/// - **NotFound**: a referenced record is missing (batch operations only)
/// - **Conflict**: the write would break a referential or state rule
/// - **Backend**: connection, lock or decoding failure
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("duplicate in {operation}: {message}")]
    Duplicate { operation: String, message: String },

    #[error("not found in {operation}: {message}")]
    NotFound { operation: String, message: String },

    #[error("conflict in {operation}: {message}")]
    Conflict { operation: String, message: String },

    #[error("storage failure in {operation}: {message}")]
    Backend { operation: String, message: String },
}

impl StoreError {
    pub fn duplicate(operation: &str, message: impl Into<String>) -> Self {
        Self::Duplicate {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(operation: &str, message: impl Into<String>) -> Self {
        Self::NotFound {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    pub fn conflict(operation: &str, message: impl Into<String>) -> Self {
        Self::Conflict {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    pub fn backend(operation: &str, message: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Active agency member with its user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgencyMember {
    pub mapping: AgencyUserMap,
    pub user: User,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// `Duplicate` when the username is taken.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn user_by_id(&self, id: UserId) -> StoreResult<Option<User>>;
    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    /// Returns `false` when the user does not exist.
    async fn set_user_active(&self, id: UserId, active: bool, now: DateTime<Utc>) -> StoreResult<bool>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    /// `Duplicate` when the name is taken.
    async fn insert_role(&self, role: &Role) -> StoreResult<()>;
    async fn role_by_id(&self, id: RoleId) -> StoreResult<Option<Role>>;
    async fn role_by_name(&self, name: &str) -> StoreResult<Option<Role>>;
    async fn list_roles(&self) -> StoreResult<Vec<Role>>;
    /// Returns `false` when the role does not exist; `Duplicate` on a name clash.
    async fn update_role(&self, role: &Role) -> StoreResult<bool>;
    /// Removes the role and every user edge pointing at it in one operation.
    async fn delete_role(&self, id: RoleId) -> StoreResult<bool>;

    /// `Duplicate` when an active edge for the pair already exists.
    async fn insert_user_role(&self, edge: &UserRoleMap) -> StoreResult<()>;
    /// Returns `false` when no active edge exists.
    async fn deactivate_user_role(&self, user_id: UserId, role_id: RoleId) -> StoreResult<bool>;
    async fn active_roles_for_user(&self, user_id: UserId) -> StoreResult<Vec<Role>>;
}

#[async_trait]
pub trait AgencyStore: Send + Sync {
    async fn insert_agency(&self, agency: &Agency) -> StoreResult<()>;
    async fn agency_by_id(&self, id: AgencyId) -> StoreResult<Option<Agency>>;
    async fn list_active_agencies(&self) -> StoreResult<Vec<Agency>>;
    /// `Conflict` while any user or case edge references the agency.
    async fn delete_agency(&self, id: AgencyId) -> StoreResult<bool>;

    /// `Duplicate` when the user already has an active agency mapping.
    async fn insert_agency_user(&self, edge: &AgencyUserMap) -> StoreResult<()>;
    async fn active_agency_for_user(&self, user_id: UserId) -> StoreResult<Option<AgencyUserMap>>;
    async fn agency_members(&self, agency_id: AgencyId) -> StoreResult<Vec<AgencyMember>>;
    /// Active users without an active agency mapping.
    async fn unassigned_users(&self) -> StoreResult<Vec<User>>;
}

#[async_trait]
pub trait CaseStore: Send + Sync {
    /// All-or-nothing insert.
    async fn insert_cases(&self, cases: &[Case]) -> StoreResult<()>;
    async fn case_by_id(&self, id: CaseId) -> StoreResult<Option<Case>>;
    /// Cases without an agency edge.
    async fn unassigned_cases(&self) -> StoreResult<Vec<Case>>;
}

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Map every case to `agency_id` and move it to `ASSIGNED`, atomically.
    ///
    /// `NotFound` for a missing agency or case, `Duplicate` for an already
    /// mapped or repeated case, `Conflict` for a case not in `PENDING`. On any
    /// error nothing is written.
    async fn assign_cases_to_agency(
        &self,
        agency_id: AgencyId,
        case_ids: &[CaseId],
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Case>>;
    async fn agency_for_case(&self, case_id: CaseId) -> StoreResult<Option<AgencyCaseMap>>;
    async fn cases_for_agency(&self, agency_id: AgencyId) -> StoreResult<Vec<Case>>;

    /// `Duplicate` when the case already has an agent.
    async fn insert_case_user(&self, edge: &CaseUserMap) -> StoreResult<()>;
    async fn cases_for_user(&self, user_id: UserId) -> StoreResult<Vec<Case>>;
    /// Earliest assignment wins.
    async fn assigned_agent(&self, case_id: CaseId) -> StoreResult<Option<User>>;
}

#[async_trait]
pub trait TrailStore: Send + Sync {
    async fn insert_trail(&self, trail: &Trail) -> StoreResult<()>;
    /// Oldest first.
    async fn trails_for_case(&self, case_id: CaseId) -> StoreResult<Vec<Trail>>;
}

/// Everything a service needs, as one trait object.
pub trait Store: UserStore + RoleStore + AgencyStore + CaseStore + AssignmentStore + TrailStore {}

impl<T> Store for T where T: UserStore + RoleStore + AgencyStore + CaseStore + AssignmentStore + TrailStore {}
