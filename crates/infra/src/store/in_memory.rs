use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use loanops_auth::{Role, User, UserRoleMap};
use loanops_cases::{Agency, AgencyCaseMap, AgencyUserMap, Case, CaseStatus, CaseUserMap, Trail};
use loanops_core::{AgencyId, CaseId, Entity, RoleId, UserId};

use super::r#trait::{
    AgencyMember, AgencyStore, AssignmentStore, CaseStore, RoleStore, StoreError, StoreResult,
    TrailStore, UserStore,
};

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<UserId, User>,
    roles: BTreeMap<RoleId, Role>,
    user_roles: Vec<UserRoleMap>,
    agencies: BTreeMap<AgencyId, Agency>,
    agency_users: Vec<AgencyUserMap>,
    cases: BTreeMap<CaseId, Case>,
    agency_cases: BTreeMap<CaseId, AgencyCaseMap>,
    case_users: Vec<CaseUserMap>,
    trails: Vec<Trail>,
}

/// In-memory store.
///
/// Intended for tests/dev. One `RwLock` guards all tables, so every mutation
/// (including batch assignment) is atomic with respect to every other.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self, operation: &str) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::backend(operation, "lock poisoned"))
    }

    fn write(&self, operation: &str) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::backend(operation, "lock poisoned"))
    }
}

/// Upsert keyed by the record's own id.
fn put<E: Entity + Clone>(table: &mut BTreeMap<E::Id, E>, record: &E) {
    table.insert(record.id(), record.clone());
}

fn sorted_cases<'a>(cases: impl Iterator<Item = &'a Case>) -> Vec<Case> {
    let mut out: Vec<Case> = cases.cloned().collect();
    out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    out
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut state = self.write("insert_user")?;
        if state.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::duplicate(
                "insert_user",
                format!("username '{}' already exists", user.username),
            ));
        }
        put(&mut state.users, user);
        Ok(())
    }

    async fn user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.read("user_by_id")?.users.get(&id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let state = self.read("user_by_username")?;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let state = self.read("list_users")?;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn set_user_active(&self, id: UserId, active: bool, now: DateTime<Utc>) -> StoreResult<bool> {
        let mut state = self.write("set_user_active")?;
        match state.users.get_mut(&id) {
            Some(user) => {
                user.is_active = active;
                user.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl RoleStore for InMemoryStore {
    async fn insert_role(&self, role: &Role) -> StoreResult<()> {
        let mut state = self.write("insert_role")?;
        if state.roles.values().any(|r| r.name == role.name) {
            return Err(StoreError::duplicate(
                "insert_role",
                format!("role '{}' already exists", role.name),
            ));
        }
        put(&mut state.roles, role);
        Ok(())
    }

    async fn role_by_id(&self, id: RoleId) -> StoreResult<Option<Role>> {
        Ok(self.read("role_by_id")?.roles.get(&id).cloned())
    }

    async fn role_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let state = self.read("role_by_name")?;
        Ok(state.roles.values().find(|r| r.name.as_str() == name).cloned())
    }

    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        let state = self.read("list_roles")?;
        let mut roles: Vec<Role> = state.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn update_role(&self, role: &Role) -> StoreResult<bool> {
        let mut state = self.write("update_role")?;
        if !state.roles.contains_key(&role.id) {
            return Ok(false);
        }
        if state
            .roles
            .values()
            .any(|r| r.id != role.id && r.name == role.name)
        {
            return Err(StoreError::duplicate(
                "update_role",
                format!("role '{}' already exists", role.name),
            ));
        }
        put(&mut state.roles, role);
        Ok(true)
    }

    async fn delete_role(&self, id: RoleId) -> StoreResult<bool> {
        let mut state = self.write("delete_role")?;
        if state.roles.remove(&id).is_none() {
            return Ok(false);
        }
        state.user_roles.retain(|edge| edge.role_id != id);
        Ok(true)
    }

    async fn insert_user_role(&self, edge: &UserRoleMap) -> StoreResult<()> {
        let mut state = self.write("insert_user_role")?;
        if !state.users.contains_key(&edge.user_id) || !state.roles.contains_key(&edge.role_id) {
            return Err(StoreError::conflict("insert_user_role", "user or role does not exist"));
        }
        let exists = state
            .user_roles
            .iter()
            .any(|e| e.is_active && e.user_id == edge.user_id && e.role_id == edge.role_id);
        if exists {
            return Err(StoreError::duplicate(
                "insert_user_role",
                format!("user {} already holds role {}", edge.user_id, edge.role_id),
            ));
        }
        state.user_roles.push(edge.clone());
        Ok(())
    }

    async fn deactivate_user_role(&self, user_id: UserId, role_id: RoleId) -> StoreResult<bool> {
        let mut state = self.write("deactivate_user_role")?;
        let edge = state
            .user_roles
            .iter_mut()
            .find(|e| e.is_active && e.user_id == user_id && e.role_id == role_id);
        match edge {
            Some(edge) => {
                edge.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn active_roles_for_user(&self, user_id: UserId) -> StoreResult<Vec<Role>> {
        let state = self.read("active_roles_for_user")?;
        let mut roles: Vec<Role> = state
            .user_roles
            .iter()
            .filter(|e| e.is_active && e.user_id == user_id)
            .filter_map(|e| state.roles.get(&e.role_id).cloned())
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }
}

#[async_trait]
impl AgencyStore for InMemoryStore {
    async fn insert_agency(&self, agency: &Agency) -> StoreResult<()> {
        let mut state = self.write("insert_agency")?;
        put(&mut state.agencies, agency);
        Ok(())
    }

    async fn agency_by_id(&self, id: AgencyId) -> StoreResult<Option<Agency>> {
        Ok(self.read("agency_by_id")?.agencies.get(&id).cloned())
    }

    async fn list_active_agencies(&self) -> StoreResult<Vec<Agency>> {
        let state = self.read("list_active_agencies")?;
        let mut agencies: Vec<Agency> = state
            .agencies
            .values()
            .filter(|a| a.is_active())
            .cloned()
            .collect();
        agencies.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(agencies)
    }

    async fn delete_agency(&self, id: AgencyId) -> StoreResult<bool> {
        let mut state = self.write("delete_agency")?;
        if !state.agencies.contains_key(&id) {
            return Ok(false);
        }
        let has_users = state.agency_users.iter().any(|e| e.agency_id == id);
        let has_cases = state.agency_cases.values().any(|e| e.agency_id == id);
        if has_users || has_cases {
            return Err(StoreError::conflict(
                "delete_agency",
                format!("agency {id} still has user or case mappings"),
            ));
        }
        state.agencies.remove(&id);
        Ok(true)
    }

    async fn insert_agency_user(&self, edge: &AgencyUserMap) -> StoreResult<()> {
        let mut state = self.write("insert_agency_user")?;
        if !state.agencies.contains_key(&edge.agency_id) || !state.users.contains_key(&edge.user_id) {
            return Err(StoreError::conflict("insert_agency_user", "agency or user does not exist"));
        }
        if state
            .agency_users
            .iter()
            .any(|e| e.is_active && e.user_id == edge.user_id)
        {
            return Err(StoreError::duplicate(
                "insert_agency_user",
                format!("user {} already belongs to an agency", edge.user_id),
            ));
        }
        state.agency_users.push(edge.clone());
        Ok(())
    }

    async fn active_agency_for_user(&self, user_id: UserId) -> StoreResult<Option<AgencyUserMap>> {
        let state = self.read("active_agency_for_user")?;
        Ok(state
            .agency_users
            .iter()
            .find(|e| e.is_active && e.user_id == user_id)
            .cloned())
    }

    async fn agency_members(&self, agency_id: AgencyId) -> StoreResult<Vec<AgencyMember>> {
        let state = self.read("agency_members")?;
        let mut members: Vec<AgencyMember> = state
            .agency_users
            .iter()
            .filter(|e| e.is_active && e.agency_id == agency_id)
            .filter_map(|e| {
                state.users.get(&e.user_id).map(|user| AgencyMember {
                    mapping: e.clone(),
                    user: user.clone(),
                })
            })
            .collect();
        members.sort_by(|a, b| a.user.username.cmp(&b.user.username));
        Ok(members)
    }

    async fn unassigned_users(&self) -> StoreResult<Vec<User>> {
        let state = self.read("unassigned_users")?;
        let mapped: HashSet<UserId> = state
            .agency_users
            .iter()
            .filter(|e| e.is_active)
            .map(|e| e.user_id)
            .collect();
        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|u| u.is_active && !mapped.contains(&u.id))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }
}

#[async_trait]
impl CaseStore for InMemoryStore {
    async fn insert_cases(&self, cases: &[Case]) -> StoreResult<()> {
        let mut state = self.write("insert_cases")?;
        if let Some(dup) = cases.iter().find(|c| state.cases.contains_key(&c.id)) {
            return Err(StoreError::duplicate("insert_cases", format!("case {} already exists", dup.id)));
        }
        for case in cases {
            put(&mut state.cases, case);
        }
        Ok(())
    }

    async fn case_by_id(&self, id: CaseId) -> StoreResult<Option<Case>> {
        Ok(self.read("case_by_id")?.cases.get(&id).cloned())
    }

    async fn unassigned_cases(&self) -> StoreResult<Vec<Case>> {
        let state = self.read("unassigned_cases")?;
        Ok(sorted_cases(
            state
                .cases
                .values()
                .filter(|c| !state.agency_cases.contains_key(&c.id)),
        ))
    }
}

#[async_trait]
impl AssignmentStore for InMemoryStore {
    async fn assign_cases_to_agency(
        &self,
        agency_id: AgencyId,
        case_ids: &[CaseId],
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Case>> {
        const OP: &str = "assign_cases_to_agency";
        let mut state = self.write(OP)?;

        if !state.agencies.contains_key(&agency_id) {
            return Err(StoreError::not_found(OP, format!("agency {agency_id}")));
        }

        // Validate the whole batch before touching anything.
        let mut seen = HashSet::new();
        for id in case_ids {
            if !seen.insert(*id) {
                return Err(StoreError::duplicate(OP, format!("case {id} repeated in batch")));
            }
            let case = state
                .cases
                .get(id)
                .ok_or_else(|| StoreError::not_found(OP, format!("case {id}")))?;
            if state.agency_cases.contains_key(id) {
                return Err(StoreError::duplicate(OP, format!("case {id} is already assigned")));
            }
            if !case.status.can_transition_to(CaseStatus::Assigned) {
                return Err(StoreError::conflict(
                    OP,
                    format!("case {id} is {} and cannot be assigned", case.status),
                ));
            }
        }

        let mut assigned = Vec::with_capacity(case_ids.len());
        for id in case_ids {
            state.agency_cases.insert(
                *id,
                AgencyCaseMap {
                    agency_id,
                    case_id: *id,
                    assigned_at: now,
                },
            );
            if let Some(case) = state.cases.get_mut(id) {
                case.status = CaseStatus::Assigned;
                case.updated_at = now;
                assigned.push(case.clone());
            }
        }
        Ok(assigned)
    }

    async fn agency_for_case(&self, case_id: CaseId) -> StoreResult<Option<AgencyCaseMap>> {
        Ok(self.read("agency_for_case")?.agency_cases.get(&case_id).cloned())
    }

    async fn cases_for_agency(&self, agency_id: AgencyId) -> StoreResult<Vec<Case>> {
        let state = self.read("cases_for_agency")?;
        Ok(sorted_cases(
            state
                .agency_cases
                .values()
                .filter(|e| e.agency_id == agency_id)
                .filter_map(|e| state.cases.get(&e.case_id)),
        ))
    }

    async fn insert_case_user(&self, edge: &CaseUserMap) -> StoreResult<()> {
        let mut state = self.write("insert_case_user")?;
        if !state.cases.contains_key(&edge.case_id) || !state.users.contains_key(&edge.user_id) {
            return Err(StoreError::conflict("insert_case_user", "case or user does not exist"));
        }
        if state.case_users.iter().any(|e| e.case_id == edge.case_id) {
            return Err(StoreError::duplicate(
                "insert_case_user",
                format!("case {} already has an agent", edge.case_id),
            ));
        }
        state.case_users.push(edge.clone());
        Ok(())
    }

    async fn cases_for_user(&self, user_id: UserId) -> StoreResult<Vec<Case>> {
        let state = self.read("cases_for_user")?;
        Ok(sorted_cases(
            state
                .case_users
                .iter()
                .filter(|e| e.user_id == user_id)
                .filter_map(|e| state.cases.get(&e.case_id)),
        ))
    }

    async fn assigned_agent(&self, case_id: CaseId) -> StoreResult<Option<User>> {
        let state = self.read("assigned_agent")?;
        Ok(state
            .case_users
            .iter()
            .filter(|e| e.case_id == case_id)
            .min_by_key(|e| e.assigned_at)
            .and_then(|e| state.users.get(&e.user_id).cloned()))
    }
}

#[async_trait]
impl TrailStore for InMemoryStore {
    async fn insert_trail(&self, trail: &Trail) -> StoreResult<()> {
        let mut state = self.write("insert_trail")?;
        if !state.cases.contains_key(&trail.case_id) {
            return Err(StoreError::conflict("insert_trail", format!("case {} does not exist", trail.case_id)));
        }
        state.trails.push(trail.clone());
        Ok(())
    }

    async fn trails_for_case(&self, case_id: CaseId) -> StoreResult<Vec<Trail>> {
        let state = self.read("trails_for_case")?;
        let mut trails: Vec<Trail> = state
            .trails
            .iter()
            .filter(|t| t.case_id == case_id)
            .cloned()
            .collect();
        trails.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(trails)
    }
}
