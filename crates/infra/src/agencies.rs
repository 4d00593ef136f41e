use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use loanops_auth::{permissions as p, RequestContext, User};
use loanops_cases::{Agency, AgencyDetails, AgencyRole, AgencyStatus, AgencyUserMap};
use loanops_core::{AgencyId, UserId};

use crate::error::{ServiceError, ServiceResult};
use crate::gate::require;
use crate::store::{AgencyMember, Store};

/// Agency CRUD and agency ↔ user membership.
#[derive(Clone)]
pub struct AgencyDirectory {
    store: Arc<dyn Store>,
}

impl AgencyDirectory {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create_agency(
        &self,
        ctx: &RequestContext,
        name: &str,
        status: Option<AgencyStatus>,
        details: AgencyDetails,
        now: DateTime<Utc>,
    ) -> ServiceResult<Agency> {
        require(ctx, &p::CREATE_AGENCY)?;
        let agency = Agency::new(name, status.unwrap_or_default(), details, now)?;
        self.store.insert_agency(&agency).await?;
        info!(agency_id = %agency.id, by = %ctx.user_id(), "agency created");
        Ok(agency)
    }

    /// Active agencies only.
    pub async fn list_agencies(&self, ctx: &RequestContext) -> ServiceResult<Vec<Agency>> {
        require(ctx, &p::VIEW_AGENCIES)?;
        Ok(self.store.list_active_agencies().await?)
    }

    /// Refused while users or cases are still mapped to the agency.
    pub async fn delete_agency(&self, ctx: &RequestContext, id: AgencyId) -> ServiceResult<()> {
        require(ctx, &p::DELETE_AGENCY)?;
        if !self.store.delete_agency(id).await? {
            return Err(ServiceError::not_found(format!("agency {id}")));
        }
        info!(agency_id = %id, by = %ctx.user_id(), "agency deleted");
        Ok(())
    }

    pub async fn assign_user_to_agency(
        &self,
        ctx: &RequestContext,
        agency_id: AgencyId,
        user_id: UserId,
        agency_role: AgencyRole,
        manager_id: Option<UserId>,
        now: DateTime<Utc>,
    ) -> ServiceResult<AgencyUserMap> {
        require(ctx, &p::ASSIGN_USER_TO_AGENCY)?;

        if self.store.agency_by_id(agency_id).await?.is_none() {
            return Err(ServiceError::not_found(format!("agency {agency_id}")));
        }
        if self.store.user_by_id(user_id).await?.is_none() {
            return Err(ServiceError::not_found(format!("user {user_id}")));
        }
        if self.store.active_agency_for_user(user_id).await?.is_some() {
            return Err(ServiceError::duplicate(format!(
                "user {user_id} already belongs to an agency"
            )));
        }

        let edge = AgencyUserMap::new(agency_id, user_id, agency_role, manager_id, now)?;

        if let Some(manager_id) = manager_id {
            let manager_agency = self.store.active_agency_for_user(manager_id).await?;
            if manager_agency.map(|m| m.agency_id) != Some(agency_id) {
                return Err(ServiceError::conflict(format!(
                    "manager {manager_id} is not a member of agency {agency_id}"
                )));
            }
        }

        self.store.insert_agency_user(&edge).await?;
        info!(agency_id = %agency_id, user_id = %user_id, role = agency_role.as_str(), "user joined agency");
        Ok(edge)
    }

    /// Callers without `view_agencies` only see their own agency.
    pub async fn agency_users(&self, ctx: &RequestContext, agency_id: AgencyId) -> ServiceResult<Vec<AgencyMember>> {
        require(ctx, &p::VIEW_AGENCY_USERS)?;
        if !ctx.has(&p::VIEW_AGENCIES) {
            let own = self.store.active_agency_for_user(ctx.user_id()).await?;
            if own.map(|m| m.agency_id) != Some(agency_id) {
                return Err(ServiceError::not_found(format!("agency {agency_id}")));
            }
        }
        if self.store.agency_by_id(agency_id).await?.is_none() {
            return Err(ServiceError::not_found(format!("agency {agency_id}")));
        }
        Ok(self.store.agency_members(agency_id).await?)
    }

    pub async fn my_agency_users(&self, ctx: &RequestContext) -> ServiceResult<Vec<AgencyMember>> {
        require(ctx, &p::VIEW_AGENCY_USERS)?;
        let own = self
            .store
            .active_agency_for_user(ctx.user_id())
            .await?
            .ok_or_else(|| ServiceError::not_found("caller has no agency"))?;
        Ok(self.store.agency_members(own.agency_id).await?)
    }

    pub async fn unassigned_users(&self, ctx: &RequestContext) -> ServiceResult<Vec<User>> {
        require(ctx, &p::VIEW_UNASSIGNED_USERS)?;
        Ok(self.store.unassigned_users().await?)
    }
}
