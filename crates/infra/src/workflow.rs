//! Case intake and the two assignment hops: case → agency, case → agent.
//!
//! Read operations share one visibility rule. A caller sees a case when it
//! holds `view_all_cases`, when the case is assigned to it, or when the case
//! belongs to the caller's active agency and it holds `view_agency_cases`.
//! Anything else is reported as `NotFound`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use loanops_auth::{permissions as p, RequestContext, User};
use loanops_cases::{parse_records, read_csv, Case, CaseUserMap, IngestReport};
use loanops_core::{AgencyId, CaseId, UserId};

use crate::error::{ServiceError, ServiceResult};
use crate::gate::require;
use crate::store::Store;

/// A case with whoever currently works it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseDetails {
    pub case: Case,
    pub assigned_agent: Option<User>,
}

/// Load a case the caller is allowed to see.
pub(crate) async fn load_visible_case(
    store: &dyn Store,
    ctx: &RequestContext,
    case_id: CaseId,
) -> ServiceResult<Case> {
    let hidden = || ServiceError::not_found(format!("case {case_id}"));
    let case = store.case_by_id(case_id).await?.ok_or_else(hidden)?;

    if ctx.has(&p::VIEW_ALL_CASES) {
        return Ok(case);
    }
    if let Some(agent) = store.assigned_agent(case_id).await? {
        if agent.id == ctx.user_id() {
            return Ok(case);
        }
    }
    if ctx.has(&p::VIEW_AGENCY_CASES) {
        let own = caller_agency(store, ctx).await?;
        let owner = store.agency_for_case(case_id).await?.map(|m| m.agency_id);
        if own.is_some() && own == owner {
            return Ok(case);
        }
    }
    Err(hidden())
}

async fn caller_agency(store: &dyn Store, ctx: &RequestContext) -> ServiceResult<Option<AgencyId>> {
    Ok(store
        .active_agency_for_user(ctx.user_id())
        .await?
        .map(|m| m.agency_id))
}

#[derive(Clone)]
pub struct CaseWorkflow {
    store: Arc<dyn Store>,
}

impl CaseWorkflow {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Parse header + data rows and store every well-formed case.
    #[instrument(skip(self, ctx, rows), fields(row_count = rows.len()), err)]
    pub async fn ingest_cases<R, S>(
        &self,
        ctx: &RequestContext,
        rows: &[R],
        now: DateTime<Utc>,
    ) -> ServiceResult<IngestReport>
    where
        R: AsRef<[S]> + Sync,
        S: AsRef<str> + Sync,
    {
        require(ctx, &p::UPLOAD_CASES)?;
        let report = parse_records(rows, now)?;
        self.store_report(ctx, report).await
    }

    /// Same as [`Self::ingest_cases`] for a raw CSV body.
    pub async fn ingest_csv(&self, ctx: &RequestContext, body: &[u8], now: DateTime<Utc>) -> ServiceResult<IngestReport> {
        require(ctx, &p::UPLOAD_CASES)?;
        let rows = read_csv(body)?;
        let report = parse_records(&rows, now)?;
        self.store_report(ctx, report).await
    }

    async fn store_report(&self, ctx: &RequestContext, report: IngestReport) -> ServiceResult<IngestReport> {
        if !report.cases.is_empty() {
            self.store.insert_cases(&report.cases).await?;
        }
        if !report.rejected.is_empty() {
            warn!(rejected = report.rejected.len(), "ingest skipped malformed rows");
        }
        info!(inserted = report.cases.len(), by = %ctx.user_id(), "cases ingested");
        Ok(report)
    }

    pub async fn unassigned_cases(&self, ctx: &RequestContext) -> ServiceResult<Vec<Case>> {
        require(ctx, &p::VIEW_UNASSIGNED_CASES)?;
        Ok(self.store.unassigned_cases().await?)
    }

    /// All-or-nothing: on any error no case is mapped and no status changes.
    #[instrument(skip(self, ctx, case_ids), fields(batch = case_ids.len()), err)]
    pub async fn assign_cases_to_agency(
        &self,
        ctx: &RequestContext,
        agency_id: AgencyId,
        case_ids: &[CaseId],
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<Case>> {
        require(ctx, &p::ASSIGN_CASES)?;
        if case_ids.is_empty() {
            return Err(ServiceError::validation("no cases to assign"));
        }

        match self.store.assign_cases_to_agency(agency_id, case_ids, now).await {
            Ok(cases) => {
                info!(agency_id = %agency_id, assigned = cases.len(), "cases assigned to agency");
                Ok(cases)
            }
            Err(e) => {
                warn!(agency_id = %agency_id, error = %e, "agency assignment rolled back");
                Err(e.into())
            }
        }
    }

    pub async fn assign_case_to_agent(
        &self,
        ctx: &RequestContext,
        case_id: CaseId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> ServiceResult<CaseUserMap> {
        require(ctx, &p::ASSIGN_CASE)?;

        if self.store.case_by_id(case_id).await?.is_none() {
            return Err(ServiceError::not_found(format!("case {case_id}")));
        }
        if self.store.user_by_id(user_id).await?.filter(|u| u.is_active).is_none() {
            return Err(ServiceError::not_found(format!("user {user_id}")));
        }

        let case_agency = self
            .store
            .agency_for_case(case_id)
            .await?
            .map(|m| m.agency_id)
            .ok_or_else(|| ServiceError::conflict(format!("case {case_id} is not assigned to an agency")))?;

        if !ctx.has(&p::VIEW_ALL_CASES) && caller_agency(self.store.as_ref(), ctx).await? != Some(case_agency) {
            return Err(ServiceError::not_found(format!("case {case_id}")));
        }

        let agent_agency = self
            .store
            .active_agency_for_user(user_id)
            .await?
            .map(|m| m.agency_id);
        if agent_agency != Some(case_agency) {
            warn!(case_id = %case_id, user_id = %user_id, "cross-agency agent assignment refused");
            return Err(ServiceError::conflict(format!(
                "user {user_id} is not a member of agency {case_agency}"
            )));
        }

        let edge = CaseUserMap {
            case_id,
            user_id,
            assigned_at: now,
        };
        self.store.insert_case_user(&edge).await?;
        info!(case_id = %case_id, user_id = %user_id, by = %ctx.user_id(), "case assigned to agent");
        Ok(edge)
    }

    /// Callers without `view_all_cases` only see their own agency.
    pub async fn cases_for_agency(&self, ctx: &RequestContext, agency_id: AgencyId) -> ServiceResult<Vec<Case>> {
        require(ctx, &p::VIEW_AGENCY_CASES)?;
        if !ctx.has(&p::VIEW_ALL_CASES) && caller_agency(self.store.as_ref(), ctx).await? != Some(agency_id) {
            return Err(ServiceError::not_found(format!("agency {agency_id}")));
        }
        if self.store.agency_by_id(agency_id).await?.is_none() {
            return Err(ServiceError::not_found(format!("agency {agency_id}")));
        }
        Ok(self.store.cases_for_agency(agency_id).await?)
    }

    /// Cases assigned to `user_id`. Visible to the agent itself, to holders of
    /// `view_all_cases`, and to agency viewers of the same agency.
    pub async fn cases_for_agent(&self, ctx: &RequestContext, user_id: UserId) -> ServiceResult<Vec<Case>> {
        require(ctx, &p::VIEW_CASES)?;
        if user_id != ctx.user_id() && !ctx.has(&p::VIEW_ALL_CASES) {
            let same_agency = ctx.has(&p::VIEW_AGENCY_CASES) && {
                let own = caller_agency(self.store.as_ref(), ctx).await?;
                let theirs = self.store.active_agency_for_user(user_id).await?.map(|m| m.agency_id);
                own.is_some() && own == theirs
            };
            if !same_agency {
                return Err(ServiceError::not_found(format!("user {user_id}")));
            }
        }
        Ok(self.store.cases_for_user(user_id).await?)
    }

    pub async fn my_cases(&self, ctx: &RequestContext) -> ServiceResult<Vec<Case>> {
        self.cases_for_agent(ctx, ctx.user_id()).await
    }

    pub async fn assigned_agent_for_case(&self, ctx: &RequestContext, case_id: CaseId) -> ServiceResult<Option<User>> {
        require(ctx, &p::VIEW_CASES)?;
        load_visible_case(self.store.as_ref(), ctx, case_id).await?;
        Ok(self.store.assigned_agent(case_id).await?)
    }

    pub async fn case_details(&self, ctx: &RequestContext, case_id: CaseId) -> ServiceResult<CaseDetails> {
        require(ctx, &p::VIEW_CASES)?;
        let case = load_visible_case(self.store.as_ref(), ctx, case_id).await?;
        let assigned_agent = self.store.assigned_agent(case_id).await?;
        Ok(CaseDetails { case, assigned_agent })
    }

    pub async fn my_agency_cases(&self, ctx: &RequestContext) -> ServiceResult<Vec<CaseDetails>> {
        require(ctx, &p::VIEW_AGENCY_CASES)?;
        let agency_id = caller_agency(self.store.as_ref(), ctx)
            .await?
            .ok_or_else(|| ServiceError::not_found("caller has no agency"))?;

        let mut out = Vec::new();
        for case in self.store.cases_for_agency(agency_id).await? {
            let assigned_agent = self.store.assigned_agent(case.id).await?;
            out.push(CaseDetails { case, assigned_agent });
        }
        Ok(out)
    }
}
