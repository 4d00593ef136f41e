use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use loanops_auth::{permissions as p, RequestContext};
use loanops_cases::{payment_link, Trail};
use loanops_core::CaseId;

use crate::error::{ServiceError, ServiceResult};
use crate::gate::require;
use crate::store::Store;
use crate::workflow::load_visible_case;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentLink {
    pub case_id: CaseId,
    pub url: String,
}

/// Contact trails recorded by agents, and payment links for borrowers.
#[derive(Clone)]
pub struct TrailLog {
    store: Arc<dyn Store>,
    payment_link_base: Arc<str>,
}

impl TrailLog {
    pub fn new(store: Arc<dyn Store>, payment_link_base: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            payment_link_base: payment_link_base.into(),
        }
    }

    /// Only the agent the case is assigned to may log against it.
    pub async fn add_trail(
        &self,
        ctx: &RequestContext,
        case_id: CaseId,
        contacted: bool,
        payment_date: Option<NaiveDate>,
        remarks: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<Trail> {
        require(ctx, &p::ADD_TRAIL)?;
        let agent = self.store.assigned_agent(case_id).await?;
        if agent.map(|u| u.id) != Some(ctx.user_id()) {
            return Err(ServiceError::not_found(format!("case {case_id}")));
        }

        let trail = Trail::new(case_id, ctx.user_id(), contacted, payment_date, remarks, now)?;
        self.store.insert_trail(&trail).await?;
        info!(case_id = %case_id, trail_id = %trail.id, contacted, "trail recorded");
        Ok(trail)
    }

    pub async fn trails_for_case(&self, ctx: &RequestContext, case_id: CaseId) -> ServiceResult<Vec<Trail>> {
        require(ctx, &p::VIEW_TRAILS)?;
        load_visible_case(self.store.as_ref(), ctx, case_id).await?;
        Ok(self.store.trails_for_case(case_id).await?)
    }

    pub async fn payment_link(&self, ctx: &RequestContext, case_id: CaseId) -> ServiceResult<PaymentLink> {
        require(ctx, &p::GENERATE_PAYMENT_LINK)?;
        load_visible_case(self.store.as_ref(), ctx, case_id).await?;
        Ok(PaymentLink {
            case_id,
            url: payment_link(&self.payment_link_base, case_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fixture, PAYMENT_LINK_BASE};
    use chrono::Duration;
    use loanops_cases::AgencyRole;

    /// Agency with a manager and an agent holding one assigned case.
    async fn worked_case(fx: &Fixture) -> CaseId {
        let admin = fx.admin_ctx().await;
        let agency = fx.agency("A").await;
        let boss = fx.user_with_roles("boss", &["manager"]).await;
        let agent = fx.user_with_roles("field", &["agent"]).await;
        for (u, role) in [(&boss, AgencyRole::Manager), (&agent, AgencyRole::Collector)] {
            fx.agencies
                .assign_user_to_agency(&admin, agency.id, u.id, role, None, fx.now)
                .await
                .unwrap();
        }
        let case = fx.case("LN-T").await;
        fx.workflow
            .assign_cases_to_agency(&admin, agency.id, &[case.id], fx.now)
            .await
            .unwrap();
        fx.workflow
            .assign_case_to_agent(&fx.ctx_for("boss").await, case.id, agent.id, fx.now)
            .await
            .unwrap();
        case.id
    }

    #[tokio::test]
    async fn assigned_agent_logs_trails_in_order() {
        let fx = Fixture::new().await;
        let case_id = worked_case(&fx).await;
        let agent = fx.ctx_for("field").await;

        let promised = NaiveDate::from_ymd_opt(2024, 4, 1);
        fx.trails
            .add_trail(&agent, case_id, false, None, "no answer", fx.now)
            .await
            .unwrap();
        fx.trails
            .add_trail(&agent, case_id, true, promised, "promised to pay", fx.now + Duration::hours(2))
            .await
            .unwrap();

        let trails = fx.trails.trails_for_case(&agent, case_id).await.unwrap();
        assert_eq!(trails.len(), 2);
        assert_eq!(trails[0].remarks, "no answer");
        assert_eq!(trails[1].payment_date, promised);

        let boss = fx.ctx_for("boss").await;
        assert_eq!(fx.trails.trails_for_case(&boss, case_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn other_agents_cannot_log_or_read() {
        let fx = Fixture::new().await;
        let case_id = worked_case(&fx).await;
        let stranger = fx.ctx_with_roles("stranger", &["agent"]).await;

        assert!(matches!(
            fx.trails.add_trail(&stranger, case_id, true, None, "hi", fx.now).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            fx.trails.trails_for_case(&stranger, case_id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            fx.trails.payment_link(&stranger, case_id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn payment_link_carries_case_id() {
        let fx = Fixture::new().await;
        let case_id = worked_case(&fx).await;
        let agent = fx.ctx_for("field").await;

        let link = fx.trails.payment_link(&agent, case_id).await.unwrap();
        assert_eq!(link.url, format!("{PAYMENT_LINK_BASE}?caseID={case_id}"));
    }
}
