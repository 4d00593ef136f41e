//! Shared fixture for service tests: every service wired to one
//! `InMemoryStore`, built-in roles seeded, cheap argon2 parameters.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use loanops_auth::{Argon2Hasher, Hs256TokenCodec, RequestContext, RoleCatalog, User, UserRoleMap};
use loanops_cases::{parse_records, Agency, AgencyDetails, AgencyStatus, Case};

use crate::agencies::AgencyDirectory;
use crate::authn::Authenticator;
use crate::gate::AuthorizationGate;
use crate::roles::RoleAdmin;
use crate::store::{InMemoryStore, Store};
use crate::trails::TrailLog;
use crate::users::UserAdmin;
use crate::workflow::CaseWorkflow;

pub const PASSWORD: &str = "correct-horse-battery";
pub const PAYMENT_LINK_BASE: &str = "https://payment.example.com/pay";

const ADMIN_USERNAME: &str = "root";

pub fn header() -> Vec<String> {
    [
        "loan_id",
        "external_customer_id",
        "emi_amount",
        "principal_outstanding",
        "interest_outstanding",
        "case_status",
        "emi_date",
        "dpd_bucket",
        "dpd",
        "disbursal_date",
        "insurance_active",
        "loan_description",
        "emis_paid_till_date",
        "emis_pending",
        "bounce_charges",
        "nach_presentation_status",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

pub fn case_row(loan_id: &str) -> Vec<String> {
    [
        loan_id,
        "CUST-77",
        "12500.50",
        "250000",
        "1830.25",
        "OPEN",
        "2024-03-05",
        "31-60",
        "45",
        "2022-01-15",
        "yes",
        "Two-wheeler loan",
        "18",
        "6",
        "500",
        "BOUNCED",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

pub struct Fixture {
    pub store: Arc<dyn Store>,
    pub gate: AuthorizationGate,
    pub authn: Authenticator,
    pub users: UserAdmin,
    pub roles: RoleAdmin,
    pub agencies: AgencyDirectory,
    pub workflow: CaseWorkflow,
    pub trails: TrailLog,
    pub now: DateTime<Utc>,
}

impl Fixture {
    pub async fn new() -> Self {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let catalog = Arc::new(RoleCatalog::builtin());
        let hasher = Arc::new(Argon2Hasher::with_cost(1024, 1, 1).unwrap());
        let tokens = Arc::new(Hs256TokenCodec::new(b"test-secret").unwrap());
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();

        let authn = Authenticator::new(store.clone(), hasher, tokens.clone());
        let roles = RoleAdmin::new(store.clone(), catalog.clone());
        roles.seed_builtin_roles(now).await.unwrap();

        Self {
            gate: AuthorizationGate::new(store.clone(), tokens, catalog),
            users: UserAdmin::new(store.clone(), authn.clone()),
            agencies: AgencyDirectory::new(store.clone()),
            workflow: CaseWorkflow::new(store.clone()),
            trails: TrailLog::new(store.clone(), PAYMENT_LINK_BASE),
            authn,
            roles,
            store,
            now,
        }
    }

    /// Register `username` with [`PASSWORD`] and grant the named roles.
    pub async fn user_with_roles(&self, username: &str, roles: &[&str]) -> User {
        let user = self
            .authn
            .register_user(username, PASSWORD, None, self.now)
            .await
            .unwrap();
        for name in roles {
            let role = self
                .store
                .role_by_name(name)
                .await
                .unwrap()
                .unwrap_or_else(|| panic!("role {name} not seeded"));
            self.store
                .insert_user_role(&UserRoleMap::active(user.id, role.id, self.now))
                .await
                .unwrap();
        }
        user
    }

    pub async fn token_for(&self, username: &str) -> String {
        self.authn
            .authenticate(username, PASSWORD, self.now)
            .await
            .unwrap()
            .token
    }

    /// Context for an existing user, resolved through the gate.
    pub async fn ctx_for(&self, username: &str) -> RequestContext {
        let token = self.token_for(username).await;
        self.gate.begin_request(&token, self.now).await.unwrap()
    }

    pub async fn ctx_with_roles(&self, username: &str, roles: &[&str]) -> RequestContext {
        self.user_with_roles(username, roles).await;
        self.ctx_for(username).await
    }

    pub async fn admin_ctx(&self) -> RequestContext {
        if self.store.user_by_username(ADMIN_USERNAME).await.unwrap().is_none() {
            self.user_with_roles(ADMIN_USERNAME, &["admin"]).await;
        }
        self.ctx_for(ADMIN_USERNAME).await
    }

    pub async fn agency(&self, name: &str) -> Agency {
        let agency = Agency::new(name, AgencyStatus::Active, AgencyDetails::default(), self.now).unwrap();
        self.store.insert_agency(&agency).await.unwrap();
        agency
    }

    /// A stored `PENDING` case built from [`case_row`].
    pub async fn case(&self, loan_id: &str) -> Case {
        let mut report = parse_records(&[header(), case_row(loan_id)], self.now).unwrap();
        let case = report.cases.remove(0);
        self.store.insert_cases(std::slice::from_ref(&case)).await.unwrap();
        case
    }
}
