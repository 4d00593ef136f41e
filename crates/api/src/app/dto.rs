use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use loanops_cases::{AgencyDetails, AgencyRole, AgencyStatus, RowError};
use loanops_core::{AgencyId, CaseId, RoleId, UserId};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub role_id: RoleId,
}

#[derive(Debug, Deserialize)]
pub struct CreateAgencyRequest {
    pub name: String,
    pub status: Option<AgencyStatus>,
    #[serde(default)]
    pub details: AgencyDetails,
}

#[derive(Debug, Deserialize)]
pub struct AssignUserToAgencyRequest {
    pub agency_id: AgencyId,
    pub user_id: UserId,
    pub agency_role: AgencyRole,
    pub manager_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct AssignCasesRequest {
    pub agency_id: AgencyId,
    pub case_ids: Vec<CaseId>,
}

#[derive(Debug, Deserialize)]
pub struct AssignAgentRequest {
    pub case_id: CaseId,
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct AddTrailRequest {
    pub contacted: bool,
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub remarks: String,
}

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    pub permission: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct ItemsResponse<T> {
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for ItemsResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub inserted: usize,
    pub case_ids: Vec<CaseId>,
    pub rejected: Vec<RowError>,
}

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse<'a> {
    pub user: &'a loanops_auth::Identity,
    pub roles: Vec<&'a str>,
}
