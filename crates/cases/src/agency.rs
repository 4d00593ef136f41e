use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use loanops_core::{AgencyId, CaseId, DomainError, DomainResult, Entity, UserId};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgencyStatus {
    #[default]
    Active,
    Inactive,
}

impl AgencyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
        }
    }
}

impl core::str::FromStr for AgencyStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            other => Err(DomainError::validation(format!("unknown agency status '{other}'"))),
        }
    }
}

/// Free-form contact details (address, phone, email, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgencyDetails(pub BTreeMap<String, String>);

/// A collection organisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agency {
    pub id: AgencyId,
    pub name: String,
    pub status: AgencyStatus,
    pub details: AgencyDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agency {
    pub fn new(
        name: &str,
        status: AgencyStatus,
        details: AgencyDetails,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("agency name must not be blank"));
        }
        Ok(Self {
            id: AgencyId::new(),
            name: name.to_string(),
            status,
            details,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == AgencyStatus::Active
    }
}

impl Entity for Agency {
    type Id = AgencyId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Role of a user inside an agency (independent of RBAC roles).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgencyRole {
    Manager,
    Collector,
}

impl AgencyRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manager => "manager",
            Self::Collector => "collector",
        }
    }
}

impl core::str::FromStr for AgencyRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "manager" => Ok(Self::Manager),
            "collector" => Ok(Self::Collector),
            other => Err(DomainError::validation(format!("unknown agency role '{other}'"))),
        }
    }
}

/// (agency, user) membership edge. A user has at most one active edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgencyUserMap {
    pub agency_id: AgencyId,
    pub user_id: UserId,
    pub agency_role: AgencyRole,
    pub manager_id: Option<UserId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgencyUserMap {
    pub fn new(
        agency_id: AgencyId,
        user_id: UserId,
        agency_role: AgencyRole,
        manager_id: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if manager_id == Some(user_id) {
            return Err(DomainError::validation("a user cannot be their own manager"));
        }
        Ok(Self {
            agency_id,
            user_id,
            agency_role,
            manager_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }
}

/// (agency, case) edge. At most one per case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgencyCaseMap {
    pub agency_id: AgencyId,
    pub case_id: CaseId,
    pub assigned_at: DateTime<Utc>,
}

/// (case, agent) edge, scoped within the case's agency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseUserMap {
    pub case_id: CaseId,
    pub user_id: UserId,
    pub assigned_at: DateTime<Utc>,
}
