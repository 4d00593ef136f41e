use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use loanops_core::{CaseId, DomainError, DomainResult, Entity, TrailId, UserId};

pub const MAX_REMARKS_LENGTH: usize = 2000;

/// One logged contact attempt against a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trail {
    pub id: TrailId,
    pub case_id: CaseId,
    pub user_id: UserId,
    pub contacted: bool,
    /// Date the borrower promised to pay, if any.
    pub payment_date: Option<NaiveDate>,
    pub remarks: String,
    pub created_at: DateTime<Utc>,
}

impl Trail {
    pub fn new(
        case_id: CaseId,
        user_id: UserId,
        contacted: bool,
        payment_date: Option<NaiveDate>,
        remarks: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let remarks = remarks.trim();
        if remarks.chars().count() > MAX_REMARKS_LENGTH {
            return Err(DomainError::validation(format!(
                "remarks must be at most {MAX_REMARKS_LENGTH} characters"
            )));
        }
        Ok(Self {
            id: TrailId::new(),
            case_id,
            user_id,
            contacted,
            payment_date,
            remarks: remarks.to_string(),
            created_at: now,
        })
    }
}

impl Entity for Trail {
    type Id = TrailId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Payment URL for a case: `{base}?caseID={id}`.
pub fn payment_link(base: &str, case_id: CaseId) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{}{sep}caseID={case_id}", base.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_appends_case_id() {
        let id = CaseId::new();
        assert_eq!(
            payment_link("https://payment.example.com/pay", id),
            format!("https://payment.example.com/pay?caseID={id}")
        );
        assert_eq!(
            payment_link("https://pay.example.com/p?src=app", id),
            format!("https://pay.example.com/p?src=app&caseID={id}")
        );
    }

    #[test]
    fn overlong_remarks_are_rejected() {
        let long = "x".repeat(MAX_REMARKS_LENGTH + 1);
        assert!(Trail::new(CaseId::new(), UserId::new(), true, None, &long, Utc::now()).is_err());
    }
}
