use core::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use loanops_core::{CaseId, DomainError, DomainResult, Entity};

/// Non-negative amount in minor currency units (1/100).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);
    /// Largest amount a signed 64-bit column can hold.
    pub const MAX: Money = Money(i64::MAX as u64);

    pub const fn from_minor(units: u64) -> Self {
        Self(units)
    }

    pub const fn minor_units(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Money {
    type Err = DomainError;

    /// Accepts `123`, `123.4` and `123.45`. Signs, exponents, more than two
    /// fractional digits and amounts above [`Money::MAX`] are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || DomainError::validation(format!("invalid amount '{s}'"));

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: u64 = whole.parse().map_err(|_| invalid())?;
        let frac: u64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u64>().map_err(|_| invalid())? * 10,
            _ => frac.parse().map_err(|_| invalid())?,
        };

        whole
            .checked_mul(100)
            .and_then(|v| v.checked_add(frac))
            .filter(|v| *v <= Self::MAX.0)
            .map(Money)
            .ok_or_else(invalid)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    Pending,
    Assigned,
    InProgress,
    Closed,
}

impl CaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Assigned => "ASSIGNED",
            Self::InProgress => "IN_PROGRESS",
            Self::Closed => "CLOSED",
        }
    }

    /// Only `PENDING → ASSIGNED` (agency assignment) is defined.
    pub fn can_transition_to(self, next: CaseStatus) -> bool {
        matches!((self, next), (Self::Pending, Self::Assigned))
    }
}

impl core::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "PENDING" => Ok(Self::Pending),
            "ASSIGNED" => Ok(Self::Assigned),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "CLOSED" => Ok(Self::Closed),
            other => Err(DomainError::validation(format!("unknown case status '{other}'"))),
        }
    }
}

/// A delinquent loan account under collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    pub id: CaseId,
    pub loan_id: String,
    pub external_customer_id: String,
    pub emi_amount: Money,
    pub principal_outstanding: Money,
    pub interest_outstanding: Money,
    pub status: CaseStatus,
    pub emi_date: NaiveDate,
    pub dpd_bucket: String,
    pub dpd: u32,
    pub disbursal_date: NaiveDate,
    pub insurance_active: bool,
    pub loan_description: String,
    pub emis_paid_till_date: u32,
    pub emis_pending: u32,
    pub bounce_charges: Money,
    pub nach_presentation_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Case {
    /// Apply the agency-assignment transition.
    pub fn mark_assigned(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.status.can_transition_to(CaseStatus::Assigned) {
            return Err(DomainError::invariant(format!(
                "case {} cannot move from {} to ASSIGNED",
                self.id, self.status
            )));
        }
        self.status = CaseStatus::Assigned;
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Case {
    type Id = CaseId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn money_parses_decimal_forms() {
        assert_eq!("12".parse::<Money>().unwrap().minor_units(), 1200);
        assert_eq!("12.5".parse::<Money>().unwrap().minor_units(), 1250);
        assert_eq!(" 12.05 ".parse::<Money>().unwrap().minor_units(), 1205);
        assert_eq!("0.00".parse::<Money>().unwrap(), Money::ZERO);
    }

    #[test]
    fn money_rejects_negative_and_malformed() {
        for bad in ["-1", "1.234", "", ".5", "1e3", "abc", "1.-2", "+3"] {
            assert!(bad.parse::<Money>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn money_is_capped_at_signed_64_bit() {
        let max = Money::MAX.to_string();
        assert_eq!(max.parse::<Money>().unwrap(), Money::MAX);
        assert!("99999999999999999".parse::<Money>().is_err());
        assert!("92233720368547758.08".parse::<Money>().is_err());
    }

    #[test]
    fn only_pending_to_assigned_is_allowed() {
        use CaseStatus::*;
        assert!(Pending.can_transition_to(Assigned));
        for (from, to) in [(Assigned, Assigned), (Assigned, Pending), (Pending, Closed), (InProgress, Assigned)] {
            assert!(!from.can_transition_to(to));
        }
    }

    #[test]
    fn status_strings_round_trip() {
        for s in [CaseStatus::Pending, CaseStatus::Assigned, CaseStatus::InProgress, CaseStatus::Closed] {
            assert_eq!(s.as_str().parse::<CaseStatus>().unwrap(), s);
        }
    }

    proptest! {
        #[test]
        fn money_display_parses_back(units in 0u64..10_000_000_000) {
            let m = Money::from_minor(units);
            prop_assert_eq!(m.to_string().parse::<Money>().unwrap(), m);
        }

        #[test]
        fn money_never_accepts_a_sign(units in 1u64..1_000_000) {
            let negative = format!("-{}", Money::from_minor(units));
            prop_assert!(negative.parse::<Money>().is_err());
        }
    }
}
