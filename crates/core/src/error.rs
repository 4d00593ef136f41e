//! Errors raised by domain constructors and parsers.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic failures detected without touching storage.
///
/// The service layer folds these into its own error: `Validation` and
/// `InvalidId` become client errors, `InvariantViolation` becomes a conflict.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Rejected input: a blank name, an unknown status, a self-managed member.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A state transition the record does not allow (e.g. assigning a closed case).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_their_kind() {
        assert_eq!(
            DomainError::validation("agency name must not be blank").to_string(),
            "validation failed: agency name must not be blank"
        );
        assert_eq!(
            DomainError::invalid_id("CaseId: bad").to_string(),
            "invalid identifier: CaseId: bad"
        );
        assert!(matches!(DomainError::invariant("closed"), DomainError::InvariantViolation(_)));
    }
}
