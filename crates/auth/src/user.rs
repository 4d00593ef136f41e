use chrono::{DateTime, Utc};
use serde::Serialize;

use loanops_core::{DomainError, DomainResult, Entity, UserId};

/// Login identity.
///
/// Users are never hard-deleted; deactivation flips `is_active`, after which
/// both login and token resolution fail.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a new active user. `username` is trimmed and must not be blank.
    pub fn new(
        username: &str,
        password_hash: String,
        email: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let username = normalize_username(username)?;
        let email = email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());

        Ok(Self {
            id: UserId::new(),
            username,
            password_hash,
            email,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }
}

impl core::fmt::Debug for User {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("email", &self.email)
            .field("is_active", &self.is_active)
            .finish()
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

pub fn normalize_username(raw: &str) -> DomainResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("username must not be blank"));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_username_is_rejected() {
        let err = User::new("   ", "x".into(), None, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn debug_output_hides_digest() {
        let user = User::new(" alice ", "$argon2id$secret".into(), Some(" ".into()), Utc::now()).unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, None);
        assert!(!format!("{user:?}").contains("argon2id"));
    }
}
