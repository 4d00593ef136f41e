use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use loanops_core::UserId;

use crate::user::User;

/// Token lifetime: 24 hours.
pub const TOKEN_LIFETIME_SECS: i64 = 24 * 60 * 60;

/// JWT claims model (transport-agnostic).
///
/// Timestamps are seconds since the Unix epoch, as registered JWT claims are.
/// Roles are deliberately absent: permissions are re-derived from the store on
/// every request, so a revoked role takes effect without re-issuing tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the user id.
    pub sub: UserId,

    pub username: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Issued-at.
    pub iat: i64,

    /// Expiration.
    pub exp: i64,
}

impl TokenClaims {
    pub fn for_user(user: &User, issued_at: DateTime<Utc>) -> Self {
        let iat = issued_at.timestamp();
        Self {
            sub: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            iat,
            exp: iat + TOKEN_LIFETIME_SECS,
        }
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.iat, 0).single()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Deterministically validate token claims against `now`.
///
/// This validates the claims only. Signature verification lives in
/// [`TokenCodec`](crate::TokenCodec).
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims_at(t: DateTime<Utc>) -> TokenClaims {
        let user = User::new("agent-1", "digest".into(), None, t).unwrap();
        TokenClaims::for_user(&user, t)
    }

    #[test]
    fn valid_just_before_24_hours() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let claims = claims_at(t);
        assert_eq!(validate_claims(&claims, t + Duration::minutes(23 * 60 + 59)), Ok(()));
    }

    #[test]
    fn expired_just_after_24_hours() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let claims = claims_at(t);
        assert_eq!(
            validate_claims(&claims, t + Duration::minutes(24 * 60 + 1)),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&claims, t + Duration::hours(24)),
            Err(TokenValidationError::Expired)
        );
    }

    #[test]
    fn future_tokens_are_rejected() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let claims = claims_at(t);
        assert_eq!(
            validate_claims(&claims, t - Duration::seconds(5)),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn inverted_window_is_rejected() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let mut claims = claims_at(t);
        claims.exp = claims.iat;
        assert_eq!(validate_claims(&claims, t), Err(TokenValidationError::InvalidTimeWindow));
    }
}
