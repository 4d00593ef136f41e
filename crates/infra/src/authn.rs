use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use loanops_auth::{check_password_policy, CredentialHasher, PasswordError, TokenClaims, TokenCodec, User};
use loanops_core::UserId;

use crate::error::{ServiceError, ServiceResult};
use crate::store::{Store, StoreError};

/// A freshly signed bearer token.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub user_id: UserId,
    pub expires_at: i64,
}

/// Credential check, token issuance and self-registration.
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn Store>,
    hasher: Arc<dyn CredentialHasher>,
    tokens: Arc<dyn TokenCodec>,
}

impl Authenticator {
    pub fn new(
        store: Arc<dyn Store>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<dyn TokenCodec>,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
        }
    }

    #[instrument(skip(self, password), err)]
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<IssuedToken> {
        let Some(user) = self.store.user_by_username(username.trim()).await? else {
            warn!(username, "login failed");
            return Err(ServiceError::InvalidCredentials);
        };

        let verified = match self.hasher.verify(&user.password_hash, password) {
            Ok(ok) => ok,
            Err(e @ PasswordError::MalformedDigest(_)) => {
                error!(user_id = %user.id, error = %e, "stored credential digest is unusable");
                false
            }
            Err(e) => return Err(e.into()),
        };
        if !user.is_active || !verified {
            warn!(user_id = %user.id, "login failed");
            return Err(ServiceError::InvalidCredentials);
        }

        let claims = TokenClaims::for_user(&user, now);
        let token = self
            .tokens
            .issue(&claims)
            .map_err(|e| ServiceError::internal("issue_token", e.to_string()))?;

        info!(user_id = %user.id, "login succeeded");
        Ok(IssuedToken {
            token,
            user_id: user.id,
            expires_at: claims.exp,
        })
    }

    /// Create an active user with no roles.
    #[instrument(skip(self, password, email), err)]
    pub async fn register_user(
        &self,
        username: &str,
        password: &str,
        email: Option<String>,
        now: DateTime<Utc>,
    ) -> ServiceResult<User> {
        check_password_policy(password)?;
        let username = loanops_auth::user::normalize_username(username)?;

        if self.store.user_by_username(&username).await?.is_some() {
            return Err(ServiceError::DuplicateUsername);
        }

        let digest = self.hasher.hash(password)?;
        let user = User::new(&username, digest, email, now)?;

        self.store.insert_user(&user).await.map_err(|e| match e {
            StoreError::Duplicate { .. } => ServiceError::DuplicateUsername,
            other => other.into(),
        })?;

        info!(user_id = %user.id, "user registered");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;

    #[tokio::test]
    async fn correct_credentials_yield_token_for_user() {
        let fx = Fixture::new().await;
        let user = fx.authn.register_user("meera", "s3cret-pass", None, fx.now).await.unwrap();

        let issued = fx.authn.authenticate("meera", "s3cret-pass", fx.now).await.unwrap();
        assert_eq!(issued.user_id, user.id);
        assert_eq!(issued.expires_at, fx.now.timestamp() + loanops_auth::TOKEN_LIFETIME_SECS);

        let ctx = fx.gate.begin_request(&issued.token, fx.now).await.unwrap();
        assert_eq!(ctx.user_id(), user.id);
    }

    #[tokio::test]
    async fn every_single_character_mutation_is_rejected() {
        let fx = Fixture::new().await;
        let password = "tr4il-runner";
        fx.authn.register_user("ravi", password, None, fx.now).await.unwrap();

        for (idx, ch) in password.char_indices() {
            let replacement = if ch == 'x' { 'y' } else { 'x' };
            let mut mutated = password.to_string();
            mutated.replace_range(idx..idx + ch.len_utf8(), &replacement.to_string());
            assert_eq!(
                fx.authn.authenticate("ravi", &mutated, fx.now).await.unwrap_err(),
                ServiceError::InvalidCredentials,
                "mutation at {idx} accepted"
            );
        }
    }

    #[tokio::test]
    async fn unknown_and_inactive_users_look_like_bad_passwords() {
        let fx = Fixture::new().await;
        let user = fx.authn.register_user("gone", "password-1", None, fx.now).await.unwrap();
        fx.store.set_user_active(user.id, false, fx.now).await.unwrap();

        assert_eq!(
            fx.authn.authenticate("nobody", "password-1", fx.now).await.unwrap_err(),
            ServiceError::InvalidCredentials
        );
        assert_eq!(
            fx.authn.authenticate("gone", "password-1", fx.now).await.unwrap_err(),
            ServiceError::InvalidCredentials
        );
    }

    #[tokio::test]
    async fn registration_rules() {
        let fx = Fixture::new().await;
        assert!(matches!(
            fx.authn.register_user("shorty", "1234567", None, fx.now).await,
            Err(ServiceError::WeakPassword(_))
        ));
        assert!(matches!(
            fx.authn.register_user("   ", "long-enough", None, fx.now).await,
            Err(ServiceError::Validation(_))
        ));

        fx.authn.register_user("dup", "long-enough", None, fx.now).await.unwrap();
        assert_eq!(
            fx.authn.register_user(" dup ", "long-enough", None, fx.now).await.unwrap_err(),
            ServiceError::DuplicateUsername
        );
    }

    #[tokio::test]
    async fn new_users_hold_no_roles() {
        let fx = Fixture::new().await;
        let user = fx.authn.register_user("fresh", "long-enough", None, fx.now).await.unwrap();
        assert!(fx.store.active_roles_for_user(user.id).await.unwrap().is_empty());
    }

    struct BrokenSigner;

    impl TokenCodec for BrokenSigner {
        fn issue(&self, _claims: &TokenClaims) -> Result<String, loanops_auth::TokenError> {
            Err(loanops_auth::TokenError::Encode("key rejected".into()))
        }

        fn verify(&self, token: &str, _now: DateTime<Utc>) -> Result<TokenClaims, loanops_auth::TokenError> {
            Err(loanops_auth::TokenError::Invalid(token.to_string()))
        }
    }

    #[tokio::test]
    async fn unusable_digest_is_a_failed_login() {
        let fx = Fixture::new().await;
        let user = User::new("legacy", "not-a-phc-string".to_string(), None, fx.now).unwrap();
        fx.store.insert_user(&user).await.unwrap();

        assert_eq!(
            fx.authn.authenticate("legacy", "whatever-1", fx.now).await.unwrap_err(),
            ServiceError::InvalidCredentials
        );
    }

    #[tokio::test]
    async fn signing_failure_is_internal() {
        let fx = Fixture::new().await;
        fx.authn.register_user("signer", "long-enough", None, fx.now).await.unwrap();
        let hasher = Arc::new(loanops_auth::Argon2Hasher::with_cost(1024, 1, 1).unwrap());
        let authn = Authenticator::new(fx.store.clone(), hasher, Arc::new(BrokenSigner));

        let err = authn.authenticate("signer", "long-enough", fx.now).await.unwrap_err();
        assert!(matches!(err, ServiceError::Internal { ref operation, .. } if operation == "issue_token"));
    }
}
