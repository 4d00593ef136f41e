//! `loanops-auth`: authentication/authorization primitives.
//!
//! This crate is intentionally decoupled from HTTP and storage: it knows how to
//! hash and verify credentials, sign and verify tokens, map roles to
//! permissions and decide allow/deny for a resolved request context.

pub mod authorize;
pub mod catalog;
pub mod claims;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod token;
pub mod user;

pub use authorize::{authorize, explain_authorization, AuthorizationExplanation, AuthzError};
pub use catalog::{RoleCatalog, RoleDefinition};
pub use claims::{validate_claims, TokenClaims, TokenValidationError, TOKEN_LIFETIME_SECS};
pub use password::{check_password_policy, Argon2Hasher, CredentialHasher, PasswordError};
pub use permissions::{Permission, PermissionSet};
pub use principal::{Identity, RequestContext};
pub use roles::{Role, RoleName, UserRoleMap};
pub use token::{Hs256TokenCodec, TokenCodec, TokenError};
pub use user::User;
