//! Infrastructure layer: persistence adapters and the request-facing services
//! built on top of them.

pub mod agencies;
pub mod authn;
pub mod error;
pub mod gate;
pub mod roles;
pub mod store;
pub mod trails;
pub mod users;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use agencies::AgencyDirectory;
pub use authn::{Authenticator, IssuedToken};
pub use error::{ServiceError, ServiceResult};
pub use gate::{require, AuthorizationGate};
pub use roles::RoleAdmin;
pub use store::{InMemoryStore, PostgresStore, Store, StoreError};
pub use trails::{PaymentLink, TrailLog};
pub use users::UserAdmin;
pub use workflow::{CaseDetails, CaseWorkflow};
