//! Persistence seams.
//!
//! Services depend on the [`Store`] trait object only; `InMemoryStore` backs
//! tests and local runs, `PostgresStore` backs deployments.

mod in_memory;
mod postgres;
mod r#trait;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use r#trait::{
    AgencyMember, AgencyStore, AssignmentStore, CaseStore, RoleStore, Store, StoreError,
    StoreResult, TrailStore, UserStore,
};
