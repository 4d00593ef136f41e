//! `loanops-cases`: loan case, agency and trail domain types.
//!
//! Pure data and parsing: no IO beyond reading an in-memory CSV buffer.
//! Persistence and authorization live in `loanops-infra`.

pub mod agency;
pub mod case;
pub mod ingest;
pub mod trail;

pub use agency::{
    Agency, AgencyCaseMap, AgencyDetails, AgencyRole, AgencyStatus, AgencyUserMap, CaseUserMap,
};
pub use case::{Case, CaseStatus, Money};
pub use ingest::{parse_records, read_csv, IngestError, IngestReport, RowError, CASE_COLUMNS};
pub use trail::{payment_link, Trail};
