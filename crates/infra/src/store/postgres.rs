//! Postgres-backed store.
//!
//! Schema lives in `crates/infra/migrations` and is applied by
//! [`PostgresStore::connect`] before the pool is handed out.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Duplicate` |
//! | Database (foreign key violation) | `23503` | `Conflict` |
//! | Database (check constraint violation) | `23514` | `Conflict` |
//! | Database (other) | Any other | `Backend` |
//! | RowNotFound | N/A | `NotFound` |
//! | Other | N/A | `Backend` |

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use loanops_auth::{Role, RoleName, User, UserRoleMap};
use loanops_cases::{
    Agency, AgencyCaseMap, AgencyDetails, AgencyUserMap, Case, CaseStatus, CaseUserMap, Money,
    Trail,
};
use loanops_core::{AgencyId, CaseId, RoleId, TrailId, UserId};

use super::r#trait::{
    AgencyMember, AgencyStore, AssignmentStore, CaseStore, RoleStore, StoreError, StoreResult,
    TrailStore, UserStore,
};

const USER_COLUMNS: &str = "id, username, password_hash, email, is_active, created_at, updated_at";
const ROLE_COLUMNS: &str = "id, name, description, created_at, updated_at";
const AGENCY_COLUMNS: &str = "id, name, status, details, created_at, updated_at";
const CASE_COLUMNS: &str = "c.id, c.loan_id, c.external_customer_id, c.emi_amount, \
    c.principal_outstanding, c.interest_outstanding, c.status, c.emi_date, c.dpd_bucket, c.dpd, \
    c.disbursal_date, c.insurance_active, c.loan_description, c.emis_paid_till_date, \
    c.emis_pending, c.bounce_charges, c.nach_presentation_status, c.created_at, c.updated_at";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and run embedded migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::backend("migrate", e.to_string()))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row decoding
// ─────────────────────────────────────────────────────────────────────────────

fn decode_error(e: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(e))
}

fn money_from_db(value: i64) -> Result<Money, sqlx::Error> {
    u64::try_from(value).map(Money::from_minor).map_err(decode_error)
}

fn count_from_db(value: i64) -> Result<u32, sqlx::Error> {
    u32::try_from(value).map_err(decode_error)
}

fn money_to_db(operation: &str, money: Money) -> StoreResult<i64> {
    i64::try_from(money.minor_units())
        .map_err(|_| StoreError::backend(operation, format!("amount {money} out of range")))
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: UserId::from_uuid(row.try_get("id")?),
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        email: row.try_get("email")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn role_from_row(row: &PgRow) -> Result<Role, sqlx::Error> {
    let name: String = row.try_get("name")?;
    Ok(Role {
        id: RoleId::from_uuid(row.try_get("id")?),
        name: RoleName::new(name),
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn agency_from_row(row: &PgRow) -> Result<Agency, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let details: Json<BTreeMap<String, String>> = row.try_get("details")?;
    Ok(Agency {
        id: AgencyId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        status: status.parse().map_err(decode_error)?,
        details: AgencyDetails(details.0),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn agency_user_from_row(row: &PgRow) -> Result<AgencyUserMap, sqlx::Error> {
    let agency_role: String = row.try_get("agency_role")?;
    let manager_id: Option<Uuid> = row.try_get("manager_id")?;
    Ok(AgencyUserMap {
        agency_id: AgencyId::from_uuid(row.try_get("agency_id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        agency_role: agency_role.parse().map_err(decode_error)?,
        manager_id: manager_id.map(UserId::from_uuid),
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn case_from_row(row: &PgRow) -> Result<Case, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(Case {
        id: CaseId::from_uuid(row.try_get("id")?),
        loan_id: row.try_get("loan_id")?,
        external_customer_id: row.try_get("external_customer_id")?,
        emi_amount: money_from_db(row.try_get("emi_amount")?)?,
        principal_outstanding: money_from_db(row.try_get("principal_outstanding")?)?,
        interest_outstanding: money_from_db(row.try_get("interest_outstanding")?)?,
        status: status.parse::<CaseStatus>().map_err(decode_error)?,
        emi_date: row.try_get("emi_date")?,
        dpd_bucket: row.try_get("dpd_bucket")?,
        dpd: count_from_db(row.try_get("dpd")?)?,
        disbursal_date: row.try_get("disbursal_date")?,
        insurance_active: row.try_get("insurance_active")?,
        loan_description: row.try_get("loan_description")?,
        emis_paid_till_date: count_from_db(row.try_get("emis_paid_till_date")?)?,
        emis_pending: count_from_db(row.try_get("emis_pending")?)?,
        bounce_charges: money_from_db(row.try_get("bounce_charges")?)?,
        nach_presentation_status: row.try_get("nach_presentation_status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn trail_from_row(row: &PgRow) -> Result<Trail, sqlx::Error> {
    Ok(Trail {
        id: TrailId::from_uuid(row.try_get("id")?),
        case_id: CaseId::from_uuid(row.try_get("case_id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        contacted: row.try_get("contacted")?,
        payment_date: row.try_get("payment_date")?,
        remarks: row.try_get("remarks")?,
        created_at: row.try_get("created_at")?,
    })
}

fn decode_all<T>(
    operation: &str,
    rows: &[PgRow],
    decode: fn(&PgRow) -> Result<T, sqlx::Error>,
) -> StoreResult<Vec<T>> {
    rows.iter()
        .map(|row| decode(row).map_err(|e| map_sqlx_error(operation, e)))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl UserStore for PostgresStore {
    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, email, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    async fn user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("user_by_id", e))?;
        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("user_by_id", e))
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("user_by_username", e))?;
        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("user_by_username", e))
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY username"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;
        decode_all("list_users", &rows, user_from_row)
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn set_user_active(&self, id: UserId, active: bool, now: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET is_active = $2, updated_at = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(active)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_user_active", e))?;
        Ok(result.rows_affected() > 0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Roles
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl RoleStore for PostgresStore {
    #[instrument(skip(self, role), fields(role = %role.name), err)]
    async fn insert_role(&self, role: &Role) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO roles (id, name, description, created_at, updated_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(role.id.as_uuid())
        .bind(role.name.as_str())
        .bind(&role.description)
        .bind(role.created_at)
        .bind(role.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_role", e))?;
        Ok(())
    }

    async fn role_by_id(&self, id: RoleId) -> StoreResult<Option<Role>> {
        let row = sqlx::query(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("role_by_id", e))?;
        row.as_ref()
            .map(role_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("role_by_id", e))
    }

    async fn role_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let row = sqlx::query(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE name = $1"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("role_by_name", e))?;
        row.as_ref()
            .map(role_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("role_by_name", e))
    }

    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        let rows = sqlx::query(&format!("SELECT {ROLE_COLUMNS} FROM roles ORDER BY name"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_roles", e))?;
        decode_all("list_roles", &rows, role_from_row)
    }

    #[instrument(skip(self, role), fields(role_id = %role.id), err)]
    async fn update_role(&self, role: &Role) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE roles SET name = $2, description = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(role.id.as_uuid())
        .bind(role.name.as_str())
        .bind(&role.description)
        .bind(role.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_role", e))?;
        Ok(result.rows_affected() > 0)
    }

    /// User edges go with the role through `ON DELETE CASCADE`.
    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn delete_role(&self, id: RoleId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_role", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, edge), fields(user_id = %edge.user_id, role_id = %edge.role_id), err)]
    async fn insert_user_role(&self, edge: &UserRoleMap) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO user_role_map (user_id, role_id, is_active, assigned_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(edge.user_id.as_uuid())
        .bind(edge.role_id.as_uuid())
        .bind(edge.is_active)
        .bind(edge.assigned_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user_role", e))?;
        Ok(())
    }

    async fn deactivate_user_role(&self, user_id: UserId, role_id: RoleId) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE user_role_map SET is_active = FALSE WHERE user_id = $1 AND role_id = $2 AND is_active",
        )
        .bind(user_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("deactivate_user_role", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn active_roles_for_user(&self, user_id: UserId) -> StoreResult<Vec<Role>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.name, r.description, r.created_at, r.updated_at
            FROM user_role_map m
            JOIN roles r ON r.id = m.role_id
            WHERE m.user_id = $1 AND m.is_active
            ORDER BY r.name
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("active_roles_for_user", e))?;
        decode_all("active_roles_for_user", &rows, role_from_row)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agencies
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl AgencyStore for PostgresStore {
    #[instrument(skip(self, agency), fields(agency_id = %agency.id), err)]
    async fn insert_agency(&self, agency: &Agency) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO agencies (id, name, status, details, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(agency.id.as_uuid())
        .bind(&agency.name)
        .bind(agency.status.as_str())
        .bind(Json(&agency.details.0))
        .bind(agency.created_at)
        .bind(agency.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_agency", e))?;
        Ok(())
    }

    async fn agency_by_id(&self, id: AgencyId) -> StoreResult<Option<Agency>> {
        let row = sqlx::query(&format!("SELECT {AGENCY_COLUMNS} FROM agencies WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("agency_by_id", e))?;
        row.as_ref()
            .map(agency_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("agency_by_id", e))
    }

    async fn list_active_agencies(&self) -> StoreResult<Vec<Agency>> {
        let rows = sqlx::query(&format!(
            "SELECT {AGENCY_COLUMNS} FROM agencies WHERE status = 'ACTIVE' ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_active_agencies", e))?;
        decode_all("list_active_agencies", &rows, agency_from_row)
    }

    /// Edges reference the agency without cascade, so Postgres refuses the
    /// delete (23503) while any remain.
    #[instrument(skip(self), fields(agency_id = %id), err)]
    async fn delete_agency(&self, id: AgencyId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM agencies WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_agency", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, edge), fields(agency_id = %edge.agency_id, user_id = %edge.user_id), err)]
    async fn insert_agency_user(&self, edge: &AgencyUserMap) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO agency_user_map
                (agency_id, user_id, agency_role, manager_id, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(edge.agency_id.as_uuid())
        .bind(edge.user_id.as_uuid())
        .bind(edge.agency_role.as_str())
        .bind(edge.manager_id.map(Uuid::from))
        .bind(edge.is_active)
        .bind(edge.created_at)
        .bind(edge.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_agency_user", e))?;
        Ok(())
    }

    async fn active_agency_for_user(&self, user_id: UserId) -> StoreResult<Option<AgencyUserMap>> {
        let row = sqlx::query(
            r#"
            SELECT agency_id, user_id, agency_role, manager_id, is_active, created_at, updated_at
            FROM agency_user_map
            WHERE user_id = $1 AND is_active
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("active_agency_for_user", e))?;
        row.as_ref()
            .map(agency_user_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("active_agency_for_user", e))
    }

    async fn agency_members(&self, agency_id: AgencyId) -> StoreResult<Vec<AgencyMember>> {
        let rows = sqlx::query(
            r#"
            SELECT
                m.agency_id, m.user_id, m.agency_role, m.manager_id, m.is_active,
                m.created_at, m.updated_at,
                u.id, u.username, u.password_hash, u.email, u.is_active AS user_is_active,
                u.created_at AS user_created_at, u.updated_at AS user_updated_at
            FROM agency_user_map m
            JOIN users u ON u.id = m.user_id
            WHERE m.agency_id = $1 AND m.is_active
            ORDER BY u.username
            "#,
        )
        .bind(agency_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("agency_members", e))?;

        rows.iter()
            .map(|row| -> Result<AgencyMember, sqlx::Error> {
                let mapping = agency_user_from_row(row)?;
                let user = User {
                    id: UserId::from_uuid(row.try_get("id")?),
                    username: row.try_get("username")?,
                    password_hash: row.try_get("password_hash")?,
                    email: row.try_get("email")?,
                    is_active: row.try_get("user_is_active")?,
                    created_at: row.try_get("user_created_at")?,
                    updated_at: row.try_get("user_updated_at")?,
                };
                Ok(AgencyMember { mapping, user })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| map_sqlx_error("agency_members", e))
    }

    async fn unassigned_users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query(
            r#"
            SELECT u.id, u.username, u.password_hash, u.email, u.is_active, u.created_at, u.updated_at
            FROM users u
            WHERE u.is_active
              AND NOT EXISTS (
                  SELECT 1 FROM agency_user_map m WHERE m.user_id = u.id AND m.is_active
              )
            ORDER BY u.username
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("unassigned_users", e))?;
        decode_all("unassigned_users", &rows, user_from_row)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cases and assignment edges
// ─────────────────────────────────────────────────────────────────────────────

async fn insert_case(tx: &mut Transaction<'_, Postgres>, case: &Case) -> StoreResult<()> {
    const OP: &str = "insert_cases";
    sqlx::query(
        r#"
        INSERT INTO cases (
            id, loan_id, external_customer_id, emi_amount, principal_outstanding,
            interest_outstanding, status, emi_date, dpd_bucket, dpd, disbursal_date,
            insurance_active, loan_description, emis_paid_till_date, emis_pending,
            bounce_charges, nach_presentation_status, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
        "#,
    )
    .bind(case.id.as_uuid())
    .bind(&case.loan_id)
    .bind(&case.external_customer_id)
    .bind(money_to_db(OP, case.emi_amount)?)
    .bind(money_to_db(OP, case.principal_outstanding)?)
    .bind(money_to_db(OP, case.interest_outstanding)?)
    .bind(case.status.as_str())
    .bind(case.emi_date)
    .bind(&case.dpd_bucket)
    .bind(i64::from(case.dpd))
    .bind(case.disbursal_date)
    .bind(case.insurance_active)
    .bind(&case.loan_description)
    .bind(i64::from(case.emis_paid_till_date))
    .bind(i64::from(case.emis_pending))
    .bind(money_to_db(OP, case.bounce_charges)?)
    .bind(&case.nach_presentation_status)
    .bind(case.created_at)
    .bind(case.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error(OP, e))?;
    Ok(())
}

/// Body of the batch assignment; the caller owns commit/rollback.
async fn assign_batch(
    tx: &mut Transaction<'_, Postgres>,
    agency_id: AgencyId,
    case_ids: &[CaseId],
    now: DateTime<Utc>,
) -> StoreResult<Vec<Case>> {
    const OP: &str = "assign_cases_to_agency";

    let agency = sqlx::query("SELECT 1 FROM agencies WHERE id = $1")
        .bind(agency_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error(OP, e))?;
    if agency.is_none() {
        return Err(StoreError::not_found(OP, format!("agency {agency_id}")));
    }

    let mut seen = HashSet::new();
    let mut assigned = Vec::with_capacity(case_ids.len());
    for id in case_ids {
        if !seen.insert(*id) {
            return Err(StoreError::duplicate(OP, format!("case {id} repeated in batch")));
        }

        let row = sqlx::query(&format!("SELECT {CASE_COLUMNS} FROM cases c WHERE c.id = $1 FOR UPDATE"))
            .bind(id.as_uuid())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error(OP, e))?;
        let mut case = match row {
            Some(row) => case_from_row(&row).map_err(|e| map_sqlx_error(OP, e))?,
            None => return Err(StoreError::not_found(OP, format!("case {id}"))),
        };

        // Unique index on agency_case_map(case_id) turns a concurrent or
        // repeated mapping into 23505.
        sqlx::query("INSERT INTO agency_case_map (agency_id, case_id, assigned_at) VALUES ($1, $2, $3)")
            .bind(agency_id.as_uuid())
            .bind(id.as_uuid())
            .bind(now)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::duplicate(OP, format!("case {id} is already assigned"))
                } else {
                    map_sqlx_error(OP, e)
                }
            })?;

        case.mark_assigned(now)
            .map_err(|e| StoreError::conflict(OP, e.to_string()))?;

        sqlx::query("UPDATE cases SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(case.status.as_str())
            .bind(now)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error(OP, e))?;

        assigned.push(case);
    }
    Ok(assigned)
}

#[async_trait]
impl CaseStore for PostgresStore {
    #[instrument(skip(self, cases), fields(case_count = cases.len()), err)]
    async fn insert_cases(&self, cases: &[Case]) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for case in cases {
            if let Err(e) = insert_case(&mut tx, case).await {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(e);
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn case_by_id(&self, id: CaseId) -> StoreResult<Option<Case>> {
        let row = sqlx::query(&format!("SELECT {CASE_COLUMNS} FROM cases c WHERE c.id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("case_by_id", e))?;
        row.as_ref()
            .map(case_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("case_by_id", e))
    }

    async fn unassigned_cases(&self) -> StoreResult<Vec<Case>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {CASE_COLUMNS}
            FROM cases c
            WHERE NOT EXISTS (SELECT 1 FROM agency_case_map m WHERE m.case_id = c.id)
            ORDER BY c.created_at, c.id
            "#
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("unassigned_cases", e))?;
        decode_all("unassigned_cases", &rows, case_from_row)
    }
}

#[async_trait]
impl AssignmentStore for PostgresStore {
    #[instrument(skip(self, case_ids), fields(agency_id = %agency_id, case_count = case_ids.len()), err)]
    async fn assign_cases_to_agency(
        &self,
        agency_id: AgencyId,
        case_ids: &[CaseId],
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Case>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        match assign_batch(&mut tx, agency_id, case_ids, now).await {
            Ok(assigned) => {
                tx.commit()
                    .await
                    .map_err(|e| map_sqlx_error("commit_transaction", e))?;
                Ok(assigned)
            }
            Err(e) => {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                Err(e)
            }
        }
    }

    async fn agency_for_case(&self, case_id: CaseId) -> StoreResult<Option<AgencyCaseMap>> {
        let row = sqlx::query("SELECT agency_id, case_id, assigned_at FROM agency_case_map WHERE case_id = $1")
            .bind(case_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("agency_for_case", e))?;
        row.map(|row| -> Result<AgencyCaseMap, sqlx::Error> {
            Ok(AgencyCaseMap {
                agency_id: AgencyId::from_uuid(row.try_get("agency_id")?),
                case_id: CaseId::from_uuid(row.try_get("case_id")?),
                assigned_at: row.try_get("assigned_at")?,
            })
        })
        .transpose()
        .map_err(|e| map_sqlx_error("agency_for_case", e))
    }

    async fn cases_for_agency(&self, agency_id: AgencyId) -> StoreResult<Vec<Case>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {CASE_COLUMNS}
            FROM agency_case_map m
            JOIN cases c ON c.id = m.case_id
            WHERE m.agency_id = $1
            ORDER BY c.created_at, c.id
            "#
        ))
        .bind(agency_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("cases_for_agency", e))?;
        decode_all("cases_for_agency", &rows, case_from_row)
    }

    #[instrument(skip(self, edge), fields(case_id = %edge.case_id, user_id = %edge.user_id), err)]
    async fn insert_case_user(&self, edge: &CaseUserMap) -> StoreResult<()> {
        sqlx::query("INSERT INTO case_user_map (case_id, user_id, assigned_at) VALUES ($1, $2, $3)")
            .bind(edge.case_id.as_uuid())
            .bind(edge.user_id.as_uuid())
            .bind(edge.assigned_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_case_user", e))?;
        Ok(())
    }

    async fn cases_for_user(&self, user_id: UserId) -> StoreResult<Vec<Case>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {CASE_COLUMNS}
            FROM case_user_map m
            JOIN cases c ON c.id = m.case_id
            WHERE m.user_id = $1
            ORDER BY c.created_at, c.id
            "#
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("cases_for_user", e))?;
        decode_all("cases_for_user", &rows, case_from_row)
    }

    async fn assigned_agent(&self, case_id: CaseId) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT u.id, u.username, u.password_hash, u.email, u.is_active, u.created_at, u.updated_at
            FROM case_user_map m
            JOIN users u ON u.id = m.user_id
            WHERE m.case_id = $1
            ORDER BY m.assigned_at
            LIMIT 1
            "#,
        )
        .bind(case_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("assigned_agent", e))?;
        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("assigned_agent", e))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Trails
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl TrailStore for PostgresStore {
    #[instrument(skip(self, trail), fields(case_id = %trail.case_id), err)]
    async fn insert_trail(&self, trail: &Trail) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO trails (id, case_id, user_id, contacted, payment_date, remarks, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(trail.id.as_uuid())
        .bind(trail.case_id.as_uuid())
        .bind(trail.user_id.as_uuid())
        .bind(trail.contacted)
        .bind(trail.payment_date)
        .bind(&trail.remarks)
        .bind(trail.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_trail", e))?;
        Ok(())
    }

    async fn trails_for_case(&self, case_id: CaseId) -> StoreResult<Vec<Trail>> {
        let rows = sqlx::query(
            r#"
            SELECT id, case_id, user_id, contacted, payment_date, remarks, created_at
            FROM trails
            WHERE case_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(case_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("trails_for_case", e))?;
        decode_all("trails_for_case", &rows, trail_from_row)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Error mapping
// ─────────────────────────────────────────────────────────────────────────────

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = db_err.message().to_string();
            match db_err.code().as_deref() {
                Some("23505") => StoreError::duplicate(operation, msg),
                Some("23503") | Some("23514") => StoreError::conflict(operation, msg),
                _ => StoreError::backend(operation, msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::not_found(operation, "row not found"),
        sqlx::Error::PoolClosed => StoreError::backend(operation, "connection pool closed"),
        other => StoreError::backend(operation, other.to_string()),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}
