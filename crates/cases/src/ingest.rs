//! Case intake from tabular data.
//!
//! The first record is a header and is skipped. Every data record must have
//! exactly [`CASE_COLUMNS`] fields in this order:
//!
//! `loan_id, external_customer_id, emi_amount, principal_outstanding,
//! interest_outstanding, case_status, emi_date, dpd_bucket, dpd,
//! disbursal_date, insurance_active, loan_description, emis_paid_till_date,
//! emis_pending, bounce_charges, nach_presentation_status`
//!
//! The `case_status` column is informational; every ingested case starts as
//! `PENDING`. Rows that fail to parse are skipped and reported with their
//! 1-based line number, while the rest of the batch goes through.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

use loanops_core::CaseId;

use crate::case::{Case, CaseStatus, Money};

pub const CASE_COLUMNS: usize = 16;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("upload contains no data rows")]
    Empty,

    #[error("malformed CSV: {0}")]
    Csv(String),
}

/// A skipped input row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub cases: Vec<Case>,
    pub rejected: Vec<RowError>,
}

/// Split a CSV body into raw records. Field counts are not checked here.
pub fn read_csv(body: &[u8]) -> Result<Vec<Vec<String>>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body);

    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(|e| IngestError::Csv(e.to_string()))
        })
        .collect()
}

/// Turn header + data records into new `PENDING` cases.
pub fn parse_records<R, S>(records: &[R], now: DateTime<Utc>) -> Result<IngestReport, IngestError>
where
    R: AsRef<[S]>,
    S: AsRef<str>,
{
    if records.len() < 2 {
        return Err(IngestError::Empty);
    }

    let mut cases = Vec::with_capacity(records.len() - 1);
    let mut rejected = Vec::new();

    for (idx, record) in records.iter().enumerate().skip(1) {
        match parse_row(record.as_ref(), now) {
            Ok(case) => cases.push(case),
            Err(reason) => rejected.push(RowError {
                line: idx + 1,
                reason,
            }),
        }
    }

    Ok(IngestReport { cases, rejected })
}

fn parse_row<S: AsRef<str>>(row: &[S], now: DateTime<Utc>) -> Result<Case, String> {
    if row.len() != CASE_COLUMNS {
        return Err(format!("expected {CASE_COLUMNS} columns, found {}", row.len()));
    }
    let field = |i: usize| row[i].as_ref().trim();

    let loan_id = required_text(field(0), "loan_id")?;
    let external_customer_id = required_text(field(1), "external_customer_id")?;

    Ok(Case {
        id: CaseId::new(),
        loan_id,
        external_customer_id,
        emi_amount: money(field(2), "emi_amount")?,
        principal_outstanding: money(field(3), "principal_outstanding")?,
        interest_outstanding: money(field(4), "interest_outstanding")?,
        status: CaseStatus::Pending,
        emi_date: date(field(6), "emi_date")?,
        dpd_bucket: field(7).to_string(),
        dpd: count(field(8), "dpd")?,
        disbursal_date: date(field(9), "disbursal_date")?,
        insurance_active: flag(field(10), "insurance_active")?,
        loan_description: field(11).to_string(),
        emis_paid_till_date: count(field(12), "emis_paid_till_date")?,
        emis_pending: count(field(13), "emis_pending")?,
        bounce_charges: money(field(14), "bounce_charges")?,
        nach_presentation_status: field(15).to_string(),
        created_at: now,
        updated_at: now,
    })
}

fn required_text(value: &str, column: &str) -> Result<String, String> {
    if value.is_empty() {
        Err(format!("{column} is required"))
    } else {
        Ok(value.to_string())
    }
}

fn money(value: &str, column: &str) -> Result<Money, String> {
    value
        .parse::<Money>()
        .map_err(|_| format!("{column}: '{value}' is not a non-negative amount up to {}", Money::MAX))
}

fn count(value: &str, column: &str) -> Result<u32, String> {
    value
        .parse::<u32>()
        .map_err(|_| format!("{column}: '{value}' is not a non-negative integer"))
}

fn date(value: &str, column: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| format!("{column}: '{value}' is not a YYYY-MM-DD date"))
}

fn flag(value: &str, column: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" | "" => Ok(false),
        _ => Err(format!("{column}: '{value}' is not a boolean")),
    }
}
