//! Shaping of client directory sheet rows into client and client-code upserts.
//!
//! [`plan_rows`] is pure; [`sync_rows`] hands each plan to a
//! [`DirectoryWriter`] and records one [`RowResult`] per row so a failing row
//! never aborts the batch. Only a lost connection ends it early.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{error, info, instrument};

use crate::error::{Result, ToolError};
use crate::model::RunMode;
use crate::report::ReportTable;

static CLIENT_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z0-9]+?)(\d{3,4})$").expect("valid client code pattern"));

/// Column set of the directory sync row report.
pub const SYNC_COLUMNS: [&str; 5] = ["row", "code", "tla", "outcome", "note"];

/// Zero-based positions of the directory sheet columns.
mod column {
    pub const CODE: usize = 0;
    pub const CLIENT_NAME: usize = 1;
    pub const PRIMARY_CONTACT: usize = 2;
    pub const PRIMARY_CONTACT_EMAIL: usize = 3;
    pub const OTHER_PEOPLE: usize = 4;
    pub const PAYMENT_TERMS: usize = 5;
    pub const PO_REQUIRED: usize = 6;
    pub const BILLING_CONTACT: usize = 7;
    pub const BILLING_EMAIL: usize = 8;
    pub const BILLING_ADDRESS: usize = 9;
    pub const NOTES: usize = 10;
    pub const FORMATTED_CLIENT_NAME: usize = 11;
}

/// Derives the company TLA from a client code by stripping its 3-4 digit
/// suffix: `ELR001` → `ELR`, `N6T001` → `N6T`.
pub fn derive_group_key(code: &str) -> Option<String> {
    let normalized = code.trim().to_uppercase();
    CLIENT_CODE
        .captures(&normalized)
        .and_then(|captures| captures.get(1))
        .map(|key| key.as_str().to_string())
}

/// One data row of the directory sheet with trimmed, non-empty cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryRow {
    pub code: Option<String>,
    pub client_name: Option<String>,
    pub primary_contact: Option<String>,
    pub primary_contact_email: Option<String>,
    pub other_people: Option<String>,
    pub payment_terms: Option<String>,
    pub po_required: Option<String>,
    pub billing_contact: Option<String>,
    pub billing_email: Option<String>,
    pub billing_address: Option<String>,
    pub notes: Option<String>,
    pub formatted_client_name: Option<String>,
}

impl DirectoryRow {
    /// Builds a row from raw cells. Missing trailing cells count as empty.
    pub fn from_cells<S: AsRef<str>>(cells: &[S]) -> Self {
        let cell = |index: usize| {
            cells
                .get(index)
                .map(|value| value.as_ref().trim())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        Self {
            code: cell(column::CODE),
            client_name: cell(column::CLIENT_NAME),
            primary_contact: cell(column::PRIMARY_CONTACT),
            primary_contact_email: cell(column::PRIMARY_CONTACT_EMAIL),
            other_people: cell(column::OTHER_PEOPLE),
            payment_terms: cell(column::PAYMENT_TERMS),
            po_required: cell(column::PO_REQUIRED),
            billing_contact: cell(column::BILLING_CONTACT),
            billing_email: cell(column::BILLING_EMAIL),
            billing_address: cell(column::BILLING_ADDRESS),
            notes: cell(column::NOTES),
            formatted_client_name: cell(column::FORMATTED_CLIENT_NAME),
        }
    }
}

/// Arguments of the `upsert_client` stored function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientUpsert {
    pub tla: String,
    pub client_name: String,
    pub formatted_client_name: Option<String>,
}

/// Arguments of the `upsert_client_code` stored function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeUpsert {
    pub code: String,
    pub tla: String,
    pub primary_contact: Option<String>,
    pub primary_contact_email: Option<String>,
    pub payment_terms: Option<String>,
    pub po_required: Option<String>,
    pub billing_contact: Option<String>,
    pub billing_email: Option<String>,
    pub billing_address: Option<String>,
}

/// Writes planned for one sheet row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowPlan {
    /// One-based sheet row number (the header is row 1).
    pub row: usize,
    /// Present only on the first row of each TLA.
    pub client: Option<ClientUpsert>,
    pub code: CodeUpsert,
}

/// What to do with one sheet row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedRow {
    Write(RowPlan),
    /// The code does not end in a 3-4 digit suffix, so no TLA can be derived.
    NoGroupKey { row: usize, code: String },
}

/// Turns the data rows (header excluded) into write plans. Rows without a
/// code are dropped.
pub fn plan_rows<S: AsRef<str>>(data_rows: &[Vec<S>]) -> Vec<PlannedRow> {
    let mut seen = BTreeSet::new();
    let mut plans = Vec::new();

    for (index, cells) in data_rows.iter().enumerate() {
        let row_number = index + 2;
        let row = DirectoryRow::from_cells(cells);
        let Some(code) = row.code.clone() else {
            continue;
        };
        let Some(tla) = derive_group_key(&code) else {
            plans.push(PlannedRow::NoGroupKey {
                row: row_number,
                code,
            });
            continue;
        };

        let client = seen.insert(tla.clone()).then(|| ClientUpsert {
            tla: tla.clone(),
            client_name: row.client_name.clone().unwrap_or_else(|| code.clone()),
            formatted_client_name: row.formatted_client_name.clone(),
        });

        plans.push(PlannedRow::Write(RowPlan {
            row: row_number,
            client,
            code: CodeUpsert {
                code,
                tla,
                primary_contact: row.primary_contact,
                primary_contact_email: row.primary_contact_email,
                payment_terms: row.payment_terms,
                po_required: row.po_required,
                billing_contact: row.billing_contact,
                billing_email: row.billing_email,
                billing_address: row.billing_address,
            },
        }));
    }

    plans
}

/// Persists the upserts of one row as a single unit of work.
pub trait DirectoryWriter {
    /// Runs the client upsert (when present) and the code upsert. On error
    /// neither write of the row may remain visible.
    fn write_row(&mut self, plan: &RowPlan) -> Result<()>;

    /// Makes every successfully written row permanent.
    fn commit(&mut self) -> Result<()>;
}

/// Per-row result of a sync batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowResult {
    Written { row: usize, code: String, tla: String, new_client: bool },
    Planned { row: usize, code: String, tla: String, new_client: bool },
    Skipped { row: usize, code: String, reason: String },
    Failed { row: usize, code: String, tla: String, error: String },
}

impl RowResult {
    pub fn row(&self) -> usize {
        match self {
            RowResult::Written { row, .. }
            | RowResult::Planned { row, .. }
            | RowResult::Skipped { row, .. }
            | RowResult::Failed { row, .. } => *row,
        }
    }
}

/// Outcome of a whole sync batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub mode: RunMode,
    pub rows: Vec<RowResult>,
}

impl SyncReport {
    /// Distinct TLAs with a client upsert, written or planned.
    pub fn clients(&self) -> usize {
        self.rows
            .iter()
            .filter(|result| {
                matches!(
                    result,
                    RowResult::Written { new_client: true, .. }
                        | RowResult::Planned { new_client: true, .. }
                )
            })
            .count()
    }

    /// Code rows written, or that would be written in a dry run.
    pub fn codes(&self) -> usize {
        self.rows
            .iter()
            .filter(|result| matches!(result, RowResult::Written { .. } | RowResult::Planned { .. }))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RowResult> {
        self.rows
            .iter()
            .filter(|result| matches!(result, RowResult::Failed { .. }))
    }

    pub fn table(&self) -> ReportTable {
        let mut table = ReportTable::new("Sync", &SYNC_COLUMNS);
        for result in &self.rows {
            let cells = match result {
                RowResult::Written { row, code, tla, new_client } => {
                    row_cells(*row, code, tla, "WRITTEN", client_note(*new_client))
                }
                RowResult::Planned { row, code, tla, new_client } => {
                    row_cells(*row, code, tla, "PLANNED", client_note(*new_client))
                }
                RowResult::Skipped { row, code, reason } => {
                    row_cells(*row, code, "", "SKIPPED", reason)
                }
                RowResult::Failed { row, code, tla, error } => {
                    row_cells(*row, code, tla, "FAILED", error)
                }
            };
            table.push_row(cells);
        }
        table
    }
}

fn client_note(new_client: bool) -> &'static str {
    if new_client { "client upsert" } else { "" }
}

fn row_cells(row: usize, code: &str, tla: &str, outcome: &str, note: &str) -> Vec<String> {
    vec![
        row.to_string(),
        code.to_string(),
        tla.to_string(),
        outcome.to_string(),
        note.to_string(),
    ]
}

/// Runs the planned rows through `writer`, or only records what would be
/// written when no writer is given (dry run). Does not commit.
///
/// Fails only with [`ToolError::ConnectionLost`]; every other row error is
/// recorded as [`RowResult::Failed`].
#[instrument(level = "info", skip_all, fields(rows = plans.len(), apply = writer.is_some()))]
pub fn sync_rows(
    plans: Vec<PlannedRow>,
    mut writer: Option<&mut dyn DirectoryWriter>,
) -> Result<SyncReport> {
    let mode = RunMode::from_apply_flag(writer.is_some());
    let mut rows = Vec::with_capacity(plans.len());

    for planned in plans {
        let plan = match planned {
            PlannedRow::NoGroupKey { row, code } => {
                info!(row, code = %code, "[SKIP] can't extract TLA");
                rows.push(RowResult::Skipped {
                    row,
                    code,
                    reason: "can't extract TLA from code".to_string(),
                });
                continue;
            }
            PlannedRow::Write(plan) => plan,
        };

        if let Some(client) = &plan.client {
            info!(tla = %client.tla, name = %client.client_name, "[CLIENT]");
        }
        info!(
            code = %plan.code.code,
            contact = plan.code.primary_contact.as_deref().unwrap_or(""),
            "[CODE]"
        );

        let row = plan.row;
        let new_client = plan.client.is_some();
        let code = plan.code.code.clone();
        let tla = plan.code.tla.clone();

        let Some(writer) = writer.as_deref_mut() else {
            rows.push(RowResult::Planned { row, code, tla, new_client });
            continue;
        };

        match writer.write_row(&plan) {
            Ok(()) => rows.push(RowResult::Written { row, code, tla, new_client }),
            Err(err @ ToolError::ConnectionLost(_)) => {
                error!(row, code = %code, error = %err, "aborting sync");
                return Err(err);
            }
            Err(err) => {
                error!(row, code = %code, error = %err, "row rolled back");
                rows.push(RowResult::Failed {
                    row,
                    code,
                    tla,
                    error: err.to_string(),
                });
            }
        }
    }

    Ok(SyncReport { mode, rows })
}
