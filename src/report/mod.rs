use std::collections::BTreeMap;
use std::fmt;

use crate::model::{Outcome, RunMode, Tier};

/// Column set of the folder audit report.
pub const AUDIT_COLUMNS: [&str; 7] = ["tier", "name", "folder_id", "tla", "code", "outcome", "note"];

/// A flat table ready to be written as CSV or as a worksheet.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    pub sheet_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    pub fn new(sheet_name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            columns: columns.iter().map(|column| column.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row, padding or truncating it to the column count.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.columns.len(), String::new());
        self.rows.push(row);
    }
}

/// Report line for one classified folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub tier: Tier,
    pub name: String,
    pub folder_id: String,
    /// Company key: extracted from the folder itself for tier 1, inherited
    /// from the parent folder for tier 2.
    pub company_key: Option<String>,
    /// Contact key extracted from a tier 2 folder.
    pub contact_key: Option<String>,
    pub outcome: Outcome,
    pub note: Option<String>,
}

impl AuditEntry {
    fn cells(&self) -> Vec<String> {
        vec![
            self.tier.to_string(),
            self.name.clone(),
            self.folder_id.clone(),
            self.company_key.clone().unwrap_or_default(),
            self.contact_key.clone().unwrap_or_default(),
            self.outcome.to_string(),
            self.note.clone().unwrap_or_default(),
        ]
    }
}

/// Ordered audit results of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditReport {
    /// Entries in processing order.
    pub entries: Vec<AuditEntry>,
    pub mode: RunMode,
    /// Folders classified as [`Outcome::Update`].
    pub eligible: usize,
    /// Links actually written; always zero for a dry run.
    pub written: usize,
}

impl AuditReport {
    /// Serialises the entries into the fixed audit column set.
    pub fn table(&self) -> ReportTable {
        let mut table = ReportTable::new("Audit", &AUDIT_COLUMNS);
        for entry in &self.entries {
            table.push_row(entry.cells());
        }
        table
    }

    pub fn summary(&self) -> Summary {
        Summary {
            counts: count_outcomes(self.entries.iter().map(|entry| entry.outcome)),
            mode: self.mode,
            eligible: self.eligible,
            written: self.written,
        }
    }
}

/// Run header naming the mode and whether contact folders are scanned.
pub fn audit_header(mode: RunMode, include_contacts: bool) -> String {
    let scope = if include_contacts {
        "yes"
    } else {
        "no (pass --tier2 to enable)"
    };
    format!("Mode: {mode}\nTier 2 scan: {scope}")
}

/// Counts how often each outcome occurs.
pub fn count_outcomes<I>(outcomes: I) -> BTreeMap<Outcome, usize>
where
    I: IntoIterator<Item = Outcome>,
{
    let mut counts = BTreeMap::new();
    for outcome in outcomes {
        *counts.entry(outcome).or_insert(0) += 1;
    }
    counts
}

/// Human readable end-of-run summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub counts: BTreeMap<Outcome, usize>,
    pub mode: RunMode,
    pub eligible: usize,
    pub written: usize,
}

impl Summary {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.counts.get(&outcome).copied().unwrap_or(0)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Summary ({}):", self.mode)?;
        let mut counts: Vec<_> = self.counts.iter().collect();
        counts.sort_by_key(|(outcome, _)| outcome.as_str());
        for (outcome, count) in counts {
            writeln!(f, "  {:<20} {count}", outcome.as_str())?;
        }
        writeln!(f)?;
        match self.mode {
            RunMode::Apply => write!(
                f,
                "  {} of {} eligible folder ID(s) written to DB",
                self.written, self.eligible
            ),
            RunMode::DryRun => write!(
                f,
                "  {} folder ID(s) ready to update (re-run with --apply)",
                self.eligible
            ),
        }
    }
}
