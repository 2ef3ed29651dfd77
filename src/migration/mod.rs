//! Generation of the client directory reimport as ordered SQL files.
//!
//! The hosted database only accepts one statement per request, so every step
//! lands in its own file and the files are meant to be run in name order.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::Result;

static BRACKETED_TLA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([A-Za-z0-9]+)\]").expect("valid bracket pattern"));

static TRAILING_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+$").expect("valid trailing digit pattern"));

/// Row of the "Live Client List" CSV export, keyed by header name.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportRow {
    #[serde(rename = "BsB Client Code")]
    pub code: String,
    #[serde(rename = "Client Name")]
    pub client_name: String,
    #[serde(rename = "Primary contact")]
    pub primary_contact: String,
    #[serde(rename = "Primary Contact Email")]
    pub primary_contact_email: String,
    #[serde(rename = "Other People in this Client Code")]
    pub other_people: String,
    #[serde(rename = "Payment Terms")]
    pub payment_terms: String,
    #[serde(rename = "PO Required?")]
    pub po_required: String,
    #[serde(rename = "Client Billing contact")]
    pub billing_contact: String,
    #[serde(rename = "Client Billing email")]
    pub billing_email: String,
    #[serde(rename = "Client Billing Address")]
    pub billing_address: String,
    #[serde(rename = "Notes")]
    pub notes: String,
    #[serde(rename = "Formatted Client Name")]
    pub formatted_client_name: String,
}

/// Cleaned client code row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCode {
    pub code: String,
    pub tla: String,
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

/// Company derived from the first code row of its TLA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company {
    pub tla: String,
    pub client_name: Option<String>,
    pub formatted_client_name: Option<String>,
}

/// One generated SQL file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStep {
    pub file_name: &'static str,
    pub sql: String,
}

/// All steps of the migration plus the counts reported to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub steps: Vec<MigrationStep>,
    pub companies: usize,
    pub codes: usize,
}

/// Quotes a value as a single-line SQL string literal, or `NULL` when blank.
pub fn sql_literal(value: Option<&str>) -> String {
    match value {
        Some(value) if !value.trim().is_empty() => {
            let single_line = value.replace("\r\n", " ").replace(['\r', '\n'], " ");
            format!("'{}'", single_line.replace('\'', "''"))
        }
        _ => "NULL".to_string(),
    }
}

/// Trims a cell; blank cells become `None`.
pub fn clean(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Like [`clean`] but also drops a leading `mailto:`.
pub fn clean_email(value: &str) -> Option<String> {
    let cleaned = clean(value)?;
    let stripped = match cleaned.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("mailto:") => cleaned[7..].trim(),
        _ => cleaned.as_str(),
    };
    clean(stripped)
}

/// Last bracketed token of a formatted client name:
/// `10x Genomics [10x] (( prev. Scale Biosciences [SCA] ))` → `SCA`.
pub fn tla_from_formatted(formatted: &str) -> Option<String> {
    BRACKETED_TLA
        .captures_iter(formatted)
        .last()
        .and_then(|captures| captures.get(1))
        .map(|tla| tla.as_str().to_string())
}

/// Client code without its trailing digits: `BTN002` → `BTN`.
pub fn tla_from_code(code: &str) -> String {
    TRAILING_DIGITS.replace(code.trim(), "").into_owned()
}

impl ExportRow {
    /// Cleans the row. Returns `None` for the `OTHER` placeholder row.
    pub fn into_client_code(self) -> Option<ClientCode> {
        let raw_code = self.code.trim();
        if raw_code.to_uppercase().starts_with("OTHER") {
            return None;
        }

        let (code, annotation) = match raw_code.split_once('\n') {
            Some((code, annotation)) => (
                code.trim().to_string(),
                clean(annotation.trim().trim_matches(|ch| ch == '(' || ch == ')')),
            ),
            None => (raw_code.to_string(), None),
        };

        let notes = match (annotation, clean(&self.notes)) {
            (Some(annotation), Some(notes)) => Some(format!("{annotation}. {notes}")),
            (Some(annotation), None) => Some(annotation),
            (None, notes) => notes,
        };

        let formatted_client_name = clean(&self.formatted_client_name);
        let tla = formatted_client_name
            .as_deref()
            .and_then(tla_from_formatted)
            .unwrap_or_else(|| tla_from_code(&code));

        Some(ClientCode {
            code,
            tla,
            client_name: clean(&self.client_name),
            primary_contact: clean(&self.primary_contact),
            primary_contact_email: clean_email(&self.primary_contact_email),
            other_people: clean(&self.other_people),
            payment_terms: clean(&self.payment_terms),
            po_required: clean(&self.po_required),
            billing_contact: clean(&self.billing_contact),
            billing_email: clean_email(&self.billing_email),
            billing_address: clean(&self.billing_address),
            notes,
            formatted_client_name,
        })
    }
}

/// Reads and cleans every row of the CSV export.
pub fn read_export<R: Read>(reader: R) -> Result<Vec<ClientCode>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut codes = Vec::new();
    for record in csv_reader.deserialize::<ExportRow>() {
        if let Some(code) = record?.into_client_code() {
            codes.push(code);
        }
    }
    Ok(codes)
}

/// First occurrence of each TLA wins; the result is ordered by TLA.
pub fn companies(codes: &[ClientCode]) -> BTreeMap<String, Company> {
    let mut companies = BTreeMap::new();
    for code in codes {
        companies.entry(code.tla.clone()).or_insert_with(|| Company {
            tla: code.tla.clone(),
            client_name: code.client_name.clone(),
            formatted_client_name: code.formatted_client_name.clone(),
        });
    }
    companies
}

/// Builds the five migration steps.
pub fn build_migration(codes: &[ClientCode]) -> Migration {
    let companies = companies(codes);

    let schema_clients = "-- Client migration step 1a: add tla column to clients\n\
         ALTER TABLE clients\n    ADD COLUMN IF NOT EXISTS tla VARCHAR(20);\n"
        .to_string();

    let schema_po_required = "-- Client migration step 1b: change po_required to TEXT\n\
         -- Preserves full values e.g. \"Yes (Coupa)\", \"No - but check for next order\"\n\
         ALTER TABLE bsb_client_codes\n    ALTER COLUMN po_required TYPE TEXT USING po_required::TEXT;\n"
        .to_string();

    let truncate = "-- Client migration step 2: clear existing data\n\
         -- CASCADE also truncates bsb_client_codes (FK dependency)\n\
         TRUNCATE clients CASCADE;\n"
        .to_string();

    let company_values: Vec<String> = companies
        .values()
        .map(|company| {
            format!(
                "  ({}, {}, {})",
                sql_literal(company.client_name.as_deref()),
                sql_literal(company.formatted_client_name.as_deref()),
                sql_literal(Some(&company.tla)),
            )
        })
        .collect();
    let insert_companies = format!(
        "-- Client migration step 3: insert {} unique companies\n\
         INSERT INTO clients (client_name, formatted_client_name, tla) VALUES\n{};\n",
        companies.len(),
        company_values.join(",\n"),
    );

    let code_values: Vec<String> = codes
        .iter()
        .map(|row| {
            let fields = [
                Some(row.code.as_str()),
                Some(row.tla.as_str()),
                row.primary_contact.as_deref(),
                row.primary_contact_email.as_deref(),
                row.other_people.as_deref(),
                row.payment_terms.as_deref(),
                row.po_required.as_deref(),
                row.billing_contact.as_deref(),
                row.billing_email.as_deref(),
                row.billing_address.as_deref(),
                row.notes.as_deref(),
            ];
            let literals: Vec<String> = fields.into_iter().map(sql_literal).collect();
            format!("    ({})", literals.join(", "))
        })
        .collect();
    let insert_codes = format!(
        "-- Client migration step 4: insert {count} client codes\n\
         INSERT INTO bsb_client_codes (\n\
         \x20   bsb_client_code, client_id,\n\
         \x20   primary_contact, primary_contact_email,\n\
         \x20   other_people_in_client_code, payment_terms, po_required,\n\
         \x20   client_billing_contact, client_billing_email, client_billing_address, notes\n\
         )\n\
         SELECT\n\
         \x20   v.bsb_client_code, c.id,\n\
         \x20   v.primary_contact, v.primary_contact_email,\n\
         \x20   v.other_people, v.payment_terms, v.po_required,\n\
         \x20   v.billing_contact, v.billing_email, v.billing_address, v.notes\n\
         FROM (VALUES\n\
         {values}\n\
         ) AS v(\n\
         \x20   bsb_client_code, tla,\n\
         \x20   primary_contact, primary_contact_email,\n\
         \x20   other_people, payment_terms, po_required,\n\
         \x20   billing_contact, billing_email, billing_address, notes\n\
         )\n\
         JOIN clients c ON c.tla = v.tla;\n",
        count = codes.len(),
        values = code_values.join(",\n"),
    );

    Migration {
        steps: vec![
            MigrationStep {
                file_name: "1a_schema_clients.sql",
                sql: schema_clients,
            },
            MigrationStep {
                file_name: "1b_schema_po_required.sql",
                sql: schema_po_required,
            },
            MigrationStep {
                file_name: "2_truncate.sql",
                sql: truncate,
            },
            MigrationStep {
                file_name: "3_insert_companies.sql",
                sql: insert_companies,
            },
            MigrationStep {
                file_name: "4_insert_codes.sql",
                sql: insert_codes,
            },
        ],
        companies: companies.len(),
        codes: codes.len(),
    }
}

/// Writes every step into `out_dir`, creating it if needed, and returns the
/// written paths in run order.
#[instrument(level = "info", skip(migration), fields(out_dir = %out_dir.display()))]
pub fn write_migration(migration: &Migration, out_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)?;
    let mut written = Vec::with_capacity(migration.steps.len());
    for step in &migration.steps {
        let path = out_dir.join(step.file_name);
        fs::write(&path, &step.sql)?;
        info!(file = step.file_name, "wrote migration step");
        written.push(path);
    }
    Ok(written)
}
