//! End-to-end runs behind the subcommands, independent of how their
//! collaborators are built.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, instrument};

use crate::blueprint::{self, BlueprintSettings, RewriteSummary};
use crate::directory::{self, DirectoryWriter, SyncReport};
use crate::error::{Result, ToolError};
use crate::io;
use crate::migration::{self, Migration};
use crate::reconcile::{self, AuditOptions, FolderSource, RecordStore};
use crate::report::AuditReport;

/// Audits the folder tree and writes the report to `output`.
#[instrument(level = "info", skip_all, fields(output = %output.display()))]
pub fn audit_folders<S, R>(
    source: &mut S,
    store: &mut R,
    options: &AuditOptions,
    output: &Path,
) -> Result<AuditReport>
where
    S: FolderSource + ?Sized,
    R: RecordStore + ?Sized,
{
    let report = reconcile::audit(source, store, options)?;
    io::write_report(output, &report.table())?;
    info!(rows = report.entries.len(), "audit report written");
    Ok(report)
}

/// Syncs the directory sheet rows (header row first) through `writer`, or
/// plans them only when `writer` is `None`. The row report is written only
/// after the writer has committed, so a failed run leaves no report claiming
/// rows were written.
#[instrument(level = "info", skip_all, fields(rows = sheet_rows.len()))]
pub fn sync_directory(
    sheet_rows: &[Vec<String>],
    mut writer: Option<&mut dyn DirectoryWriter>,
    output: Option<&Path>,
) -> Result<SyncReport> {
    let data_rows = sheet_rows.get(1..).unwrap_or_default();
    let plans = directory::plan_rows(data_rows);
    info!(planned = plans.len(), "planned directory rows");

    let report = directory::sync_rows(plans, writer.as_mut().map(|w| &mut **w as &mut dyn DirectoryWriter))?;
    if let Some(writer) = writer {
        writer.commit()?;
        info!(codes = report.codes(), "directory rows committed");
    }
    if let Some(output) = output {
        io::write_report(output, &report.table())?;
        info!(output = %output.display(), "sync report written");
    }
    Ok(report)
}

/// Rewrites the blueprint at `input` and writes it to `output`, pretty
/// printed with the original key order.
#[instrument(level = "info", skip_all, fields(input = %input.display(), output = %output.display()))]
pub fn patch_blueprint(
    input: &Path,
    output: &Path,
    settings: &BlueprintSettings,
) -> Result<RewriteSummary> {
    if !input.exists() {
        return Err(ToolError::MissingInput(input.to_path_buf()));
    }
    let source = fs::read_to_string(input)?;
    let document: Value = serde_json::from_str(&source)?;

    let (patched, summary) = blueprint::rewrite(&document, &blueprint::io_submission_rewrite(settings))?;

    let mut json = serde_json::to_string_pretty(&patched)?;
    json.push('\n');
    fs::write(output, json)?;
    info!(?summary, "blueprint patched");
    Ok(summary)
}

/// Turns a directory CSV export into the migration SQL files under `out_dir`.
#[instrument(level = "info", skip_all, fields(input = %input.display(), out_dir = %out_dir.display()))]
pub fn generate_migration(input: &Path, out_dir: &Path) -> Result<(Migration, Vec<PathBuf>)> {
    if !input.exists() {
        return Err(ToolError::MissingInput(input.to_path_buf()));
    }
    let codes = migration::read_export(File::open(input)?)?;
    let plan = migration::build_migration(&codes);
    info!(
        companies = plan.companies,
        codes = plan.codes,
        "migration planned"
    );
    let written = migration::write_migration(&plan, out_dir)?;
    Ok((plan, written))
}
