use std::fs;

use clientops_tools::io::{self, csv_write, excel_read};
use clientops_tools::model::{Outcome, RunMode, Tier};
use clientops_tools::report::{AuditEntry, AuditReport, ReportTable, audit_header};
use tempfile::tempdir;

fn entry(tier: Tier, name: &str, outcome: Outcome) -> AuditEntry {
    AuditEntry {
        tier,
        name: name.to_string(),
        folder_id: format!("id-{name}"),
        company_key: Some("ARR".to_string()),
        contact_key: (tier == Tier::Contact).then(|| "ARR001".to_string()),
        outcome,
        note: None,
    }
}

fn report(mode: RunMode, written: usize) -> AuditReport {
    AuditReport {
        entries: vec![
            entry(Tier::Company, "[ARR] Arralyze", Outcome::Update),
            entry(Tier::Contact, "[ARR001] Jane", Outcome::Update),
            entry(Tier::Company, "Misc", Outcome::NonConforming),
        ],
        mode,
        eligible: 2,
        written,
    }
}

#[test]
fn audit_table_uses_fixed_columns() {
    let table = report(RunMode::DryRun, 0).table();
    assert_eq!(
        table.columns,
        ["tier", "name", "folder_id", "tla", "code", "outcome", "note"]
    );
    assert_eq!(
        table.rows[1],
        ["2", "[ARR001] Jane", "id-[ARR001] Jane", "ARR", "ARR001", "UPDATE", ""]
    );
}

#[test]
fn summary_reports_mode_and_counts() {
    let dry = report(RunMode::DryRun, 0).summary().to_string();
    assert!(dry.starts_with("Summary (DRY-RUN):"));
    assert!(dry.contains("NON_CONFORMING"));
    assert!(dry.contains("2 folder ID(s) ready to update (re-run with --apply)"));

    let applied = report(RunMode::Apply, 2).summary().to_string();
    assert!(applied.starts_with("Summary (APPLY):"));
    assert!(applied.contains("2 of 2 eligible folder ID(s) written to DB"));
}

#[test]
fn audit_header_states_mode_and_tier2_scope() {
    assert_eq!(
        audit_header(RunMode::DryRun, false),
        "Mode: DRY-RUN\nTier 2 scan: no (pass --tier2 to enable)"
    );
    assert_eq!(audit_header(RunMode::Apply, true), "Mode: APPLY\nTier 2 scan: yes");
}

#[test]
fn short_rows_are_padded() {
    let mut table = ReportTable::new("Sheet", &["a", "b", "c"]);
    table.push_row(vec!["1".to_string()]);
    assert_eq!(table.rows[0], ["1", "", ""]);
}

#[test]
fn csv_report_has_header_and_rows() {
    let mut buffer = Vec::new();
    csv_write::write_report(&mut buffer, &report(RunMode::DryRun, 0).table()).expect("csv written");
    let text = String::from_utf8(buffer).expect("utf-8");
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("tier,name,folder_id,tla,code,outcome,note"));
    assert_eq!(lines.next(), Some("1,[ARR] Arralyze,id-[ARR] Arralyze,ARR,,UPDATE,"));
    assert_eq!(text.lines().count(), 4);
}

#[test]
fn report_format_follows_extension() {
    let dir = tempdir().expect("temporary directory");
    let table = report(RunMode::DryRun, 0).table();

    let csv_path = dir.path().join("audit.csv");
    io::write_report(&csv_path, &table).expect("csv written");
    assert!(fs::read_to_string(&csv_path).expect("read").starts_with("tier,name"));

    let xlsx_path = dir.path().join("audit.xlsx");
    io::write_report(&xlsx_path, &table).expect("xlsx written");
    let rows = excel_read::read_rows(&xlsx_path, Some("Audit")).expect("xlsx read");
    assert_eq!(rows[0], table.columns);
    assert_eq!(rows[3][1], "Misc");
    assert_eq!(rows[3][5], "NON_CONFORMING");
}
