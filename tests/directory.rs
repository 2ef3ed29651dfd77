use clientops_tools::directory::{
    self, ClientUpsert, DirectoryRow, DirectoryWriter, PlannedRow, RowPlan, RowResult,
};
use clientops_tools::model::RunMode;
use clientops_tools::pipeline;
use clientops_tools::{Result, ToolError};
use tempfile::tempdir;

fn sheet_row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|cell| cell.to_string()).collect()
}

#[derive(Default)]
struct RecordingWriter {
    fail_code: Option<&'static str>,
    disconnect_code: Option<&'static str>,
    fail_commit: bool,
    written: Vec<RowPlan>,
    commits: usize,
}

impl DirectoryWriter for RecordingWriter {
    fn write_row(&mut self, plan: &RowPlan) -> Result<()> {
        if self.disconnect_code == Some(plan.code.code.as_str()) {
            return Err(ToolError::ConnectionLost("connection closed".into()));
        }
        if self.fail_code == Some(plan.code.code.as_str()) {
            return Err(ToolError::Auth("constraint violated".into()));
        }
        self.written.push(plan.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.fail_commit {
            return Err(ToolError::ConnectionLost("commit failed".into()));
        }
        self.commits += 1;
        Ok(())
    }
}

#[test]
fn derives_group_key_from_code() {
    assert_eq!(directory::derive_group_key("ELR001").as_deref(), Some("ELR"));
    assert_eq!(directory::derive_group_key("N6T001").as_deref(), Some("N6T"));
    assert_eq!(directory::derive_group_key(" abc1234 ").as_deref(), Some("ABC"));
    assert_eq!(directory::derive_group_key("BADCODE"), None);
    assert_eq!(directory::derive_group_key("AB12"), None);
}

#[test]
fn row_cells_are_trimmed_and_optional() {
    let row = DirectoryRow::from_cells(&["  ELR001 ", "Elranatamab", "", "   "]);
    assert_eq!(row.code.as_deref(), Some("ELR001"));
    assert_eq!(row.client_name.as_deref(), Some("Elranatamab"));
    assert_eq!(row.primary_contact, None);
    assert_eq!(row.primary_contact_email, None);
    assert_eq!(row.formatted_client_name, None);
}

#[test]
fn first_row_per_tla_carries_client_upsert() {
    let rows = vec![
        sheet_row(&["ELR001", "Elr Ltd", "Jane", "jane@elr.test", "", "30 days", "Yes", "", "", "", "", "Elr Ltd [ELR]"]),
        sheet_row(&["ELR002", "Elr Ltd", "John"]),
        sheet_row(&[]),
        sheet_row(&["", "No code"]),
        sheet_row(&["BADCODE", "Bad"]),
        sheet_row(&["N6T001"]),
    ];

    let plans = directory::plan_rows(&rows);
    assert_eq!(plans.len(), 4);

    let PlannedRow::Write(first) = &plans[0] else {
        panic!("first row should be written");
    };
    assert_eq!(first.row, 2);
    assert_eq!(
        first.client,
        Some(ClientUpsert {
            tla: "ELR".to_string(),
            client_name: "Elr Ltd".to_string(),
            formatted_client_name: Some("Elr Ltd [ELR]".to_string()),
        })
    );
    assert_eq!(first.code.payment_terms.as_deref(), Some("30 days"));
    assert_eq!(first.code.po_required.as_deref(), Some("Yes"));

    let PlannedRow::Write(second) = &plans[1] else {
        panic!("second row should be written");
    };
    assert_eq!(second.row, 3);
    assert!(second.client.is_none());

    assert_eq!(
        plans[2],
        PlannedRow::NoGroupKey {
            row: 6,
            code: "BADCODE".to_string(),
        }
    );

    let PlannedRow::Write(last) = &plans[3] else {
        panic!("last row should be written");
    };
    let client = last.client.as_ref().expect("new TLA gets a client upsert");
    assert_eq!(client.tla, "N6T");
    assert_eq!(client.client_name, "N6T001");
}

#[test]
fn dry_run_plans_without_writer() {
    let rows = vec![sheet_row(&["ELR001", "Elr"]), sheet_row(&["ELR002", "Elr"])];

    let report = directory::sync_rows(directory::plan_rows(&rows), None).expect("dry run");

    assert_eq!(report.mode, RunMode::DryRun);
    assert_eq!(report.clients(), 1);
    assert_eq!(report.codes(), 2);
    assert!(matches!(report.rows[0], RowResult::Planned { new_client: true, .. }));
}

#[test]
fn failing_row_does_not_stop_the_batch() {
    let rows = vec![
        sheet_row(&["ELR001", "Elr"]),
        sheet_row(&["ELR002", "Elr"]),
        sheet_row(&["BADCODE"]),
        sheet_row(&["ELR003", "Elr"]),
    ];
    let mut writer = RecordingWriter {
        fail_code: Some("ELR002"),
        ..RecordingWriter::default()
    };

    let report =
        directory::sync_rows(directory::plan_rows(&rows), Some(&mut writer)).expect("batch runs");

    assert_eq!(report.mode, RunMode::Apply);
    let codes: Vec<&str> = writer.written.iter().map(|plan| plan.code.code.as_str()).collect();
    assert_eq!(codes, ["ELR001", "ELR003"]);
    assert_eq!(report.codes(), 2);

    let failures: Vec<&RowResult> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].row(), 3);
    assert!(matches!(
        report.rows[2],
        RowResult::Skipped { row: 4, .. }
    ));

    let table = report.table();
    assert_eq!(table.columns, ["row", "code", "tla", "outcome", "note"]);
    assert_eq!(table.rows[1][3], "FAILED");
    assert!(table.rows[1][4].contains("constraint violated"));
}

#[test]
fn lost_connection_stops_the_batch() {
    let rows = vec![
        sheet_row(&["ELR001", "Elr"]),
        sheet_row(&["ELR002", "Elr"]),
        sheet_row(&["ELR003", "Elr"]),
    ];
    let mut writer = RecordingWriter {
        disconnect_code: Some("ELR002"),
        ..RecordingWriter::default()
    };

    let result = directory::sync_rows(directory::plan_rows(&rows), Some(&mut writer));

    assert!(matches!(result, Err(ToolError::ConnectionLost(_))));
    assert_eq!(writer.written.len(), 1);
}

fn sheet_with_header() -> Vec<Vec<String>> {
    vec![
        sheet_row(&["BsB Client Code", "Client Name"]),
        sheet_row(&["ELR001", "Elr"]),
        sheet_row(&["ELR002", "Elr"]),
    ]
}

#[test]
fn report_is_written_after_commit() {
    let dir = tempdir().expect("temporary directory");
    let output = dir.path().join("sync.csv");
    let mut writer = RecordingWriter::default();

    let report = pipeline::sync_directory(&sheet_with_header(), Some(&mut writer), Some(&output))
        .expect("sync succeeds");

    assert_eq!(writer.commits, 1);
    assert_eq!(report.codes(), 2);
    let text = std::fs::read_to_string(&output).expect("report written");
    assert!(text.contains("2,ELR001,ELR,WRITTEN"));
}

#[test]
fn failed_commit_leaves_no_report() {
    let dir = tempdir().expect("temporary directory");
    let output = dir.path().join("sync.csv");
    let mut writer = RecordingWriter {
        fail_commit: true,
        ..RecordingWriter::default()
    };

    let result = pipeline::sync_directory(&sheet_with_header(), Some(&mut writer), Some(&output));

    assert!(result.is_err());
    assert!(!output.exists());
}

#[test]
fn lost_connection_leaves_no_report_and_no_commit() {
    let dir = tempdir().expect("temporary directory");
    let output = dir.path().join("sync.csv");
    let mut writer = RecordingWriter {
        disconnect_code: Some("ELR001"),
        ..RecordingWriter::default()
    };

    let result = pipeline::sync_directory(&sheet_with_header(), Some(&mut writer), Some(&output));

    assert!(result.is_err());
    assert_eq!(writer.commits, 0);
    assert!(!output.exists());
}
