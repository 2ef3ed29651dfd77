use std::fs;

use clientops_tools::migration::{self, ExportRow};
use tempfile::tempdir;

const HEADER: &str = "BsB Client Code,Client Name,Primary contact,Primary Contact Email,\
Other People in this Client Code,Payment Terms,PO Required?,Client Billing contact,\
Client Billing email,Client Billing Address,Notes,Formatted Client Name";

fn export_row(code: &str, name: &str, email: &str, notes: &str, formatted: &str) -> ExportRow {
    ExportRow {
        code: code.to_string(),
        client_name: name.to_string(),
        primary_contact: "Jane Doe".to_string(),
        primary_contact_email: email.to_string(),
        other_people: String::new(),
        payment_terms: "30 days".to_string(),
        po_required: "Yes (Coupa)".to_string(),
        billing_contact: String::new(),
        billing_email: String::new(),
        billing_address: String::new(),
        notes: notes.to_string(),
        formatted_client_name: formatted.to_string(),
    }
}

#[test]
fn sql_literals_escape_and_flatten() {
    assert_eq!(migration::sql_literal(None), "NULL");
    assert_eq!(migration::sql_literal(Some("   ")), "NULL");
    assert_eq!(migration::sql_literal(Some("O'Brien")), "'O''Brien'");
    assert_eq!(
        migration::sql_literal(Some("1 Main St\r\nCity\nZip")),
        "'1 Main St City Zip'"
    );
}

#[test]
fn emails_lose_mailto_prefix() {
    assert_eq!(
        migration::clean_email(" MailTo:jane@example.com ").as_deref(),
        Some("jane@example.com")
    );
    assert_eq!(
        migration::clean_email("jane@example.com").as_deref(),
        Some("jane@example.com")
    );
    assert_eq!(migration::clean_email("mailto:"), None);
    assert_eq!(migration::clean_email(""), None);
}

#[test]
fn tla_prefers_last_bracket_of_formatted_name() {
    assert_eq!(
        migration::tla_from_formatted("10x Genomics [10x] (( prev. Scale Biosciences [SCA] ))")
            .as_deref(),
        Some("SCA")
    );
    assert_eq!(migration::tla_from_formatted("No brackets"), None);
    assert_eq!(migration::tla_from_code("BTN002"), "BTN");
}

#[test]
fn annotated_code_moves_annotation_into_notes() {
    let row = export_row("ABC001\n(legacy account)", "Abc", "", "Pays late", "");
    let code = row.into_client_code().expect("regular row kept");
    assert_eq!(code.code, "ABC001");
    assert_eq!(code.tla, "ABC");
    assert_eq!(code.notes.as_deref(), Some("legacy account. Pays late"));

    let row = export_row("ABC002\n(second)", "Abc", "", "", "");
    let code = row.into_client_code().expect("regular row kept");
    assert_eq!(code.notes.as_deref(), Some("second"));
}

#[test]
fn placeholder_rows_are_excluded() {
    assert!(export_row("other", "", "", "", "").into_client_code().is_none());
    assert!(export_row("OTHER-misc", "", "", "", "").into_client_code().is_none());
}

#[test]
fn first_company_row_wins_and_companies_are_sorted() {
    let codes: Vec<_> = [
        export_row("ZED001", "Zed First", "", "", "Zed [ZED]"),
        export_row("ABC001", "Abc", "mailto:a@abc.test", "", "Abc [ABC]"),
        export_row("ZED002", "Zed Second", "", "", "Zed [ZED]"),
    ]
    .into_iter()
    .filter_map(ExportRow::into_client_code)
    .collect();

    let companies = migration::companies(&codes);
    let tlas: Vec<&String> = companies.keys().collect();
    assert_eq!(tlas, ["ABC", "ZED"]);
    assert_eq!(companies["ZED"].client_name.as_deref(), Some("Zed First"));
    assert_eq!(codes[1].primary_contact_email.as_deref(), Some("a@abc.test"));
}

#[test]
fn writes_five_ordered_files() {
    let csv = format!(
        "{HEADER}\n\
         ELR001,Elr Ltd,Jane,mailto:jane@elr.test,,30 days,Yes,,,,,Elr Ltd [ELR]\n\
         ELR002,Elr Ltd,John,,,,No,,,,,Elr Ltd [ELR]\n\
         OTHER,Misc,,,,,,,,,,\n\
         \"BIO001\n(pilot)\",Bio's Lab,,,,,,,,,Net 60,\n"
    );
    let codes = migration::read_export(csv.as_bytes()).expect("export parsed");
    assert_eq!(codes.len(), 3);

    let plan = migration::build_migration(&codes);
    assert_eq!(plan.companies, 2);
    assert_eq!(plan.codes, 3);

    let dir = tempdir().expect("temporary directory");
    let written = migration::write_migration(&plan, dir.path()).expect("files written");
    let names: Vec<String> = written
        .iter()
        .map(|path| path.file_name().expect("file name").to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        [
            "1a_schema_clients.sql",
            "1b_schema_po_required.sql",
            "2_truncate.sql",
            "3_insert_companies.sql",
            "4_insert_codes.sql",
        ]
    );

    let companies = fs::read_to_string(dir.path().join("3_insert_companies.sql")).expect("read");
    assert!(companies.contains("insert 2 unique companies"));
    assert!(companies.contains("('Bio''s Lab', NULL, 'BIO')"));
    assert!(companies.contains("('Elr Ltd', 'Elr Ltd [ELR]', 'ELR')"));
    assert!(companies.find("'BIO'") < companies.find("'ELR'"));

    let codes_sql = fs::read_to_string(dir.path().join("4_insert_codes.sql")).expect("read");
    assert!(codes_sql.contains("insert 3 client codes"));
    assert!(codes_sql.contains("'jane@elr.test'"));
    assert!(codes_sql.contains("'pilot. Net 60'"));
    assert!(!codes_sql.contains("OTHER"));
    assert!(codes_sql.contains("JOIN clients c ON c.tla = v.tla;"));

    let truncate = fs::read_to_string(dir.path().join("2_truncate.sql")).expect("read");
    assert!(truncate.contains("TRUNCATE clients CASCADE;"));
}
