use std::collections::BTreeMap;

use clientops_tools::model::{DirectoryRecord, Outcome, RecordTable, RemoteFolder, RunMode, Tier};
use clientops_tools::reconcile::{self, AuditOptions, FolderLink, FolderSource, RecordStore};
use clientops_tools::{Result, ToolError};

#[derive(Default)]
struct FakeDrive {
    children: BTreeMap<String, Vec<RemoteFolder>>,
    failing_parent: Option<String>,
    listed: Vec<String>,
}

impl FakeDrive {
    fn with(mut self, parent: &str, folders: &[(&str, &str)]) -> Self {
        self.children.insert(
            parent.to_string(),
            folders
                .iter()
                .map(|(id, name)| RemoteFolder::new(*id, *name))
                .collect(),
        );
        self
    }
}

impl FolderSource for FakeDrive {
    fn list_children(&mut self, parent_id: &str) -> Result<Vec<RemoteFolder>> {
        self.listed.push(parent_id.to_string());
        if self.failing_parent.as_deref() == Some(parent_id) {
            return Err(ToolError::Auth("listing failed".into()));
        }
        Ok(self.children.get(parent_id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
struct FakeStore {
    companies: RecordTable,
    contacts: RecordTable,
    staged: Vec<FolderLink>,
    committed: Vec<FolderLink>,
    commits: usize,
}

impl RecordStore for FakeStore {
    fn load_records(&mut self, tier: Tier) -> Result<RecordTable> {
        Ok(match tier {
            Tier::Company => self.companies.clone(),
            Tier::Contact => self.contacts.clone(),
        })
    }

    fn stage_link(&mut self, link: FolderLink) -> Result<()> {
        self.staged.push(link);
        Ok(())
    }

    fn commit(&mut self) -> Result<usize> {
        self.commits += 1;
        let written = self.staged.len();
        self.committed.append(&mut self.staged);
        Ok(written)
    }
}

fn records(entries: &[(&str, i64, Option<&str>)]) -> RecordTable {
    entries
        .iter()
        .map(|(key, id, folder)| {
            (
                key.to_string(),
                DirectoryRecord::new(*id, folder.map(str::to_string)),
            )
        })
        .collect()
}

fn options(mode: RunMode, include_contacts: bool) -> AuditOptions {
    AuditOptions {
        root_folder_id: "root".to_string(),
        include_contacts,
        mode,
    }
}

#[test]
fn extracts_keys_per_tier() {
    assert_eq!(reconcile::extract_key(Tier::Company, "[ARR] Arralyze"), Some("ARR"));
    assert_eq!(reconcile::extract_key(Tier::Company, "ARR Arralyze"), None);
    assert_eq!(reconcile::extract_key(Tier::Company, "[arr] Arralyze"), None);
    assert_eq!(reconcile::extract_key(Tier::Company, "[ARR]Arralyze"), None);
    assert_eq!(reconcile::extract_key(Tier::Company, "[ABCDEF] Too Long"), None);
    assert_eq!(
        reconcile::extract_key(Tier::Contact, "[ARR001] Jane Doe"),
        Some("ARR001")
    );
    assert_eq!(reconcile::extract_key(Tier::Contact, "[ARR] Jane Doe"), None);
}

#[test]
fn classifies_against_stored_folder_id() {
    let folder = RemoteFolder::new("F1", "[ARR] Arralyze");

    let unset = records(&[("ARR", 7, None)]);
    let classification = reconcile::classify(Tier::Company, &folder, &unset);
    assert_eq!(classification.outcome, Outcome::Update);
    assert_eq!(
        classification.link,
        Some(FolderLink {
            tier: Tier::Company,
            record_id: 7,
            folder_id: "F1".to_string(),
        })
    );

    let same = records(&[("ARR", 7, Some("F1"))]);
    let classification = reconcile::classify(Tier::Company, &folder, &same);
    assert_eq!(classification.outcome, Outcome::AlreadySet);
    assert!(classification.link.is_none());

    let other = records(&[("ARR", 7, Some("F9"))]);
    let classification = reconcile::classify(Tier::Company, &folder, &other);
    assert_eq!(classification.outcome, Outcome::Conflict);
    assert_eq!(
        classification.note.as_deref(),
        Some("DB already has folder_id F9")
    );
    assert!(classification.link.is_none());
}

#[test]
fn empty_stored_folder_id_counts_as_unset() {
    let folder = RemoteFolder::new("F1", "[ARR] Arralyze");
    let table = records(&[("ARR", 7, Some(""))]);
    assert_eq!(
        reconcile::classify(Tier::Company, &folder, &table).outcome,
        Outcome::Update
    );
}

#[test]
fn non_conforming_and_missing_keys_are_reported() {
    let table = records(&[("ARR", 7, None)]);

    let skipped = reconcile::classify(Tier::Company, &RemoteFolder::new("F1", "ARR Arralyze"), &table);
    assert_eq!(skipped.outcome, Outcome::NonConforming);
    assert_eq!(skipped.key, None);
    assert_eq!(
        skipped.note.as_deref(),
        Some("Name does not match [TLA] pattern")
    );

    let missing = reconcile::classify(Tier::Company, &RemoteFolder::new("F2", "[XYZ] Unknown"), &table);
    assert_eq!(missing.outcome, Outcome::KeyNotFound);
    assert_eq!(missing.key.as_deref(), Some("XYZ"));
    assert_eq!(
        missing.note.as_deref(),
        Some("TLA \"XYZ\" not in clients table")
    );
}

#[test]
fn dry_run_reports_without_writing() {
    let mut drive = FakeDrive::default().with(
        "root",
        &[("F2", "[ZED] Zed Corp"), ("F1", "[ARR] Arralyze"), ("F3", "misc")],
    );
    let mut store = FakeStore {
        companies: records(&[("ARR", 1, None), ("ZED", 2, Some("F2"))]),
        ..FakeStore::default()
    };

    let report = reconcile::audit(&mut drive, &mut store, &options(RunMode::DryRun, false))
        .expect("audit succeeds");

    let names: Vec<&str> = report.entries.iter().map(|entry| entry.name.as_str()).collect();
    assert_eq!(names, ["[ARR] Arralyze", "[ZED] Zed Corp", "misc"]);
    let outcomes: Vec<Outcome> = report.entries.iter().map(|entry| entry.outcome).collect();
    assert_eq!(
        outcomes,
        [Outcome::Update, Outcome::AlreadySet, Outcome::NonConforming]
    );
    assert_eq!(report.mode, RunMode::DryRun);
    assert_eq!(report.eligible, 1);
    assert_eq!(report.written, 0);
    assert_eq!(store.commits, 0);
    assert!(store.staged.is_empty());
}

#[test]
fn apply_commits_only_update_links() {
    let mut drive = FakeDrive::default().with(
        "root",
        &[
            ("F1", "[ARR] Arralyze"),
            ("F2", "[BIO] Bio Labs"),
            ("F3", "[CEL] Cell Co"),
            ("F4", "[NOP] Not In Db"),
        ],
    );
    let mut store = FakeStore {
        companies: records(&[
            ("ARR", 1, None),
            ("BIO", 2, Some("F2")),
            ("CEL", 3, Some("OTHER")),
        ]),
        ..FakeStore::default()
    };

    let report = reconcile::audit(&mut drive, &mut store, &options(RunMode::Apply, false))
        .expect("audit succeeds");

    assert_eq!(store.commits, 1);
    assert_eq!(
        store.committed,
        [FolderLink {
            tier: Tier::Company,
            record_id: 1,
            folder_id: "F1".to_string(),
        }]
    );
    assert_eq!(report.eligible, 1);
    assert_eq!(report.written, 1);

    let summary = report.summary();
    assert_eq!(summary.count(Outcome::Update), 1);
    assert_eq!(summary.count(Outcome::AlreadySet), 1);
    assert_eq!(summary.count(Outcome::Conflict), 1);
    assert_eq!(summary.count(Outcome::KeyNotFound), 1);
    assert_eq!(summary.count(Outcome::NonConforming), 0);
}

#[test]
fn contact_folders_inherit_company_key() {
    let mut drive = FakeDrive::default()
        .with("root", &[("F1", "[ARR] Arralyze"), ("F2", "Archive")])
        .with(
            "F1",
            &[("C2", "[ARR002] John Roe"), ("C1", "[ARR001] Jane Doe"), ("C3", "Notes")],
        );
    let mut store = FakeStore {
        companies: records(&[("ARR", 1, Some("F1"))]),
        contacts: records(&[("ARR001", 10, None), ("ARR002", 11, Some("C2"))]),
        ..FakeStore::default()
    };

    let report = reconcile::audit(&mut drive, &mut store, &options(RunMode::Apply, true))
        .expect("audit succeeds");

    assert_eq!(drive.listed, ["root", "F1"]);
    let contacts: Vec<_> = report
        .entries
        .iter()
        .filter(|entry| entry.tier == Tier::Contact)
        .collect();
    assert_eq!(contacts.len(), 3);
    assert_eq!(contacts[0].name, "Notes");
    assert_eq!(contacts[1].contact_key.as_deref(), Some("ARR001"));
    assert_eq!(contacts[1].company_key.as_deref(), Some("ARR"));
    assert_eq!(contacts[1].outcome, Outcome::Update);
    assert_eq!(contacts[2].outcome, Outcome::AlreadySet);

    assert_eq!(
        store.committed,
        [FolderLink {
            tier: Tier::Contact,
            record_id: 10,
            folder_id: "C1".to_string(),
        }]
    );
}

#[test]
fn contact_scan_covers_company_folders_missing_from_db() {
    let mut drive = FakeDrive::default()
        .with("root", &[("F1", "[NEW] New Client")])
        .with("F1", &[("C1", "[NEW001] Jane Doe")]);
    let mut store = FakeStore {
        contacts: records(&[("NEW001", 5, None)]),
        ..FakeStore::default()
    };

    let report = reconcile::audit(&mut drive, &mut store, &options(RunMode::DryRun, true))
        .expect("audit succeeds");

    assert_eq!(report.entries[0].outcome, Outcome::KeyNotFound);
    assert_eq!(report.entries[1].outcome, Outcome::Update);
    assert_eq!(report.entries[1].company_key.as_deref(), Some("NEW"));
}

#[test]
fn listing_failure_commits_nothing() {
    let mut drive = FakeDrive {
        failing_parent: Some("F2".to_string()),
        ..FakeDrive::default()
    }
    .with("root", &[("F1", "[ARR] Arralyze"), ("F2", "[BIO] Bio Labs")]);
    let mut store = FakeStore {
        companies: records(&[("ARR", 1, None), ("BIO", 2, None)]),
        ..FakeStore::default()
    };

    let result = reconcile::audit(&mut drive, &mut store, &options(RunMode::Apply, true));

    assert!(result.is_err());
    assert_eq!(store.commits, 0);
    assert!(store.committed.is_empty());
}
