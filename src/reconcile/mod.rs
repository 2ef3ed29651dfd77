//! Matching of remote folder names against directory records.
//!
//! Classification is a pure function of a folder and a [`RecordTable`]; the
//! [`audit`] function drives it over a folder hierarchy and stages write-backs
//! through a [`RecordStore`].

use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::model::{DirectoryRecord, Outcome, RecordTable, RemoteFolder, RunMode, Tier};
use crate::report::{AuditEntry, AuditReport};

static COMPANY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[([A-Z]{2,5})\]\s+(.+)$").expect("valid company pattern"));

static CONTACT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[([A-Z]{2,5}\d{3,4})\]\s+(.+)$").expect("valid contact pattern")
});

fn pattern(tier: Tier) -> &'static Regex {
    match tier {
        Tier::Company => &*COMPANY_PATTERN,
        Tier::Contact => &*CONTACT_PATTERN,
    }
}

/// Extracts the bracketed key from a folder name following the tier's naming
/// convention, e.g. `ARR` from `[ARR] Arralyze`.
pub fn extract_key(tier: Tier, name: &str) -> Option<&str> {
    pattern(tier)
        .captures(name)
        .and_then(|captures| captures.get(1))
        .map(|key| key.as_str())
}

/// Single-field update linking a record to an observed folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderLink {
    pub tier: Tier,
    pub record_id: i64,
    pub folder_id: String,
}

/// Result of classifying one folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub outcome: Outcome,
    pub key: Option<String>,
    pub note: Option<String>,
    /// Present only for [`Outcome::Update`].
    pub link: Option<FolderLink>,
}

/// Classifies a folder against the records of its tier.
pub fn classify(tier: Tier, folder: &RemoteFolder, records: &RecordTable) -> Classification {
    let Some(key) = extract_key(tier, &folder.name) else {
        return Classification {
            outcome: Outcome::NonConforming,
            key: None,
            note: Some(format!("Name does not match [{}] pattern", tier.key_label())),
            link: None,
        };
    };

    let Some(record) = records.get(key) else {
        return Classification {
            outcome: Outcome::KeyNotFound,
            key: Some(key.to_string()),
            note: Some(format!(
                "{} \"{key}\" not in {} table",
                tier.key_label(),
                tier.table()
            )),
            link: None,
        };
    };

    let (outcome, note) = compare(record, &folder.id);
    let link = (outcome == Outcome::Update).then(|| FolderLink {
        tier,
        record_id: record.record_id,
        folder_id: folder.id.clone(),
    });

    Classification {
        outcome,
        key: Some(key.to_string()),
        note,
        link,
    }
}

fn compare(record: &DirectoryRecord, observed: &str) -> (Outcome, Option<String>) {
    match record.stored_folder_id.as_deref().filter(|stored| !stored.is_empty()) {
        None => (Outcome::Update, None),
        Some(stored) if stored == observed => (Outcome::AlreadySet, None),
        Some(stored) => (
            Outcome::Conflict,
            Some(format!("DB already has folder_id {stored}")),
        ),
    }
}

/// Lists the child folders of a remote folder.
pub trait FolderSource {
    fn list_children(&mut self, parent_id: &str) -> Result<Vec<RemoteFolder>>;
}

/// Database side of the reconciliation.
pub trait RecordStore {
    /// Loads every record of the tier keyed by its code.
    fn load_records(&mut self, tier: Tier) -> Result<RecordTable>;

    /// Queues a folder id write for the next [`commit`](RecordStore::commit).
    fn stage_link(&mut self, link: FolderLink) -> Result<()>;

    /// Writes all staged links atomically and returns how many were written.
    fn commit(&mut self) -> Result<usize>;
}

/// Settings for a single audit run.
#[derive(Debug, Clone)]
pub struct AuditOptions {
    /// Folder whose children are the company folders.
    pub root_folder_id: String,
    /// Also scan the contact folders nested in each company folder.
    pub include_contacts: bool,
    pub mode: RunMode,
}

/// Reconciles the folder hierarchy under `options.root_folder_id` with the
/// directory records and returns the audit report.
///
/// Staged writes are only committed after every folder has been classified,
/// so a transport error part way through leaves the database untouched.
#[instrument(
    level = "info",
    skip_all,
    fields(root = %options.root_folder_id, mode = %options.mode, contacts = options.include_contacts)
)]
pub fn audit<S, R>(source: &mut S, store: &mut R, options: &AuditOptions) -> Result<AuditReport>
where
    S: FolderSource + ?Sized,
    R: RecordStore + ?Sized,
{
    let companies = store.load_records(Tier::Company)?;
    let contacts = if options.include_contacts {
        store.load_records(Tier::Contact)?
    } else {
        RecordTable::new()
    };
    info!(
        companies = companies.len(),
        contacts = contacts.len(),
        "loaded directory records"
    );

    let mut company_folders = source.list_children(&options.root_folder_id)?;
    company_folders.sort_by(|lhs, rhs| lhs.name.cmp(&rhs.name));
    info!(count = company_folders.len(), "listed company folders");

    let mut entries = Vec::new();
    let mut eligible = 0;

    for folder in &company_folders {
        let classification = classify(Tier::Company, folder, &companies);
        let parent_key = classification.key.clone();
        eligible += record(
            &mut entries,
            store,
            options.mode,
            Tier::Company,
            folder,
            None,
            classification,
        )?;

        let Some(parent_key) = parent_key.filter(|_| options.include_contacts) else {
            continue;
        };

        let mut contact_folders = source.list_children(&folder.id)?;
        contact_folders.sort_by(|lhs, rhs| lhs.name.cmp(&rhs.name));
        for contact in &contact_folders {
            let classification = classify(Tier::Contact, contact, &contacts);
            eligible += record(
                &mut entries,
                store,
                options.mode,
                Tier::Contact,
                contact,
                Some(&parent_key),
                classification,
            )?;
        }
    }

    let written = if options.mode.is_apply() {
        store.commit()?
    } else {
        0
    };

    Ok(AuditReport {
        entries,
        mode: options.mode,
        eligible,
        written,
    })
}

/// Appends the report entry for one folder and stages its write-back when
/// applying. Returns 1 when the folder is eligible for a write-back.
fn record<R: RecordStore + ?Sized>(
    entries: &mut Vec<AuditEntry>,
    store: &mut R,
    mode: RunMode,
    tier: Tier,
    folder: &RemoteFolder,
    parent_key: Option<&str>,
    classification: Classification,
) -> Result<usize> {
    match classification.outcome {
        Outcome::Conflict => warn!(
            tier = tier.number(),
            name = %folder.name,
            "[{}] stored folder differs",
            classification.outcome.tag()
        ),
        outcome => info!(tier = tier.number(), name = %folder.name, "[{}]", outcome.tag()),
    }

    let eligible = usize::from(classification.link.is_some());
    if let Some(link) = classification.link.filter(|_| mode.is_apply()) {
        store.stage_link(link)?;
    }

    let (company_key, contact_key) = match tier {
        Tier::Company => (classification.key, None),
        Tier::Contact => (parent_key.map(str::to_string), classification.key),
    };

    entries.push(AuditEntry {
        tier,
        name: folder.name.clone(),
        folder_id: folder.id.clone(),
        company_key,
        contact_key,
        outcome: classification.outcome,
        note: classification.note,
    });

    Ok(eligible)
}
