use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Folder entry returned when listing the children of a remote folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFolder {
    /// Opaque identifier assigned by the storage provider.
    pub id: String,
    /// Free-text display name.
    pub name: String,
}

impl RemoteFolder {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Level of the folder hierarchy a name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// `[TLA] Client Name` folders directly under the client projects root.
    Company,
    /// `[TLA001] Contact Name` folders nested inside a company folder.
    Contact,
}

impl Tier {
    /// Numeric label used in reports.
    pub fn number(self) -> u8 {
        match self {
            Tier::Company => 1,
            Tier::Contact => 2,
        }
    }

    /// Human readable name of the key the tier's grammar extracts.
    pub fn key_label(self) -> &'static str {
        match self {
            Tier::Company => "TLA",
            Tier::Contact => "CODE",
        }
    }

    /// Table the tier's records live in.
    pub fn table(self) -> &'static str {
        match self {
            Tier::Company => "clients",
            Tier::Contact => "bsb_client_codes",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Database row a folder may be linked to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord {
    /// Primary key of the row.
    pub record_id: i64,
    /// Folder id already stored on the row, if any. Empty strings are
    /// normalised to `None`.
    pub stored_folder_id: Option<String>,
}

impl DirectoryRecord {
    pub fn new(record_id: i64, stored_folder_id: Option<String>) -> Self {
        Self {
            record_id,
            stored_folder_id: stored_folder_id.filter(|id| !id.is_empty()),
        }
    }
}

/// Records of one tier keyed by their extracted code.
pub type RecordTable = BTreeMap<String, DirectoryRecord>;

/// Classification assigned to each folder by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    NonConforming,
    KeyNotFound,
    Conflict,
    AlreadySet,
    Update,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::NonConforming => "NON_CONFORMING",
            Outcome::KeyNotFound => "KEY_NOT_FOUND",
            Outcome::Conflict => "CONFLICT",
            Outcome::AlreadySet => "ALREADY_SET",
            Outcome::Update => "UPDATE",
        }
    }

    /// Short tag printed in progress lines.
    pub fn tag(self) -> &'static str {
        match self {
            Outcome::NonConforming => "SKIP",
            Outcome::KeyNotFound => "MISS",
            Outcome::Conflict => "CONF",
            Outcome::AlreadySet => "OK",
            Outcome::Update => "UPD",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a run only reports or also commits database writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    DryRun,
    Apply,
}

impl RunMode {
    pub fn from_apply_flag(apply: bool) -> Self {
        if apply { RunMode::Apply } else { RunMode::DryRun }
    }

    pub fn is_apply(self) -> bool {
        self == RunMode::Apply
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::DryRun => f.write_str("DRY-RUN"),
            RunMode::Apply => f.write_str("APPLY"),
        }
    }
}
