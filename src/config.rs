//! Defaults and environment-sourced settings shared by the subcommands.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, ToolError};

/// Client projects folder holding one `[TLA] Client Name` folder per client.
pub const DEFAULT_CLIENT_PROJECTS_FOLDER: &str = "1PURGWZSK1gMTJN7GDYogY1Q0_ohsUkht";
/// Shared drive the client projects folder lives in.
pub const DEFAULT_SHARED_DRIVE: &str = "0AB1AZiOLJI_ZUk9PVA";
/// Client directory spreadsheet.
pub const DEFAULT_DIRECTORY_SHEET: &str = "1hSSJCG-QR6R6XIyB-CrxryDhA3_XqBt-SqhG9Oqy96E";
pub const DEFAULT_DIRECTORY_RANGE: &str = "A:L";

pub const DEFAULT_TOKEN_FILE: &str = "token.json";
pub const DEFAULT_SECRETS_FILE: &str = "client_secrets.json";

pub const DEFAULT_DB_NAME: &str = "bitesize_bio";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DB_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

const DB_HINT: &str = "Set DB_HOST, DB_NAME, DB_USER, DB_PASS (and optionally DB_PORT).";

/// Env files looked up in the working directory; the first one found is loaded.
const ENV_FILES: [&str; 2] = [".env", "scripts.env"];

/// Loads `KEY=value` pairs from the first env file found in `dir`. Variables
/// already present in the process environment win.
pub fn load_env_file(dir: &Path) {
    for name in ENV_FILES {
        let path = dir.join(name);
        if path.exists() {
            match dotenvy::from_path(&path) {
                Ok(()) => debug!(path = %path.display(), "loaded env file"),
                Err(err) => debug!(path = %path.display(), error = %err, "ignored env file"),
            }
            break;
        }
    }
}

/// Connection parameters of the directory database.
#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub name: String,
    pub user: String,
    pub password: String,
    pub port: u16,
}

impl DbConfig {
    /// Validates the raw values, failing on the first required one missing.
    pub fn from_parts(
        host: Option<String>,
        name: Option<String>,
        user: Option<String>,
        password: Option<String>,
        port: Option<u16>,
    ) -> Result<Self> {
        Ok(Self {
            host: required("DB_HOST", host)?,
            name: non_empty(name).unwrap_or_else(|| DEFAULT_DB_NAME.to_string()),
            user: required("DB_USER", user)?,
            password: required("DB_PASS", password)?,
            port: port.unwrap_or(DEFAULT_DB_PORT),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn required(name: &'static str, value: Option<String>) -> Result<String> {
    non_empty(value).ok_or(ToolError::MissingConfig {
        name,
        hint: DB_HINT,
    })
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"***")
            .field("port", &self.port)
            .finish()
    }
}
