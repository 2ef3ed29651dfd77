use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, ToolError};

const SHEETS_ENDPOINT: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Read-only Sheets v4 client.
#[derive(Debug, Clone)]
pub struct SheetsClient {
    http: Client,
    access_token: String,
}

impl SheetsClient {
    pub fn new(http: Client, access_token: impl Into<String>) -> Self {
        Self {
            http,
            access_token: access_token.into(),
        }
    }

    /// Returns the cells of `range` row by row, header included. Trailing
    /// empty cells are omitted by the API, so rows may be ragged.
    pub fn read_range(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
        let mut url = Url::parse(SHEETS_ENDPOINT)
            .map_err(|err| ToolError::InvalidWorkbook(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ToolError::InvalidWorkbook("sheets endpoint cannot be a base".into()))?
            .extend([spreadsheet_id, "values", range]);

        let body: ValueRange = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()?
            .error_for_status()?
            .json()?;

        Ok(body
            .values
            .into_iter()
            .map(|row| row.iter().map(value_to_string).collect())
            .collect())
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
