use reqwest::blocking::Client;
use serde::Deserialize;

use crate::error::Result;

const API_BASE: &str = "https://app.asana.com/api/1.0";

/// Custom field attached to a project.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CustomField {
    pub gid: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct FieldSetting {
    custom_field: CustomField,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    data: Vec<FieldSetting>,
}

/// Lists the custom fields configured on `project_gid`.
pub fn list_custom_fields(http: &Client, token: &str, project_gid: &str) -> Result<Vec<CustomField>> {
    let url = format!("{API_BASE}/projects/{project_gid}/custom_field_settings");
    let envelope: Envelope = http
        .get(url)
        .bearer_auth(token)
        .query(&[("opt_fields", "custom_field.name,custom_field.gid")])
        .send()?
        .error_for_status()?
        .json()?;
    Ok(envelope
        .data
        .into_iter()
        .map(|setting| setting.custom_field)
        .collect())
}
