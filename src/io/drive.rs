use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::Result;
use crate::model::RemoteFolder;
use crate::reconcile::FolderSource;

const FILES_ENDPOINT: &str = "https://www.googleapis.com/drive/v3/files";
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    files: Vec<RemoteFolder>,
}

/// Drive v3 folder listing scoped to one shared drive.
#[derive(Debug, Clone)]
pub struct DriveClient {
    http: Client,
    access_token: String,
    shared_drive_id: String,
}

impl DriveClient {
    pub fn new(http: Client, access_token: impl Into<String>, shared_drive_id: impl Into<String>) -> Self {
        Self {
            http,
            access_token: access_token.into(),
            shared_drive_id: shared_drive_id.into(),
        }
    }

    fn fetch_page(&self, query: &str, page_token: Option<&str>) -> Result<FileList> {
        let mut params = vec![
            ("q", query),
            ("fields", "nextPageToken, files(id, name)"),
            ("pageSize", "1000"),
            ("includeItemsFromAllDrives", "true"),
            ("supportsAllDrives", "true"),
            ("corpora", "drive"),
            ("driveId", self.shared_drive_id.as_str()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let list = self
            .http
            .get(FILES_ENDPOINT)
            .bearer_auth(&self.access_token)
            .query(&params)
            .send()?
            .error_for_status()?
            .json()?;
        Ok(list)
    }
}

/// Query selecting the non-trashed folders directly inside `parent_id`.
pub fn child_folder_query(parent_id: &str) -> String {
    format!(
        "'{}' in parents and mimeType='{FOLDER_MIME_TYPE}' and trashed=false",
        parent_id.replace('\'', "\\'")
    )
}

impl FolderSource for DriveClient {
    fn list_children(&mut self, parent_id: &str) -> Result<Vec<RemoteFolder>> {
        let query = child_folder_query(parent_id);
        let mut folders = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.fetch_page(&query, page_token.as_deref())?;
            debug!(parent = parent_id, count = page.files.len(), "fetched folder page");
            folders.extend(page.files);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(folders)
    }
}
