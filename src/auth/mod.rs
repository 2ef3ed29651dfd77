//! OAuth2 credentials for the Google APIs.
//!
//! [`CredentialProvider`] is the seam the pipelines depend on. The
//! [`InstalledAppFlow`] implementation keeps a JSON token cache next to the
//! client secrets: a valid cached token is reused, an expired one is
//! refreshed, and otherwise the user is sent through the browser consent flow
//! with a loopback redirect.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use reqwest::Url;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{Result, ToolError};

pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";
pub const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";

/// Scopes requested for every token so one cache serves all subcommands.
pub const DEFAULT_SCOPES: [&str; 2] = [DRIVE_READONLY_SCOPE, SHEETS_READONLY_SCOPE];

/// Tokens expiring within this window are treated as expired.
const EXPIRY_SKEW_SECONDS: i64 = 60;

/// Access token as persisted in the token cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl StoredToken {
    pub fn covers(&self, scopes: &[String]) -> bool {
        scopes.iter().all(|scope| self.scopes.contains(scope))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry
            .is_some_and(|expiry| expiry - Duration::seconds(EXPIRY_SKEW_SECONDS) <= now)
    }

    /// Usable as-is: grants every scope and has not expired.
    pub fn is_valid_at(&self, now: DateTime<Utc>, scopes: &[String]) -> bool {
        !self.access_token.is_empty() && self.covers(scopes) && !self.is_expired_at(now)
    }
}

/// Source of access tokens with an explicit load / persist lifecycle.
pub trait CredentialProvider {
    /// Returns a valid token, refreshing or authorizing interactively when the
    /// cached one cannot be used.
    fn load_or_authenticate(&mut self) -> Result<StoredToken>;

    /// Stores a token for later runs.
    fn persist(&self, token: &StoredToken) -> Result<()>;
}

/// Token cache file.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `None` when the file is missing or unreadable as a token.
    pub fn load(&self) -> Result<Option<StoredToken>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&data) {
            Ok(token) => Ok(Some(token)),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring unreadable token cache");
                Ok(None)
            }
        }
    }

    pub fn save(&self, token: &StoredToken) -> Result<()> {
        fs::write(&self.path, serde_json::to_string_pretty(token)?)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ClientSecretsFile {
    #[serde(alias = "web")]
    installed: ClientSecrets,
}

/// OAuth client registration downloaded from the cloud console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ClientSecrets {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ToolError::MissingCredentials(path.to_path_buf()));
        }
        let data = fs::read_to_string(path)?;
        let file: ClientSecretsFile = serde_json::from_str(&data)?;
        Ok(file.installed)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    fn into_token(self, previous_refresh: Option<String>, requested: &[String]) -> StoredToken {
        let scopes = match self.scope {
            Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
            None => requested.to_vec(),
        };
        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expiry: self
                .expires_in
                .map(|seconds| Utc::now() + Duration::seconds(seconds)),
            scopes,
        }
    }
}

/// Desktop-app OAuth flow backed by a [`TokenCache`].
#[derive(Debug)]
pub struct InstalledAppFlow {
    cache: TokenCache,
    secrets_path: PathBuf,
    scopes: Vec<String>,
    http: Client,
}

impl InstalledAppFlow {
    pub fn new(cache: TokenCache, secrets_path: impl Into<PathBuf>, scopes: &[&str]) -> Self {
        Self {
            cache,
            secrets_path: secrets_path.into(),
            scopes: scopes.iter().map(|scope| scope.to_string()).collect(),
            http: Client::new(),
        }
    }

    fn refresh(&self, refresh_token: &str) -> Result<StoredToken> {
        let secrets = ClientSecrets::load(&self.secrets_path)?;
        let response: TokenResponse = self
            .http
            .post(&secrets.token_uri)
            .form(&[
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()?
            .error_for_status()?
            .json()?;
        Ok(response.into_token(Some(refresh_token.to_string()), &self.scopes))
    }

    fn authorize(&self) -> Result<StoredToken> {
        let secrets = ClientSecrets::load(&self.secrets_path)?;
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let redirect_uri = format!("http://127.0.0.1:{}/", listener.local_addr()?.port());
        let state = Uuid::new_v4().to_string();

        let url = authorization_url(&secrets, &redirect_uri, &self.scopes, &state)?;
        eprintln!("Open this URL in your browser to authorize access:\n\n{url}\n");

        let code = wait_for_code(&listener, &state)?;
        let response: TokenResponse = self
            .http
            .post(&secrets.token_uri)
            .form(&[
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
                ("code", code.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()?
            .error_for_status()?
            .json()?;
        Ok(response.into_token(None, &self.scopes))
    }
}

impl CredentialProvider for InstalledAppFlow {
    #[instrument(level = "debug", skip(self), fields(cache = %self.cache.path().display()))]
    fn load_or_authenticate(&mut self) -> Result<StoredToken> {
        let cached = self.cache.load()?;
        if let Some(token) = &cached {
            if token.is_valid_at(Utc::now(), &self.scopes) {
                debug!("using cached token");
                return Ok(token.clone());
            }
        }

        let refresh_token = cached
            .filter(|token| token.covers(&self.scopes))
            .and_then(|token| token.refresh_token);
        let refreshed = match refresh_token {
            Some(refresh_token) => match self.refresh(&refresh_token) {
                Ok(token) => Some(token),
                Err(err) => {
                    warn!(error = %err, "token refresh failed; re-authorizing");
                    None
                }
            },
            None => None,
        };

        let token = match refreshed {
            Some(token) => token,
            None => self.authorize()?,
        };
        self.persist(&token)?;
        info!("stored refreshed credentials");
        Ok(token)
    }

    fn persist(&self, token: &StoredToken) -> Result<()> {
        self.cache.save(token)
    }
}

/// Consent page URL requesting offline access for `scopes`.
pub fn authorization_url(
    secrets: &ClientSecrets,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
) -> Result<Url> {
    let scope = scopes.join(" ");
    Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ],
    )
    .map_err(|err| ToolError::Auth(format!("invalid auth_uri: {err}")))
}

fn wait_for_code(listener: &TcpListener, state: &str) -> Result<String> {
    let (mut stream, _) = listener.accept()?;
    let mut request_line = String::new();
    BufReader::new(&stream).read_line(&mut request_line)?;

    let result = parse_redirect(&request_line, state);
    let body = match &result {
        Ok(_) => "Authorization complete. You can close this window.",
        Err(_) => "Authorization failed. Return to the terminal for details.",
    };
    write!(
        stream,
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )?;
    result
}

/// Extracts the authorization code from the redirect request line
/// (`GET /?code=...&state=... HTTP/1.1`), checking the state value.
pub fn parse_redirect(request_line: &str, expected_state: &str) -> Result<String> {
    let target = request_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| ToolError::Auth("malformed redirect request".into()))?;
    let url = Url::parse("http://127.0.0.1")
        .and_then(|base| base.join(target))
        .map_err(|err| ToolError::Auth(format!("malformed redirect target: {err}")))?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => return Err(ToolError::Auth(format!("consent denied: {value}"))),
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        return Err(ToolError::Auth("state mismatch in redirect".into()));
    }
    code.ok_or_else(|| ToolError::Auth("redirect carried no authorization code".into()))
}
