use log::{debug, info};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{BuiltupError, Result};

/// Project used when neither EE_PROJECT nor the credentials file name one
pub const DEFAULT_PROJECT: &str = "earthengine-legacy";

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Refresh-token credentials written by `earthengine authenticate`
#[derive(Debug, Clone, Deserialize)]
pub struct EeCredentials {
    pub refresh_token: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub project: Option<String>,
}

/// Access token plus the project it is used against
#[derive(Debug, Clone)]
pub struct AccessGrant {
    pub access_token: String,
    pub project: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Location of the Earth Engine credentials file
///
/// EE_CREDENTIALS wins, otherwise `~/.config/earthengine/credentials`.
pub fn credentials_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("EE_CREDENTIALS") {
        return Ok(PathBuf::from(path));
    }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| BuiltupError::Auth("cannot locate home directory".to_string()))?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("earthengine")
        .join("credentials"))
}

/// Run the interactive notebook authentication flow of the `earthengine` CLI
pub fn authenticate_interactive() -> Result<()> {
    let status = Command::new("earthengine")
        .arg("authenticate")
        .arg("--auth_mode=notebook")
        .status()
        .map_err(|e| {
            BuiltupError::Auth(format!(
                "failed to execute earthengine authenticate ({}). Make sure earthengine-api is installed and in PATH",
                e
            ))
        })?;

    if !status.success() {
        return Err(BuiltupError::Auth(
            "earthengine authenticate did not complete".to_string(),
        ));
    }
    Ok(())
}

pub fn load_credentials(path: &Path) -> Result<EeCredentials> {
    let content = std::fs::read_to_string(path)?;
    let credentials: EeCredentials = serde_json::from_str(&content)?;
    Ok(credentials)
}

/// Exchange a refresh token for a short-lived access token
pub fn refresh_access_token(client: &Client, credentials: &EeCredentials) -> Result<String> {
    let (client_id, client_secret) = match (&credentials.client_id, &credentials.client_secret) {
        (Some(id), Some(secret)) => (id.as_str(), secret.as_str()),
        _ => {
            return Err(BuiltupError::Auth(
                "credentials file has no client_id/client_secret; set EE_ACCESS_TOKEN instead"
                    .to_string(),
            ))
        }
    };

    debug!("Refreshing access token at {}", TOKEN_URL);
    let response = client
        .post(TOKEN_URL)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", credentials.refresh_token.as_str()),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ])
        .send()?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().unwrap_or_default();
        return Err(BuiltupError::Auth(format!(
            "token endpoint returned {}: {}",
            status, body
        )));
    }

    let token: TokenResponse = response.json()?;
    Ok(token.access_token)
}

/// Resolve an access token and project, running the interactive flow once if needed
///
/// Order: EE_ACCESS_TOKEN, then the credentials file (created by the
/// interactive flow when missing).
pub fn resolve_access(client: &Client) -> Result<AccessGrant> {
    let env_project = std::env::var("EE_PROJECT").ok();

    if let Ok(access_token) = std::env::var("EE_ACCESS_TOKEN") {
        info!("Using access token from EE_ACCESS_TOKEN");
        return Ok(AccessGrant {
            access_token,
            project: env_project.unwrap_or_else(|| DEFAULT_PROJECT.to_string()),
        });
    }

    let path = credentials_path()?;
    if !path.exists() {
        info!("No credentials at {:?}, starting interactive authentication", path);
        authenticate_interactive()?;
    }

    let credentials = load_credentials(&path)?;
    let access_token = refresh_access_token(client, &credentials)?;
    let project = choose_project(env_project, &credentials);

    Ok(AccessGrant {
        access_token,
        project,
    })
}

fn choose_project(env_project: Option<String>, credentials: &EeCredentials) -> String {
    env_project
        .or_else(|| credentials.project.clone())
        .unwrap_or_else(|| DEFAULT_PROJECT.to_string())
}
