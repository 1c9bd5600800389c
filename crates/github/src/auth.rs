// crates/github/src/auth.rs
//! Credentials for the GitHub API: a fixed token, or a GitHub App
//! installation token minted from a signed JWT and renewed before it expires.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::GithubError;

/// Installation tokens closer than this to expiry are renewed.
pub const REFRESH_MARGIN: Duration = Duration::minutes(30);

const JWT_BACKDATE: Duration = Duration::seconds(60);
const JWT_LIFETIME: Duration = Duration::minutes(9);

pub enum TokenSource {
    Static(String),
    App(AppAuth),
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(_) => f.write_str("TokenSource::Static(..)"),
            Self::App(app) => f
                .debug_struct("TokenSource::App")
                .field("app_id", &app.app_id)
                .field("installation_id", &app.installation_id)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AppClaims {
    iss: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct InstallationToken {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

pub struct AppAuth {
    app_id: u64,
    installation_id: u64,
    key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl AppAuth {
    pub fn from_pem(app_id: u64, installation_id: u64, pem: &[u8]) -> Result<Self, GithubError> {
        Ok(Self {
            app_id,
            installation_id,
            key: EncodingKey::from_rsa_pem(pem)?,
            cached: Mutex::new(None),
        })
    }

    pub fn from_pem_file(
        app_id: u64,
        installation_id: u64,
        path: &Path,
    ) -> Result<Self, GithubError> {
        let pem = std::fs::read(path).map_err(|source| GithubError::Key {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_pem(app_id, installation_id, &pem)
    }

    pub fn installation_id(&self) -> u64 {
        self.installation_id
    }

    /// Short-lived RS256 JWT identifying the App.
    pub fn app_jwt(&self, now: DateTime<Utc>) -> Result<String, GithubError> {
        let claims = AppClaims {
            iss: self.app_id.to_string(),
            iat: (now - JWT_BACKDATE).timestamp(),
            exp: (now + JWT_LIFETIME).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::RS256), &claims, &self.key)?)
    }

    /// Cached installation token, exchanging a fresh JWT when needed.
    pub fn installation_token(
        &self,
        http: &reqwest::blocking::Client,
        api_url: &str,
    ) -> Result<String, GithubError> {
        let now = Utc::now();
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = cached.as_ref() {
            if token.expires_at - now > REFRESH_MARGIN {
                return Ok(token.token.clone());
            }
            debug!(expires_at = %token.expires_at, "installation token about to expire");
        }

        let url = format!(
            "{}/app/installations/{}/access_tokens",
            api_url.trim_end_matches('/'),
            self.installation_id
        );
        let resp = http
            .post(&url)
            .bearer_auth(self.app_jwt(now)?)
            .header("Accept", "application/vnd.github+json")
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GithubError::Status {
                status: status.as_u16(),
                body: resp.text().unwrap_or_default(),
            });
        }
        let fresh: InstallationToken = resp.json()?;
        info!(
            installation_id = self.installation_id,
            expires_at = %fresh.expires_at,
            "obtained installation token"
        );
        *cached = Some(CachedToken {
            token: fresh.token.clone(),
            expires_at: fresh.expires_at,
        });
        Ok(fresh.token)
    }
}
