// crates/github/src/client.rs
//! Blocking GitHub REST client for pull-request issue comments.

use std::time::Duration;

use jobbot_core::config::GithubSettings;
use jobbot_core::{CommentApi, RemoteError};
use jobbot_types::CommentHandle;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::{AppAuth, TokenSource};
use crate::error::GithubError;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("jobbot/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct IssueComment {
    id: u64,
    #[serde(default)]
    body: Option<String>,
}

impl From<IssueComment> for CommentHandle {
    fn from(c: IssueComment) -> Self {
        CommentHandle {
            comment_id: c.id,
            body: c.body.unwrap_or_default(),
        }
    }
}

#[derive(Serialize)]
struct EditBody<'a> {
    body: &'a str,
}

#[derive(Debug)]
pub struct GithubClient {
    http: Client,
    api_url: String,
    auth: TokenSource,
}

impl GithubClient {
    pub fn new(api_url: impl Into<String>, auth: TokenSource) -> Result<Self, GithubError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// Pick credentials from `[github]`: an explicit token, then App
    /// credentials, then the `GITHUB_TOKEN` environment variable.
    pub fn from_settings(settings: &GithubSettings) -> Result<Self, GithubError> {
        let api_url = settings.api_url.as_deref().unwrap_or(DEFAULT_API_URL);
        let auth = match (
            settings.token.as_deref().filter(|t| !t.is_empty()),
            settings.app_id,
            settings.installation_id,
            settings.private_key.as_deref(),
        ) {
            (Some(token), ..) => TokenSource::Static(token.to_string()),
            (None, Some(app_id), Some(installation_id), Some(key)) => {
                info!(app_id, installation_id, "authenticating as GitHub App");
                TokenSource::App(AppAuth::from_pem_file(app_id, installation_id, key)?)
            }
            _ => match std::env::var("GITHUB_TOKEN") {
                Ok(token) if !token.is_empty() => TokenSource::Static(token),
                _ => return Err(GithubError::MissingCredentials),
            },
        };
        Self::new(api_url, auth)
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn token(&self) -> Result<String, GithubError> {
        match &self.auth {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::App(app) => app.installation_token(&self.http, &self.api_url),
        }
    }

    fn authorized(&self, req: RequestBuilder) -> Result<RequestBuilder, GithubError> {
        Ok(req
            .bearer_auth(self.token()?)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28"))
    }

    fn comment_url(&self, repo: &str, comment_id: u64) -> String {
        format!("{}/repos/{repo}/issues/comments/{comment_id}", self.api_url)
    }

    fn list_page(&self, repo: &str, pr_number: u64, page: u32) -> Result<Vec<IssueComment>, GithubError> {
        let url = format!("{}/repos/{repo}/issues/{pr_number}/comments", self.api_url);
        let resp = self
            .authorized(self.http.get(&url))?
            .query(&[("per_page", PER_PAGE.to_string()), ("page", page.to_string())])
            .send()?;
        Ok(check(resp)?.json()?)
    }

    fn list_all(&self, repo: &str, pr_number: u64) -> Result<Vec<CommentHandle>, GithubError> {
        let mut out = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.list_page(repo, pr_number, page)?;
            let len = batch.len();
            out.extend(batch.into_iter().map(CommentHandle::from));
            if len < PER_PAGE {
                break;
            }
            page += 1;
        }
        debug!(repo, pr_number, count = out.len(), "listed PR comments");
        Ok(out)
    }

    fn get(&self, repo: &str, comment_id: u64) -> Result<Option<CommentHandle>, GithubError> {
        let resp = self
            .authorized(self.http.get(self.comment_url(repo, comment_id)))?
            .send()?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let comment: IssueComment = check(resp)?.json()?;
        Ok(Some(comment.into()))
    }

    fn edit(&self, repo: &str, comment_id: u64, body: &str) -> Result<Option<CommentHandle>, GithubError> {
        let resp = self
            .authorized(self.http.patch(self.comment_url(repo, comment_id)))?
            .json(&EditBody { body })
            .send()?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let comment: IssueComment = check(resp)?.json()?;
        Ok(Some(comment.into()))
    }
}

fn check(resp: Response) -> Result<Response, GithubError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    Err(GithubError::Status {
        status: status.as_u16(),
        body: resp.text().unwrap_or_default(),
    })
}

impl CommentApi for GithubClient {
    fn list_comments(&self, repo: &str, pr_number: u64) -> Result<Vec<CommentHandle>, RemoteError> {
        self.list_all(repo, pr_number)
            .map_err(|e| e.into_remote(format!("list comments of {repo}#{pr_number}")))
    }

    fn get_comment(&self, repo: &str, comment_id: u64) -> Result<Option<CommentHandle>, RemoteError> {
        self.get(repo, comment_id)
            .map_err(|e| e.into_remote(format!("get comment {comment_id} in {repo}")))
    }

    fn edit_comment(
        &self,
        repo: &str,
        comment_id: u64,
        body: &str,
    ) -> Result<Option<CommentHandle>, RemoteError> {
        self.edit(repo, comment_id, body)
            .map_err(|e| e.into_remote(format!("edit comment {comment_id} in {repo}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_comment_null_body_is_empty() {
        let c: IssueComment = serde_json::from_str(r#"{"id": 5, "body": null}"#).unwrap();
        let handle = CommentHandle::from(c);
        assert_eq!(handle.comment_id, 5);
        assert_eq!(handle.body, "");
    }

    #[test]
    fn test_api_url_trailing_slash_trimmed() {
        let client =
            GithubClient::new("http://localhost:1234/", TokenSource::Static("t".into())).unwrap();
        assert_eq!(client.api_url(), "http://localhost:1234");
        assert_eq!(
            client.comment_url("org/repo", 9),
            "http://localhost:1234/repos/org/repo/issues/comments/9"
        );
    }

    #[test]
    fn test_from_settings_prefers_explicit_token() {
        let settings = GithubSettings {
            api_url: Some("http://example.invalid".into()),
            token: Some("abc".into()),
            ..Default::default()
        };
        let client = GithubClient::from_settings(&settings).unwrap();
        assert!(matches!(client.auth, TokenSource::Static(ref t) if t == "abc"));
    }

    #[test]
    fn test_from_settings_missing_key_file() {
        let settings = GithubSettings {
            app_id: Some(1),
            installation_id: Some(2),
            private_key: Some("/nonexistent/key.pem".into()),
            ..Default::default()
        };
        let err = GithubClient::from_settings(&settings).unwrap_err();
        assert!(matches!(err, GithubError::Key { .. }));
    }

    #[test]
    fn test_status_error_carries_http_code() {
        let err = GithubError::Status {
            status: 502,
            body: "bad gateway".into(),
        };
        let remote = err.into_remote("edit comment 1 in org/repo");
        assert_eq!(remote.status, Some(502));
        assert!(remote.to_string().contains("HTTP 502"));
    }
}
