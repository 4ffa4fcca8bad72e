//! Remote version-controlled backend
//!
//! The artifact lives in a hosted repository and every write is a commit.
//! Concurrency control is the blob SHA: a write names the SHA it was based
//! on and the host refuses it if the file moved on. There is no retry or
//! merge here; the caller re-reads and resubmits.
//!
//! [`ContentApi`] is the seam to the host. [`GitHubApi`] speaks the GitHub
//! contents API; tests use an in-memory implementation.

use crate::backend::{ArtifactState, StorageBackend};
use crate::deploy::{DeployTrigger, NoopTrigger};
use crate::error::StoreError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use roster_record::Fingerprint;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default GitHub API endpoint
pub const GITHUB_API: &str = "https://api.github.com";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// A file fetched from the remote store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub content: Vec<u8>,
    /// Blob SHA of the current content
    pub sha: String,
}

/// File-level access to a hosted repository
#[async_trait]
pub trait ContentApi: Send + Sync {
    /// Fetch `path`; `None` if it does not exist
    async fn get(&self, path: &str) -> Result<Option<RemoteFile>, StoreError>;

    /// Commit new content for `path`, returning the new blob SHA
    ///
    /// `sha` is the blob being replaced, `None` to create the file.
    async fn put(
        &self,
        path: &str,
        content: &[u8],
        sha: Option<&str>,
        message: &str,
    ) -> Result<String, StoreError>;

    /// Human-readable location of `path`
    fn location(&self, path: &str) -> String;
}

#[async_trait]
impl<A: ContentApi + ?Sized> ContentApi for Arc<A> {
    async fn get(&self, path: &str) -> Result<Option<RemoteFile>, StoreError> {
        (**self).get(path).await
    }

    async fn put(
        &self,
        path: &str,
        content: &[u8],
        sha: Option<&str>,
        message: &str,
    ) -> Result<String, StoreError> {
        (**self).put(path, content, sha, message).await
    }

    fn location(&self, path: &str) -> String {
        (**self).location(path)
    }
}

/// Commit author/committer identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

/// Connection settings for [`GitHubApi`]
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub api_base: String,
    /// `owner/name`
    pub repository: String,
    pub branch: String,
    pub token: Option<String>,
    pub timeout: Duration,
    pub committer: Option<CommitAuthor>,
}

impl GitHubConfig {
    #[must_use]
    pub fn new(repository: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            api_base: GITHUB_API.to_string(),
            repository: repository.into(),
            branch: branch.into(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
            committer: None,
        }
    }
}

/// GitHub contents API client
pub struct GitHubApi {
    client: reqwest::Client,
    config: GitHubConfig,
}

impl std::fmt::Debug for GitHubApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubApi")
            .field("repository", &self.config.repository)
            .field("branch", &self.config.branch)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Debug, Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    committer: Option<&'a CommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: PutContent,
}

#[derive(Debug, Deserialize)]
struct PutContent {
    sha: String,
}

impl GitHubApi {
    /// Build a client with the configured timeout
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be constructed
    pub fn new(config: GitHubConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("roster/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Remote {
                status: 0,
                message: format!("failed to build http client: {e}"),
            })?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.repository,
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, self.url(path))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn transport_error(&self, path: &str, error: &reqwest::Error) -> StoreError {
        if error.is_timeout() || error.is_connect() || error.is_request() {
            StoreError::transient(self.location(path), error)
        } else {
            StoreError::Remote {
                status: error.status().map_or(0, |s| s.as_u16()),
                message: error.to_string(),
            }
        }
    }
}

/// Map a non-success status to a store error
fn status_error(location: String, expected: Option<&str>, status: u16, body: String) -> StoreError {
    let sha_rejected = status == 422 && body.contains("sha");
    if status == 409 || sha_rejected {
        StoreError::Conflict {
            location,
            expected: expected.map_or(Fingerprint::Absent, Fingerprint::digest),
        }
    } else if status >= 500 || status == 429 {
        StoreError::Transient {
            location,
            message: format!("status {status}: {body}"),
        }
    } else {
        StoreError::Remote {
            status,
            message: body,
        }
    }
}

#[async_trait]
impl ContentApi for GitHubApi {
    async fn get(&self, path: &str) -> Result<Option<RemoteFile>, StoreError> {
        let response = self
            .request(reqwest::Method::GET, path)
            .query(&[("ref", self.config.branch.as_str())])
            .send()
            .await
            .map_err(|e| self.transport_error(path, &e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(self.location(path), None, status.as_u16(), body));
        }

        let body: ContentsResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error(path, &e))?;
        if body.encoding != "base64" {
            return Err(StoreError::Remote {
                status: status.as_u16(),
                message: format!("unsupported content encoding '{}' for {path}", body.encoding),
            });
        }
        let packed: String = body.content.split_whitespace().collect();
        let content = BASE64.decode(packed).map_err(|e| StoreError::Remote {
            status: status.as_u16(),
            message: format!("invalid base64 content for {path}: {e}"),
        })?;

        Ok(Some(RemoteFile {
            content,
            sha: body.sha,
        }))
    }

    async fn put(
        &self,
        path: &str,
        content: &[u8],
        sha: Option<&str>,
        message: &str,
    ) -> Result<String, StoreError> {
        let request = PutRequest {
            message,
            content: BASE64.encode(content),
            branch: &self.config.branch,
            sha,
            committer: self.config.committer.as_ref(),
        };
        let response = self
            .request(reqwest::Method::PUT, path)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(path, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(self.location(path), sha, status.as_u16(), body));
        }
        let body: PutResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error(path, &e))?;
        Ok(body.content.sha)
    }

    fn location(&self, path: &str) -> String {
        format!(
            "github:{}@{}:{}",
            self.config.repository, self.config.branch, path
        )
    }
}

/// Backend for one artifact in a remote repository
pub struct RemoteBackend<A> {
    api: A,
    path: String,
    deploy: Arc<dyn DeployTrigger>,
}

impl<A: ContentApi> RemoteBackend<A> {
    /// Backend for `path` (repository-relative) with no deploy hook
    #[must_use]
    pub fn new(api: A, path: impl Into<String>) -> Self {
        Self {
            api,
            path: path.into(),
            deploy: Arc::new(NoopTrigger),
        }
    }

    /// Fire `deploy` after every successful write
    #[must_use]
    pub fn with_deploy(mut self, deploy: Arc<dyn DeployTrigger>) -> Self {
        self.deploy = deploy;
        self
    }

    #[inline]
    #[must_use]
    pub fn api(&self) -> &A {
        &self.api
    }
}

#[async_trait]
impl<A: ContentApi> StorageBackend for RemoteBackend<A> {
    async fn read(&self) -> Result<ArtifactState, StoreError> {
        let state = match self.api.get(&self.path).await? {
            Some(file) => ArtifactState::present(file.content, Fingerprint::digest(file.sha)),
            None => ArtifactState::absent(),
        };
        tracing::debug!(location = %self.describe(), fingerprint = state.fingerprint.short(), "read remote artifact");
        Ok(state)
    }

    async fn write(
        &self,
        content: &[u8],
        expected: &Fingerprint,
        message: &str,
    ) -> Result<Fingerprint, StoreError> {
        let sha = self
            .api
            .put(&self.path, content, expected.as_digest(), message)
            .await
            .map_err(|e| match e {
                StoreError::Conflict { location, .. } => StoreError::Conflict {
                    location,
                    expected: expected.clone(),
                },
                other => other,
            })?;

        let fingerprint = Fingerprint::digest(sha);
        tracing::info!(location = %self.describe(), fingerprint = fingerprint.short(), "committed remote artifact");
        self.deploy.trigger(&self.describe());
        Ok(fingerprint)
    }

    fn describe(&self) -> String {
        self.api.location(&self.path)
    }

    async fn settle(&self, within: Duration) {
        self.deploy.settle(within).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let conflict = status_error("x".into(), Some("abc"), 409, String::new());
        assert!(conflict.is_conflict());

        let stale = status_error("x".into(), Some("abc"), 422, "sha does not match".into());
        assert!(stale.is_conflict());

        let invalid = status_error("x".into(), None, 422, "Invalid request".into());
        assert!(matches!(invalid, StoreError::Remote { status: 422, .. }));

        let busy = status_error("x".into(), None, 502, "bad gateway".into());
        assert!(busy.is_retryable() && !busy.is_conflict());

        let denied = status_error("x".into(), None, 401, "Bad credentials".into());
        assert!(!denied.is_retryable());
    }

    #[test]
    fn url_joins_parts() {
        let mut config = GitHubConfig::new("org/site", "main");
        config.api_base = "https://example.test/api/".to_string();
        let api = GitHubApi::new(config).unwrap();
        assert_eq!(
            api.url("/data/teachers.json"),
            "https://example.test/api/repos/org/site/contents/data/teachers.json"
        );
        assert_eq!(api.location("data/teachers.json"), "github:org/site@main:data/teachers.json");
    }

    #[test]
    fn put_request_omits_absent_sha() {
        let request = PutRequest {
            message: "m",
            content: BASE64.encode(b"[]"),
            branch: "main",
            sha: None,
            committer: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("sha").is_none());
        assert_eq!(json["content"], "W10=");
    }
}
