//! forge::github
//!
//! GitHub forge implementation over the REST API.
//!
//! # Authentication
//!
//! All API calls require an OAuth token with `repo` scope (or `public_repo`
//! for public repositories). The token comes from configuration; discovery
//! is out of scope here.
//!
//! # Rate limiting
//!
//! GitHub has rate limits. This implementation returns
//! `ForgeError::RateLimited` when limits are hit; retry policy lives in
//! [`crate::forge::retry`], not here.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use super::traits::{
    CreatePrRequest, Forge, ForgeError, PrState, PullRequest, RepoInfo, UpdatePrRequest,
};

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "ghstack";

/// GitHub forge implementation.
#[derive(Debug, Clone)]
pub struct GitHubForge {
    /// HTTP client for making requests
    client: Client,
    /// OAuth token for authentication
    token: String,
    /// Repository owner (user or organization)
    owner: String,
    /// Repository name
    repo: String,
    /// API base URL (configurable for GitHub Enterprise)
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GitHubRepo {
    node_id: String,
    default_branch: String,
    fork: bool,
}

#[derive(Debug, Deserialize)]
struct GitHubRefInfo {
    #[serde(rename = "ref")]
    ref_name: String,
}

#[derive(Debug, Deserialize)]
struct GitHubPull {
    number: u64,
    html_url: String,
    state: String,
    merged_at: Option<String>,
    title: String,
    body: Option<String>,
    head: GitHubRefInfo,
    base: GitHubRefInfo,
}

#[derive(Debug, Deserialize)]
struct GitHubComment {
    id: u64,
}

impl GitHubPull {
    fn into_pull_request(self) -> PullRequest {
        let state = if self.merged_at.is_some() {
            PrState::Merged
        } else if self.state == "open" {
            PrState::Open
        } else {
            PrState::Closed
        };
        PullRequest {
            number: self.number,
            url: self.html_url,
            state,
            head_ref: self.head.ref_name,
            base_ref: self.base.ref_name,
            title: self.title,
            body: self.body.unwrap_or_default(),
        }
    }
}

impl GitHubForge {
    /// Create a new GitHub forge bound to one repository.
    pub fn new(
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        github_url: &str,
    ) -> Self {
        let api_base = if github_url == "github.com" {
            "https://api.github.com".to_string()
        } else {
            // GitHub Enterprise serves the API under the host itself.
            format!("https://{}/api/v3", github_url)
        };
        Self {
            client: Client::new(),
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
            api_base,
        }
    }

    /// Get the repository owner.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Get the repository name.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Build common headers for API requests.
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.token))
                .expect("token is not header-safe"),
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers
    }

    /// Build URL for a repository endpoint.
    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.owner, self.repo, path
        )
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: Response,
    ) -> Result<T, ForgeError> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("failed to parse response: {}", e),
            })
        } else {
            self.handle_error_response(response, status).await
        }
    }

    /// Handle an error response from the API.
    async fn handle_error_response<T>(
        &self,
        response: Response,
        status: StatusCode,
    ) -> Result<T, ForgeError> {
        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "unknown error".to_string(),
        };

        Err(match status {
            StatusCode::UNAUTHORIZED => ForgeError::AuthFailed("invalid or expired token".into()),
            StatusCode::FORBIDDEN => ForgeError::AuthFailed(format!("permission denied: {}", message)),
            StatusCode::NOT_FOUND => ForgeError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited,
            _ => ForgeError::ApiError {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, ForgeError> {
        request
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))
    }
}

#[async_trait]
impl Forge for GitHubForge {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn get_repo(&self) -> Result<RepoInfo, ForgeError> {
        let url = format!("{}/repos/{}/{}", self.api_base, self.owner, self.repo);
        let response = self.send(self.client.get(&url)).await?;
        let repo: GitHubRepo = self.handle_response(response).await?;

        Ok(RepoInfo {
            id: repo.node_id,
            owner: self.owner.clone(),
            name: self.repo.clone(),
            default_branch: repo.default_branch,
            is_fork: repo.fork,
        })
    }

    async fn get_pr(&self, number: u64) -> Result<PullRequest, ForgeError> {
        let url = self.repo_url(&format!("pulls/{}", number));
        let response = self.send(self.client.get(&url)).await?;
        let pull: GitHubPull = self.handle_response(response).await?;
        Ok(pull.into_pull_request())
    }

    async fn list_open_prs(&self) -> Result<Vec<PullRequest>, ForgeError> {
        let mut pulls = Vec::new();
        let mut page = 1;
        loop {
            let url = self.repo_url(&format!("pulls?state=open&per_page=100&page={}", page));
            let response = self.send(self.client.get(&url)).await?;
            let batch: Vec<GitHubPull> = self.handle_response(response).await?;
            let done = batch.len() < 100;
            pulls.extend(batch.into_iter().map(GitHubPull::into_pull_request));
            if done {
                break;
            }
            page += 1;
        }
        Ok(pulls)
    }

    async fn create_pr(&self, request: CreatePrRequest) -> Result<PullRequest, ForgeError> {
        let url = self.repo_url("pulls");
        let payload = serde_json::json!({
            "head": request.head,
            "base": request.base,
            "title": request.title,
            "body": request.body,
            "draft": request.draft,
            "maintainer_can_modify": true,
        });
        let response = self.send(self.client.post(&url).json(&payload)).await?;
        let pull: GitHubPull = self.handle_response(response).await?;
        Ok(pull.into_pull_request())
    }

    async fn update_pr(&self, request: UpdatePrRequest) -> Result<PullRequest, ForgeError> {
        let url = self.repo_url(&format!("pulls/{}", request.number));
        let mut payload = serde_json::Map::new();
        if let Some(title) = request.title {
            payload.insert("title".into(), title.into());
        }
        if let Some(body) = request.body {
            payload.insert("body".into(), body.into());
        }
        if let Some(base) = request.base {
            payload.insert("base".into(), base.into());
        }

        let response = self.send(self.client.patch(&url).json(&payload)).await?;
        let pull: GitHubPull = self.handle_response(response).await?;
        Ok(pull.into_pull_request())
    }

    async fn close_pr(&self, number: u64) -> Result<(), ForgeError> {
        let url = self.repo_url(&format!("pulls/{}", number));
        let payload = serde_json::json!({ "state": "closed" });
        let response = self.send(self.client.patch(&url).json(&payload)).await?;
        let _: GitHubPull = self.handle_response(response).await?;
        Ok(())
    }

    async fn delete_branch(&self, name: &str) -> Result<(), ForgeError> {
        let url = self.repo_url(&format!("git/refs/heads/{}", name));
        let response = self.send(self.client.delete(&url)).await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            self.handle_error_response(response, status).await
        }
    }

    async fn create_comment(&self, pr_number: u64, body: &str) -> Result<u64, ForgeError> {
        let url = self.repo_url(&format!("issues/{}/comments", pr_number));
        let payload = serde_json::json!({ "body": body });
        let response = self.send(self.client.post(&url).json(&payload)).await?;
        let comment: GitHubComment = self.handle_response(response).await?;
        Ok(comment.id)
    }

    async fn update_comment(&self, comment_id: u64, body: &str) -> Result<(), ForgeError> {
        let url = self.repo_url(&format!("issues/comments/{}", comment_id));
        let payload = serde_json::json!({ "body": body });
        let response = self.send(self.client.patch(&url).json(&payload)).await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            self.handle_error_response(response, status).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_base_for_dotcom_and_enterprise() {
        let dotcom = GitHubForge::new("t", "o", "r", "github.com");
        assert_eq!(dotcom.api_base, "https://api.github.com");

        let ghe = GitHubForge::new("t", "o", "r", "github.example.com");
        assert_eq!(ghe.api_base, "https://github.example.com/api/v3");
    }

    #[test]
    fn pull_state_mapping() {
        let open = GitHubPull {
            number: 1,
            html_url: "u".into(),
            state: "open".into(),
            merged_at: None,
            title: "t".into(),
            body: None,
            head: GitHubRefInfo { ref_name: "h".into() },
            base: GitHubRefInfo { ref_name: "b".into() },
        };
        assert_eq!(open.into_pull_request().state, PrState::Open);

        let merged = GitHubPull {
            number: 1,
            html_url: "u".into(),
            state: "closed".into(),
            merged_at: Some("2024-01-01T00:00:00Z".into()),
            title: "t".into(),
            body: None,
            head: GitHubRefInfo { ref_name: "h".into() },
            base: GitHubRefInfo { ref_name: "b".into() },
        };
        assert_eq!(merged.into_pull_request().state, PrState::Merged);
    }

    #[test]
    fn missing_body_becomes_empty_string() {
        let pull = GitHubPull {
            number: 9,
            html_url: "u".into(),
            state: "closed".into(),
            merged_at: None,
            title: "t".into(),
            body: None,
            head: GitHubRefInfo { ref_name: "h".into() },
            base: GitHubRefInfo { ref_name: "b".into() },
        };
        let pr = pull.into_pull_request();
        assert_eq!(pr.state, PrState::Closed);
        assert_eq!(pr.body, "");
    }
}
