//! Github Platform
use super::{
    config::GithubSettings,
    types::{
        CreateComment, CreateIssue, CreatePullRequest, CreateRepo, EditIssue, EditRepo, Numbered,
        RepoGithub,
    },
    GITHUB_API_HEADER, GITHUB_API_VERSION, GITHUB_GIT_USERNAME,
};
use crate::{
    errors::{MigrateError, MigrateErrorKind},
    mapper::{
        sanitize_single_line, Associations, IssueRecord, LabelPayload, MilestonePayload,
        PullRequestPayload,
    },
    model::{DestinationRepo, RepositoryDescriptor},
    platform::{DestinationPlatform, GitCredentials, PlatformFuture, PlatformType},
    request::{ensure_success, send_with_retry, RetryPolicy},
};
use log::{info, warn};
use reqwest::{
    header::{ACCEPT, AUTHORIZATION, USER_AGENT},
    Method, RequestBuilder, Response, StatusCode,
};
use serde::de::DeserializeOwned;
use urlencoding::encode;

/// Github Platform
#[derive(Debug, Clone)]
pub struct GithubPlatform {
    /// Web host, for display
    host: String,

    /// API url without trailing slash
    api_url: String,

    /// Organization receiving the repositories
    org: String,

    /// Github token
    token: String,

    /// Rate limit retries
    retry: RetryPolicy,

    /// Reqwest client
    client: reqwest::Client,
}

impl GithubPlatform {
    /// Create a new GithubPlatform
    pub(crate) fn new(settings: &GithubSettings, retry: RetryPolicy) -> Self {
        let api_host = settings.api_url.host_str().unwrap_or_default();
        Self {
            host: api_host.strip_prefix("api.").unwrap_or(api_host).to_string(),
            api_url: settings.api_url.as_str().trim_end_matches('/').to_string(),
            org: settings.org.clone(),
            token: settings.token.clone(),
            retry,
            client: reqwest::Client::new(),
        }
    }

    /// Authenticated request
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.api_url, path))
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, env!("CARGO_PKG_NAME"))
            .header(GITHUB_API_HEADER, GITHUB_API_VERSION)
    }

    /// Path of a repository of the organization
    fn repo_path(&self, repo: &str) -> String {
        format!("/repos/{}/{}", encode(&self.org), encode(repo))
    }

    /// Send with retries, without checking the status
    async fn send_raw(&self, request: RequestBuilder) -> Result<Response, MigrateError> {
        send_with_retry(request, &self.retry, PlatformType::Github).await
    }

    /// Send with retries and fail on a non-success status
    async fn send(&self, request: RequestBuilder) -> Result<Response, MigrateError> {
        let response = self.send_raw(request).await?;
        ensure_success(response, PlatformType::Github).await
    }

    /// Send and parse the response body
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, MigrateError> {
        let text = self.send(request).await?.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Edit an issue (pull requests are issues for labels and milestones)
    async fn edit_issue(
        &self,
        repo: &str,
        number: u64,
        edit: &EditIssue<'_>,
    ) -> Result<(), MigrateError> {
        let path = format!("{}/issues/{number}", self.repo_path(repo));
        self.send(self.request(Method::PATCH, &path).json(edit))
            .await?;
        Ok(())
    }
}

impl DestinationPlatform for GithubPlatform {
    fn check_access(&self) -> PlatformFuture<'_, ()> {
        Box::pin(async move {
            self.send(self.request(Method::GET, "/user")).await?;
            let response = self
                .send_raw(self.request(Method::GET, &format!("/orgs/{}", encode(&self.org))))
                .await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Err(MigrateError::new(MigrateErrorKind::Config)
                    .with_platform(PlatformType::Github)
                    .with_text(&format!("organization '{}' not found", self.org)));
            }
            ensure_success(response, PlatformType::Github).await?;
            Ok(())
        })
    }

    fn ensure_repository<'a>(
        &'a self,
        repo: &'a RepositoryDescriptor,
        private: bool,
    ) -> PlatformFuture<'a, DestinationRepo> {
        Box::pin(async move {
            let path = self.repo_path(&repo.name);
            let response = self.send_raw(self.request(Method::GET, &path)).await?;
            if response.status() == StatusCode::NOT_FOUND {
                let body = CreateRepo {
                    name: &repo.name,
                    description: sanitize_single_line(&repo.description),
                    private,
                    auto_init: false,
                };
                let created: RepoGithub = self
                    .send_json(
                        self.request(Method::POST, &format!("/orgs/{}/repos", encode(&self.org)))
                            .json(&body),
                    )
                    .await?;
                info!(
                    "Created {}/{} (private: {})",
                    self.org, created.name, created.private
                );
                return Ok(DestinationRepo {
                    name: created.name,
                    clone_url: created.clone_url,
                    created: true,
                    private: created.private,
                });
            }
            let text = ensure_success(response, PlatformType::Github)
                .await?
                .text()
                .await?;
            let existing: RepoGithub = serde_json::from_str(&text)?;
            warn!(
                "{}/{} already exists, its content will be overwritten",
                self.org, existing.name
            );
            if existing.private != private {
                let edit = EditRepo {
                    private: Some(private),
                    ..Default::default()
                };
                self.send(self.request(Method::PATCH, &path).json(&edit))
                    .await?;
                info!("Set {}/{} private: {private}", self.org, existing.name);
            }
            Ok(DestinationRepo {
                name: existing.name,
                clone_url: existing.clone_url,
                created: false,
                private,
            })
        })
    }

    fn set_default_branch<'a>(&'a self, repo: &'a str, branch: &'a str) -> PlatformFuture<'a, ()> {
        Box::pin(async move {
            let edit = EditRepo {
                default_branch: Some(branch),
                ..Default::default()
            };
            self.send(self.request(Method::PATCH, &self.repo_path(repo)).json(&edit))
                .await?;
            info!("Set {}/{repo} default branch: {branch}", self.org);
            Ok(())
        })
    }

    fn branch_exists<'a>(&'a self, repo: &'a str, branch: &'a str) -> PlatformFuture<'a, bool> {
        Box::pin(async move {
            let path = format!("{}/branches/{}", self.repo_path(repo), encode(branch));
            let response = self.send_raw(self.request(Method::GET, &path)).await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Ok(false);
            }
            ensure_success(response, PlatformType::Github).await?;
            Ok(true)
        })
    }

    fn create_label<'a>(
        &'a self,
        repo: &'a str,
        label: &'a LabelPayload,
    ) -> PlatformFuture<'a, ()> {
        Box::pin(async move {
            let path = format!("{}/labels", self.repo_path(repo));
            self.send(self.request(Method::POST, &path).json(label))
                .await?;
            Ok(())
        })
    }

    fn create_milestone<'a>(
        &'a self,
        repo: &'a str,
        milestone: &'a MilestonePayload,
    ) -> PlatformFuture<'a, u64> {
        Box::pin(async move {
            let path = format!("{}/milestones", self.repo_path(repo));
            let created: Numbered = self
                .send_json(self.request(Method::POST, &path).json(milestone))
                .await?;
            Ok(created.number)
        })
    }

    fn create_issue<'a>(
        &'a self,
        repo: &'a str,
        issue: &'a IssueRecord,
        associations: &'a Associations,
    ) -> PlatformFuture<'a, u64> {
        Box::pin(async move {
            let path = format!("{}/issues", self.repo_path(repo));
            let body = CreateIssue {
                title: &issue.title,
                body: &issue.description,
                labels: &associations.labels,
                milestone: associations.milestone,
            };
            let created: Numbered = self
                .send_json(self.request(Method::POST, &path).json(&body))
                .await?;
            Ok(created.number)
        })
    }

    fn close_issue<'a>(&'a self, repo: &'a str, number: u64) -> PlatformFuture<'a, ()> {
        Box::pin(async move {
            let edit = EditIssue {
                state: Some("closed"),
                ..Default::default()
            };
            self.edit_issue(repo, number, &edit).await
        })
    }

    fn create_pull_request<'a>(
        &'a self,
        repo: &'a str,
        pull_request: &'a PullRequestPayload,
    ) -> PlatformFuture<'a, u64> {
        Box::pin(async move {
            let path = format!("{}/pulls", self.repo_path(repo));
            let body = CreatePullRequest {
                title: &pull_request.title,
                body: &pull_request.body,
                head: &pull_request.head,
                base: &pull_request.base,
            };
            let created: Numbered = self
                .send_json(self.request(Method::POST, &path).json(&body))
                .await?;
            Ok(created.number)
        })
    }

    fn assign<'a>(
        &'a self,
        repo: &'a str,
        number: u64,
        associations: &'a Associations,
    ) -> PlatformFuture<'a, ()> {
        Box::pin(async move {
            if associations.labels.is_empty() && associations.milestone.is_none() {
                return Ok(());
            }
            let edit = EditIssue {
                state: None,
                labels: (!associations.labels.is_empty()).then_some(&associations.labels[..]),
                milestone: associations.milestone,
            };
            self.edit_issue(repo, number, &edit).await
        })
    }

    fn close_pull_request<'a>(&'a self, repo: &'a str, number: u64) -> PlatformFuture<'a, ()> {
        Box::pin(async move {
            let path = format!("{}/pulls/{number}", self.repo_path(repo));
            let edit = EditIssue {
                state: Some("closed"),
                ..Default::default()
            };
            self.send(self.request(Method::PATCH, &path).json(&edit))
                .await?;
            Ok(())
        })
    }

    fn create_comment<'a>(
        &'a self,
        repo: &'a str,
        number: u64,
        body: &'a str,
    ) -> PlatformFuture<'a, ()> {
        Box::pin(async move {
            let path = format!("{}/issues/{number}/comments", self.repo_path(repo));
            self.send(self.request(Method::POST, &path).json(&CreateComment { body }))
                .await?;
            Ok(())
        })
    }

    fn git_credentials(&self) -> GitCredentials {
        GitCredentials {
            username: GITHUB_GIT_USERNAME.to_string(),
            token: self.token.clone(),
        }
    }

    fn get_remote_url(&self) -> &str {
        &self.host
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::fast_retry;
    use crate::model::{IssueState, Visibility};
    use std::collections::BTreeSet;
    use url::Url;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn platform(server: &MockServer) -> GithubPlatform {
        let settings = GithubSettings {
            api_url: Url::parse(&server.uri()).unwrap(),
            token: "ghp_test".to_string(),
            org: "acme".to_string(),
        };
        GithubPlatform::new(&settings, fast_retry())
    }

    fn descriptor(visibility: Visibility) -> RepositoryDescriptor {
        RepositoryDescriptor {
            source_id: 1,
            name: "api".to_string(),
            path: "api".to_string(),
            description: "Backend\u{0} API".to_string(),
            visibility,
            ..Default::default()
        }
    }

    fn repo_json(private: bool) -> serde_json::Value {
        serde_json::json!({
            "name": "api",
            "private": private,
            "clone_url": "https://github.com/acme/api.git"
        })
    }

    #[tokio::test]
    async fn creates_missing_repository() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/api"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/orgs/acme/repos"))
            .and(header("authorization", "Bearer ghp_test"))
            .and(body_json(serde_json::json!({
                "name": "api",
                "description": "Backend API",
                "private": true,
                "auto_init": false
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(repo_json(true)))
            .expect(1)
            .mount(&server)
            .await;

        let repo = descriptor(Visibility::Public);
        let destination = platform(&server)
            .ensure_repository(&repo, true)
            .await
            .unwrap();
        assert!(destination.created);
        assert!(destination.private);
        assert_eq!(destination.clone_url, "https://github.com/acme/api.git");
    }

    #[tokio::test]
    async fn existing_repository_gets_visibility_applied() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/api"))
            .respond_with(ResponseTemplate::new(200).set_body_json(repo_json(false)))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/repos/acme/api"))
            .and(body_json(serde_json::json!({"private": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(repo_json(true)))
            .expect(1)
            .mount(&server)
            .await;

        let repo = descriptor(Visibility::Public);
        let destination = platform(&server)
            .ensure_repository(&repo, true)
            .await
            .unwrap();
        assert!(!destination.created);
        assert!(destination.private);
    }

    #[tokio::test]
    async fn default_branch_is_patched() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/repos/acme/api"))
            .and(body_json(serde_json::json!({"default_branch": "main"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(repo_json(false)))
            .expect(1)
            .mount(&server)
            .await;

        platform(&server)
            .set_default_branch("api", "main")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_default_branch_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/repos/acme/api"))
            .respond_with(
                ResponseTemplate::new(422).set_body_string(r#"{"message":"Validation Failed"}"#),
            )
            .mount(&server)
            .await;

        let error = platform(&server)
            .set_default_branch("api", "gone")
            .await
            .unwrap_err();
        assert_eq!(error.kind(), MigrateErrorKind::UnknownApi);
    }

    #[tokio::test]
    async fn branch_existence_follows_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/api/branches/main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/api/branches/feature%2Fgone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let github = platform(&server);
        assert!(github.branch_exists("api", "main").await.unwrap());
        assert!(!github.branch_exists("api", "feature/gone").await.unwrap());
    }

    #[tokio::test]
    async fn creates_issue_with_associations() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/api/issues"))
            .and(body_json(serde_json::json!({
                "title": "Crash",
                "body": "Steps",
                "labels": ["bug"],
                "milestone": 2
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"number": 12})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/repos/acme/api/issues/12"))
            .and(body_json(serde_json::json!({"state": "closed"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"number": 12})))
            .expect(1)
            .mount(&server)
            .await;

        let github = platform(&server);
        let issue = IssueRecord {
            iid: 1,
            title: "Crash".to_string(),
            description: "Steps".to_string(),
            labels: BTreeSet::new(),
            milestone: None,
            state: IssueState::Closed,
        };
        let associations = Associations {
            labels: vec!["bug".to_string()],
            milestone: Some(2),
        };
        let number = github
            .create_issue("api", &issue, &associations)
            .await
            .unwrap();
        assert_eq!(number, 12);
        github.close_issue("api", number).await.unwrap();
    }

    #[tokio::test]
    async fn label_payload_has_no_hash() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/api/labels"))
            .and(body_json(serde_json::json!({"name": "bug", "color": "d73a4a"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let label = LabelPayload {
            name: "bug".to_string(),
            color: "d73a4a".to_string(),
            description: None,
        };
        platform(&server).create_label("api", &label).await.unwrap();
    }

    #[tokio::test]
    async fn validation_failures_are_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/api/pulls"))
            .respond_with(
                ResponseTemplate::new(422).set_body_string(r#"{"message":"Validation Failed"}"#),
            )
            .mount(&server)
            .await;

        let pull_request = PullRequestPayload {
            iid: 1,
            title: "Fix".to_string(),
            body: String::new(),
            head: "fix".to_string(),
            base: "main".to_string(),
            labels: BTreeSet::new(),
            milestone: None,
            state: Default::default(),
        };
        let error = platform(&server)
            .create_pull_request("api", &pull_request)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), MigrateErrorKind::UnknownApi);
        assert!(error.to_string().contains("Validation Failed"));
    }

    #[tokio::test]
    async fn missing_organization_is_a_config_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let error = platform(&server).check_access().await.unwrap_err();
        assert_eq!(error.kind(), MigrateErrorKind::Config);
        assert!(error.is_fatal());
    }
}
