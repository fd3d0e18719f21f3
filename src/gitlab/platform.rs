//! Gitlab Platform
use super::{
    config::GitlabSettings,
    types::{GitlabIssue, GitlabLabel, GitlabMergeRequest, GitlabMilestone, GitlabNote, GitlabProject},
    GITLAB_GIT_USERNAME, GITLAB_TOKEN_HEADER,
};
use crate::{
    errors::{MigrateError, MigrateErrorKind},
    model::{
        MergeRequestRecord, RepositoryDescriptor, SourceIssue, SourceLabel, SourceMilestone,
        SourceNote,
    },
    platform::{GitCredentials, PlatformFuture, PlatformType, SourcePlatform},
    request::{ensure_success, send_with_retry, Paginator, RetryPolicy},
};
use reqwest::{header::ACCEPT, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use urlencoding::encode;

/// Gitlab Platform
#[derive(Debug, Clone)]
pub struct GitlabPlatform {
    /// Instance host, for display
    host: String,

    /// `<instance>/api/v4`
    api_url: String,

    /// Gitlab token
    token: String,

    /// Group id or full path
    group: String,

    /// Rate limit retries
    retry: RetryPolicy,

    /// Reqwest client
    client: reqwest::Client,
}

impl GitlabPlatform {
    /// Create a new GitlabPlatform
    pub(crate) fn new(settings: &GitlabSettings, retry: RetryPolicy) -> Self {
        Self {
            host: settings.url.host_str().unwrap_or_default().to_string(),
            api_url: format!("{}/api/v4", settings.url.as_str().trim_end_matches('/')),
            token: settings.token.clone(),
            group: settings.group.clone(),
            retry,
            client: reqwest::Client::new(),
        }
    }

    /// Authenticated GET request
    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.api_url, path))
            .header(GITLAB_TOKEN_HEADER, &self.token)
            .header(ACCEPT, "application/json")
    }

    /// Fetch every page of a listing and convert the items
    async fn list<T, R>(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<R>, MigrateError>
    where
        T: DeserializeOwned + Send,
        R: From<T>,
    {
        let items: Vec<T> = Paginator::new(PlatformType::Gitlab, self.retry, || {
            self.get(path).query(query)
        })
        .collect_all()
        .await?;
        Ok(items.into_iter().map(R::from).collect())
    }

    /// Notes of an issue or merge request, oldest first
    async fn list_notes(
        &self,
        project_id: u64,
        noteable: &str,
        iid: u64,
    ) -> Result<Vec<SourceNote>, MigrateError> {
        self.list::<GitlabNote, _>(
            &format!("/projects/{project_id}/{noteable}/{iid}/notes"),
            &[("sort", "asc"), ("order_by", "created_at")],
        )
        .await
    }
}

impl SourcePlatform for GitlabPlatform {
    fn check_access(&self) -> PlatformFuture<'_, ()> {
        Box::pin(async move {
            let response = send_with_retry(self.get("/user"), &self.retry, PlatformType::Gitlab)
                .await?;
            ensure_success(response, PlatformType::Gitlab).await?;

            let group_path = format!("/groups/{}", encode(&self.group));
            let response =
                send_with_retry(self.get(&group_path), &self.retry, PlatformType::Gitlab).await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Err(MigrateError::new(MigrateErrorKind::Config)
                    .with_platform(PlatformType::Gitlab)
                    .with_text(&format!("group '{}' not found", self.group)));
            }
            ensure_success(response, PlatformType::Gitlab).await?;
            Ok(())
        })
    }

    fn get_all_repos(&self) -> PlatformFuture<'_, Vec<RepositoryDescriptor>> {
        Box::pin(async move {
            let path = format!("/groups/{}/projects", encode(&self.group));
            self.list::<GitlabProject, _>(
                &path,
                &[
                    ("include_subgroups", "true"),
                    ("order_by", "path"),
                    ("sort", "asc"),
                ],
            )
            .await
        })
    }

    fn list_labels(&self, project_id: u64) -> PlatformFuture<'_, Vec<SourceLabel>> {
        Box::pin(async move {
            self.list::<GitlabLabel, _>(&format!("/projects/{project_id}/labels"), &[])
                .await
        })
    }

    fn list_milestones(&self, project_id: u64) -> PlatformFuture<'_, Vec<SourceMilestone>> {
        Box::pin(async move {
            self.list::<GitlabMilestone, _>(&format!("/projects/{project_id}/milestones"), &[])
                .await
        })
    }

    fn list_issues(&self, project_id: u64) -> PlatformFuture<'_, Vec<SourceIssue>> {
        Box::pin(async move {
            self.list::<GitlabIssue, _>(
                &format!("/projects/{project_id}/issues"),
                &[
                    ("scope", "all"),
                    ("state", "all"),
                    ("order_by", "created_at"),
                    ("sort", "asc"),
                ],
            )
            .await
        })
    }

    fn list_merge_requests(
        &self,
        project_id: u64,
    ) -> PlatformFuture<'_, Vec<MergeRequestRecord>> {
        Box::pin(async move {
            self.list::<GitlabMergeRequest, _>(
                &format!("/projects/{project_id}/merge_requests"),
                &[
                    ("scope", "all"),
                    ("state", "all"),
                    ("order_by", "created_at"),
                    ("sort", "asc"),
                ],
            )
            .await
        })
    }

    fn list_issue_notes(&self, project_id: u64, iid: u64) -> PlatformFuture<'_, Vec<SourceNote>> {
        Box::pin(async move { self.list_notes(project_id, "issues", iid).await })
    }

    fn list_merge_request_notes(
        &self,
        project_id: u64,
        iid: u64,
    ) -> PlatformFuture<'_, Vec<SourceNote>> {
        Box::pin(async move { self.list_notes(project_id, "merge_requests", iid).await })
    }

    fn git_credentials(&self) -> GitCredentials {
        GitCredentials {
            username: GITLAB_GIT_USERNAME.to_string(),
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
    use crate::model::{IssueState, MergeRequestState, Visibility};
    use url::Url;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn platform(server: &MockServer) -> GitlabPlatform {
        let settings = GitlabSettings {
            url: Url::parse(&server.uri()).unwrap(),
            token: "glpat-test".to_string(),
            group: "platform/team".to_string(),
        };
        GitlabPlatform::new(&settings, fast_retry())
    }

    #[tokio::test]
    async fn lists_group_projects_across_pages() {
        let server = MockServer::start().await;
        let project = |id: u64, name: &str, visibility: &str| {
            serde_json::json!({
                "id": id,
                "name": name,
                "path": name,
                "description": null,
                "visibility": visibility,
                "default_branch": "main",
                "http_url_to_repo": format!("https://gitlab.example.com/platform/team/{name}.git"),
                "web_url": format!("https://gitlab.example.com/platform/team/{name}"),
            })
        };
        Mock::given(method("GET"))
            .and(path("/api/v4/groups/platform%2Fteam/projects"))
            .and(header("PRIVATE-TOKEN", "glpat-test"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([project(1, "api", "internal")]))
                    .insert_header("x-next-page", "2"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v4/groups/platform%2Fteam/projects"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([project(2, "web", "public")]))
                    .insert_header("x-next-page", ""),
            )
            .mount(&server)
            .await;

        let repos = platform(&server).get_all_repos().await.unwrap();
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0].source_id, 1);
        assert_eq!(repos[0].visibility, Visibility::Internal);
        assert_eq!(repos[0].description, "");
        assert_eq!(repos[1].name, "web");
        assert_eq!(repos[1].visibility, Visibility::Public);
    }

    #[tokio::test]
    async fn converts_issues_and_merge_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects/42/issues"))
            .and(query_param("state", "all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "iid": 3,
                "title": "Crash on start",
                "description": "Steps...",
                "state": "closed",
                "labels": ["bug"],
                "milestone": {"id": 9, "title": "v1.0"},
                "web_url": "https://gitlab.example.com/platform/team/api/-/issues/3"
            }])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects/42/merge_requests"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "iid": 5,
                "title": "Fix crash",
                "description": null,
                "state": "merged",
                "source_branch": "fix/crash",
                "target_branch": "main",
                "labels": [],
                "milestone": null,
                "web_url": "https://gitlab.example.com/platform/team/api/-/merge_requests/5"
            }])))
            .mount(&server)
            .await;

        let gitlab = platform(&server);
        let issues = gitlab.list_issues(42).await.unwrap();
        assert_eq!(issues[0].state, IssueState::Closed);
        assert_eq!(issues[0].milestone.as_deref(), Some("v1.0"));
        assert_eq!(issues[0].labels, vec!["bug".to_string()]);

        let mrs = gitlab.list_merge_requests(42).await.unwrap();
        assert_eq!(mrs[0].state, MergeRequestState::Merged);
        assert_eq!(mrs[0].source_branch, "fix/crash");
        assert_eq!(mrs[0].milestone, None);
    }

    #[tokio::test]
    async fn rejected_token_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/user"))
            .respond_with(ResponseTemplate::new(401).set_body_string("401 Unauthorized"))
            .mount(&server)
            .await;

        let error = platform(&server).check_access().await.unwrap_err();
        assert_eq!(error.kind(), MigrateErrorKind::Auth);
        assert!(error.is_fatal());
    }

    #[tokio::test]
    async fn unknown_group_is_a_config_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v4/groups/platform%2Fteam"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let error = platform(&server).check_access().await.unwrap_err();
        assert_eq!(error.kind(), MigrateErrorKind::Config);
    }

    #[test]
    fn git_credentials_use_oauth2() {
        let settings = GitlabSettings {
            url: Url::parse("https://gitlab.example.com").unwrap(),
            token: "glpat-test".to_string(),
            group: "team".to_string(),
        };
        let gitlab = GitlabPlatform::new(&settings, RetryPolicy::default());
        assert_eq!(gitlab.git_credentials().username, "oauth2");
        assert_eq!(gitlab.get_remote_url(), "gitlab.example.com");
        assert_eq!(gitlab.api_url, "https://gitlab.example.com/api/v4");
    }
}
