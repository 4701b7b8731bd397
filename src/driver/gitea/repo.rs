use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::RepoResponse;
use crate::driver::{null_default, Api};
use crate::scm::{
    self, require, split_name, Context, Hook, HookInput, ListOptions, Perm, Repository,
    Response, ScmError, ScmResult,
};

pub(super) struct RepositoryService {
    api: Api,
}

impl RepositoryService {
    pub(super) fn new(api: Api) -> Self {
        Self { api }
    }
}

#[derive(Debug, Deserialize)]
struct HookResponse {
    id: u64,
    #[serde(rename = "type", default, deserialize_with = "null_default")]
    kind: String,
    #[serde(default, deserialize_with = "null_default")]
    events: Vec<String>,
    #[serde(default)]
    active: bool,
    config: HookConfig,
}

#[derive(Debug, Deserialize)]
struct HookConfig {
    #[serde(default, deserialize_with = "null_default")]
    url: String,
}

impl From<HookResponse> for Hook {
    fn from(h: HookResponse) -> Self {
        Hook {
            id: h.id.to_string(),
            name: h.kind,
            target: h.config.url,
            events: h.events,
            active: h.active,
            skip_verify: false,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateHookRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    config: CreateHookConfig<'a>,
    events: Vec<String>,
    active: bool,
}

#[derive(Debug, Serialize)]
struct CreateHookConfig<'a> {
    url: &'a str,
    content_type: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    secret: &'a str,
}

impl<'a> CreateHookRequest<'a> {
    fn new(input: &'a HookInput) -> Self {
        let events = if input.events.is_empty() {
            vec!["push".to_string()]
        } else {
            input.events.clone()
        };
        Self {
            kind: "gitea",
            config: CreateHookConfig {
                url: &input.target,
                content_type: "json",
                secret: &input.secret,
            },
            events,
            active: true,
        }
    }
}

fn hook_id(id: &str) -> Result<u64, ScmError> {
    id.trim()
        .parse()
        .map_err(|_| ScmError::Validation(format!("hook id must be numeric, got {id:?}")))
}

#[async_trait]
impl scm::RepositoryService for RepositoryService {
    #[instrument(skip(self, ctx))]
    async fn find(&self, ctx: &Context, repo: &str) -> ScmResult<Repository> {
        split_name(repo)?;
        let path = format!("repos/{repo}");
        let (raw, res) = self.api.get::<RepoResponse>(ctx, "find_repo", repo, &path).await?;
        Ok((raw.into(), res))
    }

    #[instrument(skip(self, ctx))]
    async fn find_perms(&self, ctx: &Context, repo: &str) -> ScmResult<Perm> {
        split_name(repo)?;
        let path = format!("repos/{repo}");
        let (raw, res) = self.api.get::<RepoResponse>(ctx, "find_perms", repo, &path).await?;
        Ok((raw.permissions.map(Perm::from).unwrap_or_default(), res))
    }

    #[instrument(skip(self, ctx))]
    async fn list(&self, ctx: &Context, opts: &ListOptions) -> ScmResult<Vec<Repository>> {
        let (raw, res) = self
            .api
            .list::<RepoResponse>(ctx, "list_repos", "user", "user/repos", opts, &[])
            .await?;
        Ok((raw.into_iter().map(Repository::from).collect(), res))
    }

    #[instrument(skip(self, ctx))]
    async fn list_hooks(
        &self,
        ctx: &Context,
        repo: &str,
        opts: &ListOptions,
    ) -> ScmResult<Vec<Hook>> {
        split_name(repo)?;
        let path = format!("repos/{repo}/hooks");
        let (raw, res) = self
            .api
            .list::<HookResponse>(ctx, "list_hooks", repo, &path, opts, &[])
            .await?;
        Ok((raw.into_iter().map(Hook::from).collect(), res))
    }

    #[instrument(skip(self, ctx))]
    async fn find_hook(&self, ctx: &Context, repo: &str, id: &str) -> ScmResult<Hook> {
        split_name(repo)?;
        let id = hook_id(id)?;
        let path = format!("repos/{repo}/hooks/{id}");
        let (raw, res) = self
            .api
            .get::<HookResponse>(ctx, "find_hook", &format!("{repo}#{id}"), &path)
            .await?;
        Ok((raw.into(), res))
    }

    #[instrument(skip(self, ctx, input), fields(target = %input.target))]
    async fn create_hook(&self, ctx: &Context, repo: &str, input: &HookInput) -> ScmResult<Hook> {
        split_name(repo)?;
        require("hook target", &input.target)?;
        let path = format!("repos/{repo}/hooks");
        let body = CreateHookRequest::new(input);
        let (raw, res) = self
            .api
            .post::<_, HookResponse>(ctx, "create_hook", repo, &path, &body)
            .await?;
        Ok((raw.into(), res))
    }

    #[instrument(skip(self, ctx))]
    async fn delete_hook(&self, ctx: &Context, repo: &str, id: &str) -> Result<Response, ScmError> {
        split_name(repo)?;
        let id = hook_id(id)?;
        let path = format!("repos/{repo}/hooks/{id}");
        self.api
            .delete(ctx, "delete_hook", &format!("{repo}#{id}"), &path)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use reqwest::Method;

    use crate::client::Client;
    use crate::driver::gitea;
    use crate::scm::{Context, Hook, HookInput, ListOptions, Perm, Repository, ScmError};
    use crate::transport::mock::MockTransport;

    fn client(mock: &MockTransport) -> Client {
        gitea::new("https://try.gitea.io", None, Arc::new(mock.clone())).unwrap()
    }

    #[tokio::test]
    async fn test_find_repo() {
        let mock = MockTransport::new().get(
            "/api/v1/repos/go-gitea/gitea",
            &[],
            include_str!("../../../tests/fixtures/gitea/repo.json"),
        );
        let (got, _) = client(&mock)
            .repositories()
            .find(&Context::background(), "go-gitea/gitea")
            .await
            .unwrap();

        let want: Repository =
            serde_json::from_str(include_str!("../../../tests/fixtures/gitea/repo.json.golden"))
                .unwrap();
        assert_eq!(got, want);
    }

    #[tokio::test]
    async fn test_find_perms() {
        let mock = MockTransport::new().get(
            "/api/v1/repos/go-gitea/gitea",
            &[],
            include_str!("../../../tests/fixtures/gitea/repo.json"),
        );
        let (got, _) = client(&mock)
            .repositories()
            .find_perms(&Context::background(), "go-gitea/gitea")
            .await
            .unwrap();
        assert_eq!(
            got,
            Perm {
                pull: true,
                push: false,
                admin: false
            }
        );
    }

    #[tokio::test]
    async fn test_list_repos() {
        let mock = MockTransport::new().get(
            "/api/v1/user/repos",
            &[("x-total-count", "5")],
            include_str!("../../../tests/fixtures/gitea/repos.json"),
        );
        let (got, res) = client(&mock)
            .repositories()
            .list(&Context::background(), &ListOptions { page: 1, size: 2 })
            .await
            .unwrap();

        let want: Vec<Repository> =
            serde_json::from_str(include_str!("../../../tests/fixtures/gitea/repos.json.golden"))
                .unwrap();
        assert_eq!(got, want);
        assert_eq!(got[1].full_name(), "jcitizen/dotfiles");
        assert_eq!(res.page.next, Some(2));
        assert_eq!(res.page.last, Some(3));
    }

    #[tokio::test]
    async fn test_find_hook() {
        let mock = MockTransport::new().get(
            "/api/v1/repos/go-gitea/gitea/hooks/20",
            &[],
            include_str!("../../../tests/fixtures/gitea/hook.json"),
        );
        let (got, _) = client(&mock)
            .repositories()
            .find_hook(&Context::background(), "go-gitea/gitea", "20")
            .await
            .unwrap();

        let want: Vec<Hook> =
            serde_json::from_str(include_str!("../../../tests/fixtures/gitea/hooks.json.golden"))
                .unwrap();
        assert_eq!(got, want[0]);
    }

    #[tokio::test]
    async fn test_find_hook_rejects_bad_identifiers() {
        let mock = MockTransport::new();
        let client = client(&mock);
        let ctx = Context::background();

        let err = client
            .repositories()
            .find_hook(&ctx, "go-gitea/gitea", "20/../../../admin")
            .await
            .unwrap_err();
        assert!(matches!(err, ScmError::Validation(_)));

        let err = client
            .repositories()
            .find_hook(&ctx, "go-gitea/gitea?x=1", "20")
            .await
            .unwrap_err();
        assert!(matches!(err, ScmError::Validation(_)));

        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_list_hooks() {
        let mock = MockTransport::new().get(
            "/api/v1/repos/go-gitea/gitea/hooks",
            &[("x-total-count", "1")],
            include_str!("../../../tests/fixtures/gitea/hooks.json"),
        );
        let (got, res) = client(&mock)
            .repositories()
            .list_hooks(
                &Context::background(),
                "go-gitea/gitea",
                &ListOptions { page: 1, size: 10 },
            )
            .await
            .unwrap();

        let want: Vec<Hook> =
            serde_json::from_str(include_str!("../../../tests/fixtures/gitea/hooks.json.golden"))
                .unwrap();
        assert_eq!(got, want);
        assert_eq!(res.page.next, None);
    }

    #[tokio::test]
    async fn test_create_hook() {
        let mock = MockTransport::new().route(
            Method::POST,
            "/api/v1/repos/go-gitea/gitea/hooks",
            201,
            &[],
            include_str!("../../../tests/fixtures/gitea/hook.json"),
        );
        let input = HookInput {
            name: "drone".to_string(),
            target: "http://example.com/hook".to_string(),
            secret: "topsecret".to_string(),
            events: vec!["push".to_string(), "pull_request".to_string()],
            skip_verify: false,
        };
        let (got, _) = client(&mock)
            .repositories()
            .create_hook(&Context::background(), "go-gitea/gitea", &input)
            .await
            .unwrap();
        assert_eq!(got.id, "20");
        assert_eq!(got.name, "gitea");

        let sent: serde_json::Value =
            serde_json::from_slice(mock.requests()[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(sent["type"], "gitea");
        assert_eq!(sent["config"]["secret"], "topsecret");
        assert_eq!(sent["config"]["content_type"], "json");
        assert_eq!(sent["events"], serde_json::json!(["push", "pull_request"]));
    }

    #[tokio::test]
    async fn test_delete_hook() {
        let mock = MockTransport::new().route(
            Method::DELETE,
            "/api/v1/repos/go-gitea/gitea/hooks/20",
            204,
            &[],
            "",
        );
        let res = client(&mock)
            .repositories()
            .delete_hook(&Context::background(), "go-gitea/gitea", "20")
            .await
            .unwrap();
        assert_eq!(res.status, 204);
    }
}
