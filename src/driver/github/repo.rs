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
    #[serde(default, deserialize_with = "null_default")]
    name: String,
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
    /// "0"/"1" as a string, or a number on older servers.
    #[serde(default)]
    insecure_ssl: serde_json::Value,
}

impl From<HookResponse> for Hook {
    fn from(h: HookResponse) -> Self {
        let skip_verify = match &h.config.insecure_ssl {
            serde_json::Value::String(s) => s == "1",
            serde_json::Value::Number(n) => n.as_u64() == Some(1),
            serde_json::Value::Bool(b) => *b,
            _ => false,
        };
        Hook {
            id: h.id.to_string(),
            name: h.name,
            target: h.config.url,
            events: h.events,
            active: h.active,
            skip_verify,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateHookRequest<'a> {
    name: &'static str,
    active: bool,
    events: Vec<String>,
    config: CreateHookConfig<'a>,
}

#[derive(Debug, Serialize)]
struct CreateHookConfig<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    secret: &'a str,
    content_type: &'static str,
    insecure_ssl: &'static str,
}

impl<'a> CreateHookRequest<'a> {
    fn new(input: &'a HookInput) -> Self {
        let events = if input.events.is_empty() {
            vec!["push".to_string()]
        } else {
            input.events.clone()
        };
        Self {
            name: "web",
            active: true,
            events,
            config: CreateHookConfig {
                url: &input.target,
                secret: &input.secret,
                content_type: "json",
                insecure_ssl: if input.skip_verify { "1" } else { "0" },
            },
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

    /// Permissions ride along on the repository lookup; an anonymous caller
    /// gets none.
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
