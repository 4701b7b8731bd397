//! Capability traits every provider driver implements.
//!
//! Operations take a [`Context`] for cancellation, an identifier and their
//! parameters, and return the canonical entity together with [`Response`]
//! metadata. A driver that has no equivalent for an operation returns
//! [`ScmError::NotSupported`] instead of emulating it.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use tracing::{debug, instrument};

use super::types::{
    Change, Commit, CommitListOptions, Hook, HookInput, ListOptions, Organization, Perm,
    Reference, Repository, Response,
};
use super::{Context, ScmError, Webhook};

/// Entity plus response metadata, or the failure.
pub type ScmResult<T> = Result<(T, Response), ScmError>;

#[async_trait]
pub trait GitService: Send + Sync {
    async fn find_commit(&self, ctx: &Context, repo: &str, sha: &str) -> ScmResult<Commit>;

    async fn find_branch(&self, ctx: &Context, repo: &str, name: &str) -> ScmResult<Reference>;

    async fn find_tag(&self, ctx: &Context, repo: &str, name: &str) -> ScmResult<Reference>;

    async fn list_commits(
        &self,
        ctx: &Context,
        repo: &str,
        opts: &CommitListOptions,
    ) -> ScmResult<Vec<Commit>>;

    async fn list_branches(
        &self,
        ctx: &Context,
        repo: &str,
        opts: &ListOptions,
    ) -> ScmResult<Vec<Reference>>;

    async fn list_tags(
        &self,
        ctx: &Context,
        repo: &str,
        opts: &ListOptions,
    ) -> ScmResult<Vec<Reference>>;

    /// Files changed by a single commit.
    async fn list_changes(
        &self,
        ctx: &Context,
        repo: &str,
        sha: &str,
        opts: &ListOptions,
    ) -> ScmResult<Vec<Change>>;

    /// Files changed going from `base` to `head`. Shaped like
    /// [`GitService::list_changes`]; swapping the arguments reverses the diff.
    async fn compare_commits(
        &self,
        ctx: &Context,
        repo: &str,
        base: &str,
        head: &str,
        opts: &ListOptions,
    ) -> ScmResult<Vec<Change>>;

    /// Create `path` (e.g. `refs/heads/topic`) pointing at `sha`.
    async fn create_ref(
        &self,
        ctx: &Context,
        repo: &str,
        path: &str,
        sha: &str,
    ) -> ScmResult<Reference>;
}

#[async_trait]
pub trait OrganizationService: Send + Sync {
    async fn find(&self, ctx: &Context, name: &str) -> ScmResult<Organization>;

    /// Organizations the authenticated user belongs to.
    async fn list(&self, ctx: &Context, opts: &ListOptions) -> ScmResult<Vec<Organization>>;
}

#[async_trait]
pub trait RepositoryService: Send + Sync {
    async fn find(&self, ctx: &Context, repo: &str) -> ScmResult<Repository>;

    async fn find_perms(&self, ctx: &Context, repo: &str) -> ScmResult<Perm>;

    /// Repositories visible to the authenticated user.
    async fn list(&self, ctx: &Context, opts: &ListOptions) -> ScmResult<Vec<Repository>>;

    async fn list_hooks(
        &self,
        ctx: &Context,
        repo: &str,
        opts: &ListOptions,
    ) -> ScmResult<Vec<Hook>>;

    async fn find_hook(&self, ctx: &Context, repo: &str, id: &str) -> ScmResult<Hook>;

    async fn create_hook(&self, ctx: &Context, repo: &str, input: &HookInput) -> ScmResult<Hook>;

    async fn delete_hook(&self, ctx: &Context, repo: &str, id: &str) -> Result<Response, ScmError>;
}

/// Verifies and decodes inbound webhook deliveries.
///
/// Parsing is local: it takes the raw body exactly as received, since the
/// signature covers those bytes.
pub trait WebhookService: Send + Sync {
    /// `secret` is the shared secret configured on the hook. `None` skips
    /// verification and marks the result as trusted by policy.
    fn parse(
        &self,
        headers: &HeaderMap,
        body: &[u8],
        secret: Option<&str>,
    ) -> Result<Webhook, ScmError>;
}

/// Resolve a repository's default branch.
///
/// Two dependent calls: the repository lookup names the branch, the branch
/// lookup resolves it. Either failure is returned as is. The returned
/// metadata is that of the branch lookup.
#[instrument(skip(ctx, repos, git))]
pub async fn default_branch(
    ctx: &Context,
    repos: &dyn RepositoryService,
    git: &dyn GitService,
    repo: &str,
) -> ScmResult<Reference> {
    let (repository, _) = repos.find(ctx, repo).await?;
    debug!(branch = %repository.branch, "resolved default branch name");
    git.find_branch(ctx, repo, &repository.branch).await
}
