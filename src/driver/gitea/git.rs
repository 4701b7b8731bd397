use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::Account;
use crate::driver::{not_supported, null_default, path_segment, Api};
use crate::scm::{
    self, require, split_name, Change, Commit, CommitListOptions, Context, ListOptions,
    Reference, ReferenceKind, ScmResult, Signature,
};

pub(super) struct GitService {
    api: Api,
}

impl GitService {
    pub(super) fn new(api: Api) -> Self {
        Self { api }
    }
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
    #[serde(default, deserialize_with = "null_default")]
    html_url: String,
    commit: CommitDetail,
    author: Option<Account>,
    committer: Option<Account>,
    #[serde(default, deserialize_with = "null_default")]
    files: Vec<AffectedFile>,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    #[serde(default, deserialize_with = "null_default")]
    message: String,
    author: Identity,
    committer: Identity,
}

#[derive(Debug, Deserialize)]
struct Identity {
    #[serde(default, deserialize_with = "null_default")]
    name: String,
    #[serde(default, deserialize_with = "null_default")]
    email: String,
    date: Option<DateTime<Utc>>,
}

/// Gitea reports only the path and a status word; no line counts.
#[derive(Debug, Deserialize)]
struct AffectedFile {
    filename: String,
    #[serde(default, deserialize_with = "null_default")]
    status: String,
}

#[derive(Debug, Deserialize)]
struct BranchResponse {
    name: String,
    commit: BranchCommit,
}

#[derive(Debug, Deserialize)]
struct BranchCommit {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TagResponse {
    name: String,
    commit: TagCommit,
}

#[derive(Debug, Deserialize)]
struct TagCommit {
    sha: String,
}

#[derive(Debug, Serialize)]
struct CreateBranchRequest<'a> {
    new_branch_name: &'a str,
    old_ref_name: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateTagRequest<'a> {
    tag_name: &'a str,
    target: &'a str,
}

fn signature(identity: Identity, account: Option<Account>) -> Signature {
    let account = account.unwrap_or_default();
    Signature {
        name: identity.name,
        email: identity.email,
        date: identity.date,
        login: account.name(),
        avatar: account.avatar_url,
    }
}

impl From<CommitResponse> for Commit {
    fn from(c: CommitResponse) -> Self {
        Commit {
            sha: c.sha,
            message: c.commit.message,
            author: signature(c.commit.author, c.author),
            committer: signature(c.commit.committer, c.committer),
            link: c.html_url,
        }
    }
}

impl From<AffectedFile> for Change {
    fn from(f: AffectedFile) -> Self {
        Change {
            added: f.status == "added",
            renamed: f.status == "renamed",
            deleted: f.status == "removed" || f.status == "deleted",
            path: f.filename,
            previous_path: None,
            additions: None,
            deletions: None,
        }
    }
}

#[async_trait]
impl scm::GitService for GitService {
    #[instrument(skip(self, ctx))]
    async fn find_commit(&self, ctx: &Context, repo: &str, sha: &str) -> ScmResult<Commit> {
        split_name(repo)?;
        let path = format!("repos/{repo}/git/commits/{}", path_segment("sha", sha)?);
        let (raw, res) = self
            .api
            .get::<CommitResponse>(ctx, "find_commit", &format!("{repo}@{sha}"), &path)
            .await?;
        Ok((raw.into(), res))
    }

    #[instrument(skip(self, ctx))]
    async fn find_branch(&self, ctx: &Context, repo: &str, name: &str) -> ScmResult<Reference> {
        split_name(repo)?;
        let path = format!("repos/{repo}/branches/{}", path_segment("branch", name)?);
        let (raw, res) = self
            .api
            .get::<BranchResponse>(ctx, "find_branch", &format!("{repo}@{name}"), &path)
            .await?;
        Ok((Reference::branch(raw.name, raw.commit.id), res))
    }

    #[instrument(skip(self, ctx))]
    async fn find_tag(&self, ctx: &Context, repo: &str, name: &str) -> ScmResult<Reference> {
        split_name(repo)?;
        let path = format!("repos/{repo}/tags/{}", path_segment("tag", name)?);
        let (raw, res) = self
            .api
            .get::<TagResponse>(ctx, "find_tag", &format!("{repo}@{name}"), &path)
            .await?;
        Ok((Reference::tag(raw.name, raw.commit.sha), res))
    }

    #[instrument(skip(self, ctx))]
    async fn list_commits(
        &self,
        ctx: &Context,
        repo: &str,
        opts: &CommitListOptions,
    ) -> ScmResult<Vec<Commit>> {
        split_name(repo)?;
        let mut extra = Vec::new();
        if !opts.r#ref.is_empty() {
            extra.push(("sha".to_string(), opts.r#ref.clone()));
        }
        if !opts.path.is_empty() {
            extra.push(("path".to_string(), opts.path.clone()));
        }
        let path = format!("repos/{repo}/commits");
        let (raw, res) = self
            .api
            .list::<CommitResponse>(ctx, "list_commits", repo, &path, &opts.list_options(), &extra)
            .await?;
        Ok((raw.into_iter().map(Commit::from).collect(), res))
    }

    #[instrument(skip(self, ctx))]
    async fn list_branches(
        &self,
        ctx: &Context,
        repo: &str,
        opts: &ListOptions,
    ) -> ScmResult<Vec<Reference>> {
        split_name(repo)?;
        let path = format!("repos/{repo}/branches");
        let (raw, res) = self
            .api
            .list::<BranchResponse>(ctx, "list_branches", repo, &path, opts, &[])
            .await?;
        let refs = raw
            .into_iter()
            .map(|b| Reference::branch(b.name, b.commit.id))
            .collect();
        Ok((refs, res))
    }

    #[instrument(skip(self, ctx))]
    async fn list_tags(
        &self,
        ctx: &Context,
        repo: &str,
        opts: &ListOptions,
    ) -> ScmResult<Vec<Reference>> {
        split_name(repo)?;
        let path = format!("repos/{repo}/tags");
        let (raw, res) = self
            .api
            .list::<TagResponse>(ctx, "list_tags", repo, &path, opts, &[])
            .await?;
        let refs = raw
            .into_iter()
            .map(|t| Reference::tag(t.name, t.commit.sha))
            .collect();
        Ok((refs, res))
    }

    #[instrument(skip(self, ctx, _opts))]
    async fn list_changes(
        &self,
        ctx: &Context,
        repo: &str,
        sha: &str,
        _opts: &ListOptions,
    ) -> ScmResult<Vec<Change>> {
        split_name(repo)?;
        let path = format!("repos/{repo}/git/commits/{}", path_segment("sha", sha)?);
        let (raw, res) = self
            .api
            .get::<CommitResponse>(ctx, "list_changes", &format!("{repo}@{sha}"), &path)
            .await?;
        Ok((raw.files.into_iter().map(Change::from).collect(), res))
    }

    async fn compare_commits(
        &self,
        _ctx: &Context,
        _repo: &str,
        _base: &str,
        _head: &str,
        _opts: &ListOptions,
    ) -> ScmResult<Vec<Change>> {
        not_supported("compare_commits", self.api.driver)
    }

    /// Gitea has no raw ref endpoint: branches and tags are created through
    /// their own resources, anything else is unsupported.
    #[instrument(skip(self, ctx))]
    async fn create_ref(
        &self,
        ctx: &Context,
        repo: &str,
        path: &str,
        sha: &str,
    ) -> ScmResult<Reference> {
        split_name(repo)?;
        require("ref", path)?;
        require("sha", sha)?;
        let wanted = Reference::from_path(path, sha);
        let target = format!("{repo}@{path}");
        match wanted.kind() {
            ReferenceKind::Branch => {
                let body = CreateBranchRequest {
                    new_branch_name: &wanted.name,
                    old_ref_name: sha,
                };
                let endpoint = format!("repos/{repo}/branches");
                let (raw, res) = self
                    .api
                    .post::<_, BranchResponse>(ctx, "create_ref", &target, &endpoint, &body)
                    .await?;
                Ok((Reference::branch(raw.name, raw.commit.id), res))
            }
            ReferenceKind::Tag => {
                let body = CreateTagRequest {
                    tag_name: &wanted.name,
                    target: sha,
                };
                let endpoint = format!("repos/{repo}/tags");
                let (raw, res) = self
                    .api
                    .post::<_, TagResponse>(ctx, "create_ref", &target, &endpoint, &body)
                    .await?;
                Ok((Reference::tag(raw.name, raw.commit.sha), res))
            }
            ReferenceKind::PullRequest | ReferenceKind::Other => {
                not_supported("create_ref", self.api.driver)
            }
        }
    }
}
