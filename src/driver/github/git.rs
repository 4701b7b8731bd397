use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::Account;
use crate::driver::{not_supported, null_default, path_segment, Api};
use crate::scm::{
    self, require, split_name, Change, Commit, CommitListOptions, Context, ListOptions,
    Reference, ScmResult, Signature,
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
    files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
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

#[derive(Debug, Deserialize)]
struct FileEntry {
    filename: String,
    status: String,
    previous_filename: Option<String>,
    additions: Option<u64>,
    deletions: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CompareResponse {
    #[serde(default, deserialize_with = "null_default")]
    files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct NamedCommit {
    name: String,
    commit: ShaOnly,
}

#[derive(Debug, Deserialize)]
struct ShaOnly {
    sha: String,
}

#[derive(Debug, Serialize)]
struct CreateRefRequest<'a> {
    r#ref: &'a str,
    sha: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    r#ref: String,
    object: ShaOnly,
}

fn signature(identity: Identity, account: Option<Account>) -> Signature {
    let account = account.unwrap_or_default();
    Signature {
        name: identity.name,
        email: identity.email,
        date: identity.date,
        login: account.login,
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

impl From<FileEntry> for Change {
    fn from(f: FileEntry) -> Self {
        Change {
            added: f.status == "added",
            renamed: f.status == "renamed",
            deleted: f.status == "removed",
            path: f.filename,
            previous_path: f.previous_filename,
            additions: f.additions,
            deletions: f.deletions,
        }
    }
}

#[async_trait]
impl scm::GitService for GitService {
    #[instrument(skip(self, ctx))]
    async fn find_commit(&self, ctx: &Context, repo: &str, sha: &str) -> ScmResult<Commit> {
        split_name(repo)?;
        let path = format!("repos/{repo}/commits/{}", path_segment("sha", sha)?);
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
            .get::<NamedCommit>(ctx, "find_branch", &format!("{repo}@{name}"), &path)
            .await?;
        Ok((Reference::branch(raw.name, raw.commit.sha), res))
    }

    async fn find_tag(&self, _ctx: &Context, _repo: &str, _name: &str) -> ScmResult<Reference> {
        not_supported("find_tag", self.api.driver)
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
            .list::<NamedCommit>(ctx, "list_branches", repo, &path, opts, &[])
            .await?;
        let refs = raw
            .into_iter()
            .map(|b| Reference::branch(b.name, b.commit.sha))
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
            .list::<NamedCommit>(ctx, "list_tags", repo, &path, opts, &[])
            .await?;
        let refs = raw
            .into_iter()
            .map(|t| Reference::tag(t.name, t.commit.sha))
            .collect();
        Ok((refs, res))
    }

    /// The commit endpoint embeds the changed files; it is not paginated.
    #[instrument(skip(self, ctx, _opts))]
    async fn list_changes(
        &self,
        ctx: &Context,
        repo: &str,
        sha: &str,
        _opts: &ListOptions,
    ) -> ScmResult<Vec<Change>> {
        split_name(repo)?;
        let path = format!("repos/{repo}/commits/{}", path_segment("sha", sha)?);
        let (raw, res) = self
            .api
            .get::<CommitResponse>(ctx, "list_changes", &format!("{repo}@{sha}"), &path)
            .await?;
        Ok((raw.files.into_iter().map(Change::from).collect(), res))
    }

    #[instrument(skip(self, ctx, _opts))]
    async fn compare_commits(
        &self,
        ctx: &Context,
        repo: &str,
        base: &str,
        head: &str,
        _opts: &ListOptions,
    ) -> ScmResult<Vec<Change>> {
        split_name(repo)?;
        let path = format!(
            "repos/{repo}/compare/{}...{}",
            path_segment("base", base)?,
            path_segment("head", head)?
        );
        let (raw, res) = self
            .api
            .get::<CompareResponse>(ctx, "compare_commits", &format!("{repo}@{base}...{head}"), &path)
            .await?;
        Ok((raw.files.into_iter().map(Change::from).collect(), res))
    }

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
        let endpoint = format!("repos/{repo}/git/refs");
        let body = CreateRefRequest { r#ref: path, sha };
        let (raw, res) = self
            .api
            .post::<_, RefResponse>(ctx, "create_ref", &format!("{repo}@{path}"), &endpoint, &body)
            .await?;
        Ok((Reference::from_path(raw.r#ref, raw.object.sha), res))
    }
}
