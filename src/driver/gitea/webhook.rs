use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{Account, RepoResponse};
use crate::driver::null_default;
use crate::scm::{
    self, Action, Comment, Commit, Event, Issue, IssueCommentHook, IssueHook, PullRequest,
    PullRequestHook, PushHook, Reference, ReferenceHook, ScmError, Signature, Webhook,
};
use crate::webhook::{self, Algorithm, HookScheme, SignatureHeader};

const SCHEME: HookScheme = HookScheme {
    event_header: "x-gitea-event",
    delivery_header: "x-gitea-delivery",
    signatures: &[SignatureHeader {
        name: "x-gitea-signature",
        algorithm: Algorithm::HmacSha256,
        prefix: "",
    }],
};

pub(super) struct WebhookService;

impl scm::WebhookService for WebhookService {
    fn parse(
        &self,
        headers: &HeaderMap,
        body: &[u8],
        secret: Option<&str>,
    ) -> Result<Webhook, ScmError> {
        webhook::parse(&SCHEME, decode, headers, body, secret)
    }
}

fn decode(kind: &str, body: &[u8]) -> Result<Option<Event>, serde_json::Error> {
    Ok(Some(match kind {
        "push" => Event::Push(from_slice::<PushPayload>(body)?.into()),
        "create" | "delete" => {
            let payload: RefPayload = from_slice(body)?;
            let action = if kind == "create" {
                Action::Created
            } else {
                Action::Deleted
            };
            match payload.ref_type.as_str() {
                "branch" => Event::Branch(payload.into_hook(action, |n, s| Reference::branch(n, s))),
                "tag" => Event::Tag(payload.into_hook(action, |n, s| Reference::tag(n, s))),
                _ => return Ok(None),
            }
        }
        "pull_request" => Event::PullRequest(from_slice::<PullRequestPayload>(body)?.into()),
        "issues" => Event::Issue(from_slice::<IssuePayload>(body)?.into()),
        "issue_comment" => Event::IssueComment(from_slice::<IssueCommentPayload>(body)?.into()),
        _ => return Ok(None),
    }))
}

fn from_slice<T: DeserializeOwned>(body: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(body)
}

#[derive(Debug, Deserialize)]
struct PushPayload {
    r#ref: String,
    #[serde(default, deserialize_with = "null_default")]
    before: String,
    #[serde(default, deserialize_with = "null_default")]
    after: String,
    repository: RepoResponse,
    head_commit: Option<PushCommit>,
    #[serde(default, deserialize_with = "null_default")]
    commits: Vec<PushCommit>,
    sender: Account,
}

#[derive(Debug, Clone, Deserialize)]
struct PushCommit {
    id: String,
    #[serde(default, deserialize_with = "null_default")]
    message: String,
    #[serde(default, deserialize_with = "null_default")]
    url: String,
    author: PushIdentity,
    committer: PushIdentity,
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
struct PushIdentity {
    #[serde(default, deserialize_with = "null_default")]
    name: String,
    #[serde(default, deserialize_with = "null_default")]
    email: String,
    #[serde(default, deserialize_with = "null_default")]
    username: String,
}

impl PushIdentity {
    fn into_signature(self, date: Option<DateTime<Utc>>) -> Signature {
        Signature {
            name: self.name,
            email: self.email,
            date,
            login: self.username,
            avatar: String::new(),
        }
    }
}

impl From<PushCommit> for Commit {
    fn from(c: PushCommit) -> Self {
        Commit {
            sha: c.id,
            message: c.message,
            author: c.author.into_signature(c.timestamp),
            committer: c.committer.into_signature(c.timestamp),
            link: c.url,
        }
    }
}

impl From<PushPayload> for PushHook {
    fn from(p: PushPayload) -> Self {
        // Older servers omit head_commit; it is the commit matching `after`.
        let head = p
            .head_commit
            .or_else(|| p.commits.iter().find(|c| c.id == p.after).cloned());
        PushHook {
            r#ref: p.r#ref,
            before: p.before,
            after: p.after,
            repo: p.repository.into(),
            commit: head.map(Commit::from).unwrap_or_default(),
            commits: p.commits.into_iter().map(Commit::from).collect(),
            sender: p.sender.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefPayload {
    r#ref: String,
    ref_type: String,
    /// Present on create, absent on delete.
    #[serde(default, deserialize_with = "null_default")]
    sha: String,
    repository: RepoResponse,
    sender: Account,
}

impl RefPayload {
    fn into_hook(self, action: Action, build: fn(String, String) -> Reference) -> ReferenceHook {
        ReferenceHook {
            action,
            r#ref: build(self.r#ref, self.sha),
            repo: self.repository.into(),
            sender: self.sender.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    action: String,
    pull_request: PullRequestBody,
    repository: RepoResponse,
    sender: Account,
}

#[derive(Debug, Deserialize)]
struct PullRequestBody {
    number: u64,
    #[serde(default, deserialize_with = "null_default")]
    title: String,
    #[serde(default, deserialize_with = "null_default")]
    body: String,
    #[serde(default, deserialize_with = "null_default")]
    html_url: String,
    #[serde(default, deserialize_with = "null_default")]
    state: String,
    #[serde(default)]
    merged: bool,
    head: Branch,
    base: Branch,
    user: Account,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Branch {
    r#ref: String,
    #[serde(default, deserialize_with = "null_default")]
    sha: String,
    #[serde(default)]
    repo_id: u64,
}

impl From<PullRequestPayload> for PullRequestHook {
    fn from(p: PullRequestPayload) -> Self {
        let pr = p.pull_request;
        let action = match p.action.as_str() {
            "closed" if pr.merged => Action::Merged,
            other => Action::from_provider(other),
        };
        let fork = pr.head.repo_id != pr.base.repo_id;
        PullRequestHook {
            action,
            repo: p.repository.into(),
            pull_request: PullRequest {
                r#ref: format!("refs/pull/{}/head", pr.number),
                number: pr.number,
                title: pr.title,
                body: pr.body,
                sha: pr.head.sha,
                source: pr.head.r#ref,
                target: pr.base.r#ref,
                fork,
                link: pr.html_url,
                closed: pr.state == "closed",
                merged: pr.merged,
                author: pr.user.into(),
                created: pr.created_at,
                updated: pr.updated_at,
            },
            sender: p.sender.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IssuePayload {
    action: String,
    issue: IssueBody,
    repository: RepoResponse,
    sender: Account,
}

#[derive(Debug, Deserialize)]
struct IssueBody {
    number: u64,
    #[serde(default, deserialize_with = "null_default")]
    title: String,
    #[serde(default, deserialize_with = "null_default")]
    body: String,
    #[serde(default, deserialize_with = "null_default")]
    html_url: String,
    #[serde(default, deserialize_with = "null_default")]
    labels: Vec<Label>,
    #[serde(default, deserialize_with = "null_default")]
    state: String,
    #[serde(default)]
    is_locked: bool,
    user: Account,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Label {
    name: String,
}

impl From<IssueBody> for Issue {
    fn from(i: IssueBody) -> Self {
        Issue {
            number: i.number,
            title: i.title,
            body: i.body,
            link: i.html_url,
            labels: i.labels.into_iter().map(|l| l.name).collect(),
            closed: i.state == "closed",
            locked: i.is_locked,
            author: i.user.into(),
            created: i.created_at,
            updated: i.updated_at,
        }
    }
}

impl From<IssuePayload> for IssueHook {
    fn from(p: IssuePayload) -> Self {
        IssueHook {
            action: Action::from_provider(&p.action),
            repo: p.repository.into(),
            issue: p.issue.into(),
            sender: p.sender.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IssueCommentPayload {
    action: String,
    issue: IssueBody,
    comment: CommentBody,
    repository: RepoResponse,
    sender: Account,
}

#[derive(Debug, Deserialize)]
struct CommentBody {
    id: u64,
    #[serde(default, deserialize_with = "null_default")]
    body: String,
    user: Account,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<IssueCommentPayload> for IssueCommentHook {
    fn from(p: IssueCommentPayload) -> Self {
        IssueCommentHook {
            action: Action::from_provider(&p.action),
            repo: p.repository.into(),
            issue: p.issue.into(),
            comment: Comment {
                id: p.comment.id,
                body: p.comment.body,
                author: p.comment.user.into(),
                created: p.comment.created_at,
                updated: p.comment.updated_at,
            },
            sender: p.sender.into(),
        }
    }
}
