//! Canonical webhook events.
//!
//! Every provider decodes its payloads into [`Event`]. Event types a driver
//! does not recognise become [`Event::Unknown`] carrying the raw JSON, so new
//! provider events never break callers that ignore them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{Commit, Reference, Repository};

/// A user account as it appears in events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    pub name: String,
    pub email: String,
    pub avatar: String,
}

/// What happened to the subject of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Created,
    Deleted,
    Opened,
    Reopened,
    Closed,
    Merged,
    Edited,
    Synchronized,
    Labeled,
    Unlabeled,
    /// Provider action with no canonical counterpart
    Other(String),
}

impl Action {
    /// Map a provider action string onto the canonical set.
    ///
    /// GitHub and Gitea share most verbs; the few spelling differences are
    /// folded here.
    pub fn from_provider(action: &str) -> Self {
        match action {
            "created" | "create" => Action::Created,
            "deleted" | "delete" => Action::Deleted,
            "opened" | "open" => Action::Opened,
            "reopened" | "reopen" => Action::Reopened,
            "closed" | "close" => Action::Closed,
            "merged" => Action::Merged,
            "edited" => Action::Edited,
            "synchronize" | "synchronized" => Action::Synchronized,
            "labeled" | "label_updated" => Action::Labeled,
            "unlabeled" | "label_cleared" => Action::Unlabeled,
            other => Action::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub body: String,
    /// Head commit sha
    pub sha: String,
    /// Pull request ref, e.g. `refs/pull/1/head`
    pub r#ref: String,
    /// Source branch
    pub source: String,
    /// Target branch
    pub target: String,
    /// Whether the source lives in a fork
    pub fork: bool,
    pub link: String,
    pub closed: bool,
    pub merged: bool,
    pub author: User,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub link: String,
    pub labels: Vec<String>,
    pub closed: bool,
    pub locked: bool,
    pub author: User,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub body: String,
    pub author: User,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

/// Commits pushed to a reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushHook {
    /// Fully qualified ref that was pushed
    pub r#ref: String,
    pub before: String,
    pub after: String,
    pub repo: Repository,
    /// Head commit of the push
    pub commit: Commit,
    pub commits: Vec<Commit>,
    pub sender: User,
}

/// A branch or tag was created or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceHook {
    pub action: Action,
    pub r#ref: Reference,
    pub repo: Repository,
    pub sender: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestHook {
    pub action: Action,
    pub repo: Repository,
    pub pull_request: PullRequest,
    pub sender: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueHook {
    pub action: Action,
    pub repo: Repository,
    pub issue: Issue,
    pub sender: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCommentHook {
    pub action: Action,
    pub repo: Repository,
    pub issue: Issue,
    pub comment: Comment,
    pub sender: User,
}

/// Tagged union of every canonical webhook event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Event {
    Push(PushHook),
    Branch(ReferenceHook),
    Tag(ReferenceHook),
    PullRequest(PullRequestHook),
    Issue(IssueHook),
    IssueComment(IssueCommentHook),
    /// Event type this crate does not model; `kind` is the provider's name for it
    Unknown {
        kind: String,
        payload: serde_json::Value,
    },
}

impl Event {
    /// The account that triggered the event, if the event is modelled.
    pub fn sender(&self) -> Option<&User> {
        match self {
            Event::Push(h) => Some(&h.sender),
            Event::Branch(h) | Event::Tag(h) => Some(&h.sender),
            Event::PullRequest(h) => Some(&h.sender),
            Event::Issue(h) => Some(&h.sender),
            Event::IssueComment(h) => Some(&h.sender),
            Event::Unknown { .. } => None,
        }
    }

    /// The repository the event relates to, if the event is modelled.
    pub fn repository(&self) -> Option<&Repository> {
        match self {
            Event::Push(h) => Some(&h.repo),
            Event::Branch(h) | Event::Tag(h) => Some(&h.repo),
            Event::PullRequest(h) => Some(&h.repo),
            Event::Issue(h) => Some(&h.repo),
            Event::IssueComment(h) => Some(&h.repo),
            Event::Unknown { .. } => None,
        }
    }
}

/// How a parsed webhook came to be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// The signature matched the shared secret.
    Signature,
    /// No verification was performed: the provider does not sign payloads,
    /// or the caller supplied no secret.
    Policy,
}

/// Result of a successful webhook parse.
#[derive(Debug, Clone, PartialEq)]
pub struct Webhook {
    pub event: Event,
    /// Provider delivery id, passed through unverified
    pub delivery: Option<String>,
    pub verification: Verification,
}
