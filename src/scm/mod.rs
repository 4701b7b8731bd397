//! Canonical model and driver contract shared by every provider.

pub mod context;
pub mod event;
pub mod service;
pub mod types;

pub use context::{CancelHandle, Context};
pub use event::{
    Action, Comment, Event, Issue, IssueCommentHook, IssueHook, PullRequest, PullRequestHook,
    PushHook, ReferenceHook, User, Verification, Webhook,
};
pub use service::{GitService, OrganizationService, RepositoryService, ScmResult, WebhookService};
pub use types::{
    Change, Commit, CommitListOptions, Hook, HookInput, ListOptions, Organization, Page, Perm,
    Rate, Reference, ReferenceKind, Repository, Response, Signature,
};

use thiserror::Error;

use crate::transport::TransportError;

/// Identifies a provider backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    Github,
    Gitea,
}

impl std::fmt::Display for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Driver::Github => write!(f, "github"),
            Driver::Gitea => write!(f, "gitea"),
        }
    }
}

impl std::str::FromStr for Driver {
    type Err = ScmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Ok(Driver::Github),
            "gitea" => Ok(Driver::Gitea),
            other => Err(ScmError::Validation(format!("unknown driver: {other}"))),
        }
    }
}

#[derive(Debug, Error)]
pub enum ScmError {
    /// The provider answered 404 for the addressed resource.
    #[error("{op} {target}: not found")]
    NotFound { op: &'static str, target: String },

    /// The provider has no equivalent of the operation. A capability gap,
    /// not a runtime failure.
    #[error("{op} is not supported by the {driver} driver")]
    NotSupported { op: &'static str, driver: Driver },

    #[error("webhook signature invalid")]
    SignatureInvalid,

    #[error("invalid input: {0}")]
    Validation(String),

    /// Any other non-success status.
    #[error("{op} {target}: provider returned {status}: {message}")]
    Api {
        op: &'static str,
        target: String,
        status: u16,
        message: String,
    },

    #[error("{op} {target}: transport failed: {source}")]
    Transport {
        op: &'static str,
        target: String,
        #[source]
        source: TransportError,
    },

    #[error("{op} {target}: failed to decode response: {source}")]
    Decode {
        op: &'static str,
        target: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl ScmError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ScmError::NotFound { .. })
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, ScmError::NotSupported { .. })
    }
}

/// Split an `owner/name` repository identifier.
///
/// The owner may itself contain slashes (nested groups); the name is the last
/// segment. The identifier is placed into request paths verbatim, so empty,
/// `.` and `..` segments are rejected, as are characters a URL parser would
/// reinterpret.
pub fn split_name(repo: &str) -> Result<(&str, &str), ScmError> {
    let invalid = || {
        ScmError::Validation(format!(
            "repository identifier must be owner/name, got {repo:?}"
        ))
    };
    let reinterpreted =
        |c: char| matches!(c, '?' | '#' | '%' | '\\') || c.is_whitespace() || c.is_control();
    if repo.contains(reinterpreted) || repo.split('/').any(|s| matches!(s, "" | "." | "..")) {
        return Err(invalid());
    }
    repo.rsplit_once('/').ok_or_else(invalid)
}

/// Reject empty identifiers before any request is made.
pub(crate) fn require(field: &str, value: &str) -> Result<(), ScmError> {
    if value.trim().is_empty() {
        return Err(ScmError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}
