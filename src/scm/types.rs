use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// An organization (or group) hosting repositories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Provider-qualified organization name (login)
    pub name: String,
    /// Avatar image URL
    pub avatar: String,
}

/// Repository permissions held by the authenticated user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perm {
    pub pull: bool,
    pub push: bool,
    pub admin: bool,
}

/// A repository snapshot.
///
/// The full name is derived from `namespace` and `name` and is never stored,
/// so it cannot drift from them. It is still written out as `full_name` when
/// serialized, and ignored when read back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Repository {
    /// Provider-assigned identifier, stringified so numeric and opaque ids share one type
    pub id: String,
    /// Owner or organization the repository lives under
    pub namespace: String,
    /// Repository name without namespace
    pub name: String,
    /// Permissions of the caller, when the provider reports them
    pub perm: Option<Perm>,
    /// Default branch name
    pub branch: String,
    pub private: bool,
    pub archived: bool,
    /// HTTPS clone URL
    pub clone: String,
    /// SSH clone URL
    pub clone_ssh: String,
    /// Browser URL
    pub link: String,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

impl Repository {
    /// Returns `namespace/name`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl Serialize for Repository {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Repository", 13)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("namespace", &self.namespace)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("full_name", &self.full_name())?;
        s.serialize_field("perm", &self.perm)?;
        s.serialize_field("branch", &self.branch)?;
        s.serialize_field("private", &self.private)?;
        s.serialize_field("archived", &self.archived)?;
        s.serialize_field("clone", &self.clone)?;
        s.serialize_field("clone_ssh", &self.clone_ssh)?;
        s.serialize_field("link", &self.link)?;
        s.serialize_field("created", &self.created)?;
        s.serialize_field("updated", &self.updated)?;
        s.end()
    }
}

/// What a [`Reference`] path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Branch,
    Tag,
    PullRequest,
    Other,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceKind::Branch => write!(f, "branch"),
            ReferenceKind::Tag => write!(f, "tag"),
            ReferenceKind::PullRequest => write!(f, "pull request"),
            ReferenceKind::Other => write!(f, "other"),
        }
    }
}

/// A named git reference: branch, tag or any other ref.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Short name (e.g., "master", "v1.0")
    pub name: String,
    /// Fully qualified path (e.g., "refs/heads/master")
    pub path: String,
    /// Full hex object id the reference points to
    pub sha: String,
}

impl Reference {
    /// Build a branch reference, qualifying the short name.
    pub fn branch(name: impl Into<String>, sha: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: format!("refs/heads/{name}"),
            name,
            sha: sha.into(),
        }
    }

    /// Build a tag reference, qualifying the short name.
    pub fn tag(name: impl Into<String>, sha: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: format!("refs/tags/{name}"),
            name,
            sha: sha.into(),
        }
    }

    /// Build a reference from a fully qualified path, deriving the short name.
    pub fn from_path(path: impl Into<String>, sha: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: trim_ref(&path).to_string(),
            path,
            sha: sha.into(),
        }
    }

    pub fn kind(&self) -> ReferenceKind {
        if self.path.starts_with("refs/heads/") {
            ReferenceKind::Branch
        } else if self.path.starts_with("refs/tags/") {
            ReferenceKind::Tag
        } else if self.path.starts_with("refs/pull/") {
            ReferenceKind::PullRequest
        } else {
            ReferenceKind::Other
        }
    }
}

/// Strip the `refs/heads/` or `refs/tags/` prefix from a reference path.
pub fn trim_ref(path: &str) -> &str {
    path.strip_prefix("refs/heads/")
        .or_else(|| path.strip_prefix("refs/tags/"))
        .unwrap_or(path)
}

/// Author or committer identity attached to a commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub date: Option<DateTime<Utc>>,
    /// Account login, when the provider linked the identity to a user
    pub login: String,
    pub avatar: String,
}

/// A commit snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub message: String,
    pub author: Signature,
    pub committer: Signature,
    /// Browser URL of the commit
    pub link: String,
}

/// A single file entry of a diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// File path after the change
    pub path: String,
    /// Path before a rename, if the file was renamed
    pub previous_path: Option<String>,
    pub added: bool,
    pub renamed: bool,
    pub deleted: bool,
    /// Lines added, when the provider reports it
    pub additions: Option<u64>,
    /// Lines deleted, when the provider reports it
    pub deletions: Option<u64>,
}

/// A repository webhook registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hook {
    pub id: String,
    pub name: String,
    /// Delivery URL
    pub target: String,
    pub events: Vec<String>,
    pub active: bool,
    pub skip_verify: bool,
}

/// Parameters for registering a webhook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookInput {
    pub name: String,
    pub target: String,
    /// Shared secret used by the provider to sign deliveries
    pub secret: String,
    /// Provider-native event names; empty means the provider default
    pub events: Vec<String>,
    pub skip_verify: bool,
}

/// Canonical pagination request. `size` is advisory: providers cap it.
///
/// Zero values mean "provider default" and are not sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub page: u32,
    pub size: u32,
}

/// Pagination request for commit listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitListOptions {
    /// Branch, tag or sha to list from
    pub r#ref: String,
    /// Only commits touching this path
    pub path: String,
    pub page: u32,
    pub size: u32,
}

impl CommitListOptions {
    pub fn list_options(&self) -> ListOptions {
        ListOptions {
            page: self.page,
            size: self.size,
        }
    }
}

/// Canonical pagination result. Absent fields mean "no such page".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub first: Option<u32>,
    pub next: Option<u32>,
    pub prev: Option<u32>,
    pub last: Option<u32>,
    /// Raw continuation URL, kept when the provider paginates by opaque cursor
    pub next_link: Option<String>,
}

/// Rate limit counters reported alongside a response.
///
/// An all-zero value means the provider did not report limits, not that the
/// quota is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    pub limit: u64,
    pub remaining: u64,
    /// Unix time (seconds) at which the window resets
    pub reset: i64,
}

impl Rate {
    /// Whether the provider reported any rate limit information.
    pub fn is_known(&self) -> bool {
        self.limit != 0 || self.remaining != 0 || self.reset != 0
    }
}

/// Metadata attached to every driver response.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderMap,
    /// Provider request id, for correlating with provider-side logs
    pub id: Option<String>,
    pub page: Page,
    pub rate: Rate,
}
