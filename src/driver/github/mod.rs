//! GitHub driver.
//!
//! Paginates with `Link` headers, reports `X-RateLimit-*` counters and signs
//! webhook deliveries with `X-Hub-Signature-256` (HMAC-SHA256), falling back
//! to the legacy SHA-1 `X-Hub-Signature`.

mod git;
mod org;
mod repo;
mod webhook;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use super::{null_default, Api, AuthScheme, Profile};
use crate::client::Client;
use crate::pagination::Pagination;
use crate::scm::{Driver, Perm, Repository, ScmError, User};
use crate::transport::Transport;

pub const DEFAULT_SERVER: &str = "https://api.github.com";

const PROFILE: Profile = Profile {
    driver: Driver::Github,
    auth: AuthScheme::Bearer,
    pagination: Pagination::link_header("page", "per_page"),
    rate: Some(crate::rate::GITHUB),
    request_id_header: "x-github-request-id",
};

/// Build a GitHub client rooted at `server` (e.g. `https://api.github.com`
/// or `https://ghe.example.com/api/v3`).
pub fn new(
    server: &str,
    token: Option<String>,
    transport: Arc<dyn Transport>,
) -> Result<Client, ScmError> {
    let api = Api::new(PROFILE, server, token, transport)?;
    Ok(Client::from_services(
        Driver::Github,
        Arc::new(git::GitService::new(api.clone())),
        Arc::new(org::OrganizationService::new(api.clone())),
        Arc::new(repo::RepositoryService::new(api)),
        Arc::new(webhook::WebhookService),
    ))
}

/// Anonymous client for public github.com.
pub fn default_client(transport: Arc<dyn Transport>) -> Result<Client, ScmError> {
    new(DEFAULT_SERVER, None, transport)
}

#[derive(Debug, Default, Deserialize)]
struct Account {
    #[serde(default, deserialize_with = "null_default")]
    login: String,
    #[serde(default, deserialize_with = "null_default")]
    name: String,
    #[serde(default, deserialize_with = "null_default")]
    email: String,
    #[serde(default, deserialize_with = "null_default")]
    avatar_url: String,
}

impl From<Account> for User {
    fn from(a: Account) -> Self {
        User {
            login: a.login,
            name: a.name,
            email: a.email,
            avatar: a.avatar_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Permissions {
    #[serde(default)]
    admin: bool,
    #[serde(default)]
    push: bool,
    #[serde(default)]
    pull: bool,
}

impl From<Permissions> for Perm {
    fn from(p: Permissions) -> Self {
        Perm {
            pull: p.pull,
            push: p.push,
            admin: p.admin,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    id: u64,
    owner: Account,
    name: String,
    permissions: Option<Permissions>,
    #[serde(default, deserialize_with = "null_default")]
    default_branch: String,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    archived: bool,
    #[serde(default, deserialize_with = "null_default")]
    clone_url: String,
    #[serde(default, deserialize_with = "null_default")]
    ssh_url: String,
    #[serde(default, deserialize_with = "null_default")]
    html_url: String,
    #[serde(default, deserialize_with = "flexible_time")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "flexible_time")]
    updated_at: Option<DateTime<Utc>>,
}

impl From<RepoResponse> for Repository {
    fn from(r: RepoResponse) -> Self {
        Repository {
            id: r.id.to_string(),
            namespace: r.owner.login,
            name: r.name,
            perm: r.permissions.map(Perm::from),
            branch: r.default_branch,
            private: r.private,
            archived: r.archived,
            clone: r.clone_url,
            clone_ssh: r.ssh_url,
            link: r.html_url,
            created: r.created_at,
            updated: r.updated_at,
        }
    }
}

/// Timestamps arrive as RFC 3339 strings from the API but as unix seconds in
/// some webhook payloads (the repository of a push event).
fn flexible_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(DateTime<Utc>),
        Unix(i64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(t)) => Some(t),
        Some(Raw::Unix(secs)) => DateTime::from_timestamp(secs, 0),
        None => None,
    })
}
