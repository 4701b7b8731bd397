//! Gitea driver.
//!
//! Every route lives under `/api/v1`. Lists paginate with `page`/`limit` and
//! report `X-Total-Count`; no rate limit headers are sent. Deliveries are
//! signed with a bare hex HMAC-SHA256 in `X-Gitea-Signature`.

mod git;
mod org;
mod repo;
mod webhook;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{null_default, Api, AuthScheme, Profile};
use crate::client::Client;
use crate::pagination::Pagination;
use crate::scm::{Driver, Perm, Repository, ScmError, User};
use crate::transport::Transport;

const API_PREFIX: &str = "/api/v1";

const PROFILE: Profile = Profile {
    driver: Driver::Gitea,
    auth: AuthScheme::Token,
    pagination: Pagination::page_number("page", "limit"),
    rate: None,
    request_id_header: "x-request-id",
};

/// Build a Gitea client for the instance at `server`. The `/api/v1` prefix
/// is appended unless already present.
pub fn new(
    server: &str,
    token: Option<String>,
    transport: Arc<dyn Transport>,
) -> Result<Client, ScmError> {
    let api = Api::new(PROFILE, &api_root(server), token, transport)?;
    Ok(Client::from_services(
        Driver::Gitea,
        Arc::new(git::GitService::new(api.clone())),
        Arc::new(org::OrganizationService::new(api.clone())),
        Arc::new(repo::RepositoryService::new(api)),
        Arc::new(webhook::WebhookService),
    ))
}

fn api_root(server: &str) -> String {
    let server = server.trim_end_matches('/');
    if server.ends_with(API_PREFIX) {
        server.to_string()
    } else {
        format!("{server}{API_PREFIX}")
    }
}

/// A Gitea user. The API names the account `login`; webhook payloads from
/// older servers only carry `username`.
#[derive(Debug, Default, Deserialize)]
struct Account {
    login: Option<String>,
    username: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    full_name: String,
    #[serde(default, deserialize_with = "null_default")]
    email: String,
    #[serde(default, deserialize_with = "null_default")]
    avatar_url: String,
}

impl Account {
    fn name(&self) -> String {
        self.login
            .clone()
            .filter(|l| !l.is_empty())
            .or_else(|| self.username.clone())
            .unwrap_or_default()
    }
}

impl From<Account> for User {
    fn from(a: Account) -> Self {
        User {
            login: a.name(),
            name: a.full_name,
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
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<RepoResponse> for Repository {
    fn from(r: RepoResponse) -> Self {
        Repository {
            id: r.id.to_string(),
            namespace: r.owner.name(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_root() {
        assert_eq!(api_root("https://try.gitea.io"), "https://try.gitea.io/api/v1");
        assert_eq!(api_root("https://try.gitea.io/"), "https://try.gitea.io/api/v1");
        assert_eq!(
            api_root("https://try.gitea.io/api/v1/"),
            "https://try.gitea.io/api/v1"
        );
        assert_eq!(
            api_root("https://example.com/gitea"),
            "https://example.com/gitea/api/v1"
        );
    }

    #[test]
    fn test_account_prefers_login_over_username() {
        let a: Account =
            serde_json::from_str(r#"{"login":"gogits","username":"old"}"#).unwrap();
        assert_eq!(a.name(), "gogits");
        let a: Account = serde_json::from_str(r#"{"username":"gogits"}"#).unwrap();
        assert_eq!(a.name(), "gogits");
        let a: Account = serde_json::from_str(r#"{"login":"","username":"gogits"}"#).unwrap();
        assert_eq!(a.name(), "gogits");
    }
}
