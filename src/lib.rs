//! scm-unify: one client contract over GitHub- and Gitea-style hosting APIs.
//!
//! A [`Client`] is built once for a provider and exposes capability groups
//! (git, organizations, repositories, webhooks) that return the canonical
//! entity model in [`scm`] together with response metadata: pagination,
//! rate limits and the provider request id.
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use scm_unify::{Client, Config, Context};
//!
//! let client = Client::from_config(&Config::load()?)?;
//! let (branch, res) = client
//!     .get_default_branch(&Context::background(), "octocat/hello-world")
//!     .await?;
//! println!("{} at {} ({} requests left)", branch.name, branch.sha, res.rate.remaining);
//! # Ok(())
//! # }
//! ```
//!
//! The library only emits `tracing` events; installing a subscriber is up to
//! the application.

pub mod client;
pub mod config;
pub mod driver;
pub mod pagination;
pub mod rate;
pub mod scm;
pub mod transport;
pub mod webhook;

pub use client::Client;
pub use config::{Config, ConfigError};
pub use scm::{
    Change, Commit, CommitListOptions, Context, Driver, Event, Hook, HookInput, ListOptions,
    Organization, Page, Perm, Rate, Reference, Repository, Response, ScmError, ScmResult,
    Signature, Webhook,
};
