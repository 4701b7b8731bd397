use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderMap;
use tracing::info;

use crate::config::Config;
use crate::driver::{gitea, github};
use crate::scm::service;
use crate::scm::{
    Context, Driver, GitService, OrganizationService, Reference, RepositoryService, ScmError,
    ScmResult, Webhook, WebhookService,
};
use crate::transport::{ReqwestTransport, Transport};

/// A provider-agnostic client.
///
/// The driver is chosen once, at construction. A `Client` holds no mutable
/// state, so it can be shared across tasks behind an `Arc` and several
/// clients for different providers can live side by side.
#[derive(Clone)]
pub struct Client {
    driver: Driver,
    git: Arc<dyn GitService>,
    organizations: Arc<dyn OrganizationService>,
    repositories: Arc<dyn RepositoryService>,
    webhooks: Arc<dyn WebhookService>,
    /// Secret used by [`Client::parse_webhook`] when the caller passes none
    webhook_secret: Option<String>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("driver", &self.driver)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Assemble a client from its capability implementations.
    pub fn from_services(
        driver: Driver,
        git: Arc<dyn GitService>,
        organizations: Arc<dyn OrganizationService>,
        repositories: Arc<dyn RepositoryService>,
        webhooks: Arc<dyn WebhookService>,
    ) -> Self {
        Self {
            driver,
            git,
            organizations,
            repositories,
            webhooks,
            webhook_secret: None,
        }
    }

    /// Verify webhook deliveries against `secret` unless a call supplies its
    /// own. An empty secret clears the default.
    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        self.webhook_secret = (!secret.is_empty()).then_some(secret);
        self
    }

    /// Build a client for `driver` at `server` over the given transport.
    pub fn new(
        driver: Driver,
        server: &str,
        token: Option<String>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ScmError> {
        match driver {
            Driver::Github => github::new(server, token, transport),
            Driver::Gitea => gitea::new(server, token, transport),
        }
    }

    /// Build a reqwest-backed client from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, ScmError> {
        let transport = ReqwestTransport::new(
            Duration::from_secs(config.http.timeout_secs),
            &config.http.user_agent,
        )
        .map_err(|e| ScmError::Validation(format!("cannot build HTTP client: {e}")))?;
        let server = config.server();
        info!(driver = %config.client.driver, server = %server, "building client");
        let client = Self::new(
            config.client.driver,
            &server,
            config.token(),
            Arc::new(transport),
        )?;
        Ok(match &config.webhook.secret {
            Some(secret) => client.with_webhook_secret(secret.as_str()),
            None => client,
        })
    }

    pub fn driver(&self) -> Driver {
        self.driver
    }

    pub fn git(&self) -> &dyn GitService {
        self.git.as_ref()
    }

    pub fn organizations(&self) -> &dyn OrganizationService {
        self.organizations.as_ref()
    }

    pub fn repositories(&self) -> &dyn RepositoryService {
        self.repositories.as_ref()
    }

    pub fn webhooks(&self) -> &dyn WebhookService {
        self.webhooks.as_ref()
    }

    /// Resolve the repository's default branch to a [`Reference`].
    pub async fn get_default_branch(&self, ctx: &Context, repo: &str) -> ScmResult<Reference> {
        service::default_branch(ctx, self.repositories(), self.git(), repo).await
    }

    /// Verify and decode a webhook delivery.
    ///
    /// `secret` overrides the client's configured webhook secret.
    pub fn parse_webhook(
        &self,
        headers: &HeaderMap,
        body: &[u8],
        secret: Option<&str>,
    ) -> Result<Webhook, ScmError> {
        let secret = secret.or(self.webhook_secret.as_deref());
        self.webhooks.parse(headers, body, secret)
    }
}
