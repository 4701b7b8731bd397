use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use crate::driver::{null_default, path_segment, Api};
use crate::scm::{self, Context, ListOptions, Organization, ScmResult};

pub(super) struct OrganizationService {
    api: Api,
}

impl OrganizationService {
    pub(super) fn new(api: Api) -> Self {
        Self { api }
    }
}

#[derive(Debug, Deserialize)]
struct OrgResponse {
    login: String,
    #[serde(default, deserialize_with = "null_default")]
    avatar_url: String,
}

impl From<OrgResponse> for Organization {
    fn from(o: OrgResponse) -> Self {
        Organization {
            name: o.login,
            avatar: o.avatar_url,
        }
    }
}

#[async_trait]
impl scm::OrganizationService for OrganizationService {
    #[instrument(skip(self, ctx))]
    async fn find(&self, ctx: &Context, name: &str) -> ScmResult<Organization> {
        let path = format!("orgs/{}", path_segment("organization", name)?);
        let (raw, res) = self.api.get::<OrgResponse>(ctx, "find_org", name, &path).await?;
        Ok((raw.into(), res))
    }

    #[instrument(skip(self, ctx))]
    async fn list(&self, ctx: &Context, opts: &ListOptions) -> ScmResult<Vec<Organization>> {
        let (raw, res) = self
            .api
            .list::<OrgResponse>(ctx, "list_orgs", "user", "user/orgs", opts, &[])
            .await?;
        Ok((raw.into_iter().map(Organization::from).collect(), res))
    }
}
