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

/// Recent servers send `name`; older ones only `username`.
#[derive(Debug, Deserialize)]
struct OrgResponse {
    name: Option<String>,
    username: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    avatar_url: String,
}

impl From<OrgResponse> for Organization {
    fn from(o: OrgResponse) -> Self {
        Organization {
            name: o
                .name
                .filter(|n| !n.is_empty())
                .or(o.username)
                .unwrap_or_default(),
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::driver::gitea;
    use crate::scm::{Context, ListOptions, Organization};
    use crate::transport::mock::MockTransport;

    const PAGE_HEADERS: &[(&str, &str)] = &[(
        "link",
        "<https://demo.gitea.com/api/v1/user/orgs?page=2>; rel=\"next\", \
         <https://demo.gitea.com/api/v1/user/orgs?page=1>; rel=\"prev\", \
         <https://demo.gitea.com/api/v1/user/orgs?page=1>; rel=\"first\", \
         <https://demo.gitea.com/api/v1/user/orgs?page=3>; rel=\"last\"",
    )];

    #[tokio::test]
    async fn test_org_find() {
        let mock = MockTransport::new().get(
            "/api/v1/orgs/gogits",
            &[],
            include_str!("../../../tests/fixtures/gitea/organization.json"),
        );
        let client = gitea::new("https://demo.gitea.com", None, Arc::new(mock)).unwrap();
        let (got, _) = client
            .organizations()
            .find(&Context::background(), "gogits")
            .await
            .unwrap();

        let want: Organization = serde_json::from_str(include_str!(
            "../../../tests/fixtures/gitea/organization.json.golden"
        ))
        .unwrap();
        assert_eq!(got, want);
    }

    #[tokio::test]
    async fn test_org_list() {
        let mock = MockTransport::new().get(
            "/api/v1/user/orgs",
            PAGE_HEADERS,
            include_str!("../../../tests/fixtures/gitea/organizations.json"),
        );
        let client = gitea::new("https://demo.gitea.com", None, Arc::new(mock)).unwrap();
        let (got, res) = client
            .organizations()
            .list(&Context::background(), &ListOptions::default())
            .await
            .unwrap();

        let want: Vec<Organization> = serde_json::from_str(include_str!(
            "../../../tests/fixtures/gitea/organizations.json.golden"
        ))
        .unwrap();
        assert_eq!(got, want);
        assert_eq!(res.page.next, Some(2));
        assert_eq!(res.page.prev, Some(1));
        assert_eq!(res.page.first, Some(1));
        assert_eq!(res.page.last, Some(3));
    }
}
