//! Provider drivers and the request plumbing they share.
//!
//! A driver is a set of capability-trait implementations over one [`Api`].
//! The `Api` owns nothing but configuration: base URL, credentials, and the
//! provider's pagination and rate-limit descriptors.

pub mod gitea;
pub mod github;

use std::sync::Arc;

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::pagination::Pagination;
use crate::rate::{self, RateHeaders};
use crate::scm::{require, Context, Driver, ListOptions, Page, Response, ScmError};
use crate::transport::{HttpResponse, Request, Transport};

/// How the access token is presented in the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// `Authorization: token <token>`
    Token,
}

/// Request plumbing for one configured provider endpoint.
#[derive(Clone)]
pub struct Api {
    pub driver: Driver,
    base: reqwest::Url,
    token: Option<String>,
    auth: AuthScheme,
    pub pagination: Pagination,
    rate: Option<RateHeaders>,
    request_id_header: &'static str,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Api")
            .field("driver", &self.driver)
            .field("base", &self.base.as_str())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

/// Provider-level settings a driver fixes when it builds its [`Api`].
#[derive(Debug, Clone, Copy)]
pub struct Profile {
    pub driver: Driver,
    pub auth: AuthScheme,
    pub pagination: Pagination,
    pub rate: Option<RateHeaders>,
    pub request_id_header: &'static str,
}

/// The provider's error body; only the message is surfaced.
#[derive(serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl Api {
    pub fn new(
        profile: Profile,
        base: &str,
        token: Option<String>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ScmError> {
        let mut base = reqwest::Url::parse(base)
            .map_err(|e| ScmError::Validation(format!("invalid server URL {base:?}: {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            driver: profile.driver,
            base,
            token: token.filter(|t| !t.is_empty()),
            auth: profile.auth,
            pagination: profile.pagination,
            rate: profile.rate,
            request_id_header: profile.request_id_header,
            transport,
        })
    }

    pub fn base(&self) -> &str {
        self.base.as_str()
    }

    fn url(&self, path: &str, query: &[(String, String)]) -> Result<reqwest::Url, ScmError> {
        let mut url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ScmError::Validation(format!("invalid request path {path:?}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// GET a single entity.
    pub async fn get<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        op: &'static str,
        target: &str,
        path: &str,
    ) -> Result<(T, Response), ScmError> {
        let raw = self.send(ctx, op, target, Method::GET, path, &[], None).await?;
        let value = decode(op, target, &raw.body)?;
        Ok((value, self.meta(&raw, Page::default())))
    }

    /// GET a list endpoint, reconciling its pagination metadata.
    pub async fn list<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        op: &'static str,
        target: &str,
        path: &str,
        opts: &ListOptions,
        extra: &[(String, String)],
    ) -> Result<(Vec<T>, Response), ScmError> {
        let mut query = extra.to_vec();
        query.extend(self.pagination.query(opts));
        let raw = self.send(ctx, op, target, Method::GET, path, &query, None).await?;
        let items: Vec<T> = decode(op, target, &raw.body)?;
        let page = self.pagination.page(opts, &raw.headers, items.len());
        Ok((items, self.meta(&raw, page)))
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        ctx: &Context,
        op: &'static str,
        target: &str,
        path: &str,
        body: &B,
    ) -> Result<(T, Response), ScmError> {
        let payload = serde_json::to_vec(body).map_err(|source| ScmError::Decode {
            op,
            target: target.to_string(),
            source,
        })?;
        let raw = self
            .send(ctx, op, target, Method::POST, path, &[], Some(payload))
            .await?;
        let value = decode(op, target, &raw.body)?;
        Ok((value, self.meta(&raw, Page::default())))
    }

    pub async fn delete(
        &self,
        ctx: &Context,
        op: &'static str,
        target: &str,
        path: &str,
    ) -> Result<Response, ScmError> {
        let raw = self
            .send(ctx, op, target, Method::DELETE, path, &[], None)
            .await?;
        Ok(self.meta(&raw, Page::default()))
    }

    #[allow(clippy::too_many_arguments)]
    async fn send(
        &self,
        ctx: &Context,
        op: &'static str,
        target: &str,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, ScmError> {
        let url = self.url(path, query)?;
        let mut request = Request::new(method, url.as_str())
            .header("accept", "application/json")
            .map_err(|source| transport_error(op, target, source))?;
        if let Some(token) = &self.token {
            let value = match self.auth {
                AuthScheme::Bearer => format!("Bearer {token}"),
                AuthScheme::Token => format!("token {token}"),
            };
            request = request
                .header("authorization", &value)
                .map_err(|source| transport_error(op, target, source))?;
        }
        if let Some(body) = body {
            request = request.json_body(body);
        }

        debug!(driver = %self.driver, op, method = %request.method, url = %url, "sending request");
        let response = ctx
            .run(async {
                self.transport
                    .send(request)
                    .await
                    .map_err(|source| transport_error(op, target, source))
            })
            .await?;

        check_status(op, target, &response)?;
        Ok(response)
    }

    fn meta(&self, raw: &HttpResponse, page: Page) -> Response {
        Response {
            status: raw.status.as_u16(),
            id: header_string(&raw.headers, self.request_id_header),
            rate: rate::extract(self.rate.as_ref(), &raw.headers),
            headers: raw.headers.clone(),
            page,
        }
    }
}

fn transport_error(
    op: &'static str,
    target: &str,
    source: crate::transport::TransportError,
) -> ScmError {
    ScmError::Transport {
        op,
        target: target.to_string(),
        source,
    }
}

fn check_status(op: &'static str, target: &str, response: &HttpResponse) -> Result<(), ScmError> {
    if response.status.is_success() {
        return Ok(());
    }
    if response.status == StatusCode::NOT_FOUND {
        return Err(ScmError::NotFound {
            op,
            target: target.to_string(),
        });
    }
    let message = serde_json::from_slice::<ErrorBody>(&response.body)
        .map(|b| b.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(&response.body).into_owned());
    Err(ScmError::Api {
        op,
        target: target.to_string(),
        status: response.status.as_u16(),
        message,
    })
}

fn decode<T: DeserializeOwned>(op: &'static str, target: &str, body: &[u8]) -> Result<T, ScmError> {
    serde_json::from_slice(body).map_err(|source| ScmError::Decode {
        op,
        target: target.to_string(),
        source,
    })
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Shorthand for an unsupported operation on `driver`.
pub(crate) fn not_supported<T>(op: &'static str, driver: Driver) -> Result<T, ScmError> {
    Err(ScmError::NotSupported { op, driver })
}

/// Validate a caller-supplied identifier and encode it as one path segment.
///
/// Dot segments would be resolved away by the URL parser and control
/// characters stripped, so both are rejected rather than encoded.
pub(crate) fn path_segment(field: &str, value: &str) -> Result<String, ScmError> {
    require(field, value)?;
    if matches!(value, "." | "..") || value.contains(char::is_control) {
        return Err(ScmError::Validation(format!(
            "{field} is not a valid path segment: {value:?}"
        )));
    }
    Ok(segment(value))
}

/// Percent-encode one path segment (branch names may contain `/`).
fn segment(value: &str) -> String {
    let mut url = match reqwest::Url::parse("http://x/") {
        Ok(url) => url,
        Err(_) => return value.to_string(),
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(value);
    }
    url.path().trim_start_matches('/').to_string()
}

/// Deserialize `null` as the type's default value.
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + serde::Deserialize<'de>,
{
    use serde::Deserialize;
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::Pagination;
    use crate::transport::mock::{HangingTransport, MockTransport};

    fn profile() -> Profile {
        Profile {
            driver: Driver::Github,
            auth: AuthScheme::Bearer,
            pagination: Pagination::link_header("page", "per_page"),
            rate: Some(crate::rate::GITHUB),
            request_id_header: "x-github-request-id",
        }
    }

    #[test]
    fn test_url_keeps_base_path() {
        let api = Api::new(
            profile(),
            "https://try.gitea.io/api/v1",
            None,
            Arc::new(MockTransport::new()),
        )
        .unwrap();
        let url = api.url("/repos/o/r", &[("page".into(), "2".into())]).unwrap();
        assert_eq!(url.as_str(), "https://try.gitea.io/api/v1/repos/o/r?page=2");
    }

    #[test]
    fn test_invalid_base_url() {
        let err = Api::new(profile(), "not a url", None, Arc::new(MockTransport::new())).unwrap_err();
        assert!(matches!(err, ScmError::Validation(_)));
    }

    #[test]
    fn test_segment_escapes_slashes() {
        assert_eq!(segment("feature/x"), "feature%2Fx");
        assert_eq!(segment("master"), "master");
    }

    #[test]
    fn test_path_segment_escapes_url_syntax() {
        assert_eq!(path_segment("sha", "a#b").unwrap(), "a%23b");
        assert_eq!(path_segment("sha", "a?b").unwrap(), "a%3Fb");
        assert_eq!(path_segment("sha", "%2e%2e").unwrap(), "%252e%252e");
    }

    #[test]
    fn test_path_segment_rejects_dot_segments() {
        for bad in ["", " ", ".", "..", "a\tb", "..\n"] {
            let err = path_segment("sha", bad).unwrap_err();
            assert!(matches!(err, ScmError::Validation(_)), "{bad:?}");
        }
    }

    #[test]
    fn test_debug_redacts_token() {
        let api = Api::new(
            profile(),
            "https://api.github.com",
            Some("s3cr3t".to_string()),
            Arc::new(MockTransport::new()),
        )
        .unwrap();
        assert!(!format!("{api:?}").contains("s3cr3t"));
    }

    #[tokio::test]
    async fn test_authorization_header() {
        let mock = MockTransport::new().get("/user", &[], "{}");
        let api = Api::new(
            profile(),
            "https://api.github.com",
            Some("t0k3n".to_string()),
            Arc::new(mock.clone()),
        )
        .unwrap();
        let _: (serde_json::Value, Response) = api
            .get(&Context::background(), "find_user", "me", "/user")
            .await
            .unwrap();
        let sent = &mock.requests()[0];
        assert_eq!(sent.headers["authorization"], "Bearer t0k3n");
    }

    #[tokio::test]
    async fn test_not_found_maps_to_sentinel() {
        let api = Api::new(profile(), "https://api.github.com", None, Arc::new(MockTransport::new()))
            .unwrap();
        let err = api
            .get::<serde_json::Value>(&Context::background(), "find", "o/r", "/repos/o/r")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_error_status_carries_provider_message() {
        let mock = MockTransport::new().route(
            Method::GET,
            "/repos/o/r",
            403,
            &[],
            r#"{"message":"API rate limit exceeded"}"#,
        );
        let api = Api::new(profile(), "https://api.github.com", None, Arc::new(mock)).unwrap();
        let err = api
            .get::<serde_json::Value>(&Context::background(), "find", "o/r", "/repos/o/r")
            .await
            .unwrap_err();
        match err {
            ScmError::Api { status, message, op, .. } => {
                assert_eq!(status, 403);
                assert_eq!(message, "API rate limit exceeded");
                assert_eq!(op, "find");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let mock = MockTransport::new().get("/repos/o/r", &[], "<html>");
        let api = Api::new(profile(), "https://api.github.com", None, Arc::new(mock)).unwrap();
        let err = api
            .get::<serde_json::Value>(&Context::background(), "find", "o/r", "/repos/o/r")
            .await
            .unwrap_err();
        assert!(matches!(err, ScmError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_cancellation_returns_cancelled_not_provider_error() {
        let api = Api::new(profile(), "https://api.github.com", None, Arc::new(HangingTransport))
            .unwrap();
        let (ctx, handle) = Context::background().with_cancel();
        let call = tokio::spawn(async move {
            api.get::<serde_json::Value>(&ctx, "find", "o/r", "/repos/o/r")
                .await
                .map(|_| ())
        });
        tokio::task::yield_now().await;
        handle.cancel();
        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, ScmError::Cancelled));
    }
}
