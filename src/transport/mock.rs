//! Canned-response transport used by driver tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};

use super::{HttpResponse, Request, Transport, TransportError};

/// Rate limit headers GitHub attaches to every API response.
pub const GITHUB_RATE_HEADERS: &[(&str, &str)] = &[
    ("x-ratelimit-limit", "60"),
    ("x-ratelimit-remaining", "59"),
    ("x-ratelimit-reset", "1512076018"),
    ("x-github-request-id", "DD0E:6011:12F21A8:1926790:5A2064E2"),
];

/// Link relations announcing page 2 of 3.
pub const LINK_PAGE_HEADERS: &[(&str, &str)] = &[(
    "link",
    "<https://api.github.com/resource?page=2>; rel=\"next\", \
     <https://api.github.com/resource?page=1>; rel=\"prev\", \
     <https://api.github.com/resource?page=1>; rel=\"first\", \
     <https://api.github.com/resource?page=3>; rel=\"last\"",
)];

#[derive(Debug, Clone)]
struct Route {
    method: Method,
    path: String,
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

/// Replays a response for each registered `(method, path)` and records every
/// request it sees. Unmatched requests get a 404.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    routes: Arc<Mutex<Vec<Route>>>,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(
        self,
        method: Method,
        path: &str,
        status: u16,
        headers: &[(&str, &str)],
        body: &str,
    ) -> Self {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        self.routes.lock().unwrap().push(Route {
            method,
            path: path.to_string(),
            status: StatusCode::from_u16(status).unwrap(),
            headers: map,
            body: body.as_bytes().to_vec(),
        });
        self
    }

    pub fn get(self, path: &str, headers: &[(&str, &str)], body: &str) -> Self {
        self.route(Method::GET, path, 200, headers, body)
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    /// The single recorded request, with its query split into pairs.
    pub fn last_query(&self) -> Vec<(String, String)> {
        let requests = self.requests();
        let last = requests.last().expect("no request recorded");
        let url = reqwest::Url::parse(&last.url).unwrap();
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: Request) -> Result<HttpResponse, TransportError> {
        let path = reqwest::Url::parse(&request.url)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?
            .path()
            .to_string();
        self.requests.lock().unwrap().push(request.clone());

        let routes = self.routes.lock().unwrap();
        let found = routes
            .iter()
            .find(|r| r.method == request.method && r.path == path);
        Ok(match found {
            Some(route) => HttpResponse {
                status: route.status,
                headers: route.headers.clone(),
                body: route.body.clone(),
            },
            None => HttpResponse {
                status: StatusCode::NOT_FOUND,
                headers: HeaderMap::new(),
                body: br#"{"message":"Not Found"}"#.to_vec(),
            },
        })
    }
}

/// Never answers; used to exercise cancellation.
#[derive(Debug, Clone, Default)]
pub struct HangingTransport;

#[async_trait]
impl Transport for HangingTransport {
    async fn send(&self, _request: Request) -> Result<HttpResponse, TransportError> {
        std::future::pending().await
    }
}
