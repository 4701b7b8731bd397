//! Rate limit header extraction.

use reqwest::header::HeaderMap;

use crate::scm::Rate;

/// Header names one provider uses for its rate limit counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateHeaders {
    pub limit: &'static str,
    pub remaining: &'static str,
    pub reset: &'static str,
}

pub const GITHUB: RateHeaders = RateHeaders {
    limit: "x-ratelimit-limit",
    remaining: "x-ratelimit-remaining",
    reset: "x-ratelimit-reset",
};

/// Read rate limit counters from response headers.
///
/// Providers that report nothing (`names` is `None`) and missing or
/// malformed headers yield zero fields, which [`Rate::is_known`] reports as
/// unknown.
pub fn extract(names: Option<&RateHeaders>, headers: &HeaderMap) -> Rate {
    let Some(names) = names else {
        return Rate::default();
    };
    Rate {
        limit: header_number(headers, names.limit).unwrap_or_default(),
        remaining: header_number(headers, names.remaining).unwrap_or_default(),
        reset: header_number(headers, names.reset).unwrap_or_default(),
    }
}

fn header_number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
