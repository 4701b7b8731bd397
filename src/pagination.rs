//! Pagination engine.
//!
//! Providers signal "more results" in different ways: `Link` header relations,
//! a total-count header, or nothing but a full page. Every driver describes
//! its scheme with a [`Pagination`] value and lets this module translate
//! [`ListOptions`] into query parameters and response headers into a
//! canonical [`Page`].

use reqwest::header::{HeaderMap, LINK};
use tracing::debug;

use crate::scm::{ListOptions, Page};

/// Total result count header sent by page-number providers.
pub const TOTAL_COUNT: &str = "x-total-count";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// `Link: <url>; rel="next"` style relations.
    LinkHeader,
    /// Plain page numbers, with an optional total-count header.
    PageNumber,
    /// The endpoint returns everything at once.
    Unpaginated,
}

/// How one provider paginates list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub scheme: Scheme,
    /// Query parameter carrying the page number
    pub page_param: &'static str,
    /// Query parameter carrying the page size
    pub size_param: &'static str,
}

impl Pagination {
    pub const fn link_header(page_param: &'static str, size_param: &'static str) -> Self {
        Self {
            scheme: Scheme::LinkHeader,
            page_param,
            size_param,
        }
    }

    pub const fn page_number(page_param: &'static str, size_param: &'static str) -> Self {
        Self {
            scheme: Scheme::PageNumber,
            page_param,
            size_param,
        }
    }

    /// The same parameter names, for an endpoint that does not paginate.
    pub const fn unpaginated(self) -> Self {
        Self {
            scheme: Scheme::Unpaginated,
            ..self
        }
    }

    /// Query parameters for `opts`. Zero values are left to the provider default.
    pub fn query(&self, opts: &ListOptions) -> Vec<(String, String)> {
        if self.scheme == Scheme::Unpaginated {
            return Vec::new();
        }
        let mut params = Vec::with_capacity(2);
        if opts.page != 0 {
            params.push((self.page_param.to_string(), opts.page.to_string()));
        }
        if opts.size != 0 {
            params.push((self.size_param.to_string(), opts.size.to_string()));
        }
        params
    }

    /// Reconcile response metadata into a canonical [`Page`].
    ///
    /// `returned` is the number of items decoded from the response body.
    pub fn page(&self, opts: &ListOptions, headers: &HeaderMap, returned: usize) -> Page {
        let page = match self.scheme {
            Scheme::Unpaginated => Page::default(),
            Scheme::LinkHeader => self.links(opts, headers).unwrap_or_default(),
            // Link relations win when a page-number provider sends them too.
            Scheme::PageNumber => match (self.links(opts, headers), total_count(headers)) {
                (Some(page), _) => page,
                (None, Some(total)) => from_total(opts, total),
                (None, None) => from_short_page(opts, returned),
            },
        };
        debug!(scheme = ?self.scheme, next = ?page.next, last = ?page.last, "resolved page");
        page
    }
}

impl Pagination {
    fn links(&self, opts: &ListOptions, headers: &HeaderMap) -> Option<Page> {
        let mut values = headers.get_all(LINK).iter().filter_map(|v| v.to_str().ok()).peekable();
        values.peek()?;
        Some(values.fold(Page::default(), |page, value| {
            merge(page, parse_links(value, self.page_param, opts.page.max(1)))
        }))
    }
}

fn merge(mut page: Page, other: Page) -> Page {
    page.first = page.first.or(other.first);
    page.next = page.next.or(other.next);
    page.prev = page.prev.or(other.prev);
    page.last = page.last.or(other.last);
    page.next_link = page.next_link.or(other.next_link);
    page
}

/// Parse a `Link` header value.
///
/// Each relation's page number comes from `page_param` in its URL. A URL
/// without one is an opaque cursor: the number is synthesised from the
/// current page, and the raw next URL is kept so callers can follow it.
pub fn parse_links(value: &str, page_param: &str, current: u32) -> Page {
    let mut page = Page::default();
    for part in value.split(',') {
        let mut segments = part.split(';');
        let Some(target) = segments.next() else {
            continue;
        };
        let target = target.trim();
        let Some(url) = target.strip_prefix('<').and_then(|t| t.strip_suffix('>')) else {
            continue;
        };
        let rel = segments
            .filter_map(|s| s.trim().strip_prefix("rel="))
            .map(|r| r.trim_matches('"'))
            .next();
        let Some(rel) = rel else {
            continue;
        };

        let number = page_number(url, page_param);
        match rel {
            "next" => {
                page.next = number.or_else(|| current.checked_add(1));
                page.next_link = Some(url.to_string());
            }
            "prev" | "previous" => {
                page.prev = number.or_else(|| current.checked_sub(1).filter(|p| *p > 0));
            }
            "first" => page.first = number.or(Some(1)),
            "last" => page.last = number,
            _ => {}
        }
    }
    page
}

fn page_number(url: &str, page_param: &str) -> Option<u32> {
    let url = reqwest::Url::parse(url).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == page_param)
        .and_then(|(_, v)| v.parse().ok())
}

fn total_count(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(TOTAL_COUNT)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn from_total(opts: &ListOptions, total: u64) -> Page {
    let current = opts.page.max(1);
    if opts.size == 0 {
        // Unknown page size: the total alone cannot locate the last page.
        return Page {
            prev: current.checked_sub(1).filter(|p| *p > 0),
            first: (current > 1).then_some(1),
            ..Page::default()
        };
    }
    let last = total.div_ceil(u64::from(opts.size)).max(1);
    let last = u32::try_from(last).unwrap_or(u32::MAX);
    Page {
        first: (current > 1).then_some(1),
        next: (current < last).then_some(current + 1),
        prev: (current > 1).then_some(current - 1),
        last: (current < last).then_some(last),
        next_link: None,
    }
}

/// A page holding exactly `size` items is taken to mean there may be more.
/// A final page that happens to be full still reports a next page. There is
/// no page after `u32::MAX`.
fn from_short_page(opts: &ListOptions, returned: usize) -> Page {
    let current = opts.page.max(1);
    let full = opts.size != 0 && returned == opts.size as usize;
    Page {
        first: (current > 1).then_some(1),
        next: full.then(|| current.checked_add(1)).flatten(),
        prev: (current > 1).then_some(current - 1),
        last: None,
        next_link: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    const GITHUB: Pagination = Pagination::link_header("page", "per_page");
    const GITEA: Pagination = Pagination::page_number("page", "limit");

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn test_query_uses_provider_param_names() {
        let opts = ListOptions { page: 1, size: 30 };
        assert_eq!(
            GITHUB.query(&opts),
            vec![
                ("page".to_string(), "1".to_string()),
                ("per_page".to_string(), "30".to_string())
            ]
        );
        assert_eq!(GITEA.query(&opts)[1], ("limit".to_string(), "30".to_string()));
    }

    #[test]
    fn test_query_omits_zero_values() {
        assert!(GITHUB.query(&ListOptions::default()).is_empty());
        assert!(GITHUB.unpaginated().query(&ListOptions { page: 2, size: 10 }).is_empty());
    }

    #[test]
    fn test_link_header_relations() {
        let h = headers(&[(
            "link",
            "<https://api.github.com/resource?page=2>; rel=\"next\", \
             <https://api.github.com/resource?page=1>; rel=\"prev\", \
             <https://api.github.com/resource?page=1>; rel=\"first\", \
             <https://api.github.com/resource?page=5>; rel=\"last\"",
        )]);
        let page = GITHUB.page(&ListOptions { page: 1, size: 30 }, &h, 30);
        assert_eq!(page.next, Some(2));
        assert_eq!(page.prev, Some(1));
        assert_eq!(page.first, Some(1));
        assert_eq!(page.last, Some(5));
        assert_eq!(
            page.next_link.as_deref(),
            Some("https://api.github.com/resource?page=2")
        );
    }

    #[test]
    fn test_missing_relation_is_absent() {
        let h = headers(&[(
            "link",
            "<https://api.github.com/resource?page=1>; rel=\"first\", \
             <https://api.github.com/resource?page=2>; rel=\"prev\"",
        )]);
        let page = GITHUB.page(&ListOptions { page: 3, size: 30 }, &h, 4);
        assert_eq!(page.next, None);
        assert_eq!(page.last, None);
        assert_eq!(page.prev, Some(2));
    }

    #[test]
    fn test_no_link_header_is_empty_page() {
        let page = GITHUB.page(&ListOptions { page: 1, size: 30 }, &HeaderMap::new(), 30);
        assert_eq!(page, Page::default());
    }

    #[test]
    fn test_cursor_links_synthesise_numbers() {
        let h = headers(&[(
            "link",
            "<https://api.github.com/user/repos?per_page=30&after=Y3Vyc29yOjMw>; rel=\"next\"",
        )]);
        let page = GITHUB.page(&ListOptions { page: 2, size: 30 }, &h, 30);
        assert_eq!(page.next, Some(3));
        assert_eq!(
            page.next_link.as_deref(),
            Some("https://api.github.com/user/repos?per_page=30&after=Y3Vyc29yOjMw")
        );
    }

    #[test]
    fn test_short_page_heuristic() {
        let opts = ListOptions { page: 2, size: 30 };
        let full = GITEA.page(&opts, &HeaderMap::new(), 30);
        assert_eq!(full.next, Some(3));
        assert_eq!(full.prev, Some(1));
        assert_eq!(full.first, Some(1));

        let short = GITEA.page(&opts, &HeaderMap::new(), 12);
        assert_eq!(short.next, None);
    }

    #[test]
    fn test_total_count_beats_short_page() {
        // A full page, but the total says it was the last one.
        let opts = ListOptions { page: 2, size: 10 };
        let h = headers(&[("x-total-count", "20")]);
        let page = GITEA.page(&opts, &h, 10);
        assert_eq!(page.next, None);
        assert_eq!(page.last, None);
        assert_eq!(page.prev, Some(1));

        let h = headers(&[("x-total-count", "45")]);
        let page = GITEA.page(&ListOptions { page: 1, size: 10 }, &h, 10);
        assert_eq!(page.next, Some(2));
        assert_eq!(page.last, Some(5));
    }

    #[test]
    fn test_page_number_scheme_prefers_links() {
        let h = headers(&[
            ("link", "<https://try.gitea.io/api/v1/user/orgs?page=2>; rel=\"next\""),
            ("x-total-count", "1"),
        ]);
        let page = GITEA.page(&ListOptions::default(), &h, 1);
        assert_eq!(page.next, Some(2));
    }

    #[test]
    fn test_unpaginated_is_empty() {
        let h = headers(&[("x-total-count", "200")]);
        let page = GITEA.unpaginated().page(&ListOptions { page: 1, size: 10 }, &h, 10);
        assert_eq!(page, Page::default());
    }

    #[test]
    fn test_same_input_same_page() {
        let h = headers(&[("link", "<https://x/y?page=2>; rel=\"next\"")]);
        let opts = ListOptions { page: 1, size: 30 };
        assert_eq!(GITHUB.page(&opts, &h, 30), GITHUB.page(&opts, &h, 30));
    }

    #[test]
    fn test_last_representable_page_has_no_next() {
        let opts = ListOptions { page: u32::MAX, size: 1 };
        let page = GITEA.page(&opts, &HeaderMap::new(), 1);
        assert_eq!(page.next, None);
        assert_eq!(page.prev, Some(u32::MAX - 1));

        let h = headers(&[("link", "<https://x/y?cursor=abc>; rel=\"next\"")]);
        let page = GITHUB.page(&opts, &h, 1);
        assert_eq!(page.next, None);
        assert_eq!(page.next_link.as_deref(), Some("https://x/y?cursor=abc"));
    }
}
