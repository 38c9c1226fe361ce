use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method},
    response::Response,
};
use ep_cookie::{CookiePolicy, DeploymentMode};
use ep_core::config::AppConfig;
use ep_upstream::UpstreamResponse;
use crate::headers::strip_hop_by_hop;

pub const PRIVATE_NO_STORE: &str = "private, max-age=0, no-store";

/// A `path?query` fragment pair marking per-user responses.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PrivateCacheRule {
    path_fragment: String,
    query_fragment: String,
}

#[derive(Debug, Clone, Default)]
pub struct CacheRules {
    rules: Vec<PrivateCacheRule>,
}

impl CacheRules {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules = entries
            .into_iter()
            .filter_map(|entry| {
                let entry = entry.as_ref().trim();
                let (path, query) = entry.split_once('?').unwrap_or((entry, ""));
                if path.is_empty() && query.is_empty() {
                    return None;
                }
                Some(PrivateCacheRule { path_fragment: path.to_string(), query_fragment: query.to_string() })
            })
            .collect();
        Self { rules }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(cfg.private_cache_rules())
    }

    pub fn is_private(&self, path: &str, query: Option<&str>) -> bool {
        let query = query.unwrap_or_default();
        self.rules
            .iter()
            .any(|r| path.contains(&r.path_fragment) && query.contains(&r.query_fragment))
    }
}

/// Rewrites every upstream `Set-Cookie` into its own header value, in order.
/// Values that are not valid UTF-8 or fail to parse are passed through.
pub fn rewrite_cookies(upstream: &HeaderMap, policy: &CookiePolicy, mode: DeploymentMode) -> Vec<HeaderValue> {
    upstream
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| {
            let Ok(raw) = value.to_str() else {
                tracing::warn!("forwarding non-utf8 set-cookie unmodified");
                return value.clone();
            };
            match policy.rewrite(raw, mode) {
                Ok(rewritten) => HeaderValue::from_str(&rewritten).unwrap_or_else(|_| value.clone()),
                Err(e) => {
                    tracing::warn!(error = %e, "forwarding malformed set-cookie unmodified");
                    value.clone()
                }
            }
        })
        .collect()
}

/// Builds the edge response from the buffered upstream one. CORS headers are
/// layered on afterwards by the handler so they win over upstream values.
/// `Content-Length` is recomputed from the body, except for HEAD.
pub fn assemble(
    upstream: UpstreamResponse,
    cookies: Vec<HeaderValue>,
    force_private: bool,
    method: &Method,
) -> Response {
    let UpstreamResponse { status, mut headers, body } = upstream;
    strip_hop_by_hop(&mut headers);
    headers.remove(header::SET_COOKIE);
    if method != Method::HEAD {
        headers.remove(header::CONTENT_LENGTH);
    }
    for cookie in cookies {
        headers.append(header::SET_COOKIE, cookie);
    }
    if force_private {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(PRIVATE_NO_STORE));
    }

    let mut resp = Response::new(Body::from(body));
    *resp.status_mut() = status;
    *resp.headers_mut() = headers;
    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use bytes::Bytes;

    fn upstream_with(headers: &[(&'static str, &'static str)]) -> UpstreamResponse {
        let mut map = HeaderMap::new();
        for (k, v) in headers {
            map.append(*k, HeaderValue::from_static(*v));
        }
        UpstreamResponse { status: StatusCode::OK, headers: map, body: Bytes::from_static(b"{\"ok\":true}") }
    }

    #[test]
    fn test_cache_rule_matching() {
        let rules = CacheRules::new(["progress_summary?section=leaderboard_stars_class"]);
        assert!(rules.is_private("/.netlify/functions/progress_summary", Some("section=leaderboard_stars_class")));
        assert!(rules.is_private("/.netlify/functions/progress_summary", Some("class=3&section=leaderboard_stars_class_all")));
        assert!(!rules.is_private("/.netlify/functions/progress_summary", Some("section=overview")));
        assert!(!rules.is_private("/.netlify/functions/homework_api", Some("section=leaderboard_stars_class")));
        assert!(!rules.is_private("/.netlify/functions/progress_summary", None));
    }

    #[test]
    fn test_path_only_rule() {
        let rules = CacheRules::new(["/me", " ", "?"]);
        assert!(rules.is_private("/api/me", None));
        assert!(!rules.is_private("/api/you", Some("me=1")));
    }

    #[test]
    fn test_rewrite_cookies_keeps_each_instance() {
        let up = upstream_with(&[
            ("set-cookie", "sb_access=a; Path=/"),
            ("set-cookie", "broken"),
            ("set-cookie", "sb_refresh=r; Path=/; HttpOnly"),
        ]);
        let policy = CookiePolicy::new(".willenaenglish.com");
        let out = rewrite_cookies(&up.headers, &policy, DeploymentMode::PublicEdge);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], "sb_access=a; Path=/; Domain=.willenaenglish.com; SameSite=None; Secure");
        assert_eq!(out[1], "broken");
        assert_eq!(out[2], "sb_refresh=r; Path=/; HttpOnly; Domain=.willenaenglish.com; SameSite=None; Secure");
    }

    #[test]
    fn test_rewrite_cookies_passes_non_utf8_through() {
        let mut headers = HeaderMap::new();
        let raw = HeaderValue::from_bytes(b"a=\xe9t\xe9; Path=/").unwrap();
        headers.append(header::SET_COOKIE, raw.clone());
        let out = rewrite_cookies(&headers, &CookiePolicy::new(".x.com"), DeploymentMode::PublicEdge);
        assert_eq!(out, vec![raw]);
    }

    #[test]
    fn test_assemble_replaces_cookies_and_drops_hop_headers() {
        let up = upstream_with(&[
            ("content-type", "application/json"),
            ("set-cookie", "a=1"),
            ("transfer-encoding", "chunked"),
            ("content-length", "11"),
        ]);
        let cookies = vec![HeaderValue::from_static("a=1; Domain=.x.com; SameSite=None; Secure")];
        let resp = assemble(up, cookies, false, &Method::GET);
        assert_eq!(resp.status(), StatusCode::OK);
        let h = resp.headers();
        assert_eq!(h[header::CONTENT_TYPE], "application/json");
        assert!(!h.contains_key(header::TRANSFER_ENCODING));
        assert!(!h.contains_key(header::CONTENT_LENGTH));
        let set: Vec<_> = h.get_all(header::SET_COOKIE).iter().collect();
        assert_eq!(set, vec!["a=1; Domain=.x.com; SameSite=None; Secure"]);
    }

    #[test]
    fn test_assemble_keeps_content_length_for_head() {
        let mut up = upstream_with(&[("content-length", "2048")]);
        up.body = Bytes::new();
        let resp = assemble(up, Vec::new(), false, &Method::HEAD);
        assert_eq!(resp.headers()[header::CONTENT_LENGTH], "2048");
    }

    #[test]
    fn test_assemble_forces_private_cache() {
        let up = upstream_with(&[("cache-control", "public, max-age=300")]);
        let resp = assemble(up, Vec::new(), true, &Method::GET);
        assert_eq!(resp.headers().get_all(header::CACHE_CONTROL).iter().count(), 1);
        assert_eq!(resp.headers()[header::CACHE_CONTROL], PRIVATE_NO_STORE);
    }

    #[test]
    fn test_assemble_keeps_upstream_cache_control_otherwise() {
        let up = upstream_with(&[("cache-control", "public, max-age=300")]);
        let resp = assemble(up, Vec::new(), false, &Method::GET);
        assert_eq!(resp.headers()[header::CACHE_CONTROL], "public, max-age=300");
    }
}
