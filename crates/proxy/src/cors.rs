use std::collections::HashSet;
use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use ep_core::config::AppConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsDecision {
    pub allow_origin: String,
    pub allow_credentials: bool,
}

/// Exact-match origin allowlist with a single conservative fallback origin.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed: HashSet<String>,
    default_origin: String,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
    max_age: HeaderValue,
}

impl CorsPolicy {
    pub fn new(
        allowed: impl IntoIterator<Item = String>,
        default_origin: impl Into<String>,
        methods: &[String],
        headers: &[String],
        max_age_secs: u64,
    ) -> Self {
        let allow_methods = HeaderValue::from_str(&methods.join(", "))
            .unwrap_or_else(|_| HeaderValue::from_static("GET, POST, OPTIONS"));
        let allow_headers = HeaderValue::from_str(&headers.join(", "))
            .unwrap_or_else(|_| HeaderValue::from_static("Content-Type, Authorization"));
        Self {
            allowed: allowed.into_iter().collect(),
            default_origin: default_origin.into(),
            allow_methods,
            allow_headers,
            max_age: HeaderValue::from(max_age_secs),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.allowed_origins(),
            cfg.cors.default_origin.clone(),
            &cfg.allow_methods(),
            &cfg.allow_headers(),
            cfg.cors.max_age_secs,
        )
    }

    pub fn resolve(&self, origin: Option<&str>) -> CorsDecision {
        match origin {
            Some(o) if self.allowed.contains(o) => CorsDecision {
                allow_origin: o.to_string(),
                allow_credentials: true,
            },
            _ => CorsDecision {
                allow_origin: self.default_origin.clone(),
                allow_credentials: self.allowed.contains(&self.default_origin),
            },
        }
    }

    /// Writes the CORS headers over whatever the origin sent.
    pub fn apply(&self, decision: &CorsDecision, headers: &mut HeaderMap) {
        match HeaderValue::from_str(&decision.allow_origin) {
            Ok(v) => { headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, v); }
            Err(_) => { headers.remove(header::ACCESS_CONTROL_ALLOW_ORIGIN); }
        }
        if decision.allow_credentials {
            headers.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        } else {
            headers.remove(header::ACCESS_CONTROL_ALLOW_CREDENTIALS);
        }
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());

        let varies_on_origin = headers
            .get_all(header::VARY)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|v| { let v = v.trim(); v == "*" || v.eq_ignore_ascii_case("origin") });
        if !varies_on_origin {
            headers.append(header::VARY, HeaderValue::from_static("Origin"));
        }
    }

    /// Terminal answer to an `OPTIONS` request. The origin is never contacted.
    pub fn preflight(&self, decision: &CorsDecision) -> Response {
        let mut resp = StatusCode::NO_CONTENT.into_response();
        self.apply(decision, resp.headers_mut());
        resp.headers_mut().insert(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: &str = "https://willenaenglish.netlify.app";

    fn policy() -> CorsPolicy {
        CorsPolicy::new(
            [DEFAULT.to_string(), "https://students.willenaenglish.com".to_string()],
            DEFAULT,
            &["GET".into(), "POST".into(), "DELETE".into(), "OPTIONS".into()],
            &["Content-Type".into(), "Authorization".into(), "Cookie".into()],
            600,
        )
    }

    #[test]
    fn test_allowlisted_origin_is_echoed() {
        let d = policy().resolve(Some("https://students.willenaenglish.com"));
        assert_eq!(d.allow_origin, "https://students.willenaenglish.com");
        assert!(d.allow_credentials);
    }

    #[test]
    fn test_unknown_origin_falls_back_to_default() {
        for origin in [Some("https://evil.example"), Some("https://students.willenaenglish.com.evil.example"), None] {
            let d = policy().resolve(origin);
            assert_eq!(d.allow_origin, DEFAULT);
        }
    }

    #[test]
    fn test_no_subdomain_or_case_matching() {
        let d = policy().resolve(Some("https://teachers.willenaenglish.com"));
        assert_eq!(d.allow_origin, DEFAULT);
        let d = policy().resolve(Some("HTTPS://students.willenaenglish.com"));
        assert_eq!(d.allow_origin, DEFAULT);
    }

    #[test]
    fn test_fallback_without_credentials_when_default_not_allowlisted() {
        let p = CorsPolicy::new(
            ["https://students.willenaenglish.com".to_string()],
            DEFAULT,
            &["GET".into()],
            &["Content-Type".into()],
            0,
        );
        assert!(!p.resolve(None).allow_credentials);
    }

    #[test]
    fn test_apply_overrides_upstream_values() {
        let p = policy();
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(header::VARY, HeaderValue::from_static("Accept-Encoding"));
        p.apply(&p.resolve(Some("https://students.willenaenglish.com")), &mut headers);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://students.willenaenglish.com");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET, POST, DELETE, OPTIONS");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type, Authorization, Cookie");
        let vary: Vec<_> = headers.get_all(header::VARY).iter().collect();
        assert_eq!(vary, vec!["Accept-Encoding", "Origin"]);
    }

    #[test]
    fn test_vary_origin_not_duplicated() {
        let p = policy();
        let mut headers = HeaderMap::new();
        headers.insert(header::VARY, HeaderValue::from_static("Accept-Encoding, Origin"));
        p.apply(&p.resolve(None), &mut headers);
        assert_eq!(headers.get_all(header::VARY).iter().count(), 1);
    }

    #[test]
    fn test_preflight_is_no_content() {
        let p = policy();
        let resp = p.preflight(&p.resolve(Some(DEFAULT)));
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], DEFAULT);
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_MAX_AGE], "600");
    }
}
