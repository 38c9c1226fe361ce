use serde::Deserialize;
use std::{env, time::Duration};
use thiserror::Error;

/// Frontend origins the edge trusts with credentialed CORS.
pub const DEFAULT_ALLOWED_ORIGINS: &str = "https://willenaenglish.netlify.app,\
https://willenaenglish.github.io,\
https://willenaenglish-github-io.pages.dev,\
https://staging.willenaenglish-github-io.pages.dev,\
https://willenaenglish.com,\
https://www.willenaenglish.com,\
https://students.willenaenglish.com,\
https://teachers.willenaenglish.com,\
https://cf.willenaenglish.com,\
https://staging.willenaenglish.com,\
http://localhost:9000,\
http://localhost:8888";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error(transparent)]
    Load(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSection,
    pub logging: LoggingSection,
    pub upstream: UpstreamSection,
    pub cookies: CookieSection,
    pub cors: CorsSection,
    pub http: HttpSection,
    pub routing: RoutingSection,
    pub cache: CacheSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub env: String,
    pub name: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    pub log_format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamSection {
    pub base_url: String,
    pub timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookieSection {
    pub domain: String,
    pub mode: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsSection {
    pub allowed_origins: String,
    pub default_origin: String,
    pub allow_methods: String,
    pub allow_headers: String,
    pub max_age_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpSection {
    pub max_request_size_bytes: u64,
    pub max_in_flight: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutingSection { pub function_allowlist: String }

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection { pub private_rules: String }

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds and validates the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let builder = config::Config::builder()
            .set_default("app.env", env_or("APP_ENV", "local"))?
            .set_default("app.name", env_or("APP_NAME", "edge-proxy"))?
            .set_default("app.host", env_or("APP_HOST", "0.0.0.0"))?
            .set_default("app.port", env_or("APP_PORT", "8787"))?
            .set_default("logging.log_format", env_or("LOG_FORMAT", "text"))?
            .set_override("upstream.base_url", required("BACKEND_BASE")?)?
            .set_default("upstream.timeout_ms", env_or("UPSTREAM_TIMEOUT_MS", "30000"))?
            .set_default("upstream.connect_timeout_ms", env_or("UPSTREAM_CONNECT_TIMEOUT_MS", "10000"))?
            .set_override("cookies.domain", required("COOKIE_DOMAIN")?)?
            .set_default("cookies.mode", env_or("COOKIE_MODE", "auto"))?
            .set_default("cors.allowed_origins", env_or("ALLOWED_ORIGINS", DEFAULT_ALLOWED_ORIGINS))?
            .set_default("cors.default_origin", env_or("DEFAULT_ORIGIN", "https://willenaenglish.netlify.app"))?
            .set_default("cors.allow_methods", env_or("CORS_ALLOW_METHODS", "GET,POST,DELETE,OPTIONS"))?
            .set_default("cors.allow_headers", env_or("CORS_ALLOW_HEADERS", "Content-Type,Authorization,Cookie"))?
            .set_default("cors.max_age_secs", env_or("CORS_MAX_AGE_SECS", "86400"))?
            .set_default("http.max_request_size_bytes", env_or("MAX_REQUEST_SIZE_BYTES", "1048576"))?
            .set_default("http.max_in_flight", env_or("MAX_IN_FLIGHT", "1024"))?
            .set_default("routing.function_allowlist", env_or("FUNCTION_ALLOWLIST", ""))?
            .set_default("cache.private_rules", env_or("PRIVATE_CACHE_RULES", "progress_summary?section=leaderboard_stars_class"))?;

        let cfg: AppConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = url::Url::parse(&self.upstream.base_url).map_err(|e| ConfigError::Invalid {
            key: "BACKEND_BASE",
            reason: e.to_string(),
        })?;
        if !matches!(base.scheme(), "http" | "https") || base.host_str().is_none() {
            return Err(invalid("BACKEND_BASE", "must be an absolute http(s) URL"));
        }
        if base.query().is_some() || base.fragment().is_some() {
            return Err(invalid("BACKEND_BASE", "must not carry a query or fragment"));
        }

        let domain = &self.cookies.domain;
        if !domain.starts_with('.') || domain.len() < 2 {
            return Err(invalid("COOKIE_DOMAIN", "must be dot-prefixed, e.g. .example.com"));
        }
        if domain.chars().any(|c| c.is_whitespace() || c == ';' || c == ',') {
            return Err(invalid("COOKIE_DOMAIN", "contains forbidden characters"));
        }

        if !matches!(self.cookies.mode.as_str(), "auto" | "local" | "public") {
            return Err(invalid("COOKIE_MODE", "expected auto, local or public"));
        }
        if !matches!(self.logging.log_format.as_str(), "text" | "json") {
            return Err(invalid("LOG_FORMAT", "expected text or json"));
        }
        if self.cors.default_origin.trim().is_empty() {
            return Err(invalid("DEFAULT_ORIGIN", "must not be empty"));
        }

        let methods = self.allow_methods();
        for required in ["GET", "POST", "OPTIONS"] {
            if !methods.iter().any(|m| m.eq_ignore_ascii_case(required)) {
                return Err(invalid("CORS_ALLOW_METHODS", &format!("must include {required}")));
            }
        }
        let headers = self.allow_headers();
        for required in ["Content-Type", "Authorization"] {
            if !headers.iter().any(|h| h.eq_ignore_ascii_case(required)) {
                return Err(invalid("CORS_ALLOW_HEADERS", &format!("must include {required}")));
            }
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool { self.app.env == "production" }
    pub fn upstream_timeout(&self) -> Duration { Duration::from_millis(self.upstream.timeout_ms) }
    pub fn connect_timeout(&self) -> Duration { Duration::from_millis(self.upstream.connect_timeout_ms) }
    pub fn allowed_origins(&self) -> Vec<String> { split_list(&self.cors.allowed_origins) }
    pub fn allow_methods(&self) -> Vec<String> { split_list(&self.cors.allow_methods) }
    pub fn allow_headers(&self) -> Vec<String> { split_list(&self.cors.allow_headers) }
    pub fn function_allowlist(&self) -> Vec<String> { split_list(&self.routing.function_allowlist) }
    pub fn private_cache_rules(&self) -> Vec<String> { split_list(&self.cache.private_rules) }
}

fn invalid(key: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid { key, reason: reason.to_string() }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![
            ("BACKEND_BASE", "https://willenaenglish.netlify.app"),
            ("COOKIE_DOMAIN", ".willenaenglish.com"),
        ]
    }

    #[test]
    fn test_defaults_applied() {
        let cfg = load(&base()).unwrap();
        assert_eq!(cfg.app.port, 8787);
        assert_eq!(cfg.cookies.mode, "auto");
        assert_eq!(cfg.upstream_timeout(), Duration::from_secs(30));
        assert!(cfg.allowed_origins().contains(&"https://students.willenaenglish.com".to_string()));
        assert!(cfg.function_allowlist().is_empty());
        assert_eq!(cfg.private_cache_rules(), vec!["progress_summary?section=leaderboard_stars_class"]);
    }

    #[test]
    fn test_missing_backend_base() {
        let err = load(&[("COOKIE_DOMAIN", ".willenaenglish.com")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("BACKEND_BASE")));
    }

    #[test]
    fn test_missing_cookie_domain() {
        let err = load(&[("BACKEND_BASE", "https://origin.example")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("COOKIE_DOMAIN")));
    }

    #[test]
    fn test_cookie_domain_must_be_dot_prefixed() {
        let err = load(&[
            ("BACKEND_BASE", "https://origin.example"),
            ("COOKIE_DOMAIN", "willenaenglish.com"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "COOKIE_DOMAIN", .. }));
    }

    #[test]
    fn test_backend_base_rejects_query_and_scheme() {
        for bad in ["ftp://origin.example", "https://origin.example/?x=1", "not a url"] {
            let err = load(&[("BACKEND_BASE", bad), ("COOKIE_DOMAIN", ".example.com")]).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { key: "BACKEND_BASE", .. }), "{bad}");
        }
    }

    #[test]
    fn test_cors_methods_must_cover_required_set() {
        let mut vars = base();
        vars.push(("CORS_ALLOW_METHODS", "GET,POST"));
        let err = load(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "CORS_ALLOW_METHODS", .. }));
    }

    #[test]
    fn test_list_parsing_trims_entries() {
        let mut vars = base();
        vars.push(("FUNCTION_ALLOWLIST", " supabase_auth , homework_api,,"));
        let cfg = load(&vars).unwrap();
        assert_eq!(cfg.function_allowlist(), vec!["supabase_auth", "homework_api"]);
    }
}
