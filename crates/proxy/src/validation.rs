use std::collections::HashSet;
use ep_core::{config::AppConfig, error::{ProxyError, ProxyResult}};
use once_cell::sync::Lazy;
use regex::Regex;

// Compile regex patterns once at startup
static FUNCTION_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/\.netlify/functions(?:/([^/]*))?(?:/.*)?$").expect("valid function path regex")
});

/// Gate for `/.netlify/functions/<name>` paths. Everything else passes through.
#[derive(Debug, Clone, Default)]
pub struct FunctionRouting {
    allowlist: HashSet<String>,
}

impl FunctionRouting {
    pub fn new(allowlist: impl IntoIterator<Item = String>) -> Self {
        Self { allowlist: allowlist.into_iter().collect() }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(cfg.function_allowlist())
    }

    /// Validate a request path before anything is sent upstream
    pub fn check(&self, path: &str) -> ProxyResult<()> {
        let Some(caps) = FUNCTION_PATH.captures(path) else {
            return Ok(());
        };
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if name.is_empty() {
            return Err(ProxyError::InvalidPath);
        }
        if !self.allowlist.is_empty() && !self.allowlist.contains(name) {
            tracing::debug!(function = name, "function not in allowlist");
            return Err(ProxyError::UnknownFunction(name.to_string()));
        }
        Ok(())
    }
}
