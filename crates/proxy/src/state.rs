use std::sync::Arc;
use ep_cookie::CookiePolicy;
use ep_core::config::AppConfig;
use ep_upstream::{OriginTarget, Upstream};
use crate::{cors::CorsPolicy, mode::ModeSetting, response::CacheRules, validation::FunctionRouting};

/// Immutable per-process state. Built once from `AppConfig`, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<dyn Upstream>,
    pub target: Arc<OriginTarget>,
    pub cors: Arc<CorsPolicy>,
    pub cookies: Arc<CookiePolicy>,
    pub cache: Arc<CacheRules>,
    pub functions: Arc<FunctionRouting>,
    pub mode: ModeSetting,
    pub cfg: Arc<AppConfig>,
}

impl AppState {
    pub fn new(upstream: Arc<dyn Upstream>, cfg: Arc<AppConfig>) -> anyhow::Result<Self> {
        let target = OriginTarget::new(&cfg.upstream.base_url)?;
        let mode = cfg.cookies.mode.parse::<ModeSetting>().map_err(anyhow::Error::msg)?;
        Ok(Self {
            upstream,
            target: Arc::new(target),
            cors: Arc::new(CorsPolicy::from_config(&cfg)),
            cookies: Arc::new(CookiePolicy::new(cfg.cookies.domain.clone())),
            cache: Arc::new(CacheRules::from_config(&cfg)),
            functions: Arc::new(FunctionRouting::from_config(&cfg)),
            mode,
            cfg,
        })
    }
    pub fn body_limit(&self) -> usize { self.cfg.http.max_request_size_bytes as usize }
}
