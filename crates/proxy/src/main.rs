use std::sync::Arc;
use tracing::{info, warn};
use ep_core::config::AppConfig;
use edge_proxy::app::{build_app, server_addr};
use edge_proxy::observability::init_tracing;
use edge_proxy::shutdown::shutdown_signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Arc::new(AppConfig::load()?);
    init_tracing(&cfg);
    enforce_prod_cookie_mode(&cfg)?;

    let addr = server_addr(&cfg)?;
    let app = build_app(cfg.clone())?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, env = %cfg.app.env, cookie_mode = %cfg.cookies.mode, "starting edge proxy");

    axum::serve(listener, app.router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn enforce_prod_cookie_mode(cfg: &AppConfig) -> anyhow::Result<()> {
    if cfg.is_production() {
        if cfg.cookies.mode == "local" {
            anyhow::bail!("COOKIE_MODE=local is not allowed in production; use auto or public");
        }
        if cfg.upstream.base_url.starts_with("http://") {
            warn!("BACKEND_BASE is plaintext http in production");
        }
    } else if cfg.cookies.mode == "public" {
        warn!("COOKIE_MODE=public outside production - loopback clients will get Secure cookies");
    }
    Ok(())
}
