use std::{net::IpAddr, str::FromStr};

pub use ep_cookie::DeploymentMode;

/// `COOKIE_MODE`: either pinned by configuration or detected per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSetting {
    Auto,
    Local,
    Public,
}

impl FromStr for ModeSetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ModeSetting::Auto),
            "local" => Ok(ModeSetting::Local),
            "public" => Ok(ModeSetting::Public),
            other => Err(format!("unknown cookie mode {other:?}")),
        }
    }
}

/// Resolved once per request and passed down; nothing else inspects `Host`.
pub fn resolve_mode(setting: ModeSetting, host: Option<&str>) -> DeploymentMode {
    match setting {
        ModeSetting::Local => DeploymentMode::LocalDev,
        ModeSetting::Public => DeploymentMode::PublicEdge,
        ModeSetting::Auto if host.map(is_loopback_host).unwrap_or(false) => DeploymentMode::LocalDev,
        ModeSetting::Auto => DeploymentMode::PublicEdge,
    }
}

fn is_loopback_host(host: &str) -> bool {
    let host = host.trim();
    let hostname = if let Some(rest) = host.strip_prefix('[') {
        rest.split(']').next().unwrap_or_default()
    } else if host.matches(':').count() == 1 {
        host.split(':').next().unwrap_or_default()
    } else {
        host
    };
    if hostname.eq_ignore_ascii_case("localhost") || hostname.to_ascii_lowercase().ends_with(".localhost") {
        return true;
    }
    hostname.parse::<IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false)
}
