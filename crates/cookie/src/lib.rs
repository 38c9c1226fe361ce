use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CookieParseError {
    #[error("empty cookie")]
    Empty,
    #[error("missing name=value pair")]
    MissingPair,
    #[error("empty cookie name")]
    EmptyName,
    #[error("unrecognized SameSite value {0:?}")]
    InvalidSameSite(String),
}

/// Which attribute choices the edge makes for the client it is answering.
/// The two modes never share flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    /// Plaintext loopback traffic during development.
    LocalDev,
    /// HTTPS traffic on the public edge, usually cross-site.
    PublicEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

impl FromStr for SameSite {
    type Err = CookieParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(SameSite::Strict),
            "lax" => Ok(SameSite::Lax),
            "none" => Ok(SameSite::None),
            _ => Err(CookieParseError::InvalidSameSite(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieAttribute {
    Domain(String),
    Path(String),
    SameSite(SameSite),
    Secure,
    HttpOnly,
    MaxAge(String),
    Expires(String),
    /// Anything else (Partitioned, Priority=High, ...) kept verbatim.
    Other(String),
}

impl fmt::Display for CookieAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CookieAttribute::Domain(v) => write!(f, "Domain={v}"),
            CookieAttribute::Path(v) => write!(f, "Path={v}"),
            CookieAttribute::SameSite(v) => write!(f, "SameSite={}", v.as_str()),
            CookieAttribute::Secure => f.write_str("Secure"),
            CookieAttribute::HttpOnly => f.write_str("HttpOnly"),
            CookieAttribute::MaxAge(v) => write!(f, "Max-Age={v}"),
            CookieAttribute::Expires(v) => write!(f, "Expires={v}"),
            CookieAttribute::Other(raw) => f.write_str(raw),
        }
    }
}

/// One `Set-Cookie` value split into its name, value and ordered attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieDirective {
    pub name: String,
    pub value: String,
    pub attributes: Vec<CookieAttribute>,
}

impl FromStr for CookieDirective {
    type Err = CookieParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CookieParseError::Empty);
        }
        let mut segments = raw.split(';');
        let pair = segments.next().unwrap_or_default();
        let (name, value) = pair.split_once('=').ok_or(CookieParseError::MissingPair)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(CookieParseError::EmptyName);
        }

        let mut attributes = Vec::new();
        for segment in segments {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let (key, val) = match segment.split_once('=') {
                Some((k, v)) => (k.trim(), Some(v.trim())),
                None => (segment, None),
            };
            let attr = match (key.to_ascii_lowercase().as_str(), val) {
                ("domain", v) => CookieAttribute::Domain(v.unwrap_or_default().to_string()),
                ("path", Some(v)) => CookieAttribute::Path(v.to_string()),
                ("samesite", Some(v)) => CookieAttribute::SameSite(v.parse()?),
                ("samesite", None) => return Err(CookieParseError::InvalidSameSite(String::new())),
                ("secure", _) => CookieAttribute::Secure,
                ("httponly", _) => CookieAttribute::HttpOnly,
                ("max-age", Some(v)) => CookieAttribute::MaxAge(v.to_string()),
                ("expires", Some(v)) => CookieAttribute::Expires(v.to_string()),
                _ => CookieAttribute::Other(segment.to_string()),
            };
            attributes.push(attr);
        }

        Ok(Self { name: name.to_string(), value: value.trim().to_string(), attributes })
    }
}

impl fmt::Display for CookieDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        for attr in &self.attributes {
            write!(f, "; {attr}")?;
        }
        Ok(())
    }
}

impl CookieDirective {
    pub fn same_site(&self) -> Option<SameSite> {
        self.attributes.iter().find_map(|a| match a {
            CookieAttribute::SameSite(s) => Some(*s),
            _ => None,
        })
    }

    pub fn is_secure(&self) -> bool {
        self.attributes.contains(&CookieAttribute::Secure)
    }

    /// Replaces the first `Domain` in place (dropping any repeats) or appends one.
    pub fn set_domain(&mut self, domain: &str) {
        let mut seen = false;
        self.attributes.retain_mut(|a| match a {
            CookieAttribute::Domain(d) if !seen => {
                seen = true;
                *d = domain.to_string();
                true
            }
            CookieAttribute::Domain(_) => false,
            _ => true,
        });
        if !seen {
            self.attributes.push(CookieAttribute::Domain(domain.to_string()));
        }
    }

    pub fn remove_domain(&mut self) {
        self.attributes.retain(|a| !matches!(a, CookieAttribute::Domain(_)));
    }

    /// Sets `SameSite` in place, or appends it when absent.
    pub fn set_same_site(&mut self, value: SameSite) {
        let mut seen = false;
        self.attributes.retain_mut(|a| match a {
            CookieAttribute::SameSite(s) if !seen => {
                seen = true;
                *s = value;
                true
            }
            CookieAttribute::SameSite(_) => false,
            _ => true,
        });
        if !seen {
            self.attributes.push(CookieAttribute::SameSite(value));
        }
    }

    pub fn set_secure(&mut self, secure: bool) {
        if secure {
            if !self.is_secure() {
                self.attributes.push(CookieAttribute::Secure);
            }
        } else {
            self.attributes.retain(|a| *a != CookieAttribute::Secure);
        }
    }
}

/// Attribute rules applied to every `Set-Cookie` leaving the edge.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    domain: String,
}

impl CookiePolicy {
    pub fn new(domain: impl Into<String>) -> Self {
        Self { domain: domain.into() }
    }

    pub fn apply(&self, cookie: &mut CookieDirective, mode: DeploymentMode) {
        match mode {
            DeploymentMode::PublicEdge => {
                cookie.set_domain(&self.domain);
                if cookie.same_site().is_none() {
                    cookie.set_same_site(SameSite::None);
                }
                // SameSite=None is only honoured alongside Secure.
                cookie.set_secure(true);
            }
            DeploymentMode::LocalDev => {
                // Loopback hosts cannot match the shared parent domain.
                cookie.remove_domain();
                match cookie.same_site() {
                    None | Some(SameSite::None) => cookie.set_same_site(SameSite::Lax),
                    Some(_) => {}
                }
                cookie.set_secure(false);
            }
        }
    }

    pub fn rewrite(&self, raw: &str, mode: DeploymentMode) -> Result<String, CookieParseError> {
        let mut cookie: CookieDirective = raw.parse()?;
        self.apply(&mut cookie, mode);
        Ok(cookie.to_string())
    }
}
