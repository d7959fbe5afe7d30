//! Parsing of host arguments.
//!
//! A host argument is usually a bare hostname, but `host:port`, `[v6]:port`
//! and URLs such as `https://example.com:9443/` are accepted as well.

use std::fmt;

use url::{Host, Url};

use crate::error::CheckError;

/// Host and port to connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// DNS name or IP literal, without brackets
    pub host: String,
    pub port: u16,
}

impl Target {
    /// Parses a host argument, falling back to `default_port` when the
    /// argument carries no port of its own.
    pub fn parse(input: &str, default_port: u16) -> Result<Target, CheckError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("cannot be empty"));
        }

        // Without a scheme, use an opaque one so an explicit `:443` is not
        // swallowed as the scheme default.
        let has_scheme = trimmed.contains("://");
        let candidate = if has_scheme {
            trimmed.to_string()
        } else {
            format!("tls://{}", trimmed)
        };

        let url = Url::parse(&candidate).map_err(|e| invalid(&e.to_string()))?;
        let host = match url.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            _ => return Err(invalid("no host name found")),
        };

        let port = match url.port() {
            Some(port) => port,
            None if has_scheme => url.port_or_known_default().unwrap_or(default_port),
            None => default_port,
        };

        Ok(Target { host, port })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

fn invalid(reason: &str) -> CheckError {
    CheckError::InvalidInput {
        field: "hostname".to_string(),
        reason: reason.to_string(),
    }
}
