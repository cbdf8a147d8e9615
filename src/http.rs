//! HTTP(S) liveness probe.
//!
//! Issues a single GET, waits for the first byte of the body and maps the
//! response to a [`Status`].

use std::fmt;
use std::io::Read;
use std::net::Ipv6Addr;
use std::str::FromStr;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::certificate::split_host_port;
use crate::error::CheckError;
use crate::status::{Severity, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Https => write!(f, "https"),
        }
    }
}

impl FromStr for Protocol {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(CheckError::InvalidInput {
                field: "protocol".to_string(),
                reason: format!("expected http or https, got {}", other),
            }),
        }
    }
}

/// A single GET probe against one host.
#[derive(Debug, Clone)]
pub struct HttpCheck {
    pub host: String,
    pub protocol: Protocol,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub timeout: Duration,
}

impl HttpCheck {
    pub fn new(host: &str, protocol: Protocol, timeout: Duration) -> Self {
        HttpCheck {
            host: host.to_string(),
            protocol,
            port: None,
            path: None,
            timeout,
        }
    }

    /// Builds a probe for a `host` or `host:port` target.
    pub fn for_target(target: &str, protocol: Protocol, timeout: Duration) -> Self {
        let (host, port) = split_host_port(target);
        HttpCheck {
            port,
            ..HttpCheck::new(host, protocol, timeout)
        }
    }

    pub fn url(&self) -> Result<Url, CheckError> {
        if self.host.is_empty() {
            return Err(CheckError::EmptyHostname);
        }
        let port = self.port.unwrap_or_else(|| self.protocol.default_port());
        let base = if self.host.parse::<Ipv6Addr>().is_ok() {
            format!("{}://[{}]:{}", self.protocol, self.host, port)
        } else {
            format!("{}://{}:{}", self.protocol, self.host, port)
        };
        let mut url = Url::parse(&base).map_err(|e| CheckError::InvalidInput {
            field: "host".to_string(),
            reason: e.to_string(),
        })?;
        if let Some(path) = &self.path {
            url = url.join(path).map_err(|e| CheckError::InvalidInput {
                field: "path".to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(url)
    }

    /// Runs the probe. Never fails: every problem becomes a status.
    pub fn probe(&self) -> Status {
        if self.protocol == Protocol::Http && self.port == Some(443) {
            return Status::new(
                "Protocol http specified, but port 443 chosen. Did you forget --port 80?",
                Severity::Critical,
            );
        }

        match self.fetch() {
            Ok(status) => status,
            Err(e) => Status::from(&e),
        }
    }

    fn fetch(&self) -> Result<Status, CheckError> {
        let url = self.url()?;
        let http_error = |details: String| CheckError::Http {
            url: url.to_string(),
            details,
        };

        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| http_error(e.to_string()))?;

        debug!(url = %url, "sending request");
        let start = Instant::now();
        let mut response = client
            .get(url.clone())
            .send()
            .map_err(|e| http_error(e.to_string()))?;

        let mut first_byte = [0u8; 1];
        response
            .read(&mut first_byte)
            .map_err(|e| http_error(e.to_string()))?;
        let ttfb = start.elapsed();

        Ok(classify_response(
            &self.host,
            response.version(),
            response.status(),
            ttfb,
        ))
    }
}

/// Maps an HTTP response line to a status.
///
/// 200 is OK, 503 is a WARNING, anything else is CRITICAL.
pub fn classify_response(
    host: &str,
    version: reqwest::Version,
    status: StatusCode,
    ttfb: Duration,
) -> Status {
    match status {
        StatusCode::OK => Status::new(
            format!(
                "{} responded with {:?} {} with TTFB of {:.6}s",
                host,
                version,
                status,
                ttfb.as_secs_f64()
            ),
            Severity::Ok,
        ),
        StatusCode::SERVICE_UNAVAILABLE => {
            warn!(host, "service unavailable");
            Status::new(format!("{} {:?} {}", host, version, status), Severity::Warning)
        }
        _ => Status::new(
            format!("{} {:?} {}", host, version, status),
            Severity::Critical,
        ),
    }
}
