//! Certificate inspection.
//!
//! Certificates are read either from a live TLS handshake or from a PEM
//! bundle on disk. Verification is switched off on purpose: hosts with
//! self-signed or expired certificates must still be measurable.

use std::fmt;
use std::fs;
use std::net::{IpAddr, Ipv6Addr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use openssl::sha::sha256;
use openssl::ssl::{Ssl, SslContext, SslMethod, SslVerifyMode};
use serde::Serialize;
use tracing::{debug, info};
use x509_parser::prelude::*;

use crate::error::CheckError;
use crate::status::{Severity, Status};

/// Port used when the hostname carries none.
pub const DEFAULT_PORT: u16 = 443;

/// Connection timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Same layout as the Unix `date` command, always in UTC.
const EXPIRATION_DATE_FORMAT: &str = "%a %b %e %H:%M:%S UTC %Y";

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// The evaluation relevant fields of a single certificate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CertificateDetails {
    pub subject_name: String,
    pub issuer_name: String,
    pub serial_number: String,
    pub expiration_date: String,
    pub days_until_expiration: i64,
    pub expiring_soon: bool,
    pub expired: bool,
    /// `host:port` the certificate was fetched from, empty for file scans.
    pub hostname: String,
    pub time_taken: Duration,
    /// SHA-256 of the DER encoding, colon separated.
    pub thumbprint: String,
}

impl CertificateDetails {
    /// Connects to `hostname` and inspects the first non-CA certificate of
    /// the chain it presents.
    ///
    /// `hostname` may carry a port; port 443 is assumed otherwise.
    ///
    /// # Errors
    ///
    /// * [`CheckError::EmptyHostname`] before any network activity
    /// * [`CheckError::Connection`] when dialing or the handshake fails
    /// * [`CheckError::NoLeafCertificate`] when every certificate is a CA
    pub fn from_connection(hostname: &str, timeout: Duration) -> Result<Self, CheckError> {
        let started = Instant::now();

        if hostname.is_empty() {
            return Err(CheckError::EmptyHostname);
        }
        let address = normalize_address(hostname);

        let chain = fetch_peer_chain(&address, timeout)?;
        debug!(address = %address, certificates = chain.len(), "received peer chain");

        for der in &chain {
            let (_, cert) = X509Certificate::from_der(der).map_err(|e| CheckError::Parse {
                reason: e.to_string(),
            })?;
            if cert.is_ca() {
                debug!(subject = %cert.subject(), "skipping CA certificate");
                continue;
            }

            let mut details = details_from_certificate(&cert, der, Utc::now())?;
            details.hostname = address;
            details.time_taken = started.elapsed();
            return Ok(details);
        }

        Err(CheckError::NoLeafCertificate { address })
    }

    /// Reads every certificate from a PEM bundle.
    ///
    /// All PEM bodies are decoded and concatenated before being parsed as one
    /// sequence of certificates. CA certificates are reported as well.
    ///
    /// # Errors
    ///
    /// * [`CheckError::Io`] when the file cannot be read
    /// * [`CheckError::Format`] when no valid PEM block is found
    /// * [`CheckError::Parse`] when the decoded data is not a certificate sequence
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Vec<Self>, CheckError> {
        let started = Instant::now();
        let path = path.as_ref();

        let data = fs::read(path)?;
        let der = decode_pem_blocks(&data).ok_or_else(|| CheckError::Format {
            path: path.display().to_string(),
        })?;

        let now = Utc::now();
        let mut results = Vec::new();
        for (raw, cert) in parse_certificate_sequence(&der)? {
            let mut details = details_from_certificate(&cert, raw, now)?;
            details.time_taken = started.elapsed();
            results.push(details);
        }

        info!(path = %path.display(), certificates = results.len(), "read certificate file");
        Ok(results)
    }

    /// Flags the certificate as expired or expiring within `threshold_days`.
    ///
    /// An expired certificate is never also flagged as expiring soon.
    pub fn check_expiration_status(&mut self, threshold_days: i64) {
        if self.days_until_expiration < 0 {
            self.expired = true;
        } else if self.days_until_expiration < threshold_days {
            self.expiring_soon = true;
        }
    }

    /// Status of a classified certificate.
    pub fn status(&self) -> Status {
        let target = if self.hostname.is_empty() {
            self.subject_name.clone()
        } else {
            format!("{} ({})", self.hostname, self.subject_name)
        };

        if self.expired {
            Status::new(
                format!("{} certificate expired on {}", target, self.expiration_date),
                Severity::Critical,
            )
        } else if self.expiring_soon {
            Status::new(
                format!(
                    "{} certificate expires in {} days on {}",
                    target, self.days_until_expiration, self.expiration_date
                ),
                Severity::Warning,
            )
        } else {
            Status::new(
                format!(
                    "{} certificate valid for {} days until {}",
                    target, self.days_until_expiration, self.expiration_date
                ),
                Severity::Ok,
            )
        }
    }
}

impl fmt::Display for CertificateDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Subject Name: {}", self.subject_name)?;
        writeln!(f, "Issuer: {}", self.issuer_name)?;
        writeln!(f, "Expiration date: {}", self.expiration_date)?;
        writeln!(f, "Days Until Expiration: {}", self.days_until_expiration)?;
        writeln!(f, "Serial #: {}", self.serial_number)?;
        writeln!(f, "Request Time: {:?}", self.time_taken)
    }
}

/// Groups a hex serial in pairs separated by `-` and uppercases it.
///
/// ```
/// assert_eq!(checkhttp::certificate::format_serial("1a2b3c"), "1A-2B-3C");
/// ```
pub fn format_serial(hex: &str) -> String {
    let last = hex.chars().count().saturating_sub(1);
    let mut grouped = String::with_capacity(hex.len() + hex.len() / 2);
    for (i, c) in hex.chars().enumerate() {
        grouped.push(c);
        if i % 2 == 1 && i != last {
            grouped.push('-');
        }
    }
    grouped.to_uppercase()
}

/// Appends the default port unless one is present.
pub fn normalize_address(hostname: &str) -> String {
    with_port(hostname, DEFAULT_PORT)
}

/// Appends `port` unless the target already names one.
pub fn with_port(target: &str, port: u16) -> String {
    match split_host_port(target) {
        (_, Some(_)) => target.to_string(),
        (host, None) if host.parse::<Ipv6Addr>().is_ok() => format!("[{}]:{}", host, port),
        (host, None) => format!("{}:{}", host, port),
    }
}

/// Splits `host`, `host:port`, `[v6]` or `[v6]:port` into host and port.
///
/// IPv6 brackets are stripped from the host. A bare IPv6 literal is all host.
pub fn split_host_port(target: &str) -> (&str, Option<u16>) {
    if let Some(rest) = target.strip_prefix('[') {
        if let Some((host, port)) = rest.split_once("]:") {
            if let Ok(port) = port.parse::<u16>() {
                return (host, Some(port));
            }
        } else if let Some(host) = rest.strip_suffix(']') {
            return (host, None);
        }
        return (target, None);
    }

    match target.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => match port.parse::<u16>() {
            Ok(port) => (host, Some(port)),
            Err(_) => (target, None),
        },
        _ => (target, None),
    }
}

/// Host part of a `host:port` address, without IPv6 brackets.
fn host_part(address: &str) -> &str {
    split_host_port(address).0
}

fn fetch_peer_chain(address: &str, timeout: Duration) -> Result<Vec<Vec<u8>>, CheckError> {
    let connection_error = |details: String| CheckError::Connection {
        address: address.to_string(),
        details,
    };

    let socket_addr = address
        .to_socket_addrs()
        .map_err(|e| connection_error(e.to_string()))?
        .next()
        .ok_or_else(|| connection_error("no address found for host".to_string()))?;

    let tcp_stream = TcpStream::connect_timeout(&socket_addr, timeout)
        .map_err(|e| connection_error(e.to_string()))?;
    tcp_stream
        .set_read_timeout(Some(timeout))
        .and_then(|_| tcp_stream.set_write_timeout(Some(timeout)))
        .map_err(|e| connection_error(e.to_string()))?;

    let mut context = SslContext::builder(SslMethod::tls())?;
    context.set_verify(SslVerifyMode::NONE);
    let context = context.build();

    let mut ssl = Ssl::new(&context)?;
    let host = host_part(address);
    if host.parse::<IpAddr>().is_err() {
        ssl.set_hostname(host)?;
    }

    let stream = ssl
        .connect(tcp_stream)
        .map_err(|e| connection_error(format!("TLS handshake failed: {}", e)))?;

    let ssl = stream.ssl();
    let chain = match ssl.peer_cert_chain() {
        Some(chain) => chain
            .iter()
            .map(|cert| cert.to_der())
            .collect::<Result<Vec<_>, _>>()?,
        None => match ssl.peer_certificate() {
            Some(cert) => vec![cert.to_der()?],
            None => Vec::new(),
        },
    };
    Ok(chain)
}

/// Decodes every PEM block in `data` and concatenates the bodies.
///
/// Returns `None` when no valid block is present.
fn decode_pem_blocks(data: &[u8]) -> Option<Vec<u8>> {
    let blocks = match ::pem::parse_many(data) {
        Ok(blocks) => blocks,
        Err(e) => {
            debug!(error = %e, "malformed PEM data");
            return None;
        }
    };
    if blocks.is_empty() {
        return None;
    }

    let mut der = Vec::new();
    for block in &blocks {
        der.extend_from_slice(block.contents());
    }
    Some(der)
}

/// Parses back to back DER certificates, pairing each with its raw bytes.
fn parse_certificate_sequence(
    der: &[u8],
) -> Result<Vec<(&[u8], X509Certificate<'_>)>, CheckError> {
    let mut certificates = Vec::new();
    let mut remaining = der;
    while !remaining.is_empty() {
        let (rest, cert) =
            X509Certificate::from_der(remaining).map_err(|e| CheckError::Parse {
                reason: e.to_string(),
            })?;
        let consumed = remaining.len() - rest.len();
        certificates.push((&remaining[..consumed], cert));
        remaining = rest;
    }
    Ok(certificates)
}

fn details_from_certificate(
    cert: &X509Certificate<'_>,
    der: &[u8],
    now: DateTime<Utc>,
) -> Result<CertificateDetails, CheckError> {
    let not_after = cert.validity().not_after.timestamp();
    let expiration_date = DateTime::<Utc>::from_timestamp(not_after, 0)
        .ok_or_else(|| CheckError::Parse {
            reason: "invalid notAfter timestamp".to_string(),
        })?
        .format(EXPIRATION_DATE_FORMAT)
        .to_string();

    Ok(CertificateDetails {
        subject_name: last_attribute(cert.subject()),
        issuer_name: last_attribute(cert.issuer()),
        serial_number: format_serial(&cert.serial.to_str_radix(16)),
        expiration_date,
        days_until_expiration: days_until(not_after, now),
        expiring_soon: false,
        expired: false,
        hostname: String::new(),
        time_taken: Duration::ZERO,
        thumbprint: thumbprint(der),
    })
}

/// Whole days left, rounded towards the past so anything expired is negative.
fn days_until(not_after: i64, now: DateTime<Utc>) -> i64 {
    (not_after - now.timestamp()).div_euclid(SECONDS_PER_DAY)
}

/// Value of the last attribute of the last RDN.
fn last_attribute(name: &X509Name<'_>) -> String {
    name.iter_attributes()
        .last()
        .and_then(|attr| attr.as_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn thumbprint(der: &[u8]) -> String {
    sha256(der)
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}
