//! Error types for HTTP and certificate checks.
//!
//! Every failure a check can run into is a [`CheckError`]. Each variant knows
//! the [`Severity`] it should be reported with, so the reporting layer never
//! has to guess.

use std::fmt;
use std::io;

use crate::status::Severity;

/// Error type for check failures.
#[derive(Debug)]
pub enum CheckError {
    /// The hostname given to a certificate scan was empty
    EmptyHostname,

    /// Dial, DNS resolution or TLS handshake failed or timed out
    Connection {
        /// The address (host:port) the connection was made to
        address: String,
        /// What went wrong
        details: String,
    },

    /// The peer presented only certificate authority certificates
    NoLeafCertificate {
        /// The address (host:port) that was scanned
        address: String,
    },

    /// The certificate file contained no valid PEM block
    Format {
        /// Path of the offending file
        path: String,
    },

    /// The decoded certificate data could not be parsed
    Parse {
        /// Description of the parse failure
        reason: String,
    },

    /// HTTP request or body read failed
    Http {
        /// The requested URL
        url: String,
        /// The underlying error text
        details: String,
    },

    /// Invalid input provided on the command line or in the config
    InvalidInput {
        /// Which field/parameter was invalid
        field: String,
        /// Why it was invalid
        reason: String,
    },

    /// OpenSSL error while setting up a TLS context
    OpenSSL {
        /// The underlying OpenSSL error
        details: String,
    },

    /// Generic I/O error
    Io {
        /// The underlying I/O error
        source: io::Error,
    },
}

impl CheckError {
    /// Severity this error is reported with.
    ///
    /// Failures of the remote side are CRITICAL. Failures that prevent the
    /// check from running at all are UNKNOWN.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Connection { .. } | Self::NoLeafCertificate { .. } | Self::Http { .. } => {
                Severity::Critical
            }
            Self::EmptyHostname
            | Self::Format { .. }
            | Self::Parse { .. }
            | Self::InvalidInput { .. }
            | Self::OpenSSL { .. }
            | Self::Io { .. } => Severity::Unknown,
        }
    }
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyHostname => write!(f, "hostname empty"),
            Self::Connection { address, details } => {
                write!(f, "Connection error to {}: {}", address, details)
            }
            Self::NoLeafCertificate { address } => {
                write!(f, "No leaf certificate presented by {}", address)
            }
            Self::Format { path } => {
                write!(f, "Certificate file {} doesn't have a valid PEM block", path)
            }
            Self::Parse { reason } => write!(f, "Certificate parse error: {}", reason),
            Self::Http { url, details } => write!(f, "Request to {} failed: {}", url, details),
            Self::InvalidInput { field, reason } => {
                write!(f, "Invalid input for '{}': {}", field, reason)
            }
            Self::OpenSSL { details } => write!(f, "OpenSSL error: {}", details),
            Self::Io { source } => write!(f, "I/O error: {}", source),
        }
    }
}

impl std::error::Error for CheckError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for CheckError {
    fn from(e: io::Error) -> Self {
        Self::Io { source: e }
    }
}

impl From<openssl::error::ErrorStack> for CheckError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Self::OpenSSL {
            details: e.to_string(),
        }
    }
}
