//! HTTP(S) and TLS certificate health checks for Nagios style monitoring.
//!
//! The library does the checking and produces [`status::Report`] values;
//! printing the report and exiting with its code is left to the binary.
//!
//! ```no_run
//! use checkhttp::certificate::{CertificateDetails, DEFAULT_TIMEOUT};
//!
//! let mut details = CertificateDetails::from_connection("example.com", DEFAULT_TIMEOUT)?;
//! details.check_expiration_status(30);
//! println!("{}", details.status().report().text);
//! # Ok::<(), checkhttp::CheckError>(())
//! ```

pub mod certificate;
pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod scan;
pub mod status;

pub use certificate::CertificateDetails;
pub use error::CheckError;
pub use status::{Report, Severity, Status};
