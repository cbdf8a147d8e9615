//! Integration tests for the public API

use checkhttp::scan::{CertificateStats, ScanResults};
use checkhttp::status::{self, MESSAGE_SEPARATOR};
use checkhttp::{CertificateDetails, CheckError, Report, Severity, Status};

#[test]
fn test_public_api_compiles() {
    // Needs network, so only checked for compilation.
    fn check_certificate(hostname: &str) -> Result<Report, CheckError> {
        let mut details =
            CertificateDetails::from_connection(hostname, checkhttp::certificate::DEFAULT_TIMEOUT)?;
        details.check_expiration_status(30);
        Ok(details.status().report())
    }

    let _ = check_certificate;
}

#[test]
fn test_error_types_are_public() {
    fn handle_error(err: CheckError) -> String {
        match err {
            CheckError::EmptyHostname => "empty".to_string(),
            CheckError::Connection { address, .. } => format!("Connection failed to {}", address),
            CheckError::NoLeafCertificate { address } => format!("No leaf at {}", address),
            CheckError::Format { path } => format!("Bad PEM in {}", path),
            CheckError::Parse { reason } => format!("Parse: {}", reason),
            CheckError::Http { url, .. } => format!("HTTP failed for {}", url),
            CheckError::InvalidInput { field, reason } => format!("Invalid {}: {}", field, reason),
            CheckError::OpenSSL { details } => format!("OpenSSL: {}", details),
            CheckError::Io { source } => format!("I/O: {}", source),
        }
    }

    let msg = handle_error(CheckError::Format {
        path: "bundle.pem".to_string(),
    });
    assert!(msg.contains("bundle.pem"));
}

#[test]
fn test_errors_route_to_aggregator() {
    let mut results = ScanResults::default();
    results.errors.push(CheckError::Connection {
        address: "a.example:443".to_string(),
        details: "timed out".to_string(),
    });
    results.errors.push(CheckError::Connection {
        address: "b.example:443".to_string(),
        details: "connection refused".to_string(),
    });

    let statuses = results.statuses(30);
    let summary = Status::aggregate_all(&statuses);
    let report = summary.report();

    assert_eq!(report.exit_code, 2);
    assert_eq!(
        report.text,
        "CRITICAL: Connection error to a.example:443: timed out - Connection error to b.example:443: connection refused"
    );
}

#[test]
fn test_aggregate_is_max_with_ordered_messages() {
    let mut primary = Status::new("http ok", Severity::Ok);
    primary.aggregate(&[
        Status::new("cert expiring", Severity::Warning),
        Status::new("cert fine", Severity::Ok),
    ]);

    assert_eq!(primary.severity, Severity::Warning);
    assert_eq!(
        primary.message,
        format!(
            "http ok{sep}cert expiring{sep}cert fine",
            sep = MESSAGE_SEPARATOR
        )
    );
    assert_eq!(primary.report().text, "WARNING: http ok - cert expiring - cert fine");
}

#[test]
fn test_report_exit_codes() {
    assert_eq!(status::ok("x").exit_code, 0);
    assert_eq!(status::warning("x").exit_code, 1);
    assert_eq!(status::critical(&CheckError::EmptyHostname).exit_code, 2);
    assert_eq!(status::unknown("x").exit_code, 3);
}

#[test]
fn test_stats_on_empty_scan() {
    let stats = CertificateStats::from_certificates(&Vec::new());
    assert!(stats.lines().is_empty());
}
