//! Concurrent certificate scans across many hosts.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::certificate::CertificateDetails;
use crate::error::CheckError;
use crate::status::{Severity, Status};

/// Everything a scan produced, in arrival order.
#[derive(Debug, Default)]
pub struct ScanResults {
    pub certificates: Vec<CertificateDetails>,
    pub errors: Vec<CheckError>,
}

impl ScanResults {
    /// Classifies every certificate and turns every error into a status.
    ///
    /// Certificate statuses come first, then the errors. Any failure of a
    /// scan that reached the network is CRITICAL, whatever its kind.
    pub fn statuses(&mut self, threshold_days: i64) -> Vec<Status> {
        let mut statuses = Vec::with_capacity(self.certificates.len() + self.errors.len());
        for details in &mut self.certificates {
            details.check_expiration_status(threshold_days);
            statuses.push(details.status());
        }
        statuses.extend(self.errors.iter().map(|err| match err {
            CheckError::EmptyHostname => Status::from(err),
            _ => Status::new(err.to_string(), Severity::Critical),
        }));
        statuses
    }
}

/// Scans every host on its own thread.
///
/// Both result channels hold one slot per host, so no worker ever blocks on
/// send. Results are collected once every worker has finished.
pub fn scan_hosts(hosts: &[String], timeout: Duration) -> ScanResults {
    let (cert_tx, cert_rx) = mpsc::sync_channel::<CertificateDetails>(hosts.len());
    let (error_tx, error_rx) = mpsc::sync_channel::<CheckError>(hosts.len());

    let workers: Vec<_> = hosts
        .iter()
        .cloned()
        .map(|host| {
            let cert_tx = cert_tx.clone();
            let error_tx = error_tx.clone();
            thread::spawn(move || scan_host(&host, timeout, &cert_tx, &error_tx))
        })
        .collect();
    drop(cert_tx);
    drop(error_tx);

    for worker in workers {
        if worker.join().is_err() {
            warn!("certificate scan worker panicked");
        }
    }

    ScanResults {
        certificates: cert_rx.iter().collect(),
        errors: error_rx.iter().collect(),
    }
}

fn scan_host(
    host: &str,
    timeout: Duration,
    cert_tx: &mpsc::SyncSender<CertificateDetails>,
    error_tx: &mpsc::SyncSender<CheckError>,
) {
    debug!(host, "scanning certificate");
    let sent = match CertificateDetails::from_connection(host, timeout) {
        Ok(details) => cert_tx.send(details).is_ok(),
        Err(err) => {
            warn!(host, error = %err, "certificate scan failed");
            error_tx.send(err).is_ok()
        }
    };
    if !sent {
        warn!(host, "scan result dropped, receiver closed");
    }
}

/// How often each certificate subject was seen, and on which hosts.
#[derive(Debug, Default)]
pub struct CertificateStats {
    pub subjects: BTreeMap<String, usize>,
    pub sites: BTreeSet<String>,
}

impl CertificateStats {
    pub fn record(&mut self, details: &CertificateDetails) {
        *self.subjects.entry(details.subject_name.clone()).or_insert(0) += 1;
        if !details.hostname.is_empty() {
            self.sites.insert(details.hostname.clone());
        }
    }

    pub fn from_certificates<'a, I>(certificates: I) -> Self
    where
        I: IntoIterator<Item = &'a CertificateDetails>,
    {
        let mut stats = CertificateStats::default();
        for details in certificates {
            stats.record(details);
        }
        stats
    }

    /// Long output lines describing the statistics.
    pub fn lines(&self) -> Vec<String> {
        let subjects = self.subjects.iter().map(|(subject, count)| {
            format!("Subject name: {} -- Instances found: {}", subject, count)
        });
        let sites = self.sites.iter().map(|site| format!("> {}", site));
        subjects.chain(sites).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(subject: &str, hostname: &str, days: i64) -> CertificateDetails {
        CertificateDetails {
            subject_name: subject.to_string(),
            issuer_name: "Test CA".to_string(),
            serial_number: "01".to_string(),
            expiration_date: "Fri Nov 24 22:13:20 UTC 2023".to_string(),
            days_until_expiration: days,
            expiring_soon: false,
            expired: false,
            hostname: hostname.to_string(),
            time_taken: Duration::ZERO,
            thumbprint: String::new(),
        }
    }

    #[test]
    fn test_stats_counts_subjects_and_sites() {
        let certificates = vec![
            details("a.example", "a.example:443", 90),
            details("a.example", "b.example:443", 90),
            details("c.example", "", 90),
        ];
        let stats = CertificateStats::from_certificates(&certificates);

        assert_eq!(stats.subjects.get("a.example"), Some(&2));
        assert_eq!(stats.subjects.get("c.example"), Some(&1));
        assert_eq!(stats.sites.len(), 2);
        assert_eq!(
            stats.lines(),
            vec![
                "Subject name: a.example -- Instances found: 2".to_string(),
                "Subject name: c.example -- Instances found: 1".to_string(),
                "> a.example:443".to_string(),
                "> b.example:443".to_string(),
            ]
        );
    }

    #[test]
    fn test_statuses_classify_and_route_errors() {
        let mut results = ScanResults {
            certificates: vec![
                details("fresh.example", "fresh.example:443", 90),
                details("old.example", "old.example:443", -3),
            ],
            errors: vec![CheckError::Connection {
                address: "down.example:443".to_string(),
                details: "connection refused".to_string(),
            }],
        };

        let statuses = results.statuses(30);
        assert_eq!(statuses.len(), 3);
        assert_eq!(statuses[0].severity, Severity::Ok);
        assert_eq!(statuses[1].severity, Severity::Critical);
        assert_eq!(statuses[2].severity, Severity::Critical);
        assert!(statuses[2].message.contains("down.example:443"));
        assert!(results.certificates[1].expired);
    }

    #[test]
    fn test_remote_parse_and_openssl_errors_are_critical() {
        let mut results = ScanResults {
            certificates: Vec::new(),
            errors: vec![
                CheckError::Parse {
                    reason: "malformed certificate".to_string(),
                },
                CheckError::OpenSSL {
                    details: "bad peer chain".to_string(),
                },
                CheckError::EmptyHostname,
            ],
        };

        let statuses = results.statuses(30);
        assert_eq!(statuses[0].severity, Severity::Critical);
        assert_eq!(
            statuses[0].message,
            "Certificate parse error: malformed certificate"
        );
        assert_eq!(statuses[1].severity, Severity::Critical);
        assert_eq!(statuses[1].message, "OpenSSL error: bad peer chain");
        assert_eq!(statuses[2].severity, Severity::Unknown);
    }

    #[test]
    fn test_scan_empty_hostname_reports_error() {
        let results = scan_hosts(&["".to_string()], Duration::from_secs(1));
        assert!(results.certificates.is_empty());
        assert_eq!(results.errors.len(), 1);
        assert!(matches!(results.errors[0], CheckError::EmptyHostname));
    }

    #[test]
    fn test_scan_no_hosts() {
        let results = scan_hosts(&[], Duration::from_secs(1));
        assert!(results.certificates.is_empty());
        assert!(results.errors.is_empty());
    }
}
