use std::path::Path;
use std::process::exit;
use std::thread;
use std::time::Duration;

use checkhttp::certificate::{with_port, CertificateDetails, DEFAULT_TIMEOUT};
use checkhttp::config::{
    Config, ConfigError, PrometheusConfig, DEFAULT_CONFIG_FILE, DEFAULT_THRESHOLD_DAYS,
};
use checkhttp::http::{HttpCheck, Protocol};
use checkhttp::metrics::prom::prometheus_metrics;
use checkhttp::scan::{scan_hosts, CertificateStats, ScanResults};
use checkhttp::status::{self, Report, Severity, Status};
use clap::{ArgAction, Parser};
use comfy_table::Table;
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const USAGE_HINT: &str =
    "Usage: checkhttp --host somehost.com [--protocol http|https] [--port 80|443|xxx]";

#[derive(Parser, Debug)]
#[command(name = "checkhttp", version, about, long_about = None)]
struct Cli {
    /// Host to check, optionally as host:port. Repeat for several hosts
    #[arg(long = "host", value_name = "HOST")]
    hosts: Vec<String>,

    /// Protocol, either https or http
    #[arg(long)]
    protocol: Option<Protocol>,

    /// Port for hosts given without one (default 443 for https, 80 for http)
    #[arg(long)]
    port: Option<u16>,

    /// Request path for the HTTP probe
    #[arg(long)]
    path: Option<String>,

    /// Only inspect the TLS certificate, skip the HTTP probe
    #[arg(long)]
    cert_only: bool,

    /// Inspect the certificates of a PEM bundle instead of live hosts
    #[arg(long, value_name = "PEM")]
    cert_file: Option<String>,

    /// Warn when a certificate expires within this many days
    #[arg(long)]
    days: Option<i64>,

    /// Network timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Output format: text or json
    #[arg(short, long)]
    output: Option<String>,

    /// Configuration file (defaults to ./checkhttp.toml when present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Push certificate metrics to a Prometheus Push Gateway
    #[arg(long)]
    prometheus: bool,

    /// Prometheus Push Gateway address
    #[arg(long, value_name = "URL")]
    prometheus_address: Option<String>,

    /// Print an example configuration file and exit
    #[arg(long)]
    generate_config: bool,

    /// Log more to stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn to_config(&self) -> Config {
        Config {
            hosts: (!self.hosts.is_empty()).then(|| self.hosts.clone()),
            protocol: self.protocol,
            port: self.port,
            path: self.path.clone(),
            cert_only: self.cert_only.then_some(true),
            cert_file: self.cert_file.clone(),
            days: self.days,
            timeout: self.timeout,
            output: self.output.clone(),
            prometheus: Some(PrometheusConfig {
                enabled: self.prometheus.then_some(true),
                address: self.prometheus_address.clone(),
            }),
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    status: &'a Status,
    certificates: &'a [CertificateDetails],
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.generate_config {
        println!("{}", Config::example_toml());
        exit(0);
    }

    let report = match load_config(&cli) {
        Ok(config) => run(&config),
        Err(e) => status::unknown(e.to_string()),
    };

    println!("{}", report.text);
    exit(report.exit_code);
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut config = Config::defaults();

    match &cli.config {
        Some(path) => config = config.merge_with(Config::from_file(path)?),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            debug!(path = DEFAULT_CONFIG_FILE, "loading default config file");
            config = config.merge_with(Config::from_file(DEFAULT_CONFIG_FILE)?);
        }
        None => {}
    }

    let config = config.merge_with(cli.to_config());
    config.validate()?;
    Ok(config)
}

fn run(config: &Config) -> Report {
    let threshold = config.days.unwrap_or(DEFAULT_THRESHOLD_DAYS);
    let json = config.output.as_deref() == Some("json");

    let (mut summary, certificates) = if let Some(path) = &config.cert_file {
        match check_file(path, threshold) {
            Ok(result) => result,
            Err(failure) => return failure.report(),
        }
    } else {
        let hosts = config.hosts.clone().unwrap_or_default();
        if hosts.is_empty() {
            return status::unknown(USAGE_HINT);
        }
        check_hosts(&hosts, config, threshold)
    };

    if config.prometheus_enabled() {
        if let Some(address) = config.prometheus.as_ref().and_then(|p| p.address.as_deref()) {
            prometheus_metrics(&certificates, address);
        }
    }

    let details = if json {
        let rendered = serde_json::to_string_pretty(&JsonReport {
            status: &summary,
            certificates: &certificates,
        });
        json_details(&mut summary, rendered)
    } else if config.cert_file.is_some() {
        certificates
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        host_details(&certificates)
    };

    summary.report().with_details(&details)
}

/// Unwraps the rendered JSON body, folding a rendering failure into the
/// summary as UNKNOWN.
fn json_details(summary: &mut Status, rendered: serde_json::Result<String>) -> String {
    match rendered {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "failed to render JSON output");
            summary.aggregate(&[Status::new(
                format!("failed to render JSON output: {}", e),
                Severity::Unknown,
            )]);
            String::new()
        }
    }
}

/// Classifies every certificate of a PEM bundle.
///
/// Any read or parse failure aborts the whole scan.
fn check_file(path: &str, threshold: i64) -> Result<(Status, Vec<CertificateDetails>), Status> {
    let mut certificates =
        CertificateDetails::from_file(path).map_err(|e| Status::from(&e))?;

    let statuses: Vec<Status> = certificates
        .iter_mut()
        .map(|details| {
            details.check_expiration_status(threshold);
            details.status()
        })
        .collect();

    let mut summary = Status::new(
        format!(
            "Found {} certificate(s) inside file: {}",
            certificates.len(),
            path
        ),
        Severity::Ok,
    );
    summary.aggregate(&statuses);
    Ok((summary, certificates))
}

fn check_hosts(
    hosts: &[String],
    config: &Config,
    threshold: i64,
) -> (Status, Vec<CertificateDetails>) {
    let protocol = config.protocol.unwrap_or(Protocol::Https);
    let timeout = config
        .timeout
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TIMEOUT);
    let cert_only = config.cert_only.unwrap_or(false);

    let mut statuses = Vec::new();
    if !cert_only {
        let checks: Vec<HttpCheck> = hosts
            .iter()
            .map(|host| {
                let mut check = HttpCheck::for_target(host, protocol, timeout);
                if config.port.is_some() {
                    check.port = config.port;
                }
                check.path = config.path.clone();
                check
            })
            .collect();
        statuses.extend(probe_all(&checks));
    }

    let mut scan = if protocol == Protocol::Https || cert_only {
        let targets: Vec<String> = match config.port {
            Some(port) => hosts.iter().map(|host| with_port(host, port)).collect(),
            None => hosts.to_vec(),
        };
        scan_hosts(&targets, timeout)
    } else {
        ScanResults::default()
    };
    statuses.extend(scan.statuses(threshold));
    info!(
        hosts = hosts.len(),
        certificates = scan.certificates.len(),
        errors = scan.errors.len(),
        "checks finished"
    );

    (Status::aggregate_all(&statuses), scan.certificates)
}

fn probe_all(checks: &[HttpCheck]) -> Vec<Status> {
    thread::scope(|s| {
        let handles: Vec<_> = checks
            .iter()
            .map(|check| s.spawn(move || check.probe()))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Status::new("HTTP probe panicked", Severity::Unknown))
            })
            .collect()
    })
}

fn host_details(certificates: &[CertificateDetails]) -> String {
    if certificates.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.set_header(vec!["Host", "Subject", "Issuer", "Expires", "Days", "Serial"]);
    for details in certificates {
        table.add_row(vec![
            details.hostname.clone(),
            details.subject_name.clone(),
            details.issuer_name.clone(),
            details.expiration_date.clone(),
            details.days_until_expiration.to_string(),
            details.serial_number.clone(),
        ]);
    }

    let stats = CertificateStats::from_certificates(certificates);
    format!("{}\n{}", table, stats.lines().join("\n"))
}
