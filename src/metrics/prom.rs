use lazy_static::lazy_static;
use prometheus::{labels, register_gauge, Gauge};
use tracing::{debug, warn};

use crate::certificate::CertificateDetails;

lazy_static! {
    static ref CHECKHTTP_DAYS_UNTIL_EXPIRATION: Option<Gauge> = register_gauge!(
        "checkhttp_days_until_expiration",
        "days until certificate expiration"
    )
    .ok();
    static ref CHECKHTTP_CERTIFICATE_STATE: Option<Gauge> = register_gauge!(
        "checkhttp_certificate_state",
        "certificate state: 0 valid, 1 expiring soon, 2 expired"
    )
    .ok();
}

/// Numeric state pushed alongside the day count.
pub fn certificate_state(details: &CertificateDetails) -> f64 {
    if details.expired {
        2.0
    } else if details.expiring_soon {
        1.0
    } else {
        0.0
    }
}

/// Pushes one sample per certificate to the gateway at `prometheus_address`.
///
/// Push failures are logged and otherwise ignored; they never change the
/// result of the check.
pub fn prometheus_metrics(results: &[CertificateDetails], prometheus_address: &str) {
    let (days_gauge, state_gauge) = match (
        CHECKHTTP_DAYS_UNTIL_EXPIRATION.as_ref(),
        CHECKHTTP_CERTIFICATE_STATE.as_ref(),
    ) {
        (Some(days), Some(state)) => (days, state),
        _ => {
            warn!("failed to register prometheus gauges");
            return;
        }
    };

    for details in results {
        days_gauge.set(details.days_until_expiration as f64);
        state_gauge.set(certificate_state(details));

        let metric_families = prometheus::gather();
        let pushed = prometheus::push_metrics(
            "checkhttp",
            labels! {
                "instance".to_owned() => "checkhttp".to_owned(),
                "host".to_owned() => details.hostname.to_owned(),
                "subject".to_owned() => details.subject_name.to_owned(),
                "issuer".to_owned() => details.issuer_name.to_owned(),
                "serial".to_owned() => details.serial_number.to_owned(),
            },
            &format!("{}/metrics/job", prometheus_address),
            metric_families,
            None,
        );

        match pushed {
            Ok(_) => debug!(host = %details.hostname, "pushed certificate metrics"),
            Err(e) => warn!(error = %e, "failed to push metrics to prometheus"),
        }
    }
}
