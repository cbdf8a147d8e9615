//! Metrics export.
//!
//! Certificate expiry can be pushed to a Prometheus Push Gateway so that
//! expiry trends are visible outside the monitoring check itself.
//!
//! # Submodules
//!
//! - `prom` - Prometheus Push Gateway integration

pub mod prom;
