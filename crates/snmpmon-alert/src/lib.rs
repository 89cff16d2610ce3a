//! Status evaluation for collected metrics.
//!
//! [`status`] maps a sample and its warning/critical bounds to a
//! [`MonitorStatus`](snmpmon_common::types::MonitorStatus) and folds the
//! statuses of a service's metrics into one. [`builder`] assembles time
//! series, services and resources with those statuses applied.

pub mod builder;
pub mod status;

#[cfg(test)]
mod tests;

pub use builder::{create_resource, create_service, MetricBuilder};
pub use status::{
    calculate_host_status, calculate_service_status, calculate_status, StatusError,
    HOST_STALE_AFTER_SECS,
};
