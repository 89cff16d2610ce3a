//! Device discovery and SNMP collection for the snmpmon agent.
//!
//! A collection cycle asks a [`DeviceDirectory`] for monitored devices and
//! their interfaces, resolves SNMP credentials through a
//! [`SecurityResolver`], walks the interface MIBs with an [`SnmpWalker`] and
//! hands the readings to [`state::MonitoringState`], which turns them into
//! gauge, delta and rate metrics using the [`cache::SampleCache`].

pub mod cache;
pub mod error;
pub mod nedi;
pub mod secdata;
pub mod snmp;
pub mod state;

use async_trait::async_trait;
use error::Result;
use nedi::{Device, Interface};
use secdata::SecurityData;
use snmp::MetricReadings;

/// Inventory of devices under active monitoring.
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Devices present in the monitoring whitelist, with their `lastOk`.
    async fn list_devices(&self) -> Result<Vec<Device>>;

    /// Interfaces of a single device.
    async fn list_interfaces(&self, device: &str) -> Result<Vec<Interface>>;
}

/// Resolves SNMP credentials for a community.
#[async_trait]
pub trait SecurityResolver: Send + Sync {
    async fn resolve(&self, community: &str) -> Result<SecurityData>;
}

/// Walks MIB subtrees on one target.
#[async_trait]
pub trait SnmpWalker: Send + Sync {
    /// Walk every requested MIB on `target`.
    ///
    /// # Errors
    ///
    /// Fails when the session cannot be validated or established. A failed
    /// walk of a single MIB is logged and skipped.
    async fn get_data(
        &self,
        mibs: &[String],
        target: &str,
        security: &SecurityData,
    ) -> Result<Vec<MetricReadings>>;
}
