use crate::cache::{CachedMetric, SampleCache};
use crate::nedi::{Device, Interface};
use crate::secdata::SecurityData;
use crate::snmp::{
    MetricReadings, BYTES_PER_SECOND_IN, BYTES_PER_SECOND_OUT, IF_HC_IN_OCTETS,
    IF_HC_OUT_OCTETS, IF_IN_OCTETS, IF_OUT_OCTETS,
};
use chrono::{DateTime, Utc};
use snmpmon_alert::{calculate_host_status, create_resource, create_service, MetricBuilder};
use snmpmon_common::types::{
    MetricDefinition, MetricKind, MonitorStatus, MonitoredResource, MonitoredService, TimeSeries,
    TypedValue,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

/// Metric definitions of the active profile, keyed by metric name.
pub type MetricDefinitions = HashMap<String, MetricDefinition>;

/// Device map published at the end of a collection cycle.
pub type DeviceMap = BTreeMap<String, DeviceExt>;

/// Rate metrics and the counters they are derived from, 64-bit first.
const RATE_SOURCES: [(&str, [&str; 2]); 2] = [
    (BYTES_PER_SECOND_IN, [IF_HC_IN_OCTETS, IF_IN_OCTETS]),
    (BYTES_PER_SECOND_OUT, [IF_HC_OUT_OCTETS, IF_OUT_OCTETS]),
];

/// Raw reading of one MIB on one interface for the current cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceMetric {
    pub key: String,
    pub mib: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceExt {
    pub interface: Interface,
    /// Readings keyed by MIB name.
    pub metrics: BTreeMap<String, InterfaceMetric>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceExt {
    pub device: Device,
    pub security: Option<SecurityData>,
    /// Interfaces keyed by `ifIndex`.
    pub interfaces: BTreeMap<i64, InterfaceExt>,
}

impl DeviceExt {
    pub fn new(device: Device) -> Self {
        Self {
            device,
            security: None,
            interfaces: BTreeMap::new(),
        }
    }

    /// Replace the interface map with `interfaces`.
    pub fn set_interfaces(&mut self, interfaces: Vec<Interface>) {
        self.interfaces = interfaces
            .into_iter()
            .map(|interface| {
                (
                    interface.index,
                    InterfaceExt {
                        interface,
                        metrics: BTreeMap::new(),
                    },
                )
            })
            .collect();
    }

    /// Attach walked values to interfaces. The last OID component of each
    /// instance is the `ifIndex`.
    pub fn apply_readings(&mut self, readings: &[MetricReadings]) {
        for reading in readings {
            for value in &reading.values {
                let index = value.instance.rsplit('.').next().unwrap_or_default();
                let Ok(index) = index.parse::<i64>() else {
                    tracing::warn!(
                        device = %self.device.name,
                        mib = reading.metric.mib,
                        instance = %value.instance,
                        "Cannot map SNMP instance to interface index"
                    );
                    continue;
                };
                let Some(iface) = self.interfaces.get_mut(&index) else {
                    tracing::debug!(device = %self.device.name, mib = reading.metric.mib, index, "No interface for index");
                    continue;
                };
                iface.metrics.insert(
                    reading.metric.mib.to_string(),
                    InterfaceMetric {
                        key: reading.metric.key.to_string(),
                        mib: reading.metric.mib.to_string(),
                        value: value.value,
                    },
                );
            }
        }
    }
}

/// Service status and plugin output implied by an interface status code.
pub fn interface_status(code: i64) -> Option<(MonitorStatus, &'static str)> {
    match code {
        0 => Some((
            MonitorStatus::ServiceWarning,
            "Interface Operational State is DOWN, Administrative state is DOWN",
        )),
        1 => Some((
            MonitorStatus::ServiceUnscheduledCritical,
            "Interface Operational State is DOWN, Administrative state is UP",
        )),
        2 => Some((
            MonitorStatus::ServiceWarning,
            "Interface Operational State is UP, Administrative state is DOWN",
        )),
        3 => Some((
            MonitorStatus::ServiceOk,
            "Interface Operational State is UP, Administrative state is UP",
        )),
        _ => None,
    }
}

fn build_metric(name: &str, def: &MetricDefinition, value: i64, now: DateTime<Utc>) -> TimeSeries {
    MetricBuilder::new(name, TypedValue::integer(value), now)
        .custom_name(def.custom_name.clone())
        .thresholds(def.warning_threshold, def.critical_threshold)
        .build()
}

/// Device topology of the last cycle plus the sample cache used to turn
/// raw counters into deltas and rates.
pub struct MonitoringState {
    devices: Mutex<Arc<DeviceMap>>,
    cache: Arc<SampleCache>,
}

impl MonitoringState {
    pub fn new(cache: Arc<SampleCache>) -> Self {
        Self {
            devices: Mutex::new(Arc::new(DeviceMap::new())),
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<SampleCache> {
        &self.cache
    }

    fn lock_devices(&self) -> MutexGuard<'_, Arc<DeviceMap>> {
        self.devices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Swap in the device map built by a finished cycle.
    pub fn publish(&self, devices: DeviceMap) {
        *self.lock_devices() = Arc::new(devices);
    }

    /// Consistent view of the last published device map.
    pub fn snapshot(&self) -> Arc<DeviceMap> {
        Arc::clone(&self.lock_devices())
    }

    pub fn retrieve_monitored_resources(&self, defs: &MetricDefinitions) -> Vec<MonitoredResource> {
        self.retrieve_monitored_resources_at(defs, Utc::now())
    }

    /// One resource per device, as of `now`.
    pub fn retrieve_monitored_resources_at(
        &self,
        defs: &MetricDefinitions,
        now: DateTime<Utc>,
    ) -> Vec<MonitoredResource> {
        let devices = self.snapshot();
        devices
            .values()
            .map(|device| {
                let services = self.retrieve_monitored_services(device, defs, now);
                create_resource(
                    device.device.name.clone(),
                    calculate_host_status(device.device.last_ok, now),
                    services,
                )
            })
            .collect()
    }

    /// One service per interface. Updates the sample cache with every
    /// reading of the cycle.
    pub fn retrieve_monitored_services(
        &self,
        device: &DeviceExt,
        defs: &MetricDefinitions,
        now: DateTime<Utc>,
    ) -> Vec<MonitoredService> {
        let now_secs = now.timestamp();
        let device_name = &device.device.name;
        let mut services = Vec::with_capacity(device.interfaces.len());

        for iface in device.interfaces.values() {
            let iface_name = &iface.interface.name;
            let mut metrics = Vec::new();

            // Rates read the previous samples before this cycle overwrites them.
            for (rate_key, sources) in RATE_SOURCES {
                let Some(def) = defs.get(rate_key) else {
                    continue;
                };
                if let Some(rate) = self.rate(device_name, iface, sources, now_secs) {
                    metrics.push(build_metric(rate_key, def, rate, now));
                }
            }

            for (mib, metric) in &iface.metrics {
                let cache_key = SampleCache::key(device_name, iface_name, mib);
                if let Some(def) = defs.get(&metric.mib) {
                    let value = match def.metric_type {
                        MetricKind::Delta => self
                            .cache
                            .get(&cache_key)
                            .map(|prev| metric.value.wrapping_sub(prev.value)),
                        MetricKind::Gauge | MetricKind::Cumulative => Some(metric.value),
                    };
                    if let Some(value) = value {
                        metrics.push(build_metric(&metric.key, def, value, now));
                    }
                }
                self.cache.set(
                    cache_key,
                    CachedMetric {
                        value: metric.value,
                        timestamp: now_secs,
                    },
                );
            }

            let mut service = create_service(iface_name.clone(), device_name.clone(), metrics);
            if let Some((status, output)) = interface_status(iface.interface.status) {
                service.status = status;
                service.last_plugin_output = output.to_string();
            }
            services.push(service);
        }

        services
    }

    /// Per-second rate from the first source counter that has both a
    /// current reading and a cached previous sample.
    fn rate(&self, device: &str, iface: &InterfaceExt, sources: [&str; 2], now_secs: i64) -> Option<i64> {
        for mib in sources {
            let Some(current) = iface.metrics.get(mib) else {
                continue;
            };
            let Some(prev) = self
                .cache
                .get(&SampleCache::key(device, &iface.interface.name, mib))
            else {
                continue;
            };
            let elapsed = now_secs - prev.timestamp;
            if elapsed <= 0 {
                tracing::debug!(device, interface = %iface.interface.name, mib, "No time elapsed since previous sample");
                return None;
            }
            return Some(current.value.wrapping_sub(prev.value) / elapsed);
        }
        None
    }
}
