use crate::config::{AgentConfig, Views};
use crate::transport::Transport;
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use snmpmon_collector::snmp::{all_mibs, AVAILABLE_METRICS, NON_MIB_METRICS};
use snmpmon_collector::state::{DeviceExt, DeviceMap, MetricDefinitions, MonitoringState};
use snmpmon_collector::{DeviceDirectory, SecurityResolver, SnmpWalker};
use snmpmon_common::types::{
    GroupType, HostOwnershipType, InventoryRequest, InventoryResource, MonitoredResource,
    ResourceGroup, ResourcesWithServicesRequest, TracerContext,
};
use std::sync::Arc;

pub const INTERFACES_VIEW: &str = "interfaces";
pub const HOST_GROUP: &str = "NEDI-M";

/// Identity and cadence stamped on everything a cycle sends.
#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    pub agent_id: String,
    pub app_type: String,
    pub ownership: HostOwnershipType,
    pub check_interval: Duration,
}

impl From<&AgentConfig> for ConnectorSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            agent_id: config.agent_id.clone(),
            app_type: config.app_type.clone(),
            ownership: config.ownership,
            check_interval: Duration::seconds(config.check_interval_secs as i64),
        }
    }
}

/// Result of one collection pass.
#[derive(Debug, Clone, Default)]
pub struct CycleOutput {
    pub resources: Vec<MonitoredResource>,
    pub inventory: Vec<InventoryResource>,
    pub groups: Vec<ResourceGroup>,
}

/// True when at least one view carries a metric definition.
pub fn has_metrics(views: &Views) -> bool {
    views.values().any(|defs| !defs.is_empty())
}

/// Catalogue keys offered for a view, filtered by substring.
pub fn list_suggestions(view: &str, name: &str) -> Vec<String> {
    if view != INTERFACES_VIEW {
        tracing::warn!(view, "Unsupported view");
        return Vec::new();
    }
    let mut suggestions: Vec<String> = AVAILABLE_METRICS
        .iter()
        .map(|m| m.mib)
        .chain(NON_MIB_METRICS.iter().map(|m| m.key))
        .filter(|key| name.is_empty() || key.contains(name))
        .map(str::to_string)
        .collect();
    suggestions.sort();
    suggestions
}

/// Drives discovery, SNMP collection and delivery for the agent.
pub struct SnmpConnector {
    directory: Arc<dyn DeviceDirectory>,
    resolver: Arc<dyn SecurityResolver>,
    walker: Arc<dyn SnmpWalker>,
    state: MonitoringState,
    settings: ConnectorSettings,
    inventory_checksum: Option<String>,
}

impl SnmpConnector {
    pub fn new(
        directory: Arc<dyn DeviceDirectory>,
        resolver: Arc<dyn SecurityResolver>,
        walker: Arc<dyn SnmpWalker>,
        state: MonitoringState,
        settings: ConnectorSettings,
    ) -> Self {
        Self {
            directory,
            resolver,
            walker,
            state,
            settings,
            inventory_checksum: None,
        }
    }

    pub fn state(&self) -> &MonitoringState {
        &self.state
    }

    /// Discover devices, walk their interfaces and publish the new device
    /// map. Per-device failures are logged and leave that device without
    /// interface data.
    pub async fn collect_metrics(&self, views: &Views) -> anyhow::Result<CycleOutput> {
        let mut defs = MetricDefinitions::new();
        let mut collect_interfaces = false;
        for (view, view_defs) in views {
            if view != INTERFACES_VIEW {
                tracing::warn!(view = %view, "Unsupported view, skipping");
                continue;
            }
            collect_interfaces = true;
            defs.extend(view_defs.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let devices = self
            .directory
            .list_devices()
            .await
            .context("Could not get devices")?;
        tracing::debug!(count = devices.len(), "Devices discovered");

        let mut scratch = DeviceMap::new();
        for device in devices {
            let mut ext = DeviceExt::new(device);
            match self.resolver.resolve(&ext.device.community).await {
                Ok(security) => ext.security = Some(security),
                Err(e) => tracing::warn!(
                    device = %ext.device.name,
                    community = %ext.device.community,
                    error = %e,
                    "No SNMP credentials for device"
                ),
            }
            if collect_interfaces {
                self.collect_interfaces(&mut ext).await;
            }
            scratch.insert(ext.device.name.clone(), ext);
        }
        self.state.publish(scratch);

        let resources = self.state.retrieve_monitored_resources(&defs);
        let inventory = resources.iter().map(MonitoredResource::to_inventory_resource).collect();
        let groups = vec![ResourceGroup {
            group_name: HOST_GROUP.to_string(),
            group_type: GroupType::HostGroup,
            description: String::new(),
            resources: resources.iter().map(MonitoredResource::to_resource_ref).collect(),
        }];
        tracing::info!(resources = resources.len(), cached = self.state.cache().len(), "Collection finished");

        Ok(CycleOutput {
            resources,
            inventory,
            groups,
        })
    }

    /// Interfaces are attached only once the device has been walked, so a
    /// device without credentials or with a failed walk reports host status
    /// alone.
    async fn collect_interfaces(&self, ext: &mut DeviceExt) {
        let name = ext.device.name.clone();
        let interfaces = match self.directory.list_interfaces(&name).await {
            Ok(interfaces) if interfaces.is_empty() => {
                tracing::debug!(device = %name, "Device has no interfaces");
                return;
            }
            Ok(interfaces) => interfaces,
            Err(e) => {
                tracing::warn!(device = %name, error = %e, "Could not get interfaces");
                return;
            }
        };

        let Some(security) = ext.security.as_ref() else {
            tracing::debug!(device = %name, "Skipping SNMP walk without credentials");
            return;
        };
        let result = self.walker.get_data(&all_mibs(), &ext.device.ip, security).await;
        match result {
            Ok(readings) => {
                ext.set_interfaces(interfaces);
                ext.apply_readings(&readings);
            }
            Err(e) => tracing::warn!(device = %name, target = %ext.device.ip, error = %e, "SNMP collection failed"),
        }
    }

    /// Hex SHA-256 over the sorted `device:interface` names of the last
    /// published device map.
    pub fn inventory_checksum(&self) -> anyhow::Result<String> {
        let devices = self.state.snapshot();
        let mut hosts_services: Vec<String> = devices
            .values()
            .flat_map(|ext| {
                ext.interfaces
                    .values()
                    .map(move |iface| format!("{}:{}", ext.device.name, iface.interface.name))
            })
            .collect();
        hosts_services.sort();
        let encoded = serde_json::to_vec(&hosts_services).context("Failed to encode inventory")?;
        Ok(hex::encode(Sha256::digest(&encoded)))
    }

    fn context(&self, now: DateTime<Utc>) -> TracerContext {
        TracerContext::new(&self.settings.app_type, &self.settings.agent_id, now)
    }

    /// One periodic pass: collect, send the inventory when it changed, then
    /// send metrics.
    pub async fn run_cycle(&mut self, views: &Views, transport: &dyn Transport) -> anyhow::Result<()> {
        if !has_metrics(views) {
            tracing::debug!("No metrics configured, skipping cycle");
            return Ok(());
        }
        let output = self.collect_metrics(views).await?;

        let checksum = self.inventory_checksum();
        let changed = match &checksum {
            Ok(sum) => self.inventory_checksum.as_deref() != Some(sum.as_str()),
            Err(e) => {
                tracing::warn!(error = %e, "Inventory checksum unavailable");
                true
            }
        };
        if changed {
            tracing::info!("Inventory changed, sending inventory");
            let request = InventoryRequest {
                context: self.context(Utc::now()),
                ownership_type: self.settings.ownership,
                resources: output.inventory,
                groups: output.groups,
            };
            match transport.send_inventory(&request).await {
                Ok(()) => {
                    if let Ok(sum) = checksum {
                        self.inventory_checksum = Some(sum);
                    }
                }
                Err(e) => tracing::error!(error = %e, "Failed to send inventory"),
            }
        }

        let now = Utc::now();
        let next = now + self.settings.check_interval;
        let mut resources = output.resources;
        for resource in &mut resources {
            resource.set_check_times(now, next);
        }
        let request = ResourcesWithServicesRequest {
            context: self.context(now),
            resources,
        };
        transport
            .send_metrics(&request)
            .await
            .context("Failed to send metrics")
    }
}
