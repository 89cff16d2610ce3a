use anyhow::Context;
use serde::Deserialize;
use snmpmon_collector::state::MetricDefinitions;
use snmpmon_common::types::{HostOwnershipType, MetricDefinition};
use std::collections::BTreeMap;

/// Placeholder row the profile editor leaves in every view.
pub const TEMPLATE_METRIC_NAME: &str = "$view_Template#";

/// Metric definitions grouped by view (service type).
pub type Views = BTreeMap<String, MetricDefinitions>;

#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    pub agent_id: String,
    #[serde(default = "default_app_type")]
    pub app_type: String,
    #[serde(default = "default_nedi_server")]
    pub nedi_server: String,
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    /// Directory holding `nedi.conf`. Falls back to `NEDI_CONF_PATH`.
    pub nedi_conf_path: Option<String>,
    /// Base URL of the transit endpoint. Resources are only logged when unset.
    pub transport_url: Option<String>,
    #[serde(default)]
    pub ownership: HostOwnershipType,
    #[serde(default)]
    pub metrics: Vec<MetricDefinition>,
}

fn default_app_type() -> String {
    "SNMP".to_string()
}

fn default_nedi_server() -> String {
    snmpmon_collector::nedi::DEFAULT_NEDI_SERVER.to_string()
}

fn default_check_interval() -> u64 {
    300
}

impl AgentConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {path}"))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        if config.check_interval_secs == 0 {
            anyhow::bail!("check_interval_secs must be greater than zero");
        }
        Ok(config)
    }

    /// Monitored definitions grouped by `serviceType`, then by name.
    pub fn views(&self) -> Views {
        let mut views = Views::new();
        for def in &self.metrics {
            if def.name == TEMPLATE_METRIC_NAME || !def.monitored {
                continue;
            }
            views
                .entry(def.service_type.clone())
                .or_default()
                .insert(def.name.clone(), def.clone());
        }
        views
    }
}
