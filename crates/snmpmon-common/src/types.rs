use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unit reported for plain counters and gauges.
pub const UNIT_COUNTER: &str = "1";

/// Monitor status of a host or a service, as understood by the backend.
///
/// # Examples
///
/// ```
/// use snmpmon_common::types::MonitorStatus;
///
/// let status: MonitorStatus = "service_warning".parse().unwrap();
/// assert_eq!(status, MonitorStatus::ServiceWarning);
/// assert_eq!(status.to_string(), "SERVICE_WARNING");
/// assert!(MonitorStatus::ServiceUnscheduledCritical.weight() > status.weight());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorStatus {
    ServiceOk,
    ServiceWarning,
    ServiceUnscheduledCritical,
    ServicePending,
    ServiceScheduledCritical,
    ServiceUnknown,
    HostUp,
    HostUnreachable,
    HostDown,
}

impl MonitorStatus {
    /// Weight used for multi-state comparison of service statuses.
    /// Host statuses do not take part in service roll-ups and weigh 0.
    pub fn weight(self) -> u32 {
        match self {
            MonitorStatus::ServiceOk => 0,
            MonitorStatus::ServicePending => 10,
            MonitorStatus::ServiceUnknown => 20,
            MonitorStatus::ServiceWarning => 30,
            MonitorStatus::ServiceScheduledCritical => 50,
            MonitorStatus::ServiceUnscheduledCritical => 100,
            MonitorStatus::HostUp | MonitorStatus::HostUnreachable | MonitorStatus::HostDown => 0,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            MonitorStatus::ServiceOk => "SERVICE_OK",
            MonitorStatus::ServiceWarning => "SERVICE_WARNING",
            MonitorStatus::ServiceUnscheduledCritical => "SERVICE_UNSCHEDULED_CRITICAL",
            MonitorStatus::ServicePending => "SERVICE_PENDING",
            MonitorStatus::ServiceScheduledCritical => "SERVICE_SCHEDULED_CRITICAL",
            MonitorStatus::ServiceUnknown => "SERVICE_UNKNOWN",
            MonitorStatus::HostUp => "HOST_UP",
            MonitorStatus::HostUnreachable => "HOST_UNREACHABLE",
            MonitorStatus::HostDown => "HOST_DOWN",
        }
    }
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MonitorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SERVICE_OK" => Ok(MonitorStatus::ServiceOk),
            "SERVICE_WARNING" => Ok(MonitorStatus::ServiceWarning),
            "SERVICE_UNSCHEDULED_CRITICAL" => Ok(MonitorStatus::ServiceUnscheduledCritical),
            "SERVICE_PENDING" => Ok(MonitorStatus::ServicePending),
            "SERVICE_SCHEDULED_CRITICAL" => Ok(MonitorStatus::ServiceScheduledCritical),
            "SERVICE_UNKNOWN" => Ok(MonitorStatus::ServiceUnknown),
            "HOST_UP" => Ok(MonitorStatus::HostUp),
            "HOST_UNREACHABLE" => Ok(MonitorStatus::HostUnreachable),
            "HOST_DOWN" => Ok(MonitorStatus::HostDown),
            _ => Err(format!("unknown monitor status: {s}")),
        }
    }
}

/// How a metric's raw samples relate to each other over time.
///
/// Profiles written by hand use `Delta`, the backend uses `DELTA`; parsing
/// accepts any case and serialization always emits the upper-case form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MetricKind {
    #[default]
    Gauge,
    Delta,
    Cumulative,
}

impl std::str::FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GAUGE" => Ok(MetricKind::Gauge),
            "DELTA" => Ok(MetricKind::Delta),
            "CUMULATIVE" => Ok(MetricKind::Cumulative),
            _ => Err(format!("unknown metric kind: {s}")),
        }
    }
}

impl TryFrom<String> for MetricKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MetricKind> for String {
    fn from(kind: MetricKind) -> Self {
        kind.to_string()
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::Gauge => write!(f, "GAUGE"),
            MetricKind::Delta => write!(f, "DELTA"),
            MetricKind::Cumulative => write!(f, "CUMULATIVE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ComputeType {
    #[default]
    Query,
    Regex,
    Synthetic,
    Informational,
    Performance,
    Health,
}

/// Role of a sample or threshold attached to a time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MetricSampleType {
    #[default]
    Value,
    Critical,
    Warning,
    Min,
    Max,
}

/// A single typed sample value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "valueType")]
pub enum TypedValue {
    #[serde(rename = "IntegerType")]
    Integer {
        #[serde(rename = "integerValue")]
        integer_value: i64,
    },
    #[serde(rename = "DoubleType")]
    Double {
        #[serde(rename = "doubleValue")]
        double_value: f64,
    },
    #[serde(rename = "StringType")]
    String {
        #[serde(rename = "stringValue")]
        string_value: String,
    },
    #[serde(rename = "BooleanType")]
    Boolean {
        #[serde(rename = "boolValue")]
        bool_value: bool,
    },
}

impl TypedValue {
    pub fn integer(value: i64) -> Self {
        TypedValue::Integer {
            integer_value: value,
        }
    }

    pub fn double(value: f64) -> Self {
        TypedValue::Double {
            double_value: value,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        TypedValue::String {
            string_value: value.into(),
        }
    }

    /// Numeric view of the value; `None` for strings and booleans.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Integer { integer_value } => Some(*integer_value as f64),
            TypedValue::Double { double_value } => Some(*double_value),
            TypedValue::String { .. } | TypedValue::Boolean { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdValue {
    pub sample_type: MetricSampleType,
    pub label: String,
    pub value: TypedValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInterval {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end_time: DateTime<Utc>,
}

impl TimeInterval {
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            start_time: timestamp,
            end_time: timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeries {
    pub metric_name: String,
    #[serde(default)]
    pub sample_type: MetricSampleType,
    pub interval: TimeInterval,
    pub value: TypedValue,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unit: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thresholds: Vec<ThresholdValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Host,
    Service,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredService {
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub owner: String,
    pub status: MonitorStatus,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
    pub last_check_time: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
    pub next_check_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_plugin_output: String,
    pub metrics: Vec<TimeSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredResource {
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub status: MonitorStatus,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
    pub last_check_time: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
    pub next_check_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_plugin_output: String,
    pub services: Vec<MonitoredService>,
}

impl MonitoredResource {
    pub fn to_inventory_resource(&self) -> InventoryResource {
        InventoryResource {
            name: self.name.clone(),
            resource_type: self.resource_type,
            services: self
                .services
                .iter()
                .map(|s| InventoryService {
                    name: s.name.clone(),
                    resource_type: s.resource_type,
                    owner: s.owner.clone(),
                })
                .collect(),
        }
    }

    pub fn to_resource_ref(&self) -> ResourceRef {
        ResourceRef {
            name: self.name.clone(),
            resource_type: self.resource_type,
            owner: String::new(),
        }
    }

    /// Stamp the resource and all of its services with the check times of
    /// the cycle that produced them.
    pub fn set_check_times(&mut self, last: DateTime<Utc>, next: DateTime<Utc>) {
        self.last_check_time = Some(last);
        self.next_check_time = Some(next);
        for service in &mut self.services {
            service.last_check_time = Some(last);
            service.next_check_time = Some(next);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryService {
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryResource {
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub services: Vec<InventoryService>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupType {
    HostGroup,
    ServiceGroup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    pub group_name: String,
    #[serde(rename = "type")]
    pub group_type: GroupType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub resources: Vec<ResourceRef>,
}

/// Ownership policy applied by the backend when inventory is synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HostOwnershipType {
    #[default]
    Yield,
    Take,
    Give,
}

/// Transit contract version stamped on outgoing requests.
pub const TRANSIT_VERSION: &str = "1.0.0";

/// Identifies the sender of a transit request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracerContext {
    pub app_type: String,
    pub agent_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time_stamp: DateTime<Utc>,
    pub version: String,
}

impl TracerContext {
    pub fn new(app_type: &str, agent_id: &str, time_stamp: DateTime<Utc>) -> Self {
        Self {
            app_type: app_type.to_string(),
            agent_id: agent_id.to_string(),
            time_stamp,
            version: TRANSIT_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRequest {
    pub context: TracerContext,
    pub ownership_type: HostOwnershipType,
    pub resources: Vec<InventoryResource>,
    pub groups: Vec<ResourceGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesWithServicesRequest {
    pub context: TracerContext,
    pub resources: Vec<MonitoredResource>,
}

/// One entry of the monitoring profile: how to present and judge a metric.
///
/// Thresholds of `-1` are disabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDefinition {
    pub name: String,
    #[serde(default)]
    pub custom_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub monitored: bool,
    #[serde(default)]
    pub graphed: bool,
    #[serde(default)]
    pub metric_type: MetricKind,
    #[serde(default)]
    pub compute_type: ComputeType,
    #[serde(default)]
    pub service_type: String,
    #[serde(default)]
    pub source_type: String,
    #[serde(default = "disabled_threshold")]
    pub warning_threshold: i64,
    #[serde(default = "disabled_threshold")]
    pub critical_threshold: i64,
}

fn disabled_threshold() -> i64 {
    -1
}
