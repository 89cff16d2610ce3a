use crate::status::calculate_service_status;
use chrono::{DateTime, Utc};
use snmpmon_common::types::{
    MetricSampleType, MonitorStatus, MonitoredResource, MonitoredService, ResourceType,
    ThresholdValue, TimeInterval, TimeSeries, TypedValue, UNIT_COUNTER,
};

/// Collects everything needed to emit one time series.
#[derive(Debug, Clone)]
pub struct MetricBuilder {
    pub name: String,
    pub custom_name: String,
    pub value: TypedValue,
    pub unit: String,
    pub warning: Option<TypedValue>,
    pub critical: Option<TypedValue>,
    pub timestamp: DateTime<Utc>,
}

impl MetricBuilder {
    pub fn new(name: impl Into<String>, value: TypedValue, timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            custom_name: String::new(),
            value,
            unit: UNIT_COUNTER.to_string(),
            warning: None,
            critical: None,
            timestamp,
        }
    }

    pub fn custom_name(mut self, custom_name: impl Into<String>) -> Self {
        self.custom_name = custom_name.into();
        self
    }

    /// Attach integer warning and critical bounds. `-1` is kept as-is so the
    /// backend sees the bound as disabled.
    pub fn thresholds(mut self, warning: i64, critical: i64) -> Self {
        self.warning = Some(TypedValue::integer(warning));
        self.critical = Some(TypedValue::integer(critical));
        self
    }

    /// Name the series is published under.
    pub fn display_name(&self) -> &str {
        if self.custom_name.is_empty() {
            &self.name
        } else {
            &self.custom_name
        }
    }

    pub fn build(self) -> TimeSeries {
        let metric_name = self.display_name().to_string();
        let mut thresholds = Vec::with_capacity(2);
        if let Some(warning) = self.warning {
            thresholds.push(ThresholdValue {
                sample_type: MetricSampleType::Warning,
                label: format!("{metric_name}_wn"),
                value: warning,
            });
        }
        if let Some(critical) = self.critical {
            thresholds.push(ThresholdValue {
                sample_type: MetricSampleType::Critical,
                label: format!("{metric_name}_cr"),
                value: critical,
            });
        }

        TimeSeries {
            metric_name,
            sample_type: MetricSampleType::Value,
            interval: TimeInterval::at(self.timestamp),
            value: self.value,
            unit: self.unit,
            thresholds,
        }
    }
}

/// Build a service whose status is the worst status among its metrics.
///
/// An evaluation error is logged and the service falls back to OK.
pub fn create_service(
    name: impl Into<String>,
    owner: impl Into<String>,
    metrics: Vec<TimeSeries>,
) -> MonitoredService {
    let name = name.into();
    let status = match calculate_service_status(&metrics) {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!(service = %name, error = %e, "Service status evaluation failed");
            MonitorStatus::ServiceOk
        }
    };

    MonitoredService {
        name,
        resource_type: ResourceType::Service,
        owner: owner.into(),
        status,
        last_check_time: None,
        next_check_time: None,
        last_plugin_output: String::new(),
        metrics,
    }
}

pub fn create_resource(
    name: impl Into<String>,
    status: MonitorStatus,
    services: Vec<MonitoredService>,
) -> MonitoredResource {
    MonitoredResource {
        name: name.into(),
        resource_type: ResourceType::Host,
        status,
        last_check_time: None,
        next_check_time: None,
        last_plugin_output: String::new(),
        services,
    }
}
