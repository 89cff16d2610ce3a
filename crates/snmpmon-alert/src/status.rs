use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use snmpmon_common::types::{MetricSampleType, MonitorStatus, TimeSeries, TypedValue};
use thiserror::Error;

/// A device whose last successful poll is this old or older is unreachable.
pub const HOST_STALE_AFTER_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq)]
pub enum StatusError {
    #[error("unsupported threshold sample type {sample_type:?} on metric {metric}")]
    UnsupportedThreshold {
        metric: String,
        sample_type: MetricSampleType,
    },
}

/// Numeric sample or bound. Integers compare exactly against integers.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn of(value: &TypedValue) -> Option<Self> {
        match value {
            TypedValue::Integer { integer_value } => Some(Number::Int(*integer_value)),
            TypedValue::Double { double_value } => Some(Number::Float(*double_value)),
            TypedValue::String { .. } | TypedValue::Boolean { .. } => None,
        }
    }

    /// `-1` marks a disabled bound.
    fn is_disabled(self) -> bool {
        match self {
            Number::Int(v) => v == -1,
            Number::Float(v) => v == -1.0,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(v) => v as f64,
            Number::Float(v) => v,
        }
    }

    fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

/// Which side of the bounds is the bad one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    HighIsBad,
    LowIsBad,
}

impl Direction {
    fn crossed(self, value: Number, bound: Number) -> bool {
        match (self, value.compare(bound)) {
            (Direction::HighIsBad, Some(ord)) => ord != Ordering::Less,
            (Direction::LowIsBad, Some(ord)) => ord != Ordering::Greater,
            (_, None) => false,
        }
    }
}

fn enabled_bound(bound: Option<&TypedValue>) -> Option<Number> {
    bound.and_then(Number::of).filter(|v| !v.is_disabled())
}

/// Evaluate a single value against optional warning and critical bounds.
///
/// A bound that is absent, non-numeric or `-1` is disabled. With both bounds
/// enabled and `warning > critical` the metric is low-is-bad, otherwise
/// high-is-bad. A single enabled bound is always compared high-is-bad.
/// Non-numeric values evaluate to [`MonitorStatus::ServiceOk`].
pub fn calculate_status(
    value: &TypedValue,
    warning: Option<&TypedValue>,
    critical: Option<&TypedValue>,
) -> MonitorStatus {
    let Some(value) = Number::of(value) else {
        return MonitorStatus::ServiceOk;
    };

    match (enabled_bound(warning), enabled_bound(critical)) {
        (None, None) => MonitorStatus::ServiceOk,
        (None, Some(critical)) => {
            if Direction::HighIsBad.crossed(value, critical) {
                MonitorStatus::ServiceUnscheduledCritical
            } else {
                MonitorStatus::ServiceOk
            }
        }
        (Some(warning), None) => {
            if Direction::HighIsBad.crossed(value, warning) {
                MonitorStatus::ServiceWarning
            } else {
                MonitorStatus::ServiceOk
            }
        }
        (Some(warning), Some(critical)) => {
            let direction = if warning.compare(critical) == Some(Ordering::Greater) {
                Direction::LowIsBad
            } else {
                Direction::HighIsBad
            };
            if direction.crossed(value, critical) {
                MonitorStatus::ServiceUnscheduledCritical
            } else if direction.crossed(value, warning) {
                MonitorStatus::ServiceWarning
            } else {
                MonitorStatus::ServiceOk
            }
        }
    }
}

/// Fold the statuses of a service's metrics into the worst one.
///
/// Metrics without thresholds do not take part. A threshold that is neither
/// a warning nor a critical bound is rejected.
pub fn calculate_service_status(metrics: &[TimeSeries]) -> Result<MonitorStatus, StatusError> {
    let mut worst = MonitorStatus::ServiceOk;
    for metric in metrics.iter().filter(|m| !m.thresholds.is_empty()) {
        let mut warning = None;
        let mut critical = None;
        for threshold in &metric.thresholds {
            match threshold.sample_type {
                MetricSampleType::Warning => warning = Some(&threshold.value),
                MetricSampleType::Critical => critical = Some(&threshold.value),
                other => {
                    return Err(StatusError::UnsupportedThreshold {
                        metric: metric.metric_name.clone(),
                        sample_type: other,
                    })
                }
            }
        }
        let status = calculate_status(&metric.value, warning, critical);
        if status.weight() > worst.weight() {
            worst = status;
        }
    }
    Ok(worst)
}

/// Host status from the directory's last successful poll (epoch seconds).
pub fn calculate_host_status(last_ok: f64, now: DateTime<Utc>) -> MonitorStatus {
    let age = now.timestamp() as f64 - last_ok;
    if age < HOST_STALE_AFTER_SECS as f64 {
        MonitorStatus::HostUp
    } else {
        MonitorStatus::HostUnreachable
    }
}
