use crate::builder::{create_resource, create_service, MetricBuilder};
use crate::status::{calculate_host_status, calculate_service_status, calculate_status, StatusError};
use chrono::{Duration, Utc};
use snmpmon_common::types::{
    MetricSampleType, MonitorStatus, ThresholdValue, TimeSeries, TypedValue,
};

fn int(v: i64) -> TypedValue {
    TypedValue::integer(v)
}

fn status_of(value: i64, warning: i64, critical: i64) -> MonitorStatus {
    calculate_status(&int(value), Some(&int(warning)), Some(&int(critical)))
}

fn series(name: &str, value: i64, warning: i64, critical: i64) -> TimeSeries {
    MetricBuilder::new(name, int(value), Utc::now())
        .thresholds(warning, critical)
        .build()
}

#[test]
fn disabled_bounds_are_always_ok() {
    for value in [-100, -1, 0, 1, 50, 1_000_000] {
        assert_eq!(status_of(value, -1, -1), MonitorStatus::ServiceOk);
    }
    assert_eq!(
        calculate_status(&TypedValue::double(99.5), None, None),
        MonitorStatus::ServiceOk
    );
}

#[test]
fn large_integers_compare_exactly() {
    let base = 1i64 << 53;
    assert_eq!(status_of(base + 3, -1, base + 4), MonitorStatus::ServiceOk);
    assert_eq!(status_of(base + 4, -1, base + 4), MonitorStatus::ServiceUnscheduledCritical);
    assert_eq!(status_of(base + 3, base + 3, base + 5), MonitorStatus::ServiceWarning);
    assert_eq!(
        calculate_status(&TypedValue::double(1.5), Some(&int(1)), Some(&int(2))),
        MonitorStatus::ServiceWarning
    );
}

#[test]
fn warning_above_critical_means_low_is_bad() {
    assert_eq!(status_of(50, 80, 60), MonitorStatus::ServiceUnscheduledCritical);
    assert_eq!(status_of(70, 80, 60), MonitorStatus::ServiceWarning);
    assert_eq!(status_of(90, 80, 60), MonitorStatus::ServiceOk);
}

#[test]
fn warning_below_critical_means_high_is_bad() {
    assert_eq!(status_of(50, 60, 80), MonitorStatus::ServiceOk);
    assert_eq!(status_of(70, 60, 80), MonitorStatus::ServiceWarning);
    assert_eq!(status_of(90, 60, 80), MonitorStatus::ServiceUnscheduledCritical);
}

#[test]
fn single_enabled_bound_is_compared_on_its_own() {
    // warning disabled, critical active
    assert_eq!(status_of(10, -1, 80), MonitorStatus::ServiceOk);
    assert_eq!(status_of(80, -1, 80), MonitorStatus::ServiceUnscheduledCritical);
    // critical absent, warning active
    assert_eq!(
        calculate_status(&int(59), Some(&int(60)), None),
        MonitorStatus::ServiceOk
    );
    assert_eq!(
        calculate_status(&TypedValue::double(60.0), Some(&int(60)), None),
        MonitorStatus::ServiceWarning
    );
}

#[test]
fn non_numeric_value_is_ok() {
    assert_eq!(
        calculate_status(&TypedValue::string("down"), Some(&int(1)), Some(&int(2))),
        MonitorStatus::ServiceOk
    );
}

#[test]
fn host_status_boundary_is_exclusive() {
    let now = Utc::now();
    let last_ok = |secs: i64| (now - Duration::seconds(secs)).timestamp() as f64;

    assert_eq!(calculate_host_status(last_ok(299), now), MonitorStatus::HostUp);
    assert_eq!(calculate_host_status(last_ok(300), now), MonitorStatus::HostUnreachable);
    assert_eq!(calculate_host_status(last_ok(301), now), MonitorStatus::HostUnreachable);
}

#[test]
fn service_status_takes_worst_metric() {
    let metrics = vec![
        series("a", 10, 60, 80),
        series("b", 70, 60, 80),
        series("c", 90, 60, 80),
    ];
    assert_eq!(
        calculate_service_status(&metrics).unwrap(),
        MonitorStatus::ServiceUnscheduledCritical
    );
    assert_eq!(
        calculate_service_status(&metrics[..2]).unwrap(),
        MonitorStatus::ServiceWarning
    );
}

#[test]
fn metrics_without_thresholds_do_not_participate() {
    let plain = MetricBuilder::new("ifSpeed", int(100_000_000), Utc::now()).build();
    assert!(plain.thresholds.is_empty());
    assert_eq!(
        calculate_service_status(&[plain]).unwrap(),
        MonitorStatus::ServiceOk
    );
}

#[test]
fn unexpected_threshold_type_is_rejected() {
    let mut metric = series("bytesIn", 5, 60, 80);
    metric.thresholds.push(ThresholdValue {
        sample_type: MetricSampleType::Max,
        label: "bytesIn_max".into(),
        value: int(100),
    });

    let err = calculate_service_status(&[metric]).unwrap_err();
    assert_eq!(
        err,
        StatusError::UnsupportedThreshold {
            metric: "bytesIn".into(),
            sample_type: MetricSampleType::Max,
        }
    );
}

#[test]
fn builder_labels_thresholds_with_published_name() {
    let now = Utc::now();
    let ts = MetricBuilder::new("ifInDiscards", int(10), now)
        .custom_name("Inbound Discards")
        .thresholds(-1, 5)
        .build();

    assert_eq!(ts.metric_name, "Inbound Discards");
    assert_eq!(ts.unit, "1");
    assert_eq!(ts.interval.start_time, now);
    assert_eq!(ts.interval.end_time, now);
    assert_eq!(ts.thresholds.len(), 2);
    assert_eq!(ts.thresholds[0].label, "Inbound Discards_wn");
    assert_eq!(ts.thresholds[0].value, int(-1));
    assert_eq!(ts.thresholds[1].label, "Inbound Discards_cr");
    assert_eq!(ts.thresholds[1].sample_type, MetricSampleType::Critical);
}

#[test]
fn service_falls_back_to_ok_on_evaluation_error() {
    let mut metric = series("bytesOut", 100, 60, 80);
    metric.thresholds[0].sample_type = MetricSampleType::Min;

    let service = create_service("Fa0/0", "c2801", vec![metric]);
    assert_eq!(service.status, MonitorStatus::ServiceOk);
    assert_eq!(service.owner, "c2801");
}

#[test]
fn resource_serializes_for_backend() {
    let service = create_service("Fa0/0", "c2801", vec![series("bytesIn", 70, 60, 80)]);
    assert_eq!(service.status, MonitorStatus::ServiceWarning);

    let resource = create_resource("c2801", MonitorStatus::HostUp, vec![service]);
    let json = serde_json::to_value(&resource).unwrap();
    assert_eq!(json["type"], "host");
    assert_eq!(json["services"][0]["type"], "service");
    assert_eq!(json["services"][0]["status"], "SERVICE_WARNING");
    assert_eq!(json["services"][0]["metrics"][0]["thresholds"][0]["label"], "bytesIn_wn");
}
