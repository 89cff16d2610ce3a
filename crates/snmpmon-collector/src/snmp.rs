use crate::error::{CollectorError, Result};
use crate::secdata::SecurityData;
use crate::SnmpWalker;
use async_snmp::{
    Auth, AuthProtocol, Client, Oid, PrivProtocol, Retry, UdpClient, Value, WalkMode,
    DEFAULT_MAX_OIDS_PER_REQUEST, DEFAULT_MAX_REPETITIONS,
};
use async_trait::async_trait;
use std::time::Duration;

pub const SNMP_PORT: u16 = 161;
pub const SNMP_TIMEOUT: Duration = Duration::from_secs(2);
/// GETBULK repetitions and OIDs per request for v2c sessions.
pub const V2C_MAX_REPETITIONS: u32 = 2;
pub const V2C_MAX_OIDS: usize = 1;

pub const IF_SPEED: &str = "ifSpeed";
pub const IF_IN_OCTETS: &str = "ifInOctets";
pub const IF_OUT_OCTETS: &str = "ifOutOctets";
pub const IF_HC_IN_OCTETS: &str = "ifHCInOctets";
pub const IF_HC_OUT_OCTETS: &str = "ifHCOutOctets";
pub const IF_IN_ERRORS: &str = "ifInErrors";
pub const IF_OUT_ERRORS: &str = "ifOutErrors";
pub const IF_IN_DISCARDS: &str = "ifInDiscards";
pub const IF_OUT_DISCARDS: &str = "ifOutDiscards";

pub const BYTES_PER_SECOND_IN: &str = "bytesPerSecondIn";
pub const BYTES_PER_SECOND_OUT: &str = "bytesPerSecondOut";

/// A MIB object the client knows how to walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnmpMetric {
    pub mib: &'static str,
    pub oid: &'static str,
    /// Name the reading is published under.
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// A metric derived from other readings rather than walked directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonMibMetric {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub static AVAILABLE_METRICS: &[SnmpMetric] = &[
    SnmpMetric {
        mib: IF_SPEED,
        oid: "1.3.6.1.2.1.2.2.1.5",
        key: IF_SPEED,
        name: "Interface Speed",
        description: "An estimate of the interface's current bandwidth in bits per second.",
    },
    SnmpMetric {
        mib: IF_IN_OCTETS,
        oid: "1.3.6.1.2.1.2.2.1.10",
        key: "bytesIn",
        name: "Inbound Octets",
        description: "The total number of octets received on the interface, including framing characters.",
    },
    SnmpMetric {
        mib: IF_OUT_OCTETS,
        oid: "1.3.6.1.2.1.2.2.1.16",
        key: "bytesOut",
        name: "Outbound Octets",
        description: "The total number of octets transmitted out of the interface, including framing characters.",
    },
    SnmpMetric {
        mib: IF_HC_IN_OCTETS,
        oid: "1.3.6.1.2.1.31.1.1.1.6",
        key: "bytesInX64",
        name: "Inbound Octets (64-bit)",
        description: "64-bit counter of octets received on the interface, including framing characters.",
    },
    SnmpMetric {
        mib: IF_HC_OUT_OCTETS,
        oid: "1.3.6.1.2.1.31.1.1.1.10",
        key: "bytesOutX64",
        name: "Outbound Octets (64-bit)",
        description: "64-bit counter of octets transmitted out of the interface, including framing characters.",
    },
    SnmpMetric {
        mib: IF_IN_ERRORS,
        oid: "1.3.6.1.2.1.2.2.1.14",
        key: IF_IN_ERRORS,
        name: "Inbound Errors",
        description: "The number of inbound packets that contained errors preventing them from being deliverable to a higher-layer protocol.",
    },
    SnmpMetric {
        mib: IF_OUT_ERRORS,
        oid: "1.3.6.1.2.1.2.2.1.20",
        key: IF_OUT_ERRORS,
        name: "Outbound Errors",
        description: "The number of outbound packets that could not be transmitted because of errors.",
    },
    SnmpMetric {
        mib: IF_IN_DISCARDS,
        oid: "1.3.6.1.2.1.2.2.1.13",
        key: IF_IN_DISCARDS,
        name: "Inbound Discards",
        description: "The number of inbound packets discarded even though no errors had been detected.",
    },
    SnmpMetric {
        mib: IF_OUT_DISCARDS,
        oid: "1.3.6.1.2.1.2.2.1.19",
        key: IF_OUT_DISCARDS,
        name: "Outbound Discards",
        description: "The number of outbound packets discarded even though no errors had been detected.",
    },
];

pub static NON_MIB_METRICS: &[NonMibMetric] = &[
    NonMibMetric {
        key: BYTES_PER_SECOND_IN,
        name: "Bytes Per Second In",
        description: "Inbound octet rate, from the 64-bit counter when available.",
    },
    NonMibMetric {
        key: BYTES_PER_SECOND_OUT,
        name: "Bytes Per Second Out",
        description: "Outbound octet rate, from the 64-bit counter when available.",
    },
];

pub fn find_metric(mib: &str) -> Option<&'static SnmpMetric> {
    AVAILABLE_METRICS.iter().find(|m| m.mib == mib)
}

/// Every catalogue MIB, in catalogue order.
pub fn all_mibs() -> Vec<String> {
    AVAILABLE_METRICS.iter().map(|m| m.mib.to_string()).collect()
}

/// One walked instance: the OID suffix below the MIB root and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpValue {
    pub instance: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricReadings {
    pub metric: SnmpMetric,
    pub values: Vec<SnmpValue>,
}

/// Validated session parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSecurity {
    V2c {
        community: String,
    },
    V3 {
        user: String,
        auth: AuthProtocol,
        auth_password: String,
        privacy: Option<(PrivProtocol, String)>,
    },
}

impl SessionSecurity {
    /// Validate `security` for `target` and pick the protocol version.
    pub fn from_security_data(target: &str, security: &SecurityData) -> Result<Self> {
        let mut missing = Vec::new();
        if target.is_empty() {
            missing.push("target");
        }
        if security.name.is_empty() {
            missing.push("security name");
        }
        if !security.auth_protocol.is_empty() && security.auth_password.is_empty() {
            missing.push("authentication password");
        }
        if !security.privacy_protocol.is_empty() && security.privacy_password.is_empty() {
            missing.push("privacy password");
        }
        if !security.privacy_protocol.is_empty() && security.auth_protocol.is_empty() {
            missing.push("authentication protocol");
        }
        if !missing.is_empty() {
            return Err(CollectorError::Validation(format!(
                "missing {}",
                missing.join(", ")
            )));
        }

        if !security.is_v3() {
            return Ok(SessionSecurity::V2c {
                community: security.name.clone(),
            });
        }

        let auth = match security.auth_protocol.to_lowercase().as_str() {
            "md5" => AuthProtocol::Md5,
            "sha" => AuthProtocol::Sha1,
            other => {
                return Err(CollectorError::UnsupportedProtocol {
                    kind: "authentication",
                    protocol: other.to_string(),
                })
            }
        };
        let privacy = match security.privacy_protocol.to_lowercase().as_str() {
            "" => None,
            "aes" => Some((PrivProtocol::Aes128, security.privacy_password.clone())),
            "des" => Some((PrivProtocol::Des, security.privacy_password.clone())),
            other => {
                return Err(CollectorError::UnsupportedProtocol {
                    kind: "privacy",
                    protocol: other.to_string(),
                })
            }
        };

        Ok(SessionSecurity::V3 {
            user: security.name.clone(),
            auth,
            auth_password: security.auth_password.clone(),
            privacy,
        })
    }

    fn auth(&self) -> Auth {
        match self {
            SessionSecurity::V2c { community } => Auth::v2c(community.clone()),
            SessionSecurity::V3 {
                user,
                auth,
                auth_password,
                privacy,
            } => {
                let usm = Auth::usm(user.clone());
                match privacy {
                    Some((protocol, password)) => usm
                        .auth_priv(*auth, auth_password.as_str(), *protocol, password.as_str())
                        .into(),
                    None => usm.auth(*auth, auth_password.as_str()).into(),
                }
            }
        }
    }
}

/// Request shaping applied when a session is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub timeout: Duration,
    pub retries: u32,
    pub max_repetitions: u32,
    pub max_oids_per_request: usize,
    pub walk_mode: WalkMode,
}

/// Normalize a walked value to a signed reading. Only unsigned counters and
/// gauges are supported. Counter64 values above `i64::MAX` keep their bit
/// pattern, so differences must be taken with wrapping subtraction.
pub fn normalize_value(value: &Value) -> Option<i64> {
    match value {
        Value::Counter32(v) | Value::Gauge32(v) => Some(i64::from(*v)),
        Value::Counter64(v) => Some(*v as i64),
        _ => None,
    }
}

/// OID suffix below `root`, e.g. `"3"` for `1.3.6.1.2.1.2.2.1.5.3`.
pub fn instance_suffix<'a>(root: &str, oid: &'a str) -> Option<&'a str> {
    let oid = oid.strip_prefix('.').unwrap_or(oid);
    oid.strip_prefix(root)?.strip_prefix('.')
}

/// An open session able to walk one catalogue MIB.
#[async_trait]
pub trait SnmpSession: Send + Sync {
    async fn walk(&self, metric: &SnmpMetric) -> Result<MetricReadings>;
}

/// Opens sessions to a target.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    type Session: SnmpSession;

    async fn connect(&self, target: &str, security: &SessionSecurity) -> Result<Self::Session>;
}

/// Walk `mibs` in order over one session. A failed walk is logged and the
/// session reopened before the next MIB; if reopening fails the readings
/// gathered so far are returned. A failed initial connect is an error.
pub async fn walk_mibs<C: SessionConnector>(
    connector: &C,
    mibs: &[String],
    target: &str,
    security: &SessionSecurity,
) -> Result<Vec<MetricReadings>> {
    let mut session = connector.connect(target, security).await?;

    let mut data = Vec::with_capacity(mibs.len());
    for mib in mibs {
        let Some(metric) = find_metric(mib) else {
            tracing::warn!(target, mib = %mib, "Unsupported metric, skipping");
            continue;
        };
        match session.walk(metric).await {
            Ok(readings) => data.push(readings),
            Err(e) => {
                tracing::warn!(target, mib = %mib, error = %e, "SNMP walk failed, reconnecting");
                session = match connector.connect(target, security).await {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::error!(target, error = %e, "SNMP reconnect failed");
                        break;
                    }
                };
            }
        }
    }
    Ok(data)
}

#[async_trait]
impl SnmpSession for UdpClient {
    async fn walk(&self, metric: &SnmpMetric) -> Result<MetricReadings> {
        let root = Oid::parse(metric.oid)
            .map_err(|e| CollectorError::UnsupportedMib(format!("{}: {e}", metric.mib)))?;
        let varbinds = Client::walk(self, root)?.collect().await?;

        let mut values = Vec::with_capacity(varbinds.len());
        for vb in varbinds {
            let oid = vb.oid.to_string();
            let Some(instance) = instance_suffix(metric.oid, &oid) else {
                tracing::debug!(mib = metric.mib, oid = %oid, "Walked past MIB root");
                continue;
            };
            match normalize_value(&vb.value) {
                Some(value) => values.push(SnmpValue {
                    instance: instance.to_string(),
                    value,
                }),
                None => {
                    tracing::warn!(mib = metric.mib, oid = %oid, value = ?vb.value, "Unsupported SNMP value type, skipping");
                }
            }
        }

        Ok(MetricReadings {
            metric: *metric,
            values,
        })
    }
}

/// SNMP client that opens one UDP session per device and walks each MIB in turn.
pub struct SnmpClient {
    port: u16,
    timeout: Duration,
    retries: u32,
}

impl Default for SnmpClient {
    fn default() -> Self {
        Self {
            port: SNMP_PORT,
            timeout: SNMP_TIMEOUT,
            retries: 1,
        }
    }
}

impl SnmpClient {
    pub fn new(port: u16, timeout: Duration, retries: u32) -> Self {
        Self {
            port,
            timeout,
            retries,
        }
    }

    /// v2c sessions use small GETBULK requests with one OID each; v3
    /// sessions keep the library defaults.
    pub fn options(&self, security: &SessionSecurity) -> SessionOptions {
        match security {
            SessionSecurity::V2c { .. } => SessionOptions {
                timeout: self.timeout,
                retries: self.retries,
                max_repetitions: V2C_MAX_REPETITIONS,
                max_oids_per_request: V2C_MAX_OIDS,
                walk_mode: WalkMode::GetBulk,
            },
            SessionSecurity::V3 { .. } => SessionOptions {
                timeout: self.timeout,
                retries: self.retries,
                max_repetitions: DEFAULT_MAX_REPETITIONS,
                max_oids_per_request: DEFAULT_MAX_OIDS_PER_REQUEST,
                walk_mode: WalkMode::Auto,
            },
        }
    }
}

#[async_trait]
impl SessionConnector for SnmpClient {
    type Session = UdpClient;

    async fn connect(&self, target: &str, security: &SessionSecurity) -> Result<UdpClient> {
        let options = self.options(security);
        let client = Client::builder(format!("{target}:{}", self.port), security.auth())
            .timeout(options.timeout)
            .retry(Retry::fixed(options.retries, Duration::ZERO))
            .max_repetitions(options.max_repetitions)
            .max_oids_per_request(options.max_oids_per_request)
            .walk_mode(options.walk_mode)
            .connect()
            .await?;
        Ok(client)
    }
}

#[async_trait]
impl SnmpWalker for SnmpClient {
    async fn get_data(
        &self,
        mibs: &[String],
        target: &str,
        security: &SecurityData,
    ) -> Result<Vec<MetricReadings>> {
        if mibs.is_empty() {
            return Err(CollectorError::NoMibs);
        }
        let session = SessionSecurity::from_security_data(target, security)?;

        tracing::info!(target, mibs = mibs.len(), "Starting SNMP collection");
        let data = walk_mibs(self, mibs, target, &session).await?;
        tracing::info!(target, collected = data.len(), "SNMP collection completed");
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn v3(auth: &str, auth_pass: &str, privacy: &str, privacy_pass: &str) -> SecurityData {
        SecurityData {
            name: "admin".into(),
            auth_protocol: auth.into(),
            auth_password: auth_pass.into(),
            privacy_protocol: privacy.into(),
            privacy_password: privacy_pass.into(),
        }
    }

    #[test]
    fn empty_auth_protocol_selects_v2c() {
        let session =
            SessionSecurity::from_security_data("10.0.0.1", &SecurityData::v2c("public")).unwrap();
        assert_eq!(
            session,
            SessionSecurity::V2c {
                community: "public".into()
            }
        );
    }

    #[test]
    fn privacy_protocol_selects_auth_priv() {
        let session =
            SessionSecurity::from_security_data("10.0.0.1", &v3("SHA", "a", "aes", "p")).unwrap();
        match session {
            SessionSecurity::V3 { auth, privacy, .. } => {
                assert_eq!(auth, AuthProtocol::Sha1);
                assert_eq!(privacy, Some((PrivProtocol::Aes128, "p".to_string())));
            }
            other => panic!("expected v3, got {other:?}"),
        }

        let session =
            SessionSecurity::from_security_data("10.0.0.1", &v3("md5", "a", "", "")).unwrap();
        assert!(matches!(
            session,
            SessionSecurity::V3 {
                auth: AuthProtocol::Md5,
                privacy: None,
                ..
            }
        ));
    }

    #[test]
    fn validation_rejects_incomplete_credentials() {
        let cases = [
            ("", SecurityData::v2c("public")),
            ("10.0.0.1", SecurityData::v2c("")),
            ("10.0.0.1", v3("md5", "", "", "")),
            ("10.0.0.1", v3("md5", "a", "des", "")),
            ("10.0.0.1", v3("", "", "des", "p")),
        ];
        for (target, sec) in cases {
            let err = SessionSecurity::from_security_data(target, &sec).unwrap_err();
            assert!(matches!(err, CollectorError::Validation(_)), "{target} {sec:?}");
        }
    }

    #[test]
    fn unknown_protocols_are_rejected() {
        let err = SessionSecurity::from_security_data("h", &v3("sha512", "a", "", "")).unwrap_err();
        assert!(matches!(
            err,
            CollectorError::UnsupportedProtocol {
                kind: "authentication",
                ..
            }
        ));
        let err = SessionSecurity::from_security_data("h", &v3("sha", "a", "3des", "p")).unwrap_err();
        assert!(matches!(
            err,
            CollectorError::UnsupportedProtocol { kind: "privacy", .. }
        ));
    }

    #[test]
    fn catalogue_keys_and_oids() {
        assert_eq!(find_metric(IF_HC_IN_OCTETS).unwrap().key, "bytesInX64");
        assert_eq!(find_metric(IF_OUT_OCTETS).unwrap().key, "bytesOut");
        assert_eq!(find_metric(IF_SPEED).unwrap().oid, "1.3.6.1.2.1.2.2.1.5");
        assert!(find_metric("sysDescr").is_none());
        assert_eq!(all_mibs().len(), AVAILABLE_METRICS.len());
    }

    #[test]
    fn instance_suffix_strips_root() {
        let root = "1.3.6.1.2.1.2.2.1.5";
        assert_eq!(instance_suffix(root, "1.3.6.1.2.1.2.2.1.5.3"), Some("3"));
        assert_eq!(instance_suffix(root, ".1.3.6.1.2.1.2.2.1.5.10"), Some("10"));
        assert_eq!(instance_suffix(root, "1.3.6.1.2.1.2.2.1.50.1"), None);
        assert_eq!(instance_suffix(root, "1.3.6.1.2.1.2.2.1.6.1"), None);
    }

    #[test]
    fn counters_and_gauges_are_normalized() {
        assert_eq!(normalize_value(&Value::Counter32(42)), Some(42));
        assert_eq!(normalize_value(&Value::Gauge32(100_000_000)), Some(100_000_000));
        assert_eq!(normalize_value(&Value::Counter64(1 << 40)), Some(1 << 40));
        assert_eq!(normalize_value(&Value::Integer(5)), None);
    }

    #[test]
    fn v2c_sessions_use_small_bulk_requests() {
        let client = SnmpClient::default();
        let options = client.options(&SessionSecurity::V2c {
            community: "public".into(),
        });
        assert_eq!(
            options,
            SessionOptions {
                timeout: Duration::from_secs(2),
                retries: 1,
                max_repetitions: 2,
                max_oids_per_request: 1,
                walk_mode: WalkMode::GetBulk,
            }
        );

        let secure = SessionSecurity::from_security_data("h", &v3("sha", "a", "", "")).unwrap();
        let options = client.options(&secure);
        assert_eq!(options.timeout, SNMP_TIMEOUT);
        assert_eq!(options.max_repetitions, DEFAULT_MAX_REPETITIONS);
        assert_eq!(options.walk_mode, WalkMode::Auto);
    }

    /// Sessions fail the walk of `failing` MIBs; connects after
    /// `max_connects` fail.
    struct ScriptedConnector {
        failing: Vec<&'static str>,
        max_connects: usize,
        connects: Mutex<usize>,
    }

    impl ScriptedConnector {
        fn new(failing: &[&'static str], max_connects: usize) -> Self {
            Self {
                failing: failing.to_vec(),
                max_connects,
                connects: Mutex::new(0),
            }
        }

        fn connects(&self) -> usize {
            *self.connects.lock().unwrap()
        }
    }

    struct ScriptedSession {
        failing: Vec<&'static str>,
    }

    #[async_trait]
    impl SnmpSession for ScriptedSession {
        async fn walk(&self, metric: &SnmpMetric) -> Result<MetricReadings> {
            if self.failing.contains(&metric.mib) {
                return Err(CollectorError::Validation(format!("timeout walking {}", metric.mib)));
            }
            Ok(MetricReadings {
                metric: *metric,
                values: vec![SnmpValue {
                    instance: "1".into(),
                    value: 7,
                }],
            })
        }
    }

    #[async_trait]
    impl SessionConnector for ScriptedConnector {
        type Session = ScriptedSession;

        async fn connect(&self, _target: &str, _security: &SessionSecurity) -> Result<ScriptedSession> {
            let mut connects = self.connects.lock().unwrap();
            if *connects >= self.max_connects {
                return Err(CollectorError::Validation("connection refused".into()));
            }
            *connects += 1;
            Ok(ScriptedSession {
                failing: self.failing.clone(),
            })
        }
    }

    fn v2c_session() -> SessionSecurity {
        SessionSecurity::V2c {
            community: "public".into(),
        }
    }

    fn mibs(names: &[&str]) -> Vec<String> {
        names.iter().map(|m| m.to_string()).collect()
    }

    #[tokio::test]
    async fn failed_walk_reconnects_and_continues() {
        let connector = ScriptedConnector::new(&[IF_IN_OCTETS], 5);
        let data = walk_mibs(
            &connector,
            &mibs(&[IF_SPEED, IF_IN_OCTETS, IF_OUT_OCTETS]),
            "10.0.0.1",
            &v2c_session(),
        )
        .await
        .unwrap();

        let walked: Vec<&str> = data.iter().map(|r| r.metric.mib).collect();
        assert_eq!(walked, [IF_SPEED, IF_OUT_OCTETS]);
        assert_eq!(connector.connects(), 2);
    }

    #[tokio::test]
    async fn failed_reconnect_keeps_earlier_readings() {
        let connector = ScriptedConnector::new(&[IF_IN_OCTETS], 1);
        let data = walk_mibs(
            &connector,
            &mibs(&[IF_SPEED, IF_IN_OCTETS, IF_OUT_OCTETS]),
            "10.0.0.1",
            &v2c_session(),
        )
        .await
        .unwrap();

        assert_eq!(data.len(), 1);
        assert_eq!(data[0].metric.mib, IF_SPEED);
    }

    #[tokio::test]
    async fn failed_initial_connect_aborts() {
        let connector = ScriptedConnector::new(&[], 0);
        let err = walk_mibs(&connector, &mibs(&[IF_SPEED]), "10.0.0.1", &v2c_session())
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_mibs_are_skipped() {
        let connector = ScriptedConnector::new(&[], 1);
        let data = walk_mibs(&connector, &mibs(&["sysDescr", IF_SPEED]), "10.0.0.1", &v2c_session())
            .await
            .unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test]
    async fn get_data_requires_mibs_and_valid_security() {
        let client = SnmpClient::default();
        let err = client
            .get_data(&[], "10.0.0.1", &SecurityData::v2c("public"))
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::NoMibs));

        let err = client
            .get_data(&all_mibs(), "", &SecurityData::v2c("public"))
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::Validation(_)));
    }
}
