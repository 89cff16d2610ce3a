use crate::error::{CollectorError, Result};
use crate::DeviceDirectory;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

pub const DEFAULT_NEDI_SERVER: &str = "nedi:8092";

const TABLE_DEVICES: &str = "devices";
const TABLE_MONITORING: &str = "monitoring";
const TABLE_INTERFACES: &str = "interfaces";

const COL_NAME: &str = "name";
const COL_DEVICE: &str = "device";
const COL_DEV_IP: &str = "devip";
const COL_MON_IP: &str = "monip";
const COL_READ_COMM: &str = "readcomm";
const COL_IF_NAME: &str = "ifname";
const COL_IF_INDEX: &str = "ifidx";
const COL_LAST_OK: &str = "lastok";
const COL_IF_STAT: &str = "ifstat";

/// One directory row, keyed by column name.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub name: String,
    pub ip: String,
    pub community: String,
    /// Epoch seconds of the directory's last successful check.
    pub last_ok: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Monitoring {
    pub name: String,
    pub device: String,
    pub ip: String,
    pub last_ok: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub device: String,
    pub index: i64,
    /// Admin/oper status code, `-1` when unknown.
    pub status: i64,
}

/// A row that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub table: &'static str,
    /// Position among the data rows (metadata excluded).
    pub row: usize,
    pub column: &'static str,
    pub reason: String,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} row {}: column '{}' {}",
            self.table, self.row, self.column, self.reason
        )
    }
}

/// Decoded rows together with the rows that were skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Rows<T> {
    pub rows: Vec<T>,
    pub errors: Vec<RowError>,
}

impl<T> Rows<T> {
    fn new() -> Self {
        Self {
            rows: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn log_errors(&self) {
        for e in &self.errors {
            tracing::warn!(table = e.table, row = e.row, column = e.column, reason = %e.reason, "Skipping directory row");
        }
    }
}

/// Normalize any JSON number to an integer. Fractions are truncated.
pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        _ => None,
    }
}

/// The directory stores IPv4 addresses as big-endian integers.
pub fn int_to_ipv4(value: i64) -> Ipv4Addr {
    Ipv4Addr::from(value as u32)
}

fn float(row: &Row, column: &'static str) -> RowResult<f64> {
    match row.get(column) {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| (column, format!("has unsupported value {n}"))),
        Some(other) => Err((column, format!("has unsupported value {other}"))),
        None => Err((column, "is missing".to_string())),
    }
}

type RowResult<T> = std::result::Result<T, (&'static str, String)>;

fn text<'a>(row: &'a Row, column: &'static str) -> RowResult<&'a str> {
    match row.get(column) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err((column, format!("has unsupported value {other}"))),
        None => Err((column, "is missing".to_string())),
    }
}

fn int(row: &Row, column: &'static str) -> RowResult<i64> {
    match row.get(column) {
        Some(v) => coerce_int(v).ok_or_else(|| (column, format!("has unsupported value {v}"))),
        None => Err((column, "is missing".to_string())),
    }
}

/// Parse a directory response: element 0 is metadata, non-object rows are dropped.
pub fn parse_response(table: &str, body: &str) -> Result<Vec<Row>> {
    let values: Vec<Value> =
        serde_json::from_str(body).map_err(|e| CollectorError::Directory {
            table: table.to_string(),
            reason: format!("malformed response: {e}"),
        })?;

    let mut skipped = 0usize;
    let rows: Vec<Row> = values
        .into_iter()
        .skip(1)
        .filter_map(|v| match v {
            Value::Object(row) => Some(row),
            _ => {
                skipped += 1;
                None
            }
        })
        .collect();
    if skipped > 0 {
        tracing::debug!(table, skipped, "Dropped non-object directory rows");
    }
    Ok(rows)
}

fn decode<T>(
    table: &'static str,
    rows: &[Row],
    mut decode_row: impl FnMut(&Row) -> RowResult<Option<T>>,
) -> Rows<T> {
    let mut out = Rows::new();
    for (i, row) in rows.iter().enumerate() {
        match decode_row(row) {
            Ok(Some(item)) => out.rows.push(item),
            Ok(None) => {}
            Err((column, reason)) => out.errors.push(RowError {
                table,
                row: i,
                column,
                reason,
            }),
        }
    }
    out
}

fn monitoring_row(row: &Row) -> RowResult<Option<Monitoring>> {
    let name = text(row, COL_NAME)?;
    let device = text(row, COL_DEVICE)?;
    let last_ok = float(row, COL_LAST_OK)?;
    let ip = int(row, COL_MON_IP)?;
    Ok(Some(Monitoring {
        name: name.to_string(),
        device: device.to_string(),
        ip: int_to_ipv4(ip).to_string(),
        last_ok,
    }))
}

fn device_row(row: &Row, monitored: &HashMap<String, Monitoring>) -> RowResult<Option<Device>> {
    let name = text(row, COL_DEVICE)?;
    let Some(mon) = monitored.get(name) else {
        return Ok(None);
    };
    let ip = int(row, COL_DEV_IP)?;
    let community = text(row, COL_READ_COMM)?;
    Ok(Some(Device {
        name: name.to_string(),
        ip: int_to_ipv4(ip).to_string(),
        community: community.to_string(),
        last_ok: mon.last_ok,
    }))
}

fn interface_row(row: &Row) -> RowResult<Option<Interface>> {
    let name = text(row, COL_IF_NAME)?;
    let device = text(row, COL_DEVICE)?;
    let index = int(row, COL_IF_INDEX)?;
    let status = int(row, COL_IF_STAT).unwrap_or_else(|(_, reason)| {
        tracing::debug!(interface = name, reason = %reason, "Interface status unknown");
        -1
    });
    Ok(Some(Interface {
        name: name.to_string(),
        device: device.to_string(),
        index,
        status,
    }))
}

pub fn decode_monitoring(rows: &[Row]) -> Rows<Monitoring> {
    decode(TABLE_MONITORING, rows, monitoring_row)
}

/// Decode device rows, keeping only devices in the monitoring whitelist.
pub fn decode_devices(rows: &[Row], monitored: &HashMap<String, Monitoring>) -> Rows<Device> {
    decode(TABLE_DEVICES, rows, |row| device_row(row, monitored))
}

/// Decode interface rows. An undecodable status keeps the row with status `-1`.
pub fn decode_interfaces(rows: &[Row]) -> Rows<Interface> {
    decode(TABLE_INTERFACES, rows, interface_row)
}

/// Client for the NeDi `query.php` endpoint.
pub struct NediClient {
    server: String,
    client: Client,
}

impl NediClient {
    pub fn new(server: &str) -> Result<Self> {
        if server.is_empty() {
            return Err(CollectorError::Config("missing NeDi server".to_string()));
        }
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CollectorError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            server: server.to_string(),
            client,
        })
    }

    pub fn query_url(&self, table: &str, filter: Option<&str>, order: Option<&str>) -> Result<Url> {
        let mut params = vec![("c", "1"), ("t", table)];
        if let Some(q) = filter.filter(|q| !q.is_empty()) {
            params.push(("q", q));
        }
        if let Some(o) = order.filter(|o| !o.is_empty()) {
            params.push(("o", o));
        }
        Url::parse_with_params(&format!("http://{}/nedi/query.php", self.server), &params).map_err(
            |e| CollectorError::Directory {
                table: table.to_string(),
                reason: format!("invalid query URL: {e}"),
            },
        )
    }

    async fn query(&self, table: &str, filter: Option<&str>) -> Result<Vec<Row>> {
        let url = self.query_url(table, filter, None)?;
        let failed = |reason: String| CollectorError::Directory {
            table: table.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| failed(e.to_string()))?;
        if !status.is_success() {
            return Err(failed(format!("status={status}, body={body}")));
        }

        tracing::debug!(request = %url, bytes = body.len(), "Directory response");
        parse_response(table, &body)
    }

    /// Monitoring whitelist keyed by device name.
    pub async fn monitored(&self) -> Result<HashMap<String, Monitoring>> {
        let rows = self.query(TABLE_MONITORING, None).await?;
        let decoded = decode_monitoring(&rows);
        decoded.log_errors();
        Ok(decoded
            .rows
            .into_iter()
            .map(|m| (m.device.clone(), m))
            .collect())
    }

    pub async fn devices(&self) -> Result<Rows<Device>> {
        let monitored = self.monitored().await?;
        if monitored.is_empty() {
            tracing::warn!("Monitoring inventory is empty, skipping device query");
            return Ok(Rows::new());
        }
        let rows = self.query(TABLE_DEVICES, None).await?;
        Ok(decode_devices(&rows, &monitored))
    }

    pub async fn interfaces(&self, device: &str) -> Result<Rows<Interface>> {
        if device.is_empty() {
            return Err(CollectorError::Directory {
                table: TABLE_INTERFACES.to_string(),
                reason: "missing device".to_string(),
            });
        }
        let filter = format!("{COL_DEVICE} = {device}");
        let rows = self.query(TABLE_INTERFACES, Some(&filter)).await?;
        Ok(decode_interfaces(&rows))
    }
}

#[async_trait]
impl DeviceDirectory for NediClient {
    async fn list_devices(&self) -> Result<Vec<Device>> {
        let devices = self.devices().await?;
        devices.log_errors();
        Ok(devices.rows)
    }

    async fn list_interfaces(&self, device: &str) -> Result<Vec<Interface>> {
        let interfaces = self.interfaces(device).await?;
        interfaces.log_errors();
        Ok(interfaces.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    fn rows(value: Value) -> Vec<Row> {
        parse_response("test", &value.to_string()).unwrap()
    }

    async fn handler(
        Query(params): Query<HashMap<String, String>>,
    ) -> std::result::Result<Json<Value>, StatusCode> {
        let meta = json!({"version": "2.1", "table": params.get("t")});
        match params.get("t").map(String::as_str) {
            Some("monitoring") => Ok(Json(json!([
                meta,
                {"name": "c2801", "device": "c2801", "monip": 3232235777u32, "lastok": 1696286942},
                {"name": "sw-1", "device": "sw-1", "monip": 167772161, "lastok": 1696286000.0}
            ]))),
            Some("devices") => Ok(Json(json!([
                meta,
                {"device": "c2801", "devip": 3232235777u32, "readcomm": "public"},
                {"device": "sw-1", "devip": "10.0.0.1", "readcomm": "public"},
                {"device": "unmonitored", "devip": 167772162, "readcomm": "public"}
            ]))),
            Some("interfaces") if params.get("q").map(String::as_str) == Some("device = c2801") => {
                Ok(Json(json!([
                    meta,
                    {"ifname": "Fa0/0", "device": "c2801", "ifidx": 1, "ifstat": 3},
                    {"ifname": "Fa0/1", "device": "c2801", "ifidx": 2.0, "ifstat": "up"},
                    {"ifname": "Nu0", "device": "c2801", "ifidx": null, "ifstat": 0}
                ])))
            }
            _ => Err(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    async fn spawn_directory() -> String {
        let app = Router::new().route("/nedi/query.php", get(handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr.to_string()
    }

    #[test]
    fn coerce_accepts_any_number_width() {
        assert_eq!(coerce_int(&json!(7)), Some(7));
        assert_eq!(coerce_int(&json!(-7)), Some(-7));
        assert_eq!(coerce_int(&json!(4294967295u64)), Some(4_294_967_295));
        assert_eq!(coerce_int(&json!(3.9)), Some(3));
        assert_eq!(coerce_int(&json!("7")), None);
        assert_eq!(coerce_int(&Value::Null), None);
    }

    #[test]
    fn integer_ip_is_big_endian() {
        assert_eq!(int_to_ipv4(3232235777).to_string(), "192.168.1.1");
        assert_eq!(int_to_ipv4(167772161).to_string(), "10.0.0.1");
    }

    #[test]
    fn metadata_row_is_discarded() {
        let parsed = rows(json!([{"meta": true}, {"a": 1}, "junk", {"b": 2}]));
        assert_eq!(parsed.len(), 2);
        assert!(parsed[0].contains_key("a"));
    }

    #[test]
    fn malformed_body_is_one_error() {
        let err = parse_response("devices", "<html>").unwrap_err();
        assert!(matches!(err, CollectorError::Directory { .. }));
    }

    #[test]
    fn bad_device_rows_are_reported_not_fatal() {
        let monitored: HashMap<String, Monitoring> = [(
            "c2801".to_string(),
            Monitoring {
                name: "c2801".into(),
                device: "c2801".into(),
                ip: "192.168.1.1".into(),
                last_ok: 100.0,
            },
        )]
        .into();
        let decoded = decode_devices(
            &rows(json!([
                {},
                {"device": "c2801", "devip": "bad", "readcomm": "public"},
                {"device": "c2801", "devip": 3232235777u32, "readcomm": "public"},
                {"device": "other", "devip": 1, "readcomm": "public"}
            ])),
            &monitored,
        );

        assert_eq!(decoded.rows.len(), 1);
        assert_eq!(decoded.rows[0].last_ok, 100.0);
        assert_eq!(decoded.errors.len(), 1);
        assert_eq!(decoded.errors[0].column, COL_DEV_IP);
        assert_eq!(decoded.errors[0].row, 0);
    }

    #[test]
    fn monitoring_keeps_fractional_last_ok() {
        let decoded = decode_monitoring(&rows(json!([
            {},
            {"name": "c2801", "device": "c2801", "monip": 3232235777u32, "lastok": 1696286942.75},
            {"name": "sw-1", "device": "sw-1", "monip": 167772161, "lastok": "never"}
        ])));

        assert_eq!(decoded.rows.len(), 1);
        assert_eq!(decoded.rows[0].last_ok, 1696286942.75);
        assert_eq!(decoded.errors.len(), 1);
        assert_eq!(decoded.errors[0].column, COL_LAST_OK);
    }

    #[test]
    fn query_url_escapes_filter() {
        let client = NediClient::new(DEFAULT_NEDI_SERVER).unwrap();
        let url = client
            .query_url(TABLE_INTERFACES, Some("device = c2801"), None)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://nedi:8092/nedi/query.php?c=1&t=interfaces&q=device+%3D+c2801"
        );
        assert!(NediClient::new("").is_err());
    }

    #[tokio::test]
    async fn lists_only_monitored_devices() {
        let server = spawn_directory().await;
        let client = NediClient::new(&server).unwrap();

        let devices = client.devices().await.unwrap();
        assert_eq!(devices.rows.len(), 1);
        assert_eq!(
            devices.rows[0],
            Device {
                name: "c2801".into(),
                ip: "192.168.1.1".into(),
                community: "public".into(),
                last_ok: 1696286942.0,
            }
        );
        // sw-1 is monitored but its devip is not numeric
        assert_eq!(devices.errors.len(), 1);
        assert_eq!(devices.errors[0].table, TABLE_DEVICES);
    }

    #[tokio::test]
    async fn lists_interfaces_with_status_fallback() {
        let server = spawn_directory().await;
        let client = NediClient::new(&server).unwrap();

        let interfaces = client.list_interfaces("c2801").await.unwrap();
        assert_eq!(interfaces.len(), 2);
        assert_eq!(interfaces[0].index, 1);
        assert_eq!(interfaces[0].status, 3);
        assert_eq!(interfaces[1].index, 2);
        assert_eq!(interfaces[1].status, -1);
    }

    #[tokio::test]
    async fn server_error_fails_only_that_call() {
        let server = spawn_directory().await;
        let client = NediClient::new(&server).unwrap();

        let err = client.list_interfaces("unknown").await.unwrap_err();
        assert!(matches!(err, CollectorError::Directory { .. }));
        assert_eq!(client.list_devices().await.unwrap().len(), 1);
    }
}
