//! Collectors
//!
//! A collector is a scan configuration bound to one discovery interface of
//! a scanning agent (a Scout). Collectors carry their own CIDR categories
//! under `zone/collector/<id>/cidr/<category>`, expose key/value
//! properties, and accept externally discovered devices and traces through
//! the publish endpoints.

use crate::connection::Connection;
use crate::cursor::Cursor;
use crate::error::SpectreError;
use crate::models::AddressList;
use crate::query::Query;
use crate::zone::Zone;
use chrono::Utc;
use ipnetwork::IpNetwork;
use serde::Deserialize;
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// CIDR categories carried by a collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorCidrKind {
    /// Ranges the collector actively scans.
    Target,
    /// Ranges no packets are sent to (paths may still trace through them).
    Avoid,
    /// Ranges that stop a path trace when a hop lands in them.
    Stop,
}

impl CollectorCidrKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Target => "target",
            Self::Avoid => "avoid",
            Self::Stop => "stop",
        }
    }
}

/// A collector configured on the server.
#[derive(Clone)]
pub struct Collector {
    pub id: u64,
    pub uuid: String,
    pub name: String,
    /// The owning zone, as referenced by the collector record (detached).
    pub zone: Zone,
    server: Option<Arc<dyn Connection>>,
}

#[derive(Deserialize)]
struct CollectorRecord {
    id: u64,
    uuid: String,
    name: String,
    zone: ZoneRef,
}

#[derive(Deserialize)]
struct ZoneRef {
    id: u64,
    name: String,
}

impl Collector {
    /// Build a detached collector from its fields.
    pub fn new(id: u64, uuid: impl Into<String>, name: impl Into<String>, zone: Zone) -> Self {
        Self {
            id,
            uuid: uuid.into(),
            name: name.into(),
            zone,
            server: None,
        }
    }

    /// Attach a connection, enabling the server-backed operations.
    pub fn with_server(mut self, server: Arc<dyn Connection>) -> Self {
        self.server = Some(server);
        self
    }

    /// Drop the attached connection.
    pub fn detach(&mut self) {
        self.server = None;
    }

    pub(crate) fn from_record(record: &Value) -> Result<Self, SpectreError> {
        let parsed: CollectorRecord = serde_json::from_value(record.clone())?;
        Ok(Self::new(
            parsed.id,
            parsed.uuid,
            parsed.name,
            Zone::new(parsed.zone.id, parsed.zone.name, None),
        ))
    }

    fn conn(&self, op: &'static str) -> Result<&Arc<dyn Connection>, SpectreError> {
        self.server.as_ref().ok_or(SpectreError::NoServer(op))
    }

    fn cidr_path(&self, kind: CollectorCidrKind) -> String {
        format!("zone/collector/{}/cidr/{}", self.id, kind.as_str())
    }

    /// Fetch one CIDR category of this collector.
    pub fn cidrs(&self, kind: CollectorCidrKind) -> Result<Vec<IpNetwork>, SpectreError> {
        let conn = self.conn("Collector::cidrs")?;
        let mut cursor = Cursor::new(Arc::clone(conn), self.cidr_path(kind), Vec::new())?;

        let mut cidrs = Vec::new();
        while let Some(record) = cursor.next() {
            let record = record?;
            let text = record.as_str().ok_or_else(|| {
                SpectreError::UnexpectedResponse(format!("non-string CIDR record: {record}"))
            })?;
            cidrs.push(text.parse()?);
        }
        Ok(cidrs)
    }

    /// Replace (or, with `append`, extend) one CIDR category, chunked at
    /// the connection's CIDR chunk size. After the first chunk, `append`
    /// is forced on so later chunks extend what the first one wrote.
    pub fn set_cidrs(
        &self,
        kind: CollectorCidrKind,
        cidrs: &[IpNetwork],
        append: bool,
    ) -> Result<(), SpectreError> {
        let conn = self.conn("Collector::set_cidrs")?;
        let path = self.cidr_path(kind);
        debug!(
            "Setting {} {} CIDRs on collector {}",
            cidrs.len(),
            kind.as_str(),
            self.name
        );

        let mut append = append;
        for chunk in cidrs.chunks(conn.cidr_chunk_size()) {
            let params = vec![("append".to_string(), append.to_string())];
            let body = serde_json::to_value(AddressList::new(chunk))?;
            conn.post(&path, &params, &body)?;
            append = true;
        }
        Ok(())
    }

    /// Remove addresses from one CIDR category, chunked like
    /// [`Collector::set_cidrs`].
    pub fn delete_cidrs(
        &self,
        kind: CollectorCidrKind,
        cidrs: &[IpNetwork],
    ) -> Result<(), SpectreError> {
        let conn = self.conn("Collector::delete_cidrs")?;
        let path = self.cidr_path(kind);

        for chunk in cidrs.chunks(conn.cidr_chunk_size()) {
            let body = serde_json::to_value(AddressList::new(chunk))?;
            conn.delete(&path, &body)?;
        }
        Ok(())
    }

    /// "Target" CIDRs: the ranges this collector scans.
    pub fn target_cidrs(&self) -> Result<Vec<IpNetwork>, SpectreError> {
        self.cidrs(CollectorCidrKind::Target)
    }

    /// "Avoid" CIDRs: no packets are emitted at these addresses.
    pub fn avoid_cidrs(&self) -> Result<Vec<IpNetwork>, SpectreError> {
        self.cidrs(CollectorCidrKind::Avoid)
    }

    /// "Stop" CIDRs: a path trace stops when a hop lands in one.
    pub fn stop_cidrs(&self) -> Result<Vec<IpNetwork>, SpectreError> {
        self.cidrs(CollectorCidrKind::Stop)
    }

    pub fn set_target_cidrs(&self, cidrs: &[IpNetwork], append: bool) -> Result<(), SpectreError> {
        self.set_cidrs(CollectorCidrKind::Target, cidrs, append)
    }

    pub fn set_avoid_cidrs(&self, cidrs: &[IpNetwork], append: bool) -> Result<(), SpectreError> {
        self.set_cidrs(CollectorCidrKind::Avoid, cidrs, append)
    }

    pub fn set_stop_cidrs(&self, cidrs: &[IpNetwork], append: bool) -> Result<(), SpectreError> {
        self.set_cidrs(CollectorCidrKind::Stop, cidrs, append)
    }

    pub fn delete_target_cidrs(&self, cidrs: &[IpNetwork]) -> Result<(), SpectreError> {
        self.delete_cidrs(CollectorCidrKind::Target, cidrs)
    }

    pub fn delete_avoid_cidrs(&self, cidrs: &[IpNetwork]) -> Result<(), SpectreError> {
        self.delete_cidrs(CollectorCidrKind::Avoid, cidrs)
    }

    pub fn delete_stop_cidrs(&self, cidrs: &[IpNetwork]) -> Result<(), SpectreError> {
        self.delete_cidrs(CollectorCidrKind::Stop, cidrs)
    }

    /// Read one collector property.
    ///
    /// The property endpoints answer with a bare `result` field rather
    /// than the usual page envelope.
    pub fn property(&self, name: &str) -> Result<Option<Value>, SpectreError> {
        let conn = self.conn("Collector::property")?;
        let body = conn.get_value(
            &format!("zone/collector/{}/property/get/{}", self.id, name),
            &[],
        )?;
        Ok(body.get("result").cloned())
    }

    /// Set one collector property.
    ///
    /// With `query_first`, the current value is read first and the write
    /// is skipped when it already matches.
    pub fn set_property(
        &self,
        name: &str,
        value: &str,
        query_first: bool,
    ) -> Result<(), SpectreError> {
        let conn = self.conn("Collector::set_property")?;

        if query_first
            && self
                .property(name)?
                .is_some_and(|current| property_matches(&current, value))
        {
            return Ok(());
        }

        conn.get_value(
            &format!("zone/collector/{}/property/set/{}", self.id, name),
            &[("value".to_string(), value.to_string())],
        )?;
        Ok(())
    }

    /// The collector's full configuration record.
    pub fn config(&self) -> Result<Value, SpectreError> {
        let conn = self.conn("Collector::config")?;
        let cursor = Query::new(Arc::clone(conn), "zone/collector")
            .filter("collector.id", self.id)
            .detail("Config")
            .detail("Interface")
            .run()?;
        cursor.value().cloned().ok_or_else(|| {
            SpectreError::UnexpectedResponse("collector config query returned no results".into())
        })
    }

    /// Publish externally discovered devices through this collector.
    ///
    /// Each record is stamped with a response block naming the collector,
    /// the scan type and protocol, the current time in epoch milliseconds,
    /// and the NACK flag, then PUT to `publish/device/<uuid>`.
    pub fn publish_devices(
        &self,
        devices: &[Value],
        scan_type: &str,
        protocol: &str,
        nack: bool,
    ) -> Result<(), SpectreError> {
        let conn = self.conn("Collector::publish_devices")?;
        let responses = json!([{
            "collector": {"id": self.id, "uuid": self.uuid},
            "scanType": scan_type,
            "protocol": protocol,
            "time": Utc::now().timestamp_millis(),
            "NACK": nack,
        }]);

        let mut stamped = Vec::with_capacity(devices.len());
        for device in devices {
            let mut device = device.clone();
            let record = device.as_object_mut().ok_or_else(|| {
                SpectreError::InvalidRequest("device records must be JSON objects".to_string())
            })?;
            record.insert("responses".to_string(), responses.clone());
            stamped.push(device);
        }

        debug!(
            "Publishing {} devices through collector {}",
            stamped.len(),
            self.name
        );
        conn.put(
            &format!("publish/device/{}", self.uuid),
            &json!({"devices": stamped}),
        )?;
        Ok(())
    }

    /// Publish path traces through this collector, PUT to
    /// `publish/path/<uuid>`.
    pub fn publish_traces(
        &self,
        traces: &[Value],
        scan_type: &str,
        protocol: &str,
    ) -> Result<(), SpectreError> {
        let conn = self.conn("Collector::publish_traces")?;
        let response = json!({
            "collector": {"id": self.id, "uuid": self.uuid},
            "scanType": scan_type,
            "protocol": protocol,
            "time": Utc::now().timestamp_millis(),
            "NACK": false,
        });

        let mut stamped = Vec::with_capacity(traces.len());
        for trace in traces {
            let mut trace = trace.clone();
            let record = trace.as_object_mut().ok_or_else(|| {
                SpectreError::InvalidRequest("trace records must be JSON objects".to_string())
            })?;
            record.insert("response".to_string(), response.clone());
            stamped.push(trace);
        }

        conn.put(
            &format!("publish/path/{}", self.uuid),
            &json!({"traces": stamped}),
        )?;
        Ok(())
    }
}

fn property_matches(current: &Value, value: &str) -> bool {
    match current {
        Value::String(s) => s == value,
        other => other.to_string() == value,
    }
}

impl fmt::Debug for Collector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collector")
            .field("id", &self.id)
            .field("uuid", &self.uuid)
            .field("name", &self.name)
            .field("zone", &self.zone)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Collector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id={}, uuid={}, name={}, zone=({})",
            self.id, self.uuid, self.name, self.zone
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockServer;

    const UUID: &str = "420EF9B6-FEE7-B3C7-C454-3965CC461604";

    fn networks(last_octets: std::ops::RangeInclusive<u8>) -> Vec<IpNetwork> {
        last_octets
            .map(|i| format!("192.168.1.{i}/32").parse().unwrap())
            .collect()
    }

    fn attached_collector(mock: &Arc<MockServer>) -> Collector {
        let conn: Arc<dyn Connection> = mock.clone();
        Collector::new(1, UUID, "RodSerling", Zone::new(4, "Twilight", None)).with_server(conn)
    }

    #[test]
    fn target_cidrs_round_trip_through_the_collector_endpoint() {
        let mock = Arc::new(MockServer::new(500));
        let collector = attached_collector(&mock);

        collector.set_target_cidrs(&networks(1..=4), false).unwrap();
        assert_eq!(mock.posts()[0].path, "zone/collector/1/cidr/target");

        let targets = collector.target_cidrs().unwrap();
        assert_eq!(targets.len(), 4);
    }

    #[test]
    fn chunked_set_forces_append_after_the_first_request() {
        let mock = Arc::new(MockServer::new(500).with_cidr_chunk_size(3));
        let collector = attached_collector(&mock);

        collector.set_avoid_cidrs(&networks(1..=10), false).unwrap();

        let posts = mock.posts();
        assert_eq!(posts.len(), 4);
        assert_eq!(posts[0].params[0].1, "false");
        assert!(posts[1..].iter().all(|p| p.params[0].1 == "true"));

        let avoided = collector.avoid_cidrs().unwrap();
        assert_eq!(avoided[9].to_string(), "192.168.1.10/32");
    }

    #[test]
    fn publish_devices_stamps_the_collector_response_block() {
        let mock = Arc::new(MockServer::new(500));
        let collector = attached_collector(&mock);

        let device = json!({"@class": "device", "ip": "1.1.1.1", "phaseComplete": false});
        collector
            .publish_devices(&[device], "hostDiscovery", "icmp", false)
            .unwrap();

        let puts = mock.puts();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].path, format!("publish/device/{UUID}"));

        let stamped = &puts[0].body["devices"][0];
        assert_eq!(stamped["ip"], json!("1.1.1.1"));
        let response = &stamped["responses"][0];
        assert_eq!(response["collector"]["id"], json!(1));
        assert_eq!(response["collector"]["uuid"], json!(UUID));
        assert_eq!(response["scanType"], json!("hostDiscovery"));
        assert_eq!(response["protocol"], json!("icmp"));
        assert_eq!(response["NACK"], json!(false));
        assert!(response["time"].is_i64());
    }

    #[test]
    fn publish_devices_rejects_non_object_records() {
        let mock = Arc::new(MockServer::new(500));
        let collector = attached_collector(&mock);

        let err = collector
            .publish_devices(&[json!("1.1.1.1")], "hostDiscovery", "icmp", false)
            .unwrap_err();
        assert!(matches!(err, SpectreError::InvalidRequest(_)));
        assert!(mock.puts().is_empty());
    }

    #[test]
    fn publish_traces_uses_the_path_endpoint() {
        let mock = Arc::new(MockServer::new(500));
        let collector = attached_collector(&mock);

        let trace = json!({"hops": ["10.0.0.1", "10.0.0.2"]});
        collector.publish_traces(&[trace], "external", "udp").unwrap();

        let puts = mock.puts();
        assert_eq!(puts[0].path, format!("publish/path/{UUID}"));
        let stamped = &puts[0].body["traces"][0];
        assert_eq!(stamped["response"]["NACK"], json!(false));
        assert_eq!(stamped["response"]["scanType"], json!("external"));
    }

    #[test]
    fn set_property_skips_the_write_when_unchanged() {
        let mock = Arc::new(MockServer::new(500));
        mock.set_value(
            "zone/collector/1/property/get/discoveryInterface",
            json!({"status": "SUCCESS", "result": "eth0"}),
        );
        let collector = attached_collector(&mock);

        assert_eq!(
            collector.property("discoveryInterface").unwrap(),
            Some(json!("eth0"))
        );

        collector
            .set_property("discoveryInterface", "eth0", true)
            .unwrap();
        // One read, no write.
        assert_eq!(mock.gets().len(), 2);

        collector
            .set_property("discoveryInterface", "eth1", true)
            .unwrap();
        let gets = mock.gets();
        assert_eq!(gets.len(), 4);
        let set = gets.last().unwrap();
        assert_eq!(set.path, "zone/collector/1/property/set/discoveryInterface");
        assert_eq!(set.params, vec![("value".to_string(), "eth1".to_string())]);
    }

    #[test]
    fn config_returns_the_detailed_collector_record() {
        let mock = Arc::new(MockServer::new(500));
        mock.set_records(
            "zone/collector",
            vec![json!({
                "id": 1,
                "name": "RodSerling",
                "config": {"rescanInterval": 150},
            })],
        );
        let collector = attached_collector(&mock);

        let config = collector.config().unwrap();
        assert_eq!(config["config"]["rescanInterval"], json!(150));

        let params = mock.last_fetch_params();
        assert!(params.contains(&("filter.collector.id".into(), "1".into())));
        assert!(params.contains(&("detail.Config".into(), "true".into())));
        assert!(params.contains(&("detail.Interface".into(), "true".into())));
    }

    #[test]
    fn detached_collector_reports_no_server() {
        let collector = Collector::new(1, UUID, "RodSerling", Zone::new(4, "Twilight", None));
        let err = collector.target_cidrs().unwrap_err();
        assert!(matches!(err, SpectreError::NoServer(_)));
    }
}
