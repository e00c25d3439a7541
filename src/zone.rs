//! Zones
//!
//! A zone is a named grouping of collectors and address ranges; zones keep
//! sets of discovery results separate from one another. Each CIDR category
//! has its own endpoint under `zone/<id>/cidr/<category>`.

use crate::connection::Connection;
use crate::cursor::Cursor;
use crate::error::SpectreError;
use crate::models::AddressList;
use crate::query::Query;
use crate::server::version_at_least;
use ipnetwork::IpNetwork;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// CIDR categories carried by a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneCidrKind {
    /// Ranges you know about but do not own or control.
    Known,
    /// Ranges that may be scanned when discovered. The UI calls these
    /// "eligible"; the wire name is `trusted`.
    Trusted,
    /// Ranges you own or control that are part of your network.
    Internal,
    /// Ranges that are never actively scanned.
    Avoid,
}

impl ZoneCidrKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Known => "known",
            Self::Trusted => "trusted",
            Self::Internal => "internal",
            Self::Avoid => "avoid",
        }
    }
}

/// A zone configured on the server.
///
/// Obtained from [`Server::zones`](crate::server::Server::zones) or
/// [`Server::zone_by_name`](crate::server::Server::zone_by_name), which
/// attach the connection; a zone built with [`Zone::new`] is detached and
/// its server-backed operations return [`SpectreError::NoServer`].
#[derive(Clone)]
pub struct Zone {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    server: Option<Arc<dyn Connection>>,
}

#[derive(Deserialize)]
struct ZoneRecord {
    id: u64,
    name: String,
    #[serde(default)]
    description: Option<String>,
}

impl Zone {
    /// Build a detached zone from its fields.
    pub fn new(id: u64, name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description,
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
        let parsed: ZoneRecord = serde_json::from_value(record.clone())?;
        Ok(Self::new(parsed.id, parsed.name, parsed.description))
    }

    fn conn(&self, op: &'static str) -> Result<&Arc<dyn Connection>, SpectreError> {
        self.server.as_ref().ok_or(SpectreError::NoServer(op))
    }

    /// Fetch one CIDR category of this zone.
    pub fn cidrs(&self, kind: ZoneCidrKind) -> Result<Vec<IpNetwork>, SpectreError> {
        let conn = self.conn("Zone::cidrs")?;
        let path = format!("zone/{}/cidr/{}", self.id, kind.as_str());
        let mut cursor = Cursor::new(Arc::clone(conn), path, Vec::new())?;

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

    /// Replace (or, with `append`, extend) one CIDR category of this zone.
    ///
    /// Large lists are sent in chunks of the connection's CIDR chunk size,
    /// one request each. After the first chunk, `append` is forced on so
    /// later chunks extend what the first one wrote.
    pub fn set_cidrs(
        &self,
        kind: ZoneCidrKind,
        cidrs: &[IpNetwork],
        append: bool,
    ) -> Result<(), SpectreError> {
        let conn = self.conn("Zone::set_cidrs")?;
        let path = format!("zone/{}/cidr/{}", self.id, kind.as_str());
        debug!("Setting {} {} CIDRs on zone {}", cidrs.len(), kind.as_str(), self.id);

        let mut append = append;
        for chunk in cidrs.chunks(conn.cidr_chunk_size()) {
            let params = vec![("append".to_string(), append.to_string())];
            let body = serde_json::to_value(AddressList::new(chunk))?;
            conn.post(&path, &params, &body)?;
            append = true;
        }
        Ok(())
    }

    /// Remove addresses from one CIDR category of this zone.
    ///
    /// Chunked like [`Zone::set_cidrs`].
    pub fn delete_cidrs(&self, kind: ZoneCidrKind, cidrs: &[IpNetwork]) -> Result<(), SpectreError> {
        let conn = self.conn("Zone::delete_cidrs")?;
        let path = format!("zone/{}/cidr/{}", self.id, kind.as_str());
        debug!("Deleting {} {} CIDRs on zone {}", cidrs.len(), kind.as_str(), self.id);

        for chunk in cidrs.chunks(conn.cidr_chunk_size()) {
            let body = serde_json::to_value(AddressList::new(chunk))?;
            conn.delete(&path, &body)?;
        }
        Ok(())
    }

    /// "Known" CIDRs: ranges you know about but don't own or control.
    pub fn known_cidrs(&self) -> Result<Vec<IpNetwork>, SpectreError> {
        self.cidrs(ZoneCidrKind::Known)
    }

    /// "Eligible" CIDRs: ranges we're allowed to scan if we discover them.
    pub fn eligible_cidrs(&self) -> Result<Vec<IpNetwork>, SpectreError> {
        self.cidrs(ZoneCidrKind::Trusted)
    }

    /// Alias for [`Zone::eligible_cidrs`]; `trusted` is the wire name.
    pub fn trusted_cidrs(&self) -> Result<Vec<IpNetwork>, SpectreError> {
        self.cidrs(ZoneCidrKind::Trusted)
    }

    /// "Internal" CIDRs: ranges that are part of your own network.
    pub fn internal_cidrs(&self) -> Result<Vec<IpNetwork>, SpectreError> {
        self.cidrs(ZoneCidrKind::Internal)
    }

    /// "Avoid" CIDRs: ranges that won't be actively scanned.
    pub fn avoid_cidrs(&self) -> Result<Vec<IpNetwork>, SpectreError> {
        self.cidrs(ZoneCidrKind::Avoid)
    }

    pub fn set_known_cidrs(&self, cidrs: &[IpNetwork], append: bool) -> Result<(), SpectreError> {
        self.set_cidrs(ZoneCidrKind::Known, cidrs, append)
    }

    pub fn set_eligible_cidrs(&self, cidrs: &[IpNetwork], append: bool) -> Result<(), SpectreError> {
        self.set_cidrs(ZoneCidrKind::Trusted, cidrs, append)
    }

    pub fn set_trusted_cidrs(&self, cidrs: &[IpNetwork], append: bool) -> Result<(), SpectreError> {
        self.set_cidrs(ZoneCidrKind::Trusted, cidrs, append)
    }

    pub fn set_internal_cidrs(&self, cidrs: &[IpNetwork], append: bool) -> Result<(), SpectreError> {
        self.set_cidrs(ZoneCidrKind::Internal, cidrs, append)
    }

    pub fn set_avoid_cidrs(&self, cidrs: &[IpNetwork], append: bool) -> Result<(), SpectreError> {
        self.set_cidrs(ZoneCidrKind::Avoid, cidrs, append)
    }

    pub fn delete_known_cidrs(&self, cidrs: &[IpNetwork]) -> Result<(), SpectreError> {
        self.delete_cidrs(ZoneCidrKind::Known, cidrs)
    }

    pub fn delete_eligible_cidrs(&self, cidrs: &[IpNetwork]) -> Result<(), SpectreError> {
        self.delete_cidrs(ZoneCidrKind::Trusted, cidrs)
    }

    pub fn delete_trusted_cidrs(&self, cidrs: &[IpNetwork]) -> Result<(), SpectreError> {
        self.delete_cidrs(ZoneCidrKind::Trusted, cidrs)
    }

    pub fn delete_internal_cidrs(&self, cidrs: &[IpNetwork]) -> Result<(), SpectreError> {
        self.delete_cidrs(ZoneCidrKind::Internal, cidrs)
    }

    pub fn delete_avoid_cidrs(&self, cidrs: &[IpNetwork]) -> Result<(), SpectreError> {
        self.delete_cidrs(ZoneCidrKind::Avoid, cidrs)
    }

    /// Start a device query scoped to this zone.
    pub fn device_query(&self) -> Result<Query, SpectreError> {
        let conn = self.conn("Zone::device_query")?;
        Ok(Query::new(Arc::clone(conn), "zonedata/devices").filter("zone.id", self.id))
    }

    /// Full details for the device(s) in this zone at address `ip`.
    ///
    /// Enables every detail section; profile details only exist from
    /// server version 3.3.1 on, so those two are version-gated.
    pub fn device_details_by_ip(&self, ip: &str) -> Result<Cursor, SpectreError> {
        let conn = self.conn("Zone::device_details_by_ip")?;
        let mut query = Query::new(Arc::clone(conn), "zonedata/devices")
            .filter("zone.id", self.id)
            .filter("address.ip", ip);
        for detail in [
            "ScanType",
            "Attributes",
            "Protocol",
            "Port",
            "AlternateAddress",
            "ReferenceIp",
            "Details",
            "LeakResponse",
            "Certificate",
            "Interfaces",
            "Vlans",
            "Collector",
            "SnmpAlias",
        ] {
            query = query.detail(detail);
        }
        if conn.version().is_some_and(|v| version_at_least(v, 3, 3, 1)) {
            query = query.detail("Profile").detail("ProfileDetails");
        }
        query.run()
    }
}

impl fmt::Debug for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Zone")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id={}, name={}, description={}",
            self.id,
            self.name,
            self.description.as_deref().unwrap_or("")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockServer;
    use serde_json::json;

    fn networks(last_octets: std::ops::RangeInclusive<u8>) -> Vec<IpNetwork> {
        last_octets
            .map(|i| format!("192.168.1.{i}/32").parse().unwrap())
            .collect()
    }

    fn attached_zone(mock: &Arc<MockServer>) -> Zone {
        let conn: Arc<dyn Connection> = mock.clone();
        Zone::new(4, "Twilight", Some("Zone to Test Scanning".into())).with_server(conn)
    }

    #[test]
    fn set_cidrs_chunks_requests_and_round_trips() {
        let mock = Arc::new(MockServer::new(3).with_cidr_chunk_size(3));
        let zone = attached_zone(&mock);

        zone.set_avoid_cidrs(&networks(1..=10), false).unwrap();

        // 10 addresses at chunk size 3 -> 4 requests; only the first one
        // honors the caller's append flag.
        let posts = mock.posts();
        assert_eq!(posts.len(), 4);
        assert_eq!(posts[0].params, vec![("append".to_string(), "false".to_string())]);
        for post in &posts[1..] {
            assert_eq!(post.params, vec![("append".to_string(), "true".to_string())]);
        }

        let avoided = zone.avoid_cidrs().unwrap();
        assert_eq!(avoided.len(), 10);
        assert_eq!(avoided[9].to_string(), "192.168.1.10/32");
    }

    #[test]
    fn append_extends_an_existing_category() {
        let mock = Arc::new(MockServer::new(500));
        let zone = attached_zone(&mock);

        zone.set_known_cidrs(&networks(1..=2), false).unwrap();
        zone.set_known_cidrs(&networks(3..=3), true).unwrap();

        assert_eq!(zone.known_cidrs().unwrap().len(), 3);
    }

    #[test]
    fn eligible_and_trusted_share_the_wire_category() {
        let mock = Arc::new(MockServer::new(500));
        let zone = attached_zone(&mock);

        zone.set_eligible_cidrs(&networks(1..=4), false).unwrap();
        assert_eq!(zone.trusted_cidrs().unwrap(), zone.eligible_cidrs().unwrap());

        let posts = mock.posts();
        assert_eq!(posts[0].path, "zone/4/cidr/trusted");
    }

    #[test]
    fn delete_cidrs_removes_addresses() {
        let mock = Arc::new(MockServer::new(500));
        let zone = attached_zone(&mock);

        zone.set_internal_cidrs(&networks(1..=8), false).unwrap();
        zone.delete_internal_cidrs(&networks(1..=2)).unwrap();

        let remaining = zone.internal_cidrs().unwrap();
        assert_eq!(remaining.len(), 6);
        assert_eq!(remaining[0].to_string(), "192.168.1.3/32");
    }

    #[test]
    fn empty_set_issues_no_request() {
        let mock = Arc::new(MockServer::new(500));
        let zone = attached_zone(&mock);

        zone.set_avoid_cidrs(&[], false).unwrap();
        assert!(mock.posts().is_empty());
    }

    #[test]
    fn detached_zone_reports_no_server() {
        let mock = Arc::new(MockServer::new(500));
        let mut zone = attached_zone(&mock);
        zone.detach();

        let err = zone.known_cidrs().unwrap_err();
        assert!(matches!(err, SpectreError::NoServer(_)));
    }

    #[test]
    fn device_query_is_scoped_to_the_zone() {
        let mock = Arc::new(MockServer::new(500));
        mock.set_records("zonedata/devices", vec![json!({"id": 1110})]);
        let zone = attached_zone(&mock);

        zone.device_query().unwrap().run().unwrap();
        let params = mock.last_fetch_params();
        assert!(params.contains(&("filter.zone.id".into(), "4".into())));
    }

    #[test]
    fn device_details_gate_profile_on_server_version() {
        let mock = Arc::new(MockServer::new(500).with_version("3.3.0.11241"));
        attached_zone(&mock).device_details_by_ip("10.2.1.1").unwrap();
        let params = mock.last_fetch_params();
        assert!(params.contains(&("detail.ScanType".into(), "true".into())));
        assert!(!params.iter().any(|(k, _)| k == "detail.Profile"));

        let mock = Arc::new(MockServer::new(500).with_version("3.3.1"));
        attached_zone(&mock).device_details_by_ip("10.2.1.1").unwrap();
        let params = mock.last_fetch_params();
        assert!(params.contains(&("detail.Profile".into(), "true".into())));
        assert!(params.contains(&("detail.ProfileDetails".into(), "true".into())));
    }
}
