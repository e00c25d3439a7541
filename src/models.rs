//! Wire shapes for the Command Center REST API
//!
//! Every GET endpoint answers with the same `apiresponse` envelope; the
//! records inside `results` stay opaque `serde_json::Value`s and are
//! interpreted (if at all) by the resource accessors that issued the query.

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One fetched page of a paged GET response.
///
/// `total` is the server-reported record count across all pages. Singleton
/// endpoints (`system/information`, the collector property endpoints) omit
/// it, and some omit `results` entirely; both fields therefore default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub results: Vec<Value>,
}

/// The `system/information` record, fetched once at connect to capture
/// the server version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub name: String,
    #[serde(default)]
    pub uuid: Option<String>,
    pub version: String,
    #[serde(default)]
    pub osversion: Option<String>,
    #[serde(rename = "systemType", default)]
    pub system_type: Option<String>,
}

/// Request body for the CIDR set/delete endpoints:
/// `{"addresses": [{"address": "10.0.0.0/24"}, ...]}`
#[derive(Debug, Clone, Serialize)]
pub struct AddressList {
    pub addresses: Vec<AddressEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddressEntry {
    pub address: String,
}

impl AddressList {
    pub fn new(cidrs: &[IpNetwork]) -> Self {
        Self {
            addresses: cidrs
                .iter()
                .map(|cidr| AddressEntry {
                    address: cidr.to_string(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_deserializes_full_envelope() {
        let page: Page = serde_json::from_value(json!({
            "@class": "apiresponse",
            "status": "SUCCESS",
            "method": "ZoneManagement.getZones",
            "total": 2,
            "results": [
                {"@class": "zone", "id": 2, "name": "Twilight"},
                {"@class": "zone", "id": 1, "name": "Zone1"},
            ],
        }))
        .unwrap();

        assert_eq!(page.total, Some(2));
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.status.as_deref(), Some("SUCCESS"));
    }

    #[test]
    fn page_tolerates_missing_total_and_results() {
        let page: Page = serde_json::from_value(json!({
            "@class": "apiresponse",
            "status": "SUCCESS",
        }))
        .unwrap();

        assert_eq!(page.total, None);
        assert!(page.results.is_empty());
    }

    #[test]
    fn address_list_serializes_cidr_strings() {
        let cidrs = vec!["10.0.0.0/24".parse().unwrap(), "192.168.1.1/32".parse().unwrap()];
        let body = serde_json::to_value(AddressList::new(&cidrs)).unwrap();
        assert_eq!(
            body,
            json!({"addresses": [{"address": "10.0.0.0/24"}, {"address": "192.168.1.1/32"}]})
        );
    }
}
