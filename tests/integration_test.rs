//! Integration tests against a live Command Center
//!
//! These tests require a reachable Spectre server.
//! Set SPECTRE_HOST and SPECTRE_API_KEY, then run with `--ignored`.

use spectre_client::{Server, ServerConfig};

fn connect() -> Server {
    let host = std::env::var("SPECTRE_HOST").unwrap_or_else(|_| "i3".to_string());
    let api_key =
        std::env::var("SPECTRE_API_KEY").expect("SPECTRE_API_KEY environment variable must be set");

    Server::with_api_key(&host, &api_key).expect("Failed to connect")
}

#[test]
#[ignore] // Requires a live Command Center
fn connect_reports_a_server_version() {
    let server = connect();
    assert!(server.version().is_some(), "version captured at connect");

    let info = server.system_information().expect("Failed to fetch system information");
    println!("{} running {}", info.name, info.version);
}

#[test]
#[ignore]
fn zones_are_listed() {
    let server = connect();
    let zones = server.zones().expect("Failed to list zones");
    println!("Found {} zones", zones.len());
}

#[test]
#[ignore]
fn collectors_reference_their_zone() {
    let server = connect();
    let collectors = server.collectors().expect("Failed to list collectors");
    for collector in &collectors {
        assert!(!collector.uuid.is_empty());
        println!("{}", collector);
    }
}

#[test]
#[ignore]
fn device_count_is_stable_across_page_sizes() {
    let host = std::env::var("SPECTRE_HOST").unwrap_or_else(|_| "i3".to_string());
    let api_key =
        std::env::var("SPECTRE_API_KEY").expect("SPECTRE_API_KEY environment variable must be set");

    let baseline = Server::with_api_key(&host, &api_key)
        .expect("Failed to connect")
        .query("zonedata/devices")
        .filter("zone.id", 4)
        .run()
        .expect("Failed to query devices")
        .total();

    for page_size in [1, 2, 5, 7, 500] {
        let config = ServerConfig {
            page_size,
            ..ServerConfig::default()
        };
        let server =
            Server::with_api_key_config(&host, &api_key, config).expect("Failed to connect");

        let count = server
            .query("zonedata/devices")
            .filter("zone.id", 4)
            .run()
            .expect("Failed to query devices")
            .map(|record| record.expect("Failed to fetch a page"))
            .count() as u64;
        assert_eq!(count, baseline, "page size {page_size}");
    }
}

#[test]
#[ignore]
fn reiterating_a_device_query_yields_the_same_count() {
    let server = connect();
    let mut devices = server
        .query("zonedata/devices")
        .filter("zone.id", 4)
        .run()
        .expect("Failed to query devices");

    let first = devices.by_ref().count();
    let second = devices.by_ref().count();
    assert_eq!(first, second);
}
