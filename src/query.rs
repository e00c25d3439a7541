//! Fluent query builder
//!
//! Wraps one query descriptor (endpoint path plus `filter.*` / `detail.*`
//! parameters) and produces a [`Cursor`] on `run()`.

use crate::connection::Connection;
use crate::cursor::Cursor;
use crate::error::SpectreError;
use std::sync::Arc;

/// Builder for a filtered GET query.
///
/// # Example
///
/// ```no_run
/// # fn example(server: &spectre_client::Server) -> Result<(), spectre_client::SpectreError> {
/// let devices = server
///     .query("zonedata/devices")
///     .filter("zone.id", 4)
///     .detail("Attributes")
///     .run()?;
/// for device in devices {
///     println!("{}", device?["ip"]);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Query {
    conn: Arc<dyn Connection>,
    path: String,
    params: Vec<(String, String)>,
}

impl Query {
    pub fn new(conn: Arc<dyn Connection>, path: impl Into<String>) -> Self {
        Self {
            conn,
            path: path.into(),
            params: Vec::new(),
        }
    }

    /// Add a `filter.<name>=<value>` parameter.
    pub fn filter(mut self, name: &str, value: impl ToString) -> Self {
        self.params
            .push((format!("filter.{name}"), value.to_string()));
        self
    }

    /// Request a `detail.<name>` section in each returned record.
    pub fn detail(mut self, name: &str) -> Self {
        self.params.push((format!("detail.{name}"), "true".into()));
        self
    }

    /// Execute the query, fetching the first page.
    pub fn run(self) -> Result<Cursor, SpectreError> {
        Cursor::new(self.conn, self.path, self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockServer;
    use serde_json::json;

    #[test]
    fn filters_and_details_become_query_parameters() {
        let mock = Arc::new(MockServer::new(500));
        mock.set_records("zonedata/devices", vec![json!({"id": 1})]);

        let conn: Arc<dyn Connection> = mock.clone();
        let cur = Query::new(conn, "zonedata/devices")
            .filter("zone.id", 4)
            .filter("address.ip", "10.2.1.1")
            .detail("ScanType")
            .run()
            .unwrap();
        assert_eq!(cur.total(), 1);

        let (path, _) = &mock.fetch_log()[0];
        assert_eq!(path, "zonedata/devices");

        let params = mock.last_fetch_params();
        assert!(params.contains(&("filter.zone.id".into(), "4".into())));
        assert!(params.contains(&("filter.address.ip".into(), "10.2.1.1".into())));
        assert!(params.contains(&("detail.ScanType".into(), "true".into())));
    }
}
