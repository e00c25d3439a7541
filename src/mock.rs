//! Mock transport for unit testing
//!
//! `MockServer` implements [`Connection`] against in-memory datasets so
//! cursors, zones, and collectors can be tested without a running Command
//! Center. Paged endpoints are seeded with a full logical result set and
//! served in page-size slices; the reported `total` always reflects the
//! dataset at fetch time, so tests can shrink a set mid-iteration.
//!
//! Every request is logged, and the CIDR set/delete endpoints are emulated
//! (honoring the `append` parameter) so chunked mutations can round-trip
//! through the corresponding getters.

use crate::connection::{Connection, DEFAULT_CIDR_CHUNK_SIZE};
use crate::error::SpectreError;
use crate::models::Page;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;

/// One logged request (POST, PUT, DELETE, or raw GET).
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: Value,
}

/// In-memory [`Connection`] for tests.
pub struct MockServer {
    page_size: usize,
    cidr_chunk_size: usize,
    version: Option<String>,
    data: Mutex<HashMap<String, Vec<Value>>>,
    singletons: Mutex<HashMap<String, Page>>,
    values: Mutex<HashMap<String, Value>>,
    failures: Mutex<HashMap<String, u16>>,
    fetches: Mutex<Vec<(String, u64, Vec<(String, String)>)>>,
    gets: Mutex<Vec<RequestRecord>>,
    posts: Mutex<Vec<RequestRecord>>,
    puts: Mutex<Vec<RequestRecord>>,
    deletes: Mutex<Vec<RequestRecord>>,
}

impl MockServer {
    /// Create a mock serving pages of `page_size` records.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            cidr_chunk_size: DEFAULT_CIDR_CHUNK_SIZE,
            version: None,
            data: Mutex::new(HashMap::new()),
            singletons: Mutex::new(HashMap::new()),
            values: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            fetches: Mutex::new(Vec::new()),
            gets: Mutex::new(Vec::new()),
            posts: Mutex::new(Vec::new()),
            puts: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_cidr_chunk_size(mut self, chunk_size: usize) -> Self {
        self.cidr_chunk_size = chunk_size;
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// Seed a paged endpoint with its full logical result set.
    pub fn set_records(&self, path: &str, records: Vec<Value>) {
        self.data.lock().unwrap().insert(path.to_string(), records);
    }

    /// Seed an endpoint with a fixed response page (served for every page
    /// index, e.g. a singleton shape without a `total` field).
    pub fn set_singleton(&self, path: &str, page: Page) {
        self.singletons.lock().unwrap().insert(path.to_string(), page);
    }

    /// Seed a raw GET endpoint (collector property responses).
    pub fn set_value(&self, path: &str, value: Value) {
        self.values.lock().unwrap().insert(path.to_string(), value);
    }

    /// Make every subsequent request to `path` fail with `status`.
    pub fn fail_with(&self, path: &str, status: u16) {
        self.failures.lock().unwrap().insert(path.to_string(), status);
    }

    /// Current dataset of a paged endpoint.
    pub fn records(&self, path: &str) -> Vec<Value> {
        self.data.lock().unwrap().get(path).cloned().unwrap_or_default()
    }

    /// `(path, page_index)` of every page fetch so far.
    pub fn fetch_log(&self) -> Vec<(String, u64)> {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .map(|(path, page, _)| (path.clone(), *page))
            .collect()
    }

    /// Query parameters of the most recent page fetch.
    pub fn last_fetch_params(&self) -> Vec<(String, String)> {
        self.fetches
            .lock()
            .unwrap()
            .last()
            .map(|(_, _, params)| params.clone())
            .unwrap_or_default()
    }

    pub fn gets(&self) -> Vec<RequestRecord> {
        self.gets.lock().unwrap().clone()
    }

    pub fn posts(&self) -> Vec<RequestRecord> {
        self.posts.lock().unwrap().clone()
    }

    pub fn puts(&self) -> Vec<RequestRecord> {
        self.puts.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<RequestRecord> {
        self.deletes.lock().unwrap().clone()
    }

    fn check_failure(&self, path: &str) -> Result<(), SpectreError> {
        if let Some(status) = self.failures.lock().unwrap().get(path) {
            return Err(SpectreError::Api {
                status: StatusCode::from_u16(*status)
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                body: format!("mock failure for {path}"),
            });
        }
        Ok(())
    }

    fn body_addresses(body: &Value) -> Vec<String> {
        body.get("addresses")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.get("address").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Connection for MockServer {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn cidr_chunk_size(&self) -> usize {
        self.cidr_chunk_size
    }

    fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn fetch_page(
        &self,
        path: &str,
        params: &[(String, String)],
        page: u64,
    ) -> Result<Page, SpectreError> {
        self.fetches
            .lock()
            .unwrap()
            .push((path.to_string(), page, params.to_vec()));
        self.check_failure(path)?;

        if let Some(fixed) = self.singletons.lock().unwrap().get(path) {
            return Ok(fixed.clone());
        }

        let data = self.data.lock().unwrap();
        let records = data.get(path).cloned().unwrap_or_default();
        let start = (page as usize).saturating_mul(self.page_size);
        let results = if start < records.len() {
            let end = (start + self.page_size).min(records.len());
            records[start..end].to_vec()
        } else {
            Vec::new()
        };

        Ok(Page {
            status: Some("SUCCESS".into()),
            method: None,
            total: Some(records.len() as u64),
            results,
        })
    }

    fn get_value(&self, path: &str, params: &[(String, String)]) -> Result<Value, SpectreError> {
        self.gets.lock().unwrap().push(RequestRecord {
            path: path.to_string(),
            params: params.to_vec(),
            body: Value::Null,
        });
        self.check_failure(path)?;

        Ok(self
            .values
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_else(|| json!({"status": "SUCCESS"})))
    }

    fn post(
        &self,
        path: &str,
        params: &[(String, String)],
        body: &Value,
    ) -> Result<Value, SpectreError> {
        self.posts.lock().unwrap().push(RequestRecord {
            path: path.to_string(),
            params: params.to_vec(),
            body: body.clone(),
        });
        self.check_failure(path)?;

        // Emulate the CIDR set endpoints so chunked writes round-trip.
        if path.contains("/cidr/") {
            let append = params
                .iter()
                .any(|(k, v)| k == "append" && v == "true");
            let mut data = self.data.lock().unwrap();
            let entry = data.entry(path.to_string()).or_default();
            if !append {
                entry.clear();
            }
            entry.extend(Self::body_addresses(body).into_iter().map(Value::String));
        }

        Ok(json!({"status": "SUCCESS"}))
    }

    fn put(&self, path: &str, body: &Value) -> Result<Value, SpectreError> {
        self.puts.lock().unwrap().push(RequestRecord {
            path: path.to_string(),
            params: Vec::new(),
            body: body.clone(),
        });
        self.check_failure(path)?;
        Ok(json!({"status": "SUCCESS"}))
    }

    fn delete(&self, path: &str, body: &Value) -> Result<Value, SpectreError> {
        self.deletes.lock().unwrap().push(RequestRecord {
            path: path.to_string(),
            params: Vec::new(),
            body: body.clone(),
        });
        self.check_failure(path)?;

        if path.contains("/cidr/") {
            let removed = Self::body_addresses(body);
            let mut data = self.data.lock().unwrap();
            if let Some(entry) = data.get_mut(path) {
                entry.retain(|record| {
                    record
                        .as_str()
                        .is_none_or(|s| !removed.iter().any(|r| r == s))
                });
            }
        }

        Ok(json!({"status": "SUCCESS"}))
    }
}
