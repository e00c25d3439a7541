//! Command Center session
//!
//! A [`Server`] holds the HTTP session for one Spectre Command Center:
//! base URL, authentication, per-connection paging policy, and the server
//! version captured at connect. It implements [`Connection`], so cursors
//! and resource objects created through it fetch pages over HTTPS.
//!
//! Two authentication modes exist: API key (`Bearer` header on every
//! request) and username/password (HTTP basic auth on the initial request,
//! session cookie from there out).

use crate::collector::Collector;
use crate::connection::{Connection, DEFAULT_CIDR_CHUNK_SIZE, DEFAULT_PAGE_SIZE};
use crate::cursor::Cursor;
use crate::error::SpectreError;
use crate::models::{Page, SystemInfo};
use crate::query::Query;
use crate::zone::Zone;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Per-connection configuration.
///
/// Explicit value passed at construction; there is no process-wide
/// configuration. The page size is fixed for the lifetime of the
/// connection and inherited by every cursor it creates.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Records requested per page fetch.
    pub page_size: usize,
    /// Addresses sent per CIDR set/delete request.
    pub cidr_chunk_size: usize,
    /// Uniform per-request timeout.
    pub timeout: Duration,
    /// Verify the server TLS certificate. Command Centers ship with
    /// self-signed certificates, so this defaults to off.
    pub verify_cert: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            cidr_chunk_size: DEFAULT_CIDR_CHUNK_SIZE,
            timeout: Duration::from_secs(5),
            verify_cert: false,
        }
    }
}

/// A session with one Spectre Command Center.
#[derive(Debug, Clone)]
pub struct Server {
    client: Client,
    base_url: String,
    host: String,
    page_size: usize,
    cidr_chunk_size: usize,
    version: Option<String>,
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("json:pretty"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

fn build_client(
    config: &ServerConfig,
    headers: HeaderMap,
    cookie_store: bool,
) -> Result<Client, SpectreError> {
    let mut builder = Client::builder()
        .timeout(config.timeout)
        .default_headers(headers)
        .danger_accept_invalid_certs(!config.verify_cert);
    if cookie_store {
        builder = builder.cookie_store(true);
    }
    builder.build().map_err(SpectreError::Http)
}

impl Server {
    /// Connect with an API key (generated with `user key new <username>`
    /// at the Command Center CLI).
    pub fn with_api_key(host: &str, api_key: &str) -> Result<Self, SpectreError> {
        Self::with_api_key_config(host, api_key, ServerConfig::default())
    }

    /// Connect with an API key and explicit configuration.
    pub fn with_api_key_config(
        host: &str,
        api_key: &str,
        config: ServerConfig,
    ) -> Result<Self, SpectreError> {
        let mut headers = default_headers();
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| SpectreError::InvalidRequest(format!("invalid API key: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);

        let mut server = Self {
            client: build_client(&config, headers, false)?,
            base_url: format!("https://{host}/api/rest/"),
            host: host.to_string(),
            page_size: config.page_size,
            cidr_chunk_size: config.cidr_chunk_size,
            version: None,
        };
        server.version = Some(server.system_information()?.version);
        Ok(server)
    }

    /// Connect with username/password.
    ///
    /// Basic auth is sent on the initial `system/information` request
    /// only; the session cookie it yields authenticates everything after.
    pub fn with_login(host: &str, username: &str, password: &str) -> Result<Self, SpectreError> {
        Self::with_login_config(host, username, password, ServerConfig::default())
    }

    /// Connect with username/password and explicit configuration.
    pub fn with_login_config(
        host: &str,
        username: &str,
        password: &str,
        config: ServerConfig,
    ) -> Result<Self, SpectreError> {
        let mut server = Self {
            client: build_client(&config, default_headers(), true)?,
            base_url: format!("https://{host}/api/rest/"),
            host: host.to_string(),
            page_size: config.page_size,
            cidr_chunk_size: config.cidr_chunk_size,
            version: None,
        };

        debug!("Authenticating to {} as {}", server.host, username);
        let response = server
            .client
            .get(server.url("system/information"))
            .basic_auth(username, Some(password))
            .send()?;
        let page: Page = Self::check(response)?.json()?;
        let info: SystemInfo = match page.results.first() {
            Some(record) => serde_json::from_value(record.clone())?,
            None => {
                return Err(SpectreError::UnexpectedResponse(
                    "system/information returned no results".to_string(),
                ));
            }
        };
        server.version = Some(info.version);
        Ok(server)
    }

    /// Host name (or IP) this session talks to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server version as reported by `system/information` at connect.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn url(&self, api: &str) -> String {
        format!("{}{}", self.base_url, api.trim_start_matches('/'))
    }

    fn check(response: Response) -> Result<Response, SpectreError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SpectreError::Api { status, body });
        }
        Ok(response)
    }

    fn parse_body(response: Response) -> Result<Value, SpectreError> {
        let text = response.text()?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// GET a paged endpoint, producing a cursor over its records.
    pub fn get(&self, api: &str, params: &[(&str, &str)]) -> Result<Cursor, SpectreError> {
        Cursor::new(self.handle(), api, owned_params(params))
    }

    /// Start building a filtered query against `api`.
    pub fn query(&self, api: &str) -> Query {
        Query::new(self.handle(), api)
    }

    /// Fetch one page directly, without cursor state.
    pub fn get_page(
        &self,
        api: &str,
        params: &[(&str, &str)],
        page: u64,
    ) -> Result<Page, SpectreError> {
        self.fetch_page(api, &owned_params(params), page)
    }

    /// POST a JSON body, with query parameters.
    pub fn post_json(
        &self,
        api: &str,
        params: &[(&str, &str)],
        body: &Value,
    ) -> Result<Value, SpectreError> {
        self.post(api, &owned_params(params), body)
    }

    /// POST a raw body with a caller-chosen content type.
    ///
    /// Some management endpoints (SNMP daemon configuration, file uploads)
    /// only accept XML; this bypasses the JSON defaults for those.
    pub fn raw_post(
        &self,
        api: &str,
        body: String,
        content_type: &str,
    ) -> Result<String, SpectreError> {
        debug!("POST {} ({})", api, content_type);
        let response = self
            .client
            .post(self.url(api))
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()?;
        Ok(Self::check(response)?.text()?)
    }

    /// PUT a JSON body.
    pub fn put_json(&self, api: &str, body: &Value) -> Result<Value, SpectreError> {
        self.put(api, body)
    }

    /// DELETE with a JSON body.
    pub fn delete_json(&self, api: &str, body: &Value) -> Result<Value, SpectreError> {
        self.delete(api, body)
    }

    /// The `system/information` record for this server.
    pub fn system_information(&self) -> Result<SystemInfo, SpectreError> {
        let cursor = self.get("system/information", &[])?;
        match cursor.value() {
            Some(record) => Ok(serde_json::from_value(record.clone())?),
            None => Err(SpectreError::UnexpectedResponse(
                "system/information returned no results".to_string(),
            )),
        }
    }

    /// Connection handle shared with cursors and resource objects.
    fn handle(&self) -> Arc<dyn Connection> {
        Arc::new(self.clone())
    }

    /// All zones configured on the server.
    pub fn zones(&self) -> Result<Vec<Zone>, SpectreError> {
        let conn = self.handle();
        let mut cursor = Cursor::new(Arc::clone(&conn), "zone", Vec::new())?;
        let mut zones = Vec::new();
        while let Some(record) = cursor.next() {
            zones.push(Zone::from_record(&record?)?.with_server(Arc::clone(&conn)));
        }
        Ok(zones)
    }

    /// The zone named `name`, if present.
    pub fn zone_by_name(&self, name: &str) -> Result<Option<Zone>, SpectreError> {
        let conn = self.handle();
        let mut cursor = Cursor::new(Arc::clone(&conn), "zone", Vec::new())?;
        while let Some(record) = cursor.next() {
            let record = record?;
            if record["name"] == name {
                return Ok(Some(Zone::from_record(&record)?.with_server(Arc::clone(&conn))));
            }
        }
        Ok(None)
    }

    /// The zone named `name`, created through `POST zone` if absent.
    pub fn get_or_create_zone(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Zone, SpectreError> {
        if let Some(zone) = self.zone_by_name(name)? {
            return Ok(zone);
        }

        debug!("Creating zone {}", name);
        let body = json!([{
            "@class": "zone",
            "name": name,
            "description": description,
        }]);
        self.post_json("zone", &[], &body)?;

        self.zone_by_name(name)?.ok_or_else(|| {
            SpectreError::UnexpectedResponse(format!("zone {name} not found after create"))
        })
    }

    /// All collectors configured on the server.
    pub fn collectors(&self) -> Result<Vec<Collector>, SpectreError> {
        let conn = self.handle();
        let mut cursor = Cursor::new(Arc::clone(&conn), "zone/collector", Vec::new())?;
        let mut collectors = Vec::new();
        while let Some(record) = cursor.next() {
            collectors.push(Collector::from_record(&record?)?.with_server(Arc::clone(&conn)));
        }
        Ok(collectors)
    }

    /// The collector named `name`, if present.
    pub fn collector_by_name(&self, name: &str) -> Result<Option<Collector>, SpectreError> {
        let conn = self.handle();
        let mut cursor = Cursor::new(Arc::clone(&conn), "zone/collector", Vec::new())?;
        while let Some(record) = cursor.next() {
            let record = record?;
            if record["name"] == name {
                return Ok(Some(
                    Collector::from_record(&record)?.with_server(Arc::clone(&conn)),
                ));
            }
        }
        Ok(None)
    }
}

impl Connection for Server {
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
        let mut query = params.to_vec();
        query.push(("query.pagesize".to_string(), self.page_size.to_string()));
        query.push(("query.page".to_string(), page.to_string()));

        debug!("Fetching page {} of {}", page, path);
        let response = self.client.get(self.url(path)).query(&query).send()?;
        let response = Self::check(response)?;
        Ok(response.json()?)
    }

    fn get_value(&self, path: &str, params: &[(String, String)]) -> Result<Value, SpectreError> {
        debug!("GET {}", path);
        let response = self.client.get(self.url(path)).query(&params).send()?;
        Self::parse_body(Self::check(response)?)
    }

    fn post(
        &self,
        path: &str,
        params: &[(String, String)],
        body: &Value,
    ) -> Result<Value, SpectreError> {
        debug!("POST {}", path);
        let response = self
            .client
            .post(self.url(path))
            .query(&params)
            .json(body)
            .send()?;
        Self::parse_body(Self::check(response)?)
    }

    fn put(&self, path: &str, body: &Value) -> Result<Value, SpectreError> {
        debug!("PUT {}", path);
        let response = self.client.put(self.url(path)).json(body).send()?;
        Self::parse_body(Self::check(response)?)
    }

    fn delete(&self, path: &str, body: &Value) -> Result<Value, SpectreError> {
        debug!("DELETE {}", path);
        let response = self.client.delete(self.url(path)).json(body).send()?;
        Self::parse_body(Self::check(response)?)
    }
}

fn owned_params(params: &[(&str, &str)]) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Compare a dotted server version ("3.3.0.11241") against a required
/// major/minor/patch. Trailing build components are ignored; non-numeric
/// components compare as zero.
pub(crate) fn version_at_least(version: &str, major: u64, minor: u64, patch: u64) -> bool {
    let mut parts = version.split('.').map(|p| p.parse::<u64>().unwrap_or(0));
    let found = (
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    );
    found >= (major, minor, patch)
}
