//! Connection trait for Spectre API transports
//!
//! Abstracts the HTTP layer so cursors, zones, and collectors can be
//! exercised against a mock transport in unit tests. `Server` is the
//! real implementation; `MockServer` (behind the `test-util` feature)
//! is the in-memory one.

use crate::error::SpectreError;
use crate::models::Page;
use serde_json::Value;

/// Default number of records requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Default number of addresses per CIDR set/delete request.
pub const DEFAULT_CIDR_CHUNK_SIZE: usize = 5000;

/// A transport capable of talking to one Command Center.
///
/// The page size and CIDR chunk size are fixed per connection; every
/// cursor created through a connection inherits its page size at
/// construction time.
pub trait Connection: Send + Sync {
    /// Records requested per page fetch.
    fn page_size(&self) -> usize;

    /// Addresses sent per CIDR set/delete request.
    fn cidr_chunk_size(&self) -> usize {
        DEFAULT_CIDR_CHUNK_SIZE
    }

    /// Server version as reported at connect, if known.
    fn version(&self) -> Option<&str> {
        None
    }

    /// Fetch one page of a paged GET endpoint.
    ///
    /// The transport attaches the page-size and page-index query
    /// parameters and fails with `SpectreError::Api` on any non-success
    /// status; callers treat this as an opaque synchronous call.
    fn fetch_page(
        &self,
        path: &str,
        params: &[(String, String)],
        page: u64,
    ) -> Result<Page, SpectreError>;

    /// GET a non-paged endpoint and return the parsed response body.
    ///
    /// Used for the collector property endpoints, which answer with a
    /// bare `result` field instead of the page envelope.
    fn get_value(&self, path: &str, params: &[(String, String)]) -> Result<Value, SpectreError>;

    /// POST a JSON body.
    fn post(
        &self,
        path: &str,
        params: &[(String, String)],
        body: &Value,
    ) -> Result<Value, SpectreError>;

    /// PUT a JSON body.
    fn put(&self, path: &str, body: &Value) -> Result<Value, SpectreError>;

    /// DELETE with a JSON body (the CIDR delete endpoints take one).
    fn delete(&self, path: &str, body: &Value) -> Result<Value, SpectreError>;
}
