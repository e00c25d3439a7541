//! Paginated result cursor
//!
//! A [`Cursor`] presents one paged GET query as a lazy, restartable
//! sequence of records, fetching only the pages actually visited. It is
//! created by [`Server::get`](crate::server::Server::get) or
//! [`Query::run`](crate::query::Query::run) and iterated like any other
//! iterator; items are `Result<Value, SpectreError>` because any advance
//! may perform a blocking page fetch.
//!
//! Iterating past the end performs an implicit rewind, so a cursor can be
//! iterated again from the start without an explicit `rewind()` call.

use crate::connection::Connection;
use crate::error::SpectreError;
use crate::models::Page;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Client-side iteration state over one paged query.
///
/// The cursor is bound to one query descriptor (path plus filter/detail
/// parameters) and the page size of the connection that created it. Page 0
/// is fetched eagerly at construction so `total()` is known immediately.
///
/// Invariant: `page_index * page_size + pos` is the absolute offset into
/// the logical result set; the sequence is exhausted exactly when that
/// offset equals `total`.
pub struct Cursor {
    conn: Arc<dyn Connection>,
    path: String,
    params: Vec<(String, String)>,
    page_size: usize,
    page_index: u64,
    pos: usize,
    page: Page,
    total: u64,
}

impl Cursor {
    /// Create a cursor over `path`, fetching page 0 immediately.
    ///
    /// `total` is snapshotted from the server-reported count, or taken as
    /// 1 when the endpoint answers with a singleton shape that carries no
    /// count field.
    pub fn new(
        conn: Arc<dyn Connection>,
        path: impl Into<String>,
        params: Vec<(String, String)>,
    ) -> Result<Self, SpectreError> {
        let path = path.into();
        let page_size = conn.page_size();
        let page = conn.fetch_page(&path, &params, 0)?;
        let total = page.total.unwrap_or(1);

        Ok(Self {
            conn,
            path,
            params,
            page_size,
            page_index: 0,
            pos: 0,
            page,
            total,
        })
    }

    /// Record count across all pages, as reported at the last (re)fetch
    /// of page 0.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Absolute offset into the logical result set.
    fn offset(&self) -> u64 {
        self.page_index * self.page_size as u64 + self.pos as u64
    }

    /// Reset to offset 0, refetch page 0, and refresh `total`.
    ///
    /// Afterwards the cursor is equivalent to a freshly constructed cursor
    /// over the same query. Called implicitly when iteration reaches the
    /// end of the result set.
    pub fn rewind(&mut self) -> Result<(), SpectreError> {
        self.page_index = 0;
        self.pos = 0;
        self.page = self.conn.fetch_page(&self.path, &self.params, 0)?;
        self.total = self.page.total.unwrap_or(1);
        Ok(())
    }

    /// All records of the currently cached page.
    ///
    /// Does not trigger a fetch; callers wanting the full result set must
    /// iterate instead.
    pub fn values(&self) -> &[Value] {
        &self.page.results
    }

    /// First record of the currently cached page, for queries known to
    /// return exactly one logical result.
    pub fn value(&self) -> Option<&Value> {
        self.page.results.first()
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("path", &self.path)
            .field("page_index", &self.page_index)
            .field("pos", &self.pos)
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

impl Iterator for Cursor {
    type Item = Result<Value, SpectreError>;

    fn next(&mut self) -> Option<Self::Item> {
        // Exhausted: rewind so the next iteration starts over, then stop.
        if self.offset() == self.total {
            if let Err(e) = self.rewind() {
                return Some(Err(e));
            }
            return None;
        }

        if self.pos < self.page_size {
            match self.page.results.get(self.pos) {
                Some(record) => {
                    let record = record.clone();
                    self.pos += 1;
                    Some(Ok(record))
                }
                // The underlying result set shrank between the initial
                // count and this page fetch; treat as end-of-sequence.
                None => {
                    if let Err(e) = self.rewind() {
                        return Some(Err(e));
                    }
                    None
                }
            }
        } else {
            self.page_index += 1;
            self.pos = 1;
            self.page = match self.conn.fetch_page(&self.path, &self.params, self.page_index) {
                Ok(page) => page,
                Err(e) => return Some(Err(e)),
            };
            match self.page.results.first() {
                Some(record) => Some(Ok(record.clone())),
                None => {
                    if let Err(e) = self.rewind() {
                        return Some(Err(e));
                    }
                    None
                }
            }
        }
    }
}
