//! Spectre Command Center REST API client
//!
//! A synchronous client for the Spectre network-discovery REST API:
//! authenticate a session, page through result sets, and work with zones,
//! collectors, and devices as convenience objects.
//!
//! Every GET produces a [`Cursor`] that fetches pages on demand and can be
//! iterated repeatedly; iterating past the end transparently rewinds, so a
//! second pass starts over from the first record.
//!
//! # Example
//!
//! ```no_run
//! use spectre_client::Server;
//!
//! # fn example() -> Result<(), spectre_client::SpectreError> {
//! let server = Server::with_api_key("i3", "eyJhbGciOi...")?;
//!
//! // Cursors fetch pages lazily.
//! for zone in server.get("zone", &[])? {
//!     println!("{}", zone?["name"]);
//! }
//!
//! // Filtered device queries through the query builder.
//! let devices = server
//!     .query("zonedata/devices")
//!     .filter("zone.id", 4)
//!     .run()?;
//! println!("{} devices", devices.total());
//!
//! // Zones and collectors as convenience objects.
//! if let Some(zone) = server.zone_by_name("Twilight")? {
//!     println!("{} internal ranges", zone.internal_cidrs()?.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Lazy pagination**: restartable cursors over paged result sets
//! - **Two auth modes**: API key (Bearer) or username/password (session cookie)
//! - **Zone and collector CIDR management**: chunked set/delete for large lists
//! - **Device publishing**: push externally discovered devices and traces
//! - **`test-util`**: in-memory mock connection for downstream unit tests

pub mod collector;
pub mod connection;
pub mod cursor;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod models;
pub mod query;
pub mod server;
pub mod zone;

pub use collector::{Collector, CollectorCidrKind};
pub use connection::Connection;
pub use cursor::Cursor;
pub use error::SpectreError;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockServer;
pub use models::{Page, SystemInfo};
pub use query::Query;
pub use server::{Server, ServerConfig};
pub use zone::{Zone, ZoneCidrKind};
