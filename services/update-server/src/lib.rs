//! iris-update distribution server.
//!
//! A read-only HTTP facade over the Release Store: reports the latest release
//! and streams artifacts by version.

pub mod routes;
pub mod state;

pub use routes::{ApiError, router};
pub use state::{AppState, Snapshot};
