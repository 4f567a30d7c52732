//! Platform transport layer for Shield actions
//!
//! This crate provides the request/response types every platform connector
//! speaks, an HTTP transport built on reqwest, and a simulated transport used
//! in mock mode and in tests.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod http;
pub mod simulated;
pub mod transport;

pub use http::{HttpTransport, HttpTransportConfig};
pub use simulated::{SimulatedTransport, SimulationConfig};
pub use transport::{HttpMethod, PlatformCall, PlatformError, PlatformResponse, PlatformTransport};

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, PlatformError>;
