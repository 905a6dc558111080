//! Paginated fetch client for the provider API.
//!
//! One logical request may span several wire chunks; [`ApiClient::fetch`]
//! follows the continuation signals and hands back a single merged payload,
//! tracking transfer errors against a per-client budget along the way.

pub mod cache;
pub mod client;
pub mod error;
pub mod observations;
pub mod request;
pub mod signer;
pub mod transport;

pub use cache::ListCache;
pub use client::{ApiClient, Credentials};
pub use error::FetchError;
pub use observations::{ModificationFilter, ObservationsClient};
pub use request::{FetchLimits, FetchRequest, Method, SessionState, WireResponse};
pub use signer::{HmacSigner, RequestSigner};
pub use transport::{HttpTransport, Transport, TransportError};

pub const CRATE_NAME: &str = "fauna-client";
