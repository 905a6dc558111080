//! Request and response shapes at the wire boundary.

use std::time::Duration;

use indexmap::IndexMap;

/// HTTP verbs the provider protocol uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// One logical request to the provider, before wire pagination.
///
/// Parameters keep their insertion order so requests serialize the same way
/// on every retry.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub scope: String,
    pub params: IndexMap<String, String>,
    pub method: Method,
    pub body: Option<String>,
}

impl FetchRequest {
    pub fn get(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            params: IndexMap::new(),
            method: Method::Get,
            body: None,
        }
    }

    pub fn post(scope: impl Into<String>, body: String) -> Self {
        Self {
            scope: scope.into(),
            params: IndexMap::new(),
            method: Method::Post,
            body: Some(body),
        }
    }
}

/// One wire chunk: status, continuation signals and body bytes.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub chunked: bool,
    pub pagination_key: Option<String>,
    pub body: Vec<u8>,
}

impl WireResponse {
    /// Both signals must be present for pagination to continue: a chunked
    /// transfer marker and a continuation key.
    pub fn continuation(&self) -> Option<&str> {
        if self.chunked {
            self.pagination_key.as_deref()
        } else {
            None
        }
    }
}

/// Per-client transfer counters, exposed for audit logging.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionState {
    /// Cumulative transfer errors over the client's whole lifetime.
    pub transfer_errors: u32,
    /// Status code of the most recent wire response.
    pub last_status: u16,
}

/// Retry and pagination ceilings for one client.
#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    /// Total transfer errors tolerated per client, across all of its calls.
    pub max_retry: u32,
    /// Wire chunks allowed per logical request.
    pub max_chunks: usize,
    /// Fixed pause between retries of a failed request.
    pub retry_delay: Duration,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            max_retry: 5,
            max_chunks: 10,
            retry_delay: Duration::from_secs(5),
        }
    }
}
