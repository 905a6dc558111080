//! Wire-level access to the provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, TRANSFER_ENCODING};
use thiserror::Error;

use crate::request::{FetchRequest, Method, WireResponse};
use crate::signer::RequestSigner;

/// Response header carrying the continuation key.
pub const PAGINATION_KEY_HEADER: &str = "pagination_key";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport failure: {0}")]
    Http(#[from] reqwest::Error),
}

/// One request in, one wire chunk out.
///
/// The production implementation signs and sends HTTP requests; tests swap
/// in scripted responses.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &FetchRequest) -> Result<WireResponse, TransportError>;
}

/// Signed HTTP transport against `<base>/api/<scope>`.
pub struct HttpTransport {
    client: reqwest::Client,
    api_url: String,
    signer: Arc<dyn RequestSigner>,
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        signer: Arc<dyn RequestSigner>,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            api_url: format!("{}/api/", base_url.trim_end_matches('/')),
            signer,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &FetchRequest) -> Result<WireResponse, TransportError> {
        let url = format!("{}{}", self.api_url, request.scope);
        let query: Vec<(&str, &str)> = request
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        builder = builder
            .query(&query)
            .header(CONTENT_TYPE, "application/json;charset=UTF-8")
            .header(AUTHORIZATION, self.signer.authorization(request));
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let chunked = response
            .headers()
            .get(TRANSFER_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("chunked"))
            .unwrap_or(false);
        let pagination_key = response
            .headers()
            .get(PAGINATION_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        Ok(WireResponse {
            status,
            chunked,
            pagination_key,
            body,
        })
    }
}
