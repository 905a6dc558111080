//! Controller-bound API client with chunk following and a lifetime error
//! budget.

use std::sync::Arc;

use fauna_core::{Controller, Payload};
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::FetchError;
use crate::request::{FetchLimits, FetchRequest, SessionState};
use crate::transport::Transport;

/// Credentials carried as query parameters on every call.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user_email: String,
    pub user_pw: String,
}

/// Client bound to one controller of the provider API.
///
/// The transfer-error counter is cumulative over the client's lifetime, not
/// per call: a client that already burned retries on earlier calls has less
/// budget left for the next one. This bounds the total cost a flaky endpoint
/// can impose on one ingestion run.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    credentials: Credentials,
    controller: Controller,
    limits: FetchLimits,
    session: SessionState,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Credentials,
        controller: Controller,
        limits: FetchLimits,
    ) -> Self {
        Self {
            transport,
            credentials,
            controller,
            limits,
            session: SessionState::default(),
        }
    }

    pub fn controller(&self) -> Controller {
        self.controller
    }

    /// Snapshot of the transfer counters, for audit logging.
    pub fn session(&self) -> SessionState {
        self.session
    }

    pub(crate) fn base_params(&self) -> IndexMap<String, String> {
        let mut params = IndexMap::new();
        params.insert("user_email".to_string(), self.credentials.user_email.clone());
        params.insert("user_pw".to_string(), self.credentials.user_pw.clone());
        params
    }

    /// Mask credentials before parameters reach the logs.
    fn masked(params: &IndexMap<String, String>) -> IndexMap<String, String> {
        let mut masked = params.clone();
        for key in ["user_email", "user_pw"] {
            if let Some(value) = masked.get_mut(key) {
                *value = "***".to_string();
            }
        }
        masked
    }

    /// List the controller's entities.
    pub async fn list(&mut self, opt_params: &[(String, String)]) -> Result<Payload, FetchError> {
        let mut request = FetchRequest::get(self.controller.path());
        request.params = self.base_params();
        for (key, value) in opt_params {
            request.params.insert(key.clone(), value.clone());
        }
        tracing::debug!(
            controller = %self.controller,
            params = ?Self::masked(&request.params),
            "listing entities"
        );
        self.fetch(request).await
    }

    /// Fetch a single entity by id.
    pub async fn get(
        &mut self,
        id: i64,
        opt_params: &[(String, String)],
    ) -> Result<Payload, FetchError> {
        let mut request = FetchRequest::get(format!("{}/{id}", self.controller.path()));
        request.params = self.base_params();
        for (key, value) in opt_params {
            request.params.insert(key.clone(), value.clone());
        }
        tracing::debug!(controller = %self.controller, id, "fetching entity");
        self.fetch(request).await
    }

    /// Run one logical request, following wire chunks until the provider
    /// stops signaling continuation.
    ///
    /// Non-success statuses and undecodable bodies count against the session
    /// budget and re-issue the same request after a fixed delay. A provider
    /// that never stops signaling continuation trips the chunk ceiling.
    pub async fn fetch(&mut self, request: FetchRequest) -> Result<Payload, FetchError> {
        let mut request = request;
        let mut merged: Option<Payload> = None;
        let mut chunks = 0usize;

        while chunks < self.limits.max_chunks {
            let wire = match self.transport.execute(&request).await {
                Ok(wire) => wire,
                Err(err) => {
                    tracing::error!(controller = %self.controller, %err, "transport failure");
                    self.count_error().await?;
                    continue;
                }
            };

            self.session.last_status = wire.status;
            if wire.status != 200 {
                tracing::error!(
                    controller = %self.controller,
                    status = wire.status,
                    scope = %request.scope,
                    "provider returned an error status"
                );
                self.count_error().await?;
                continue;
            }

            let decoded: Value = match serde_json::from_slice(&wire.body) {
                Ok(value) => value,
                Err(err) => {
                    tracing::error!(controller = %self.controller, %err, "undecodable response body");
                    self.count_error().await?;
                    continue;
                }
            };

            let chunk = Payload::from_chunk(decoded);
            match merged.as_mut() {
                None => merged = Some(chunk),
                Some(payload) => payload.merge(chunk)?,
            }

            match wire.continuation() {
                Some(key) => {
                    tracing::debug!(
                        controller = %self.controller,
                        chunk = chunks,
                        "continuation signaled, requesting next chunk"
                    );
                    request
                        .params
                        .insert("pagination_key".to_string(), key.to_string());
                    chunks += 1;
                }
                None => {
                    request.params.shift_remove("pagination_key");
                    return Ok(merged.expect("at least one chunk merged"));
                }
            }
        }

        Err(FetchError::PaginationOverflow {
            max_chunks: self.limits.max_chunks,
        })
    }

    /// Count one transfer error against the lifetime budget, failing once it
    /// is spent and pausing before the retry otherwise.
    async fn count_error(&mut self) -> Result<(), FetchError> {
        self.session.transfer_errors += 1;
        if self.session.transfer_errors > self.limits.max_retry {
            tracing::error!(
                controller = %self.controller,
                errors = self.session.transfer_errors,
                "too many transfer errors, giving up"
            );
            return Err(FetchError::Protocol {
                status: self.session.last_status,
                errors: self.session.transfer_errors,
            });
        }
        tokio::time::sleep(self.limits.retry_delay).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::WireResponse;
    use crate::transport::TransportError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays scripted wire responses and records every request seen.
    struct ScriptedTransport {
        responses: Mutex<VecDeque<WireResponse>>,
        requests: Mutex<Vec<FetchRequest>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<WireResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn remaining(&self) -> usize {
            self.responses.lock().expect("lock").len()
        }

        fn requests(&self) -> Vec<FetchRequest> {
            self.requests.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(&self, request: &FetchRequest) -> Result<WireResponse, TransportError> {
            self.requests.lock().expect("lock").push(request.clone());
            Ok(self
                .responses
                .lock()
                .expect("lock")
                .pop_front()
                .expect("script exhausted"))
        }
    }

    fn ok(body: serde_json::Value) -> WireResponse {
        WireResponse {
            status: 200,
            chunked: false,
            pagination_key: None,
            body: serde_json::to_vec(&body).expect("serializable body"),
        }
    }

    fn ok_chunked(body: serde_json::Value, key: &str) -> WireResponse {
        WireResponse {
            status: 200,
            chunked: true,
            pagination_key: Some(key.to_string()),
            body: serde_json::to_vec(&body).expect("serializable body"),
        }
    }

    fn failing(status: u16) -> WireResponse {
        WireResponse {
            status,
            chunked: false,
            pagination_key: None,
            body: Vec::new(),
        }
    }

    fn limits(max_retry: u32, max_chunks: usize) -> FetchLimits {
        FetchLimits {
            max_retry,
            max_chunks,
            retry_delay: Duration::ZERO,
        }
    }

    fn client(transport: Arc<ScriptedTransport>, limits: FetchLimits) -> ApiClient {
        ApiClient::new(
            transport,
            Credentials {
                user_email: "mirror@example.org".to_string(),
                user_pw: "pw".to_string(),
            },
            Controller::Species,
            limits,
        )
    }

    #[tokio::test]
    async fn single_chunk_response_is_returned_verbatim() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok(
            json!({"data": [{"id": "1"}, {"id": "2"}]}),
        )]));
        let mut client = client(Arc::clone(&transport), limits(5, 10));

        let payload = client.list(&[]).await.expect("single chunk fetch");
        assert_eq!(
            payload,
            Payload::Data(vec![json!({"id": "1"}), json!({"id": "2"})])
        );
        assert_eq!(client.session().transfer_errors, 0);
        assert_eq!(client.session().last_status, 200);
    }

    #[tokio::test]
    async fn chunks_merge_in_arrival_order_and_echo_the_continuation_key() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            ok_chunked(json!({"data": {"sightings": [{"n": "a"}]}}), "k1"),
            ok_chunked(json!({"data": {"sightings": [{"n": "b"}]}}), "k2"),
            ok(json!({"data": {"sightings": [{"n": "c"}]}})),
        ]));
        let mut client = client(Arc::clone(&transport), limits(5, 10));

        let payload = client.list(&[]).await.expect("three chunk fetch");
        match payload {
            Payload::Observations { sightings, .. } => {
                let names: Vec<&str> = sightings
                    .iter()
                    .map(|s| s["n"].as_str().expect("n"))
                    .collect();
                assert_eq!(names, vec!["a", "b", "c"]);
            }
            other => panic!("unexpected payload {other:?}"),
        }

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].params.get("pagination_key"), None);
        assert_eq!(
            requests[1].params.get("pagination_key").map(String::as_str),
            Some("k1")
        );
        assert_eq!(
            requests[2].params.get("pagination_key").map(String::as_str),
            Some("k2")
        );
    }

    #[tokio::test]
    async fn pagination_overflow_fires_exactly_at_the_ceiling() {
        let script: Vec<WireResponse> = (0..5)
            .map(|i| ok_chunked(json!({"data": [{"id": i.to_string()}]}), "next"))
            .collect();
        let transport = Arc::new(ScriptedTransport::new(script));
        let mut client = client(Arc::clone(&transport), limits(5, 3));

        let err = client.list(&[]).await.expect_err("ceiling reached");
        assert!(matches!(err, FetchError::PaginationOverflow { max_chunks: 3 }));
        // Exactly three chunks were consumed, not one more or less.
        assert_eq!(transport.remaining(), 2);
    }

    #[tokio::test]
    async fn ceiling_minus_one_chunks_still_succeed() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            ok_chunked(json!({"data": [{"id": "1"}]}), "k1"),
            ok_chunked(json!({"data": [{"id": "2"}]}), "k2"),
            ok(json!({"data": [{"id": "3"}]})),
        ]));
        let mut client = client(Arc::clone(&transport), limits(5, 3));

        let payload = client.list(&[]).await.expect("terminating pagination");
        assert_eq!(payload.len(), 3);
    }

    #[tokio::test]
    async fn budget_tolerates_exactly_max_retry_errors() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            failing(503),
            failing(503),
            ok(json!({"data": [{"id": "1"}]})),
        ]));
        let mut client = client(Arc::clone(&transport), limits(2, 10));

        let payload = client.list(&[]).await.expect("recovered fetch");
        assert_eq!(payload.len(), 1);
        assert_eq!(client.session().transfer_errors, 2);
    }

    #[tokio::test]
    async fn budget_overflow_raises_with_the_last_status() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            failing(500),
            failing(500),
            failing(429),
        ]));
        let mut client = client(Arc::clone(&transport), limits(2, 10));

        let err = client.list(&[]).await.expect_err("budget exhausted");
        match err {
            FetchError::Protocol { status, errors } => {
                assert_eq!(status, 429);
                assert_eq!(errors, 3);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn budget_spans_calls_for_the_client_lifetime() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            failing(500),
            failing(500),
            ok(json!({"data": []})),
            failing(500),
        ]));
        let mut client = client(Arc::clone(&transport), limits(2, 10));

        client.list(&[]).await.expect("first call recovers");
        // The two earlier errors already spent the budget; one more is fatal.
        let err = client.list(&[]).await.expect_err("no budget left");
        assert!(matches!(err, FetchError::Protocol { errors: 3, .. }));
    }

    #[tokio::test]
    async fn undecodable_bodies_count_as_transient_errors() {
        let garbled = WireResponse {
            status: 200,
            chunked: false,
            pagination_key: None,
            body: b"not json".to_vec(),
        };
        let transport = Arc::new(ScriptedTransport::new(vec![
            garbled,
            ok(json!({"data": [{"id": "1"}]})),
        ]));
        let mut client = client(Arc::clone(&transport), limits(2, 10));

        let payload = client.list(&[]).await.expect("retried after bad body");
        assert_eq!(payload.len(), 1);
        assert_eq!(client.session().transfer_errors, 1);
    }

    #[tokio::test]
    async fn credentials_ride_along_as_query_parameters() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok(json!({"data": []}))]));
        let mut client = client(Arc::clone(&transport), limits(2, 10));

        client
            .list(&[("id_taxo_group".to_string(), "1".to_string())])
            .await
            .expect("list");

        let request = &transport.requests()[0];
        assert_eq!(
            request.params.get("user_email").map(String::as_str),
            Some("mirror@example.org")
        );
        assert_eq!(request.params.get("user_pw").map(String::as_str), Some("pw"));
        assert_eq!(
            request.params.get("id_taxo_group").map(String::as_str),
            Some("1")
        );
    }
}
