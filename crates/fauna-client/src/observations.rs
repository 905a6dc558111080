//! Observation-controller specifics: differential queries and windowed
//! search on top of the generic client.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fauna_core::{Controller, Payload};
use serde_json::Value;

use crate::client::{ApiClient, Credentials};
use crate::error::FetchError;
use crate::request::{FetchLimits, FetchRequest, SessionState};
use crate::transport::Transport;

/// Which side of the change history a differential request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModificationFilter {
    OnlyModified,
    OnlyDeleted,
    All,
}

impl ModificationFilter {
    fn as_param(&self) -> &'static str {
        match self {
            ModificationFilter::OnlyModified => "only_modified",
            ModificationFilter::OnlyDeleted => "only_deleted",
            ModificationFilter::All => "all",
        }
    }
}

/// Client for the observations controller: list, single get, differential
/// queries and search.
pub struct ObservationsClient {
    inner: ApiClient,
}

impl ObservationsClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Credentials,
        limits: FetchLimits,
    ) -> Self {
        Self {
            inner: ApiClient::new(transport, credentials, Controller::Observations, limits),
        }
    }

    pub fn session(&self) -> SessionState {
        self.inner.session()
    }

    /// List observations of one partition.
    pub async fn list(
        &mut self,
        id_taxo_group: &str,
        opt_params: &[(String, String)],
    ) -> Result<Payload, FetchError> {
        let mut params = vec![("id_taxo_group".to_string(), id_taxo_group.to_string())];
        params.extend_from_slice(opt_params);
        self.inner.list(&params).await
    }

    /// Fetch one observation by id.
    pub async fn get(
        &mut self,
        id: i64,
        opt_params: &[(String, String)],
    ) -> Result<Payload, FetchError> {
        self.inner.get(id, opt_params).await
    }

    /// Everything that changed in a partition since `since`.
    pub async fn diff(
        &mut self,
        id_taxo_group: &str,
        since: DateTime<Utc>,
        filter: ModificationFilter,
    ) -> Result<Payload, FetchError> {
        let mut request = FetchRequest::get("observations/diff/");
        request.params = self.inner.base_params();
        request
            .params
            .insert("id_taxo_group".to_string(), id_taxo_group.to_string());
        request
            .params
            .insert("modification_type".to_string(), filter.as_param().to_string());
        request.params.insert(
            "date".to_string(),
            since.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
        tracing::debug!(partition = id_taxo_group, since = %since, "fetching differential");
        self.inner.fetch(request).await
    }

    /// Search observations with the same body the interactive service uses.
    /// A missing body is a caller bug, not a provider condition.
    pub async fn search(
        &mut self,
        query: Option<&Value>,
        opt_params: &[(String, String)],
    ) -> Result<Payload, FetchError> {
        let Some(query) = query else {
            return Err(FetchError::MissingSearchBody);
        };
        let mut request = FetchRequest::post("observations/search/", query.to_string());
        request.params = self.inner.base_params();
        for (key, value) in opt_params {
            request.params.insert(key.clone(), value.clone());
        }
        self.inner.fetch(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::WireResponse;
    use crate::transport::TransportError;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

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

    fn observations_client(transport: Arc<ScriptedTransport>) -> ObservationsClient {
        ObservationsClient::new(
            transport,
            Credentials {
                user_email: "mirror@example.org".to_string(),
                user_pw: "pw".to_string(),
            },
            FetchLimits {
                retry_delay: Duration::ZERO,
                ..FetchLimits::default()
            },
        )
    }

    #[tokio::test]
    async fn diff_requests_carry_filter_date_and_partition() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok(json!([]))]));
        let mut client = observations_client(Arc::clone(&transport));
        let since = Utc.with_ymd_and_hms(2026, 3, 1, 6, 30, 0).single().expect("ts");

        client
            .diff("18", since, ModificationFilter::OnlyDeleted)
            .await
            .expect("diff");

        let request = &transport.requests.lock().expect("lock")[0];
        assert_eq!(request.scope, "observations/diff/");
        assert_eq!(
            request.params.get("modification_type").map(String::as_str),
            Some("only_deleted")
        );
        assert_eq!(
            request.params.get("date").map(String::as_str),
            Some("2026-03-01 06:30:00")
        );
        assert_eq!(request.params.get("id_taxo_group").map(String::as_str), Some("18"));
    }

    #[tokio::test]
    async fn search_without_a_body_is_rejected_before_any_request() {
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        let mut client = observations_client(Arc::clone(&transport));

        let err = client.search(None, &[]).await.expect_err("caller bug");
        assert!(matches!(err, FetchError::MissingSearchBody));
        assert!(transport.requests.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn search_posts_the_query_body() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok(
            json!({"data": {"sightings": []}}),
        )]));
        let mut client = observations_client(Arc::clone(&transport));
        let query = json!({"period_choice": "range", "taxonomic_group": "1"});

        client
            .search(Some(&query), &[("short_version".to_string(), "1".to_string())])
            .await
            .expect("search");

        let request = &transport.requests.lock().expect("lock")[0];
        assert_eq!(request.scope, "observations/search/");
        assert_eq!(request.method, crate::request::Method::Post);
        let body: serde_json::Value =
            serde_json::from_str(request.body.as_deref().expect("body")).expect("json body");
        assert_eq!(body, query);
    }
}
