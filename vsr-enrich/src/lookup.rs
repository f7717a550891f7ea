//! Lookup service client
//!
//! Resolves a variant's table reference to candidate data sources and fetches
//! raw field rows from a source. The service is read-only; errors are passed
//! to the caller unmodified and never retried here.

use crate::error::{EnrichError, EnrichResult};
use crate::resolver::{FieldQuery, FieldQueryResult};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Algorithm key selecting the per-variant lookup schema
pub const VARIANTS_ALGORITHM_KEY: &str = "variants";

/// A named external data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupSource {
    /// Source locator passed back on record queries
    pub url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LookupSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            extra: Map::new(),
        }
    }
}

/// Lookup service contract
#[async_trait]
pub trait LookupService: Send + Sync {
    /// Candidate sources for a table, in service order
    async fn sources(&self, table_id: &str, algorithm_key: &str) -> EnrichResult<Vec<LookupSource>>;

    /// Raw field rows for one record
    async fn records(&self, query: &FieldQuery) -> EnrichResult<FieldQueryResult>;
}

/// HTTP implementation of [`LookupService`]
///
/// - `GET  {base}/project-tables/{table}/sources?algKey={key}`
/// - `POST {base}/project-tables/records` with a [`FieldQuery`] body
pub struct HttpLookupClient {
    http_client: Client,
    base_url: Url,
}

impl HttpLookupClient {
    pub fn new(base_url: &str, timeout: Duration, connect_timeout: Duration) -> EnrichResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        let base_url = Url::parse(base_url)
            .map_err(|e| EnrichError::Transport(format!("Invalid lookup URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(EnrichError::Transport(format!(
                "Lookup URL {} cannot be used as a base",
                base_url
            )));
        }

        Ok(Self {
            http_client,
            base_url,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> EnrichResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| EnrichError::Transport(format!("Bad lookup base URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> EnrichResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichError::Transport(format!(
                "Lookup service returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| EnrichError::Parse(format!("Malformed lookup response: {}", e)))
    }
}

#[async_trait]
impl LookupService for HttpLookupClient {
    async fn sources(&self, table_id: &str, algorithm_key: &str) -> EnrichResult<Vec<LookupSource>> {
        let url = self.endpoint(&["project-tables", table_id, "sources"])?;

        tracing::debug!(table_id = %table_id, url = %url, "Querying lookup sources");

        let response = self
            .http_client
            .get(url)
            .query(&[("algKey", algorithm_key)])
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn records(&self, query: &FieldQuery) -> EnrichResult<FieldQueryResult> {
        let url = self.endpoint(&["project-tables", "records"])?;

        tracing::debug!(
            record_id = %query.record_id,
            fields = ?query.field_symbols,
            "Querying lookup records"
        );

        let response = self.http_client.post(url).json(query).send().await?;

        Self::read_json(response).await
    }
}
