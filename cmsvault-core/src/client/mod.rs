//! Rate-governed client for the remote CMS REST API.
//!
//! Every call passes the [`RequestGate`] (admission, then pacing) and runs
//! under its own timeout. Only GET requests are issued.
//!
//! # Module Structure
//! - `gate`: admission and pacing policies
//! - `transport`: network seam and the `reqwest` implementation
//! - `pagination`: page-walk results and continuation rule
//! - `schema_inference`: field layout from a sampled document

mod gate;
mod pagination;
mod schema_inference;
mod transport;

pub use gate::{AdmissionGate, PacingGate, RequestGate};
pub use pagination::{PaginatedData, Truncation, has_more};
pub use schema_inference::{describe_sample, infer_fields};
pub use transport::{HttpTransport, Transport, TransportResponse};

use crate::config::{EnvironmentConfig, RateLimitConfig};
use crate::error::{VaultError, redact_url};
use crate::models::{AccessDescriptor, CountResponse, Page, PageQuery, SchemaDescriptor};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Authenticated API client with bounded concurrency and pacing.
///
/// # Example
/// ```rust,no_run
/// use cmsvault_core::client::RateLimitedApiClient;
/// use cmsvault_core::config::{EnvironmentConfig, RateLimitConfig};
/// use cmsvault_core::security::ApiKey;
///
/// # async fn example() -> cmsvault_core::Result<()> {
/// let env = EnvironmentConfig::new(
///     "staging",
///     "https://cms.example.com/api",
///     ApiKey::new("key".to_string()),
/// )?;
/// let client = RateLimitedApiClient::new(env, RateLimitConfig::default())?;
///
/// for name in client.discover_collections().await? {
///     println!("{name}: {}", client.get_collection_count(&name).await?);
/// }
/// # Ok(())
/// # }
/// ```
pub struct RateLimitedApiClient {
    environment: EnvironmentConfig,
    rate_limit: RateLimitConfig,
    depth: Option<u32>,
    sort: Option<String>,
    gate: RequestGate,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for RateLimitedApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedApiClient")
            .field("environment", &self.environment.name)
            .field("base_url", &self.environment.redacted_url())
            .field("rate_limit", &self.rate_limit)
            .field("depth", &self.depth)
            .field("sort", &self.sort)
            .finish_non_exhaustive()
    }
}

impl RateLimitedApiClient {
    /// Creates a client over an HTTP transport.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(environment: EnvironmentConfig, rate_limit: RateLimitConfig) -> crate::Result<Self> {
        let transport = HttpTransport::new(rate_limit.timeout())?;
        Ok(Self::with_transport(
            environment,
            rate_limit,
            Arc::new(transport),
        ))
    }

    /// Creates a client over the given transport
    pub fn with_transport(
        environment: EnvironmentConfig,
        rate_limit: RateLimitConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            gate: RequestGate::new(rate_limit.concurrency, rate_limit.delay()),
            environment,
            rate_limit,
            depth: None,
            sort: None,
            transport,
        }
    }

    /// Builder method to set the depth forwarded on data queries.
    pub fn with_depth(mut self, depth: Option<u32>) -> Self {
        self.depth = depth;
        self
    }

    /// Builder method to set the sort forwarded on full retrievals.
    pub fn with_sort(mut self, sort: Option<String>) -> Self {
        self.sort = sort;
        self
    }

    /// Environment this client talks to
    pub fn environment(&self) -> &EnvironmentConfig {
        &self.environment
    }

    /// Request budget in effect
    pub fn rate_limit(&self) -> &RateLimitConfig {
        &self.rate_limit
    }

    /// Requests currently in flight
    pub fn in_flight(&self) -> usize {
        self.gate.in_flight()
    }

    async fn get_json<T>(&self, segments: &[&str], query: &[(&str, String)]) -> crate::Result<T>
    where
        T: DeserializeOwned,
    {
        let mut url = self.environment.endpoint(segments)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        let endpoint = redact_url(url.as_str());

        let _permit = self.gate.enter().await?;
        debug!(endpoint = %endpoint, in_flight = self.gate.in_flight(), "Dispatching request");

        let authorization = Zeroizing::new(self.environment.authorization());
        let response = tokio::time::timeout(
            self.rate_limit.timeout(),
            self.transport.get(&url, authorization.as_str()),
        )
        .await
        .map_err(|_| VaultError::timeout(&endpoint, self.rate_limit.timeout_ms))??;

        if !response.is_success() {
            return Err(VaultError::http_status(&endpoint, response.status));
        }

        serde_json::from_slice(&response.body)
            .map_err(|e| VaultError::invalid_response(&endpoint, e.to_string()))
    }

    /// Fetches the permission snapshot (`GET /access`).
    ///
    /// # Errors
    /// Returns error on transport failure, non-2xx status or timeout
    pub async fn get_access(&self) -> crate::Result<AccessDescriptor> {
        self.get_json(&["access"], &[]).await
    }

    /// Names of the collections visible to the credential.
    ///
    /// An empty list is logged as a warning, not an error.
    ///
    /// # Errors
    /// Returns error if the access request fails
    pub async fn discover_collections(&self) -> crate::Result<Vec<String>> {
        let names = self.get_access().await?.collection_names();
        if names.is_empty() {
            warn!(environment = %self.environment.name, "No collections visible to this API key");
        }
        Ok(names)
    }

    /// Document count of a collection (`GET /{name}/count`).
    ///
    /// # Errors
    /// Returns error if the request fails or the body has no `totalDocs`
    pub async fn get_collection_count(&self, name: &str) -> crate::Result<u64> {
        let count: CountResponse = self.get_json(&[name, "count"], &[]).await?;
        Ok(count.total_docs)
    }

    /// Query for `page` of a full retrieval with the configured options
    pub fn page_query(&self, page: u64, limit: u32) -> PageQuery {
        PageQuery::new(page, limit)
            .with_depth(self.depth)
            .with_sort(self.sort.clone())
    }

    /// Fetches a single page (`GET /{name}?page&limit&depth&sort`).
    ///
    /// # Errors
    /// Returns error if the request fails or the body is not a page
    pub async fn get_collection_data(&self, name: &str, query: &PageQuery) -> crate::Result<Page> {
        self.get_json(&[name], &query.to_query_pairs()).await
    }

    /// Walks pages 1, 2, … sequentially, accumulating documents in order.
    ///
    /// A failed page ends the walk; the documents gathered so far are kept
    /// and the failure is reported through [`PaginatedData::truncation`].
    pub async fn fetch_all_pages(&self, name: &str) -> PaginatedData {
        let mut data = PaginatedData::default();
        let mut current: u64 = 1;

        loop {
            let query = self.page_query(current, self.rate_limit.batch_size);
            match self.get_collection_data(name, &query).await {
                Ok(page) => {
                    data.pages_fetched = data.pages_fetched.saturating_add(1);
                    let more = has_more(&page, current);
                    debug!(
                        collection = %name,
                        page = current,
                        docs = page.docs.len(),
                        total_docs = page.total_docs,
                        "Fetched page"
                    );
                    data.docs.extend(page.docs);
                    if !more {
                        break;
                    }
                    current = current.saturating_add(1);
                }
                Err(e) => {
                    warn!(
                        collection = %name,
                        page = current,
                        retrieved = data.docs.len(),
                        error = %e,
                        "Page request failed, stopping pagination"
                    );
                    data.truncation = Some(Truncation {
                        failed_page: current,
                        error: e.to_string(),
                    });
                    break;
                }
            }
        }

        data
    }

    /// All documents of a collection; a failed page truncates silently.
    pub async fn get_all_collection_data(&self, name: &str) -> Vec<Value> {
        self.fetch_all_pages(name).await.docs
    }

    /// Infers the field layout of a collection from one sampled document.
    ///
    /// A failed sample request yields a descriptor carrying the error
    /// instead of failing.
    pub async fn get_collection_schema(&self, name: &str) -> SchemaDescriptor {
        let query = PageQuery::new(1, 1).with_depth(self.depth);
        match self.get_collection_data(name, &query).await {
            Ok(page) => describe_sample(name, page.total_docs, page.docs.into_iter().next()),
            Err(e) => {
                warn!(collection = %name, error = %e, "Schema sample request failed");
                SchemaDescriptor::failed(name, e.to_string())
            }
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
