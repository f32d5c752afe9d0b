//! Asynchronous network client implementation.

use crate::models::{CreateNetworkRequest, Network, NetworkListParams, RenameNetworkRequest};
use crate::Result;
use futures::stream::{self, Stream, TryStreamExt};
use reqwest::Method;
use stratus_core::client::{
    ApiTransport, ClientConfig, RetryPolicy, ServiceClient, ServiceClientBuilder,
};
use stratus_core::config::{StratusClientConfig, TaskWaitConfig};
use stratus_core::decode::extract_result;
use stratus_core::ids::NetworkId;
use stratus_core::pagination::{LinkedPage, Page, Pager, LIMIT_PARAM};
use stratus_core::tasks::{confirm_deleted, TaskId, TaskOutcome, TaskWaiter, WaitOptions};
use stratus_core::types::{ResourceFamily, ResourcePath};
use tracing::info;
use url::Url;
use validator::Validate;

const USER_AGENT: &str = concat!("stratus-networks/", env!("CARGO_PKG_VERSION"));

/// Builder for [`NetworksClient`].
#[derive(Debug, Clone)]
pub struct NetworksClientBuilder {
    inner: ServiceClientBuilder,
    api_version: String,
    project_id: u64,
    region_id: u64,
    page_limit: u32,
    task_wait: TaskWaitConfig,
}

impl NetworksClientBuilder {
    /// Create a builder for the specified base URL and project/region scope.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL cannot be parsed.
    pub fn new(base_url: impl AsRef<str>, project_id: u64, region_id: u64) -> Result<Self> {
        let config = StratusClientConfig::new(base_url.as_ref(), project_id, region_id)?;
        Self::from_config(&config)
    }

    /// Create a builder from a validated client configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the API URL cannot be parsed.
    pub fn from_config(config: &StratusClientConfig) -> Result<Self> {
        Ok(Self {
            inner: ServiceClientBuilder::from_config(config)?.with_user_agent(USER_AGENT),
            api_version: config.api_version.clone(),
            project_id: config.project_id,
            region_id: config.region_id,
            page_limit: config.pagination.limit,
            task_wait: config.task_wait,
        })
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.inner = self.inner.with_retry_policy(retry);
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.inner = self.inner.with_http_config(config);
        self
    }

    /// Configure the API token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.inner = self.inner.with_token(token);
        self
    }

    /// Default page size for list calls.
    #[must_use]
    pub const fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit;
        self
    }

    /// Default task-wait behaviour.
    #[must_use]
    pub const fn with_task_wait(mut self, config: TaskWaitConfig) -> Self {
        self.task_wait = config;
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn build(self) -> Result<NetworksClient> {
        Ok(NetworksClient {
            inner: self.inner.build()?,
            path: ResourcePath::new(
                self.api_version.clone(),
                ResourceFamily::Networks,
                self.project_id,
                self.region_id,
            ),
            api_version: self.api_version,
            page_limit: self.page_limit,
            task_wait: self.task_wait,
        })
    }
}

/// Asynchronous client for private networks.
#[derive(Debug, Clone)]
pub struct NetworksClient {
    inner: ServiceClient,
    path: ResourcePath,
    api_version: String,
    page_limit: u32,
    task_wait: TaskWaitConfig,
}

impl NetworksClient {
    /// Construct a client directly from the base URL and scope.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL is invalid.
    pub fn new(base_url: impl AsRef<str>, project_id: u64, region_id: u64) -> Result<Self> {
        NetworksClientBuilder::new(base_url, project_id, region_id)?.build()
    }

    /// Return the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        self.inner.base_url()
    }

    /// Wait options implied by the client configuration.
    #[must_use]
    pub fn default_wait(&self) -> Option<WaitOptions> {
        WaitOptions::configured(&self.task_wait)
    }

    /// Lazily page through networks, following `next` links.
    ///
    /// # Errors
    ///
    /// Returns an endpoint error if the collection URL cannot be built.
    pub fn list(&self, params: &NetworkListParams) -> Result<Pager<'_, LinkedPage<Network>>> {
        let mut url = self.path.collection(self.base_url())?;
        {
            let mut query = url.query_pairs_mut();
            if params.limit.is_none() {
                query.append_pair(LIMIT_PARAM, &self.page_limit.to_string());
            }
            for (key, value) in params.to_pairs() {
                query.append_pair(key, &value);
            }
        }
        Ok(Pager::new(&self.inner, url, LinkedPage::new))
    }

    /// Fetch every network.
    ///
    /// # Errors
    ///
    /// Returns the first transport or decode error.
    pub async fn list_all(&self, params: &NetworkListParams) -> Result<Vec<Network>> {
        self.list(params)?.all_items().await
    }

    /// Stream networks one at a time, fetching pages on demand.
    ///
    /// # Errors
    ///
    /// Returns an endpoint error if the collection URL cannot be built; page errors are
    /// yielded by the stream.
    pub fn stream(
        &self,
        params: &NetworkListParams,
    ) -> Result<impl Stream<Item = Result<Network>> + '_> {
        let pages = self.list(params)?.into_stream();
        Ok(pages
            .and_then(|page| async move { page.items() })
            .map_ok(|items| stream::iter(items.into_iter().map(Ok)))
            .try_flatten())
    }

    /// Fetch a single network.
    ///
    /// # Errors
    ///
    /// Returns [`stratus_core::Error::NotFound`] if the network does not exist.
    pub async fn get(&self, id: NetworkId) -> Result<Network> {
        let url = self.network_url(id)?;
        extract_result(self.inner.get_json(&url).await?)
    }

    /// Create a network.
    ///
    /// Every returned task is awaited in order; the network is read from the last one.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any request, then the first task failure.
    pub async fn create(
        &self,
        request: &CreateNetworkRequest,
        wait: Option<WaitOptions>,
    ) -> Result<TaskOutcome<Network>> {
        request.validate()?;
        let url = self.path.collection(self.base_url())?;
        let tasks = self.inner.submit(Method::POST, &url, Some(request)).await?;
        info!(name = %request.name, tasks = ?tasks.tasks, "Network creation submitted");

        self.waiter()
            .settle(tasks, wait.as_ref(), |task_id| self.created_network(task_id))
            .await
    }

    /// Delete a network and confirm it is gone.
    ///
    /// # Errors
    ///
    /// Returns [`stratus_core::Error::ResourceStillExists`] if the network can still be
    /// fetched after its tasks settle.
    pub async fn delete(
        &self,
        id: NetworkId,
        wait: Option<WaitOptions>,
    ) -> Result<TaskOutcome<()>> {
        let url = self.network_url(id)?;
        let tasks = self.inner.submit::<()>(Method::DELETE, &url, None).await?;
        info!(network_id = %id, tasks = ?tasks.tasks, "Network deletion submitted");

        self.waiter()
            .settle(tasks, wait.as_ref(), |_| async move {
                confirm_deleted(self.get(id).await, &id.to_string())
            })
            .await
    }

    /// Rename a network.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid name, then any transport or decode error.
    pub async fn rename(&self, id: NetworkId, name: impl Into<String>) -> Result<Network> {
        let request = RenameNetworkRequest { name: name.into() };
        request.validate()?;
        let url = self.network_url(id)?;
        let body = serde_json::to_value(&request)?;
        extract_result(self.inner.send_json(Method::PATCH, &url, Some(body)).await?)
    }

    async fn created_network(&self, task_id: TaskId) -> Result<Network> {
        let key = ResourceFamily::Networks.created_resources_key();
        let raw_id = self.waiter().get_task(&task_id).await?.first_created_id(key)?;
        self.get(NetworkId::parse_str(&raw_id)?).await
    }

    fn network_url(&self, id: NetworkId) -> Result<Url> {
        self.path.resource(self.base_url(), &[&id.to_string()])
    }

    fn waiter(&self) -> TaskWaiter<'_> {
        TaskWaiter::new(&self.inner, self.base_url(), self.api_version.clone())
    }
}
