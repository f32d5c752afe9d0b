//! Asynchronous volume client implementation.

use crate::models::{
    CreateVolumeRequest, ExtendVolumeRequest, RenameVolumeRequest, RetypeVolumeRequest, Volume,
    VolumeListParams, VolumeType,
};
use crate::Result;
use reqwest::Method;
use stratus_core::client::{
    ApiTransport, ClientConfig, RetryPolicy, ServiceClient, ServiceClientBuilder,
};
use stratus_core::config::{StratusClientConfig, TaskWaitConfig};
use stratus_core::decode::extract_result;
use stratus_core::ids::VolumeId;
use stratus_core::pagination::{OffsetPage, Pager, LIMIT_PARAM};
use stratus_core::tasks::{confirm_deleted, TaskId, TaskOutcome, TaskWaiter, WaitOptions};
use stratus_core::types::{ResourceFamily, ResourcePath};
use tracing::{debug, info};
use url::Url;
use validator::Validate;

const USER_AGENT: &str = concat!("stratus-volumes/", env!("CARGO_PKG_VERSION"));

/// Builder for [`VolumesClient`].
#[derive(Debug, Clone)]
pub struct VolumesClientBuilder {
    inner: ServiceClientBuilder,
    api_version: String,
    project_id: u64,
    region_id: u64,
    page_limit: u32,
    task_wait: TaskWaitConfig,
}

impl VolumesClientBuilder {
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
        let inner = ServiceClientBuilder::from_config(config)?.with_user_agent(USER_AGENT);

        Ok(Self {
            inner,
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

    /// Override the API version path segment.
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Default page size for list calls.
    #[must_use]
    pub const fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit;
        self
    }

    /// Default task-wait behaviour reported by [`VolumesClient::default_wait`].
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
    pub fn build(self) -> Result<VolumesClient> {
        let inner = self.inner.build()?;
        let path = ResourcePath::new(
            self.api_version.clone(),
            ResourceFamily::Volumes,
            self.project_id,
            self.region_id,
        );

        Ok(VolumesClient {
            inner,
            path,
            api_version: self.api_version,
            page_limit: self.page_limit,
            task_wait: self.task_wait,
        })
    }
}

/// Asynchronous client for block-storage volumes.
#[derive(Debug, Clone)]
pub struct VolumesClient {
    inner: ServiceClient,
    path: ResourcePath,
    api_version: String,
    page_limit: u32,
    task_wait: TaskWaitConfig,
}

impl VolumesClient {
    /// Construct a client directly from the base URL and scope.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL is invalid.
    pub fn new(base_url: impl AsRef<str>, project_id: u64, region_id: u64) -> Result<Self> {
        VolumesClientBuilder::new(base_url, project_id, region_id)?.build()
    }

    /// Return the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        self.inner.base_url()
    }

    /// Wait options implied by the client configuration, or `None` for fire-and-forget.
    #[must_use]
    pub fn default_wait(&self) -> Option<WaitOptions> {
        WaitOptions::configured(&self.task_wait)
    }

    /// Lazily page through volumes matching `params`.
    ///
    /// No request is made until the pager is driven.
    ///
    /// # Errors
    ///
    /// Returns an endpoint error if the collection URL cannot be built.
    pub fn list(&self, params: &VolumeListParams) -> Result<Pager<'_, OffsetPage<Volume>>> {
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
        Ok(Pager::new(&self.inner, url, OffsetPage::new))
    }

    /// Fetch every volume matching `params`.
    ///
    /// # Errors
    ///
    /// Returns the first transport or decode error.
    pub async fn list_all(&self, params: &VolumeListParams) -> Result<Vec<Volume>> {
        self.list(params)?.all_items().await
    }

    /// Fetch a single volume.
    ///
    /// # Errors
    ///
    /// Returns [`stratus_core::Error::NotFound`] if the volume does not exist.
    pub async fn get(&self, id: VolumeId) -> Result<Volume> {
        let url = self.volume_url(id, None)?;
        extract_result(self.inner.get_json(&url).await?)
    }

    /// Create a volume.
    ///
    /// With `wait`, resolves to the created volume once its task finishes.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any request if `request` is invalid, then any
    /// transport or task error.
    pub async fn create(
        &self,
        request: &CreateVolumeRequest,
        wait: Option<WaitOptions>,
    ) -> Result<TaskOutcome<Volume>> {
        request.validate()?;
        let url = self.path.collection(self.base_url())?;
        let tasks = self.inner.submit(Method::POST, &url, Some(request)).await?;
        info!(name = %request.name, tasks = ?tasks.tasks, "Volume creation submitted");

        self.waiter()
            .settle(tasks, wait.as_ref(), |task_id| self.created_volume(task_id))
            .await
    }

    /// Delete a volume.
    ///
    /// With `wait`, succeeds only once fetching the volume returns 404.
    ///
    /// # Errors
    ///
    /// Returns [`stratus_core::Error::ResourceStillExists`] if the volume is still
    /// present after its task settles.
    pub async fn delete(&self, id: VolumeId, wait: Option<WaitOptions>) -> Result<TaskOutcome<()>> {
        let url = self.volume_url(id, None)?;
        let tasks = self.inner.submit::<()>(Method::DELETE, &url, None).await?;
        info!(volume_id = %id, tasks = ?tasks.tasks, "Volume deletion submitted");

        self.waiter()
            .settle(tasks, wait.as_ref(), |_| async move {
                confirm_deleted(self.get(id).await, &id.to_string())
            })
            .await
    }

    /// Grow a volume to `size` GiB.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an out-of-range size, then any transport or task
    /// error.
    pub async fn extend(
        &self,
        id: VolumeId,
        size: u64,
        wait: Option<WaitOptions>,
    ) -> Result<TaskOutcome<Volume>> {
        let request = ExtendVolumeRequest { size };
        request.validate()?;
        let url = self.volume_url(id, Some("extend"))?;
        let tasks = self.inner.submit(Method::POST, &url, Some(&request)).await?;
        debug!(volume_id = %id, size, "Volume extension submitted");

        self.waiter()
            .settle(tasks, wait.as_ref(), |_| self.get(id))
            .await
    }

    /// Change a volume's storage class.
    ///
    /// # Errors
    ///
    /// Returns any transport or task error.
    pub async fn retype(
        &self,
        id: VolumeId,
        volume_type: VolumeType,
        wait: Option<WaitOptions>,
    ) -> Result<TaskOutcome<Volume>> {
        let request = RetypeVolumeRequest { volume_type };
        let url = self.volume_url(id, Some("retype"))?;
        let tasks = self.inner.submit(Method::POST, &url, Some(&request)).await?;
        debug!(volume_id = %id, %volume_type, "Volume retype submitted");

        self.waiter()
            .settle(tasks, wait.as_ref(), |_| self.get(id))
            .await
    }

    /// Rename a volume. Takes effect synchronously.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid name, then any transport or decode error.
    pub async fn rename(&self, id: VolumeId, name: impl Into<String>) -> Result<Volume> {
        let request = RenameVolumeRequest { name: name.into() };
        request.validate()?;
        let url = self.volume_url(id, None)?;
        let body = serde_json::to_value(&request)?;
        extract_result(self.inner.send_json(Method::PATCH, &url, Some(body)).await?)
    }

    async fn created_volume(&self, task_id: TaskId) -> Result<Volume> {
        let key = ResourceFamily::Volumes.created_resources_key();
        let raw_id = self.waiter().get_task(&task_id).await?.first_created_id(key)?;
        self.get(VolumeId::parse_str(&raw_id)?).await
    }

    fn volume_url(&self, id: VolumeId, action: Option<&str>) -> Result<Url> {
        let id = id.to_string();
        match action {
            Some(action) => self.path.resource(self.base_url(), &[&id, action]),
            None => self.path.resource(self.base_url(), &[&id]),
        }
    }

    fn waiter(&self) -> TaskWaiter<'_> {
        TaskWaiter::new(&self.inner, self.base_url(), self.api_version.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::time::Duration;
    use stratus_core::Error;
    use tokio_test::assert_ok;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VOLUME_ID: &str = "726ecfcc-7fd0-4e30-a86b-7ed1aa6d8a4b";
    const VOLUME_PATH: &str = "/v1/volumes/1/76/726ecfcc-7fd0-4e30-a86b-7ed1aa6d8a4b";

    fn client(server: &MockServer) -> VolumesClient {
        VolumesClientBuilder::new(server.uri(), 1, 76)
            .unwrap()
            .with_retry_policy(RetryPolicy::no_retry())
            .with_page_limit(2)
            .build()
            .unwrap()
    }

    fn volume_id() -> VolumeId {
        VolumeId::parse_str(VOLUME_ID).unwrap()
    }

    fn volume(id: &str, name: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "size": 10,
            "status": "available",
            "volume_type": "standard",
            "bootable": false,
            "attachments": []
        })
    }

    fn wait() -> Option<WaitOptions> {
        Some(WaitOptions::from_secs(5).with_poll_interval(Duration::from_millis(10)))
    }

    async fn mount_task(server: &MockServer, task_id: &str, task: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/v1/tasks/{task_id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(task))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_list_all_walks_offset_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/volumes/1/76"))
            .and(query_param("offset", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 3,
                "results": [volume("8e01e4c3-7e4c-4a4c-9b3e-8b4f7c0e2a19", "c")]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/volumes/1/76"))
            .and(query_param("limit", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 3,
                "results": [
                    volume("0c5ba4f8-1c2e-4a0b-9d7b-52b1d3b0c111", "a"),
                    volume(VOLUME_ID, "b")
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let volumes = client(&server)
            .list_all(&VolumeListParams::default())
            .await
            .unwrap();

        let names: Vec<_> = volumes.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_list_is_lazy() {
        let server = MockServer::start().await;
        let client = client(&server);

        let pager = client.list(&VolumeListParams::default()).unwrap();
        drop(pager);

        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(VOLUME_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such volume"))
            .mount(&server)
            .await;

        let err = client(&server).get(volume_id()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_waits_and_fetches_created_volume() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/volumes/1/76"))
            .and(body_json(json!({"source": "new-volume", "name": "data", "size": 10})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tasks": ["t-1"]})))
            .expect(1)
            .mount(&server)
            .await;
        mount_task(
            &server,
            "t-1",
            json!({
                "id": "t-1",
                "state": "FINISHED",
                "created_resources": {"volumes": [VOLUME_ID]}
            }),
        )
        .await;
        Mock::given(method("GET"))
            .and(path(VOLUME_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(volume(VOLUME_ID, "data")))
            .mount(&server)
            .await;

        let outcome = client(&server)
            .create(&CreateVolumeRequest::new_volume("data", 10), wait())
            .await
            .unwrap();

        let created = outcome.completed().unwrap();
        assert_eq!(created.id, volume_id());
        assert_eq!(created.name, "data");
    }

    #[tokio::test]
    async fn test_create_without_wait_returns_tasks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/volumes/1/76"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tasks": ["t-1"]})))
            .mount(&server)
            .await;

        let outcome = client(&server)
            .create(&CreateVolumeRequest::new_volume("data", 10), None)
            .await
            .unwrap();

        assert_eq!(
            outcome.submitted().unwrap().tasks,
            vec![TaskId::from("t-1")]
        );
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_request_without_io() {
        let server = MockServer::start().await;

        let err = client(&server)
            .create(&CreateVolumeRequest::new_volume("", 10), wait())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ValidationError(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_missing_created_resource() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/volumes/1/76"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tasks": ["t-1"]})))
            .mount(&server)
            .await;
        mount_task(
            &server,
            "t-1",
            json!({"id": "t-1", "state": "FINISHED", "created_resources": {"ports": []}}),
        )
        .await;

        let err = client(&server)
            .create(&CreateVolumeRequest::new_volume("data", 10), wait())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingCreatedResource { key, .. } if key == "volumes"));
    }

    #[tokio::test]
    async fn test_delete_confirmed_when_volume_gone() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(VOLUME_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tasks": ["t-del"]})))
            .expect(1)
            .mount(&server)
            .await;
        mount_task(&server, "t-del", json!({"id": "t-del", "state": "FINISHED"})).await;
        Mock::given(method("GET"))
            .and(path(VOLUME_PATH))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let outcome = client(&server).delete(volume_id(), wait()).await;
        assert_ok!(outcome);
    }

    #[tokio::test]
    async fn test_delete_fails_when_volume_remains() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(VOLUME_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tasks": ["t-del"]})))
            .mount(&server)
            .await;
        mount_task(&server, "t-del", json!({"id": "t-del", "state": "FINISHED"})).await;
        Mock::given(method("GET"))
            .and(path(VOLUME_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(volume(VOLUME_ID, "data")))
            .mount(&server)
            .await;

        let err = client(&server).delete(volume_id(), wait()).await.unwrap_err();
        assert_eq!(err, Error::ResourceStillExists(VOLUME_ID.to_string()));
    }

    #[tokio::test]
    async fn test_extend_posts_size_and_returns_volume() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{VOLUME_PATH}/extend")))
            .and(body_json(json!({"size": 20})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tasks": ["t-ext"]})))
            .expect(1)
            .mount(&server)
            .await;
        mount_task(&server, "t-ext", json!({"id": "t-ext", "state": "FINISHED"})).await;
        let mut grown = volume(VOLUME_ID, "data");
        grown["size"] = json!(20);
        Mock::given(method("GET"))
            .and(path(VOLUME_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(grown))
            .mount(&server)
            .await;

        let volume = client(&server)
            .extend(volume_id(), 20, wait())
            .await
            .unwrap()
            .completed()
            .unwrap();
        assert_eq!(volume.size, 20);
    }

    #[tokio::test]
    async fn test_retype_failure_surfaces_task_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{VOLUME_PATH}/retype")))
            .and(body_json(json!({"volume_type": "ssd_hiiops"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tasks": ["t-rt"]})))
            .mount(&server)
            .await;
        mount_task(
            &server,
            "t-rt",
            json!({"id": "t-rt", "state": "ERROR", "error": "volume is attached"}),
        )
        .await;

        let err = client(&server)
            .retype(volume_id(), VolumeType::SsdHiIops, wait())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::TaskFailed {
                task_id: "t-rt".into(),
                detail: "volume is attached".into()
            }
        );
    }

    #[tokio::test]
    async fn test_rename_patches_name() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(VOLUME_PATH))
            .and(body_json(json!({"name": "renamed"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(volume(VOLUME_ID, "renamed")))
            .expect(1)
            .mount(&server)
            .await;

        let volume = client(&server).rename(volume_id(), "renamed").await.unwrap();
        assert_eq!(volume.name, "renamed");
    }

    #[test]
    fn test_default_wait_follows_config() {
        let client = VolumesClientBuilder::new("https://api.example.com", 1, 1)
            .unwrap()
            .with_task_wait(TaskWaitConfig::new().no_wait())
            .build()
            .unwrap();
        assert!(client.default_wait().is_none());
    }
}
