//! Asynchronous task-completion protocol.
//!
//! Mutating calls do not finish synchronously: the API answers with one or more task
//! IDs and the operation runs server-side. [`TaskWaiter`] polls `GET /tasks/{id}` until a
//! task reaches a terminal state or the caller's deadline passes, then hands the task ID
//! to a caller-supplied extractor that turns the finished task into a typed result
//! (usually by reading `created_resources` and fetching the new resource).
//!
//! ```text
//! NEW/RUNNING --poll, non-terminal--> NEW/RUNNING
//! NEW/RUNNING --poll, FINISHED------> FINISHED --extractor--> done
//! NEW/RUNNING --poll, ERROR---------> ERROR    --extractor or TaskFailed--> done/fail
//! NEW/RUNNING --deadline exceeded---> TaskTimeout
//! ```

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::client::ApiTransport;
use crate::config::TaskWaitConfig;
use crate::decode::{deserialize_optional_timestamp, extract_result};
use crate::error::{Error, Result};
use crate::types::task_url;

/// Reported as the last state when a deadline passes before any poll succeeded.
const STATE_NOT_OBSERVED: &str = "NOT_OBSERVED";

/// Stand-in deadline for timeouts too large to add to the current instant.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Opaque server-side task identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wrap a task identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-reported task state.
///
/// Strings the client does not recognise are kept in [`TaskState::Unknown`] and treated
/// as non-terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskState {
    /// Accepted, not yet started
    New,
    /// In progress
    Running,
    /// Completed successfully
    Finished,
    /// Completed with an error
    Error,
    /// Any other server string
    Unknown(String),
}

impl TaskState {
    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::New => "NEW",
            Self::Running => "RUNNING",
            Self::Finished => "FINISHED",
            Self::Error => "ERROR",
            Self::Unknown(raw) => raw,
        }
    }

    /// `FINISHED` and `ERROR` are the only terminal states.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }
}

impl From<String> for TaskState {
    fn from(raw: String) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "NEW" => Self::New,
            "RUNNING" => Self::Running,
            "FINISHED" => Self::Finished,
            "ERROR" => Self::Error,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<TaskState> for String {
    fn from(state: TaskState) -> Self {
        match state {
            TaskState::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loosely-typed map of resources a task created, keyed by resource family.
///
/// Its shape depends on the operation, so it stays dynamic here; extractors ask for the
/// specific key they expect through [`Task::created_ids`] or [`Task::created_resource`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreatedResources(Map<String, Value>);

impl CreatedResources {
    /// Raw value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Keys present in the map.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Whether the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Server-side handle for an in-flight asynchronous operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Task identifier.
    pub id: TaskId,
    /// Current state.
    pub state: TaskState,
    /// Operation kind (e.g. `create_volume`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    /// Resources created by the task, once finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_resources: Option<CreatedResources>,
    /// Server-reported error detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Request that spawned the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Submitting user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    /// Owning client account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<u64>,
    /// Project scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,
    /// Region scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<u64>,
    /// User who acknowledged a failed task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<u64>,
    /// Creation time.
    #[serde(
        default,
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_on: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(
        default,
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_on: Option<DateTime<Utc>>,
    /// Completion time.
    #[serde(
        default,
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub finished_on: Option<DateTime<Utc>>,
    /// Operation-specific request data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Task {
    /// Error detail suitable for surfacing to the caller.
    #[must_use]
    pub fn error_detail(&self) -> String {
        self.error
            .clone()
            .filter(|detail| !detail.is_empty())
            .unwrap_or_else(|| "task reported ERROR without detail".to_string())
    }

    /// Decode the created-resources entry under `key` into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCreatedResource`] if the map or key is absent, and
    /// [`Error::Decode`] if the entry does not match `T`.
    pub fn created_resource<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let value = self
            .created_resources
            .as_ref()
            .and_then(|resources| resources.get(key))
            .filter(|value| !value.is_null())
            .ok_or_else(|| self.missing(key))?;

        T::deserialize(value).map_err(|err| {
            Error::Decode(format!(
                "Task {} created resource `{key}` has unexpected shape: {err}",
                self.id
            ))
        })
    }

    /// IDs listed under `key` in the created resources.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCreatedResource`] if the key is absent, is not a list of
    /// IDs, or lists none.
    pub fn created_ids(&self, key: &str) -> Result<Vec<String>> {
        let ids: Vec<String> = self.created_resource(key).map_err(|err| match err {
            Error::Decode(_) => self.missing(key),
            other => other,
        })?;
        if ids.is_empty() {
            return Err(self.missing(key));
        }
        Ok(ids)
    }

    /// First ID listed under `key`.
    ///
    /// # Errors
    ///
    /// See [`Task::created_ids`].
    pub fn first_created_id(&self, key: &str) -> Result<String> {
        self.created_ids(key)?
            .into_iter()
            .next()
            .ok_or_else(|| self.missing(key))
    }

    fn missing(&self, key: &str) -> Error {
        Error::MissingCreatedResource {
            task_id: self.id.to_string(),
            key: key.to_string(),
        }
    }
}

/// Body returned by every mutating call: `{"tasks": ["...", ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResults {
    /// Spawned task IDs, in execution order.
    pub tasks: Vec<TaskId>,
}

impl TaskResults {
    /// Decode a mutation response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the body has no `tasks` list.
    pub fn from_body(body: Value) -> Result<Self> {
        extract_result(body)
    }

    /// First task ID, if any.
    #[must_use]
    pub fn first(&self) -> Option<&TaskId> {
        self.tasks.first()
    }

    /// Last task ID, if any.
    #[must_use]
    pub fn last(&self) -> Option<&TaskId> {
        self.tasks.last()
    }

    /// Whether no tasks were spawned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Result of a mutation that may or may not have been waited on.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome<T> {
    /// Tasks settled and the extractor produced a value.
    Completed(T),
    /// Caller chose not to wait; the raw task IDs are returned.
    Submitted(TaskResults),
}

impl<T> TaskOutcome<T> {
    /// The completed value, if the caller waited.
    #[must_use]
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Submitted(_) => None,
        }
    }

    /// The submitted task IDs, if the caller did not wait.
    #[must_use]
    pub fn submitted(&self) -> Option<&TaskResults> {
        match self {
            Self::Completed(_) => None,
            Self::Submitted(tasks) => Some(tasks),
        }
    }
}

/// How long and how to wait for a task.
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Maximum time to wait for a single task.
    pub timeout: Duration,
    /// Delay between polls.
    pub poll_interval: Duration,
    /// Fail immediately when a task ends in `ERROR`; otherwise let the extractor decide.
    pub throw_on_api_error: bool,
    /// External cancellation signal.
    pub cancel: Option<CancellationToken>,
}

impl WaitOptions {
    /// Wait up to `timeout`, polling at the default interval.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::from_config(&TaskWaitConfig::default())
        }
    }

    /// Wait up to `seconds` seconds.
    #[must_use]
    pub fn from_secs(seconds: u64) -> Self {
        Self::new(Duration::from_secs(seconds))
    }

    /// Options derived from configuration defaults.
    #[must_use]
    pub fn from_config(config: &TaskWaitConfig) -> Self {
        Self {
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
            throw_on_api_error: true,
            cancel: None,
        }
    }

    /// Options for a mutation under `config`, or `None` when it opts out of waiting.
    #[must_use]
    pub fn configured(config: &TaskWaitConfig) -> Option<Self> {
        config.wait.then(|| Self::from_config(config))
    }

    /// Set the poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Choose whether an `ERROR` task fails the wait or reaches the extractor.
    #[must_use]
    pub const fn with_throw_on_api_error(mut self, throw: bool) -> Self {
        self.throw_on_api_error = throw;
        self
    }

    /// Abort waiting when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::from_config(&TaskWaitConfig::default())
    }
}

/// Polls task status until completion.
#[derive(Clone)]
pub struct TaskWaiter<'a> {
    transport: &'a dyn ApiTransport,
    base_url: Url,
    api_version: String,
}

impl fmt::Debug for TaskWaiter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskWaiter")
            .field("base_url", &self.base_url.as_str())
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl<'a> TaskWaiter<'a> {
    /// Create a waiter that reads tasks from `{base_url}/{api_version}/tasks/{id}`.
    #[must_use]
    pub fn new(
        transport: &'a dyn ApiTransport,
        base_url: &Url,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.clone(),
            api_version: api_version.into(),
        }
    }

    /// Fetch a task by ID.
    ///
    /// # Errors
    ///
    /// Returns transport errors unchanged and [`Error::Decode`] for malformed bodies.
    pub async fn get_task(&self, task_id: &TaskId) -> Result<Task> {
        let url = task_url(&self.base_url, &self.api_version, task_id.as_str())?;
        let body = self.transport.get_json(&url).await?;
        extract_result(body)
    }

    /// Re-fetch a finished task and return the IDs it created under `key`.
    ///
    /// # Errors
    ///
    /// See [`TaskWaiter::get_task`] and [`Task::created_ids`].
    pub async fn created_resource_ids(&self, task_id: &TaskId, key: &str) -> Result<Vec<String>> {
        self.get_task(task_id).await?.created_ids(key)
    }

    /// Poll until the task is terminal.
    ///
    /// Returns the final task. An `ERROR` task is returned as-is when
    /// `throw_on_api_error` is false.
    ///
    /// # Errors
    ///
    /// - [`Error::TaskFailed`] when the task ends in `ERROR` and `throw_on_api_error` is set
    /// - [`Error::TaskTimeout`] when the deadline passes first
    /// - [`Error::Cancelled`] when the cancellation token fires
    /// - any transport or decode error from a poll; polls are not retried here
    pub async fn wait_for_task(&self, task_id: &TaskId, options: &WaitOptions) -> Result<Task> {
        let now = Instant::now();
        let deadline = now.checked_add(options.timeout).unwrap_or(now + FAR_FUTURE);
        let mut last_state: Option<TaskState> = None;
        let mut polls: u32 = 0;

        loop {
            let task = self
                .bounded(task_id, deadline, options, last_state.as_ref(), self.get_task(task_id))
                .await??;
            polls += 1;

            if last_state.as_ref() != Some(&task.state) {
                info!(task_id = %task_id, state = %task.state, polls, "Task state changed");
            }

            match &task.state {
                TaskState::Finished => {
                    debug!(task_id = %task_id, polls, "Task finished");
                    return Ok(task);
                }
                TaskState::Error if options.throw_on_api_error => {
                    warn!(task_id = %task_id, error = ?task.error, "Task failed");
                    return Err(Error::TaskFailed {
                        task_id: task_id.to_string(),
                        detail: task.error_detail(),
                    });
                }
                TaskState::Error => {
                    debug!(task_id = %task_id, "Task failed, deferring to extractor");
                    return Ok(task);
                }
                TaskState::Unknown(raw) => {
                    warn!(task_id = %task_id, state = %raw, "Unrecognised task state");
                }
                TaskState::New | TaskState::Running => {}
            }
            last_state = Some(task.state);

            let now = Instant::now();
            if now >= deadline {
                return Err(timeout_error(task_id, last_state.as_ref()));
            }
            let pause = options.poll_interval.min(deadline - now);
            self.bounded(task_id, deadline + pause, options, last_state.as_ref(), sleep(pause))
                .await?;
        }
    }

    /// Wait for the task, then return whatever `extractor` produces for it.
    ///
    /// # Errors
    ///
    /// Any error from [`TaskWaiter::wait_for_task`], or the extractor's error verbatim.
    pub async fn wait_task_and_return_result<T, F, Fut>(
        &self,
        task_id: &TaskId,
        options: &WaitOptions,
        extractor: F,
    ) -> Result<T>
    where
        F: FnOnce(TaskId) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.wait_for_task(task_id, options).await?;
        extractor(task_id.clone()).await
    }

    /// Wait for each task in turn; the first failure aborts the remaining waits.
    ///
    /// # Errors
    ///
    /// See [`TaskWaiter::wait_for_task`].
    pub async fn wait_for_tasks(
        &self,
        task_ids: &[TaskId],
        options: &WaitOptions,
    ) -> Result<Vec<Task>> {
        let mut finished = Vec::with_capacity(task_ids.len());
        for task_id in task_ids {
            finished.push(self.wait_for_task(task_id, options).await?);
        }
        Ok(finished)
    }

    /// Wait for each task in turn and run the extractor on each.
    ///
    /// # Errors
    ///
    /// The first wait or extractor failure, after which no further task is polled.
    pub async fn wait_tasks_and_return_results<T, F, Fut>(
        &self,
        task_ids: &[TaskId],
        options: &WaitOptions,
        mut extractor: F,
    ) -> Result<Vec<T>>
    where
        F: FnMut(TaskId) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut results = Vec::with_capacity(task_ids.len());
        for task_id in task_ids {
            self.wait_for_task(task_id, options).await?;
            results.push(extractor(task_id.clone()).await?);
        }
        Ok(results)
    }

    /// Settle a mutation according to the caller's wait choice.
    ///
    /// With `wait = None` the task IDs are returned untouched. Otherwise every task is
    /// waited on in order and the extractor runs once, against the last task. Only the
    /// last task may reach the extractor in `ERROR`; an earlier `ERROR` task always fails
    /// the mutation, whatever `throw_on_api_error` says.
    ///
    /// # Errors
    ///
    /// [`Error::Decode`] if the mutation spawned no tasks, [`Error::TaskFailed`] for an
    /// earlier failed task, otherwise as [`TaskWaiter::wait_for_task`] and the extractor.
    pub async fn settle<T, F, Fut>(
        &self,
        tasks: TaskResults,
        wait: Option<&WaitOptions>,
        extractor: F,
    ) -> Result<TaskOutcome<T>>
    where
        F: FnOnce(TaskId) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Some(options) = wait else {
            debug!(tasks = ?tasks.tasks, "Not waiting for tasks");
            return Ok(TaskOutcome::Submitted(tasks));
        };
        let Some((last, earlier)) = tasks.tasks.split_last() else {
            return Err(Error::Decode("Mutation response listed no tasks".to_string()));
        };

        for task_id in earlier {
            let task = self.wait_for_task(task_id, options).await?;
            if task.state == TaskState::Error {
                warn!(task_id = %task_id, error = ?task.error, "Task failed");
                return Err(Error::TaskFailed {
                    task_id: task_id.to_string(),
                    detail: task.error_detail(),
                });
            }
        }
        self.wait_for_task(last, options).await?;
        extractor(last.clone()).await.map(TaskOutcome::Completed)
    }

    async fn bounded<F>(
        &self,
        task_id: &TaskId,
        deadline: Instant,
        options: &WaitOptions,
        last_state: Option<&TaskState>,
        future: F,
    ) -> Result<F::Output>
    where
        F: Future,
    {
        let bounded = timeout_at(deadline, future);
        let outcome = match &options.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    () = token.cancelled() => {
                        info!(task_id = %task_id, "Task wait cancelled");
                        return Err(Error::Cancelled { task_id: task_id.to_string() });
                    }
                    outcome = bounded => outcome,
                }
            }
            None => bounded.await,
        };
        outcome.map_err(|_| timeout_error(task_id, last_state))
    }
}

fn timeout_error(task_id: &TaskId, last_state: Option<&TaskState>) -> Error {
    let last_state = last_state.map_or(STATE_NOT_OBSERVED, TaskState::as_str);
    warn!(task_id = %task_id, last_state, "Timed out waiting for task");
    Error::TaskTimeout {
        task_id: task_id.to_string(),
        last_state: last_state.to_string(),
    }
}

/// Interpret a post-delete fetch of the deleted resource.
///
/// A 404 means the delete took effect; finding the resource is a failure; any other
/// error is passed through.
///
/// # Errors
///
/// [`Error::ResourceStillExists`] if `fetched` is `Ok`, or the fetch error if it is not a
/// 404.
pub fn confirm_deleted<R>(fetched: Result<R>, resource: &str) -> Result<()> {
    match fetched {
        Err(err) if err.is_not_found() => {
            debug!(resource, "Delete confirmed");
            Ok(())
        }
        Ok(_) => Err(Error::ResourceStillExists(resource.to_string())),
        Err(err) => Err(err),
    }
}
