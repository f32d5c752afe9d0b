//! # stratus-core
//!
//! Core building blocks for Stratus cloud API clients.
//!
//! This crate provides the HTTP transport, error handling, configuration, pagination and
//! task-waiting machinery shared by every resource client.
//!
//! ## Modules
//!
//! - [`error`] - Error types and HTTP status code mapping
//! - [`client`] - HTTP transport, retry policy and the [`client::ApiTransport`] seam
//! - [`config`] - Configuration structures for Stratus clients
//! - [`decode`] - Typed decoding of response envelopes
//! - [`ids`] - Strongly-typed UUID wrappers for Stratus resources
//! - [`pagination`] - Lazy pager over link-style and offset-style list endpoints
//! - [`query`] - Query-string construction helpers
//! - [`tasks`] - Polling protocol for asynchronous server-side tasks
//! - [`types`] - Resource families and URL construction

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod ids;
pub mod pagination;
pub mod query;
pub mod tasks;
pub mod types;

// Re-export commonly used types
pub use client::{ApiTransport, ServiceClient, ServiceClientBuilder};
pub use error::{Error, Result};
pub use pagination::{LinkedPage, OffsetPage, Page, PageResult, Pager, PagerState};
pub use tasks::{
    confirm_deleted, Task, TaskId, TaskOutcome, TaskResults, TaskState, TaskWaiter, WaitOptions,
};
