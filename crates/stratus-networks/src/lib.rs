//! Private network client for the Stratus cloud API.
//!
//! Networks are listed through link-style pagination. Creating a network may spawn
//! several tasks (network, then optional router); the client waits for all of them and
//! reads the new network from the last one.

#![deny(missing_docs)]

pub mod client;
pub mod models;

pub use client::{NetworksClient, NetworksClientBuilder};
pub use models::{
    CreateNetworkRequest, Network, NetworkListParams, NetworkType, RenameNetworkRequest,
};

/// Convenient result alias that reuses the shared Stratus error type.
pub type Result<T> = stratus_core::Result<T>;
