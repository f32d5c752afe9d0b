//! Block-storage volume client for the Stratus cloud API.
//!
//! Volumes are listed through offset-style pagination and mutated through asynchronous
//! tasks; every mutating call can either wait for its task or return the task IDs.

#![deny(missing_docs)]

pub mod client;
pub mod models;

pub use client::{VolumesClient, VolumesClientBuilder};
pub use models::{
    CreateVolumeRequest, ExtendVolumeRequest, RenameVolumeRequest, RetypeVolumeRequest, Volume,
    VolumeAttachment, VolumeListParams, VolumeSource, VolumeType,
};

/// Convenient result alias that reuses the shared Stratus error type.
pub type Result<T> = stratus_core::Result<T>;
