//! Core Stratus domain types.
//!
//! This module enumerates the API's resource families and builds the project/region
//! scoped URLs every resource crate talks to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::config::StratusClientConfig;
use crate::error::{Error, Result};

/// Path segment of the task status endpoint.
pub const TASKS_SEGMENT: &str = "tasks";

/// Resource families exposed by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceFamily {
    /// Block-storage volumes
    Volumes,
    /// Private networks
    Networks,
    /// Subnets of a network
    Subnets,
    /// Compute instances
    Instances,
    /// Load balancers
    LoadBalancers,
    /// Security groups
    SecurityGroups,
    /// File shares
    FileShares,
    /// GPU clusters
    GpuClusters,
    /// Volume snapshots
    Snapshots,
}

impl ResourceFamily {
    /// Returns the URL path segment for the family.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Volumes => "volumes",
            Self::Networks => "networks",
            Self::Subnets => "subnets",
            Self::Instances => "instances",
            Self::LoadBalancers => "loadbalancers",
            Self::SecurityGroups => "securitygroups",
            Self::FileShares => "file_shares",
            Self::GpuClusters => "gpu_clusters",
            Self::Snapshots => "snapshots",
        }
    }

    /// Returns all resource families.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Volumes,
            Self::Networks,
            Self::Subnets,
            Self::Instances,
            Self::LoadBalancers,
            Self::SecurityGroups,
            Self::FileShares,
            Self::GpuClusters,
            Self::Snapshots,
        ]
    }

    /// Key under which a finished task reports IDs of this family in `created_resources`.
    #[must_use]
    pub const fn created_resources_key(&self) -> &'static str {
        self.name()
    }
}

impl FromStr for ResourceFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "volumes" => Ok(Self::Volumes),
            "networks" => Ok(Self::Networks),
            "subnets" => Ok(Self::Subnets),
            "instances" => Ok(Self::Instances),
            "loadbalancers" => Ok(Self::LoadBalancers),
            "securitygroups" => Ok(Self::SecurityGroups),
            "file_shares" => Ok(Self::FileShares),
            "gpu_clusters" => Ok(Self::GpuClusters),
            "snapshots" => Ok(Self::Snapshots),
            _ => Err(Error::InvalidRequest(format!("Unknown resource family: {s}"))),
        }
    }
}

impl fmt::Display for ResourceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Builder for `{base}/{version}/{family}/{project}/{region}/...` URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePath {
    api_version: String,
    family: ResourceFamily,
    project_id: u64,
    region_id: u64,
}

impl ResourcePath {
    /// Create a path builder for a family within a project/region scope.
    #[must_use]
    pub fn new(
        api_version: impl Into<String>,
        family: ResourceFamily,
        project_id: u64,
        region_id: u64,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            family,
            project_id,
            region_id,
        }
    }

    /// Create a path builder from a client configuration.
    #[must_use]
    pub fn from_config(config: &StratusClientConfig, family: ResourceFamily) -> Self {
        Self::new(
            config.api_version.clone(),
            family,
            config.project_id,
            config.region_id,
        )
    }

    /// Resource family addressed by this path.
    #[must_use]
    pub const fn family(&self) -> ResourceFamily {
        self.family
    }

    /// Collection URL (`.../{family}/{project}/{region}`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if the URL cannot be joined.
    pub fn collection(&self, base: &Url) -> Result<Url> {
        self.join(base, &[])
    }

    /// Single-resource URL, optionally followed by action segments
    /// (e.g. `[id, "extend"]`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if the URL cannot be joined.
    pub fn resource(&self, base: &Url, segments: &[&str]) -> Result<Url> {
        self.join(base, segments)
    }

    fn join(&self, base: &Url, segments: &[&str]) -> Result<Url> {
        let mut path = format!(
            "{}/{}/{}/{}",
            self.api_version,
            self.family.name(),
            self.project_id,
            self.region_id
        );
        for segment in segments {
            path.push('/');
            path.push_str(segment);
        }
        base.join(&path).map_err(|err| {
            Error::InvalidEndpoint(format!("Invalid resource path `{path}`: {err}"))
        })
    }
}

/// URL of the task status endpoint for `task_id`.
///
/// # Errors
///
/// Returns [`Error::InvalidEndpoint`] if the URL cannot be joined.
pub fn task_url(base: &Url, api_version: &str, task_id: &str) -> Result<Url> {
    let path = format!("{api_version}/{TASKS_SEGMENT}/{task_id}");
    base.join(&path)
        .map_err(|err| Error::InvalidEndpoint(format!("Invalid task path `{path}`: {err}")))
}
