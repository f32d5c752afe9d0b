//! Network models and request payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use stratus_core::decode::deserialize_optional_timestamp;
use stratus_core::ids::{NetworkId, SubnetId};
use stratus_core::query::QueryParams;
use stratus_core::Error;
use validator::Validate;

/// Segmentation technology backing a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    /// 802.1Q VLAN
    Vlan,
    /// VXLAN overlay
    Vxlan,
}

impl NetworkType {
    /// Wire name of the type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Vlan => "vlan",
            Self::Vxlan => "vxlan",
        }
    }
}

impl FromStr for NetworkType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vlan" => Ok(Self::Vlan),
            "vxlan" => Ok(Self::Vxlan),
            _ => Err(Error::InvalidRequest(format!("Unknown network type: {s}"))),
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filters supported by the network list endpoint.
#[derive(Debug, Default, Clone)]
pub struct NetworkListParams {
    /// Only networks carrying every listed metadata key.
    pub metadata_keys: Vec<String>,
    /// Sort order, e.g. `created_at.desc`.
    pub order_by: Option<String>,
    /// Page size; the client default applies when unset.
    pub limit: Option<u32>,
}

impl NetworkListParams {
    /// Convert the parameters into URL query pairs.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut params = QueryParams::new();
        params.push_all("metadata_k", &self.metadata_keys);
        params.push_opt("order_by", self.order_by.as_deref());
        params.push_opt("limit", self.limit);

        params.into_pairs()
    }
}

/// A private network as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Network {
    /// Network ID.
    pub id: NetworkId,
    /// Display name.
    pub name: String,
    /// Segmentation type as reported; see [`Network::kind`].
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,
    /// MTU in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    /// VLAN or VNI number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation_id: Option<u32>,
    /// Whether the network is routed to the public internet.
    #[serde(default)]
    pub external: bool,
    /// Whether this is the project's default network.
    #[serde(default)]
    pub default: bool,
    /// Whether the network is shared across projects.
    #[serde(default)]
    pub shared: bool,
    /// Subnets carved from this network.
    #[serde(default)]
    pub subnets: Vec<SubnetId>,
    /// Key/value metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Project scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,
    /// Region scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<u64>,
    /// Region display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Creation time.
    #[serde(
        default,
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(
        default,
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Network {
    /// Segmentation type, if it is one this client knows.
    #[must_use]
    pub fn kind(&self) -> Option<NetworkType> {
        self.network_type.as_deref().and_then(|raw| raw.parse().ok())
    }
}

/// Payload for creating a network.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateNetworkRequest {
    /// Display name.
    #[validate(length(min = 1, max = 63))]
    pub name: String,
    /// Segmentation type.
    #[serde(rename = "type")]
    pub network_type: NetworkType,
    /// Also create a router attached to the network (spawns an extra task).
    pub create_router: bool,
    /// Key/value metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl CreateNetworkRequest {
    /// VXLAN network with a router.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            network_type: NetworkType::Vxlan,
            create_router: true,
            metadata: HashMap::new(),
        }
    }

    /// Set the segmentation type.
    #[must_use]
    pub const fn with_type(mut self, network_type: NetworkType) -> Self {
        self.network_type = network_type;
        self
    }

    /// Skip router creation.
    #[must_use]
    pub const fn without_router(mut self) -> Self {
        self.create_router = false;
        self
    }

    /// Add a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Payload for renaming a network.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RenameNetworkRequest {
    /// New display name.
    #[validate(length(min = 1, max = 63))]
    pub name: String,
}
