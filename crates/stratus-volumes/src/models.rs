//! Volume models and request payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use stratus_core::decode::deserialize_optional_timestamp;
use stratus_core::ids::{ImageId, InstanceId, SnapshotId, VolumeId};
use stratus_core::query::QueryParams;
use stratus_core::Error;
use validator::{Validate, ValidationError};

/// Largest volume the API accepts, in GiB.
pub const MAX_VOLUME_SIZE_GIB: u64 = 16_384;

/// Storage class of a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeType {
    /// Network HDD storage
    #[serde(rename = "standard")]
    Standard,
    /// High-IOPS SSD storage
    #[serde(rename = "ssd_hiiops")]
    SsdHiIops,
    /// Low-latency local SSD storage
    #[serde(rename = "ssd_lowlatency")]
    SsdLowLatency,
    /// Archive storage
    #[serde(rename = "cold")]
    Cold,
    /// Highest-throughput SSD storage
    #[serde(rename = "ultra")]
    Ultra,
}

impl VolumeType {
    /// Wire name of the type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::SsdHiIops => "ssd_hiiops",
            Self::SsdLowLatency => "ssd_lowlatency",
            Self::Cold => "cold",
            Self::Ultra => "ultra",
        }
    }
}

impl FromStr for VolumeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "ssd_hiiops" => Ok(Self::SsdHiIops),
            "ssd_lowlatency" => Ok(Self::SsdLowLatency),
            "cold" => Ok(Self::Cold),
            "ultra" => Ok(Self::Ultra),
            _ => Err(Error::InvalidRequest(format!("Unknown volume type: {s}"))),
        }
    }
}

impl fmt::Display for VolumeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a new volume is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeSource {
    /// Empty volume
    #[serde(rename = "new-volume")]
    NewVolume,
    /// Copy of an image
    #[serde(rename = "image")]
    Image,
    /// Restore of a snapshot
    #[serde(rename = "snapshot")]
    Snapshot,
}

impl VolumeSource {
    /// Wire name of the source.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NewVolume => "new-volume",
            Self::Image => "image",
            Self::Snapshot => "snapshot",
        }
    }
}

impl FromStr for VolumeSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new-volume" => Ok(Self::NewVolume),
            "image" => Ok(Self::Image),
            "snapshot" => Ok(Self::Snapshot),
            _ => Err(Error::InvalidRequest(format!("Unknown volume source: {s}"))),
        }
    }
}

impl fmt::Display for VolumeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filters supported by the volume list endpoint.
#[derive(Debug, Default, Clone)]
pub struct VolumeListParams {
    /// Only volumes attached to this instance.
    pub instance_id: Option<InstanceId>,
    /// Filter on bootable flag.
    pub bootable: Option<bool>,
    /// Filter on whether the volume is attached anywhere.
    pub has_attachments: Option<bool>,
    /// Substring match on the volume name.
    pub name_part: Option<String>,
    /// Only volumes carrying every listed metadata key.
    pub metadata_keys: Vec<String>,
    /// Page size; the client default applies when unset.
    pub limit: Option<u32>,
    /// Offset of the first volume.
    pub offset: Option<u32>,
}

impl VolumeListParams {
    /// Convert the parameters into URL query pairs.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut params = QueryParams::new();
        params.push_opt("instance_id", self.instance_id.as_ref());
        params.push_opt("bootable", self.bootable);
        params.push_opt("has_attachments", self.has_attachments);
        params.push_opt("name_part", self.name_part.as_deref());
        params.push_all("metadata_k", &self.metadata_keys);
        params.push_opt("limit", self.limit);
        params.push_opt("offset", self.offset);

        params.into_pairs()
    }
}

/// Attachment of a volume to an instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolumeAttachment {
    /// Instance the volume is attached to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<InstanceId>,
    /// Attachment record ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<String>,
    /// Guest device path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// When the attachment was made.
    #[serde(
        default,
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub attached_at: Option<DateTime<Utc>>,
}

/// A block-storage volume as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Volume {
    /// Volume ID.
    pub id: VolumeId,
    /// Display name.
    pub name: String,
    /// Size in GiB.
    pub size: u64,
    /// Lifecycle status (`available`, `in-use`, `creating`, ...).
    pub status: String,
    /// Storage class as reported; see [`Volume::kind`].
    pub volume_type: String,
    /// Whether the volume can boot an instance.
    #[serde(default)]
    pub bootable: bool,
    /// Current attachments.
    #[serde(default)]
    pub attachments: Vec<VolumeAttachment>,
    /// Project scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,
    /// Region scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<u64>,
    /// Region display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Snapshots taken of this volume.
    #[serde(default)]
    pub snapshot_ids: Vec<SnapshotId>,
    /// Key/value metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
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

impl Volume {
    /// Storage class, if it is one this client knows.
    #[must_use]
    pub fn kind(&self) -> Option<VolumeType> {
        self.volume_type.parse().ok()
    }

    /// Whether the volume is attached to any instance.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// Payload for creating a volume.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_source"))]
pub struct CreateVolumeRequest {
    /// What the volume is built from.
    pub source: VolumeSource,
    /// Display name.
    #[validate(length(min = 1, max = 63))]
    pub name: String,
    /// Size in GiB; optional only when restoring a snapshot.
    #[validate(range(min = 1, max = 16384))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Storage class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<VolumeType>,
    /// Image to copy, for [`VolumeSource::Image`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<ImageId>,
    /// Snapshot to restore, for [`VolumeSource::Snapshot`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<SnapshotId>,
    /// Instance to attach the volume to once created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id_to_attach_to: Option<InstanceId>,
    /// Key/value metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl CreateVolumeRequest {
    fn with_source(source: VolumeSource, name: impl Into<String>) -> Self {
        Self {
            source,
            name: name.into(),
            size: None,
            type_name: None,
            image_id: None,
            snapshot_id: None,
            instance_id_to_attach_to: None,
            metadata: HashMap::new(),
        }
    }

    /// Empty volume of `size` GiB.
    #[must_use]
    pub fn new_volume(name: impl Into<String>, size: u64) -> Self {
        Self {
            size: Some(size),
            ..Self::with_source(VolumeSource::NewVolume, name)
        }
    }

    /// Volume of `size` GiB holding a copy of `image_id`.
    #[must_use]
    pub fn from_image(name: impl Into<String>, image_id: ImageId, size: u64) -> Self {
        Self {
            size: Some(size),
            image_id: Some(image_id),
            ..Self::with_source(VolumeSource::Image, name)
        }
    }

    /// Volume restored from `snapshot_id` at the snapshot's size.
    #[must_use]
    pub fn from_snapshot(name: impl Into<String>, snapshot_id: SnapshotId) -> Self {
        Self {
            snapshot_id: Some(snapshot_id),
            ..Self::with_source(VolumeSource::Snapshot, name)
        }
    }

    /// Set the storage class.
    #[must_use]
    pub fn with_type(mut self, volume_type: VolumeType) -> Self {
        self.type_name = Some(volume_type);
        self
    }

    /// Attach to `instance` after creation.
    #[must_use]
    pub fn attach_to(mut self, instance: InstanceId) -> Self {
        self.instance_id_to_attach_to = Some(instance);
        self
    }

    /// Add a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

fn validate_source(request: &CreateVolumeRequest) -> Result<(), ValidationError> {
    let consistent = match request.source {
        VolumeSource::NewVolume => {
            request.size.is_some() && request.image_id.is_none() && request.snapshot_id.is_none()
        }
        VolumeSource::Image => {
            request.size.is_some() && request.image_id.is_some() && request.snapshot_id.is_none()
        }
        VolumeSource::Snapshot => request.snapshot_id.is_some() && request.image_id.is_none(),
    };

    if consistent {
        Ok(())
    } else {
        Err(ValidationError::new("source_mismatch"))
    }
}

/// Payload for growing a volume.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExtendVolumeRequest {
    /// New size in GiB.
    #[validate(range(min = 1, max = 16384))]
    pub size: u64,
}

/// Payload for changing a volume's storage class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetypeVolumeRequest {
    /// Target storage class.
    pub volume_type: VolumeType,
}

/// Payload for renaming a volume.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RenameVolumeRequest {
    /// New display name.
    #[validate(length(min = 1, max = 63))]
    pub name: String,
}
