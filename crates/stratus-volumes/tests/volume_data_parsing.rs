//! Integration tests for parsing volume list payloads.

use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use stratus_core::pagination::{OffsetPage, Page, PageResult};
use stratus_volumes::models::{Volume, VolumeType};
use url::Url;

/// Get the path to the test fixtures directory.
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Load the volume list fixture from disk.
fn load_volume_list_fixture() -> Value {
    let fixture_path = fixtures_dir().join("volume_list.json");
    let json_data = fs::read_to_string(&fixture_path).unwrap_or_else(|e| {
        panic!(
            "Failed to read volume list fixture at {}: {}",
            fixture_path.display(),
            e
        )
    });
    serde_json::from_str(&json_data).expect("fixture is valid JSON")
}

fn fixture_page() -> OffsetPage<Volume> {
    let url = Url::parse("https://api.example.com/v1/volumes/1/76?limit=3").unwrap();
    OffsetPage::new(PageResult::new(url, load_volume_list_fixture()))
}

#[test]
fn test_deserialize_volume_list() {
    let volumes = fixture_page()
        .items()
        .unwrap_or_else(|e| panic!("Failed to deserialize volume list: {e}"));

    assert_eq!(volumes.len(), 3, "Expected 3 volumes in test data");

    let boot = &volumes[0];
    assert!(boot.bootable);
    assert!(boot.is_attached());
    assert_eq!(boot.kind(), Some(VolumeType::SsdHiIops));
    assert_eq!(boot.attachments[0].device.as_deref(), Some("/dev/vda"));
    assert_eq!(boot.metadata.get("role").map(String::as_str), Some("boot"));
    assert!(boot.created_at.unwrap() < boot.updated_at.unwrap());

    let data = &volumes[1];
    assert_eq!(data.size, 200);
    assert_eq!(data.snapshot_ids.len(), 1);
    assert!(data.updated_at.is_none());

    let archive = &volumes[2];
    assert_eq!(archive.kind(), Some(VolumeType::Cold));
    assert!(archive.attachments.is_empty());
    assert!(archive.metadata.is_empty());
}

#[test]
fn test_full_count_page_is_last() {
    let page = fixture_page();
    assert_eq!(page.total_count().unwrap(), Some(3));
    assert!(!page.is_empty().unwrap());
    assert!(page.next_page_url().unwrap().is_none());
}
