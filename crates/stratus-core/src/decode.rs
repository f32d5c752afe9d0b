//! Typed decoding of JSON response envelopes.
//!
//! List responses wrap their items as `{"count": N, "results": [...]}` or
//! `{"results": [...], "links": [...]}`. These helpers strip the envelope and decode the
//! payload into a caller-chosen type; a missing or malformed field is always a
//! [`Error::Decode`], never an empty success.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Envelope field holding the item array.
pub const RESULTS_LABEL: &str = "results";

/// Envelope field holding the total item count.
pub const COUNT_LABEL: &str = "count";

/// Envelope field holding continuation links.
pub const LINKS_LABEL: &str = "links";

/// Relation marking the forward-continuation link.
pub const NEXT_REL: &str = "next";

/// A `{rel, href}` continuation link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Link relation (`next`, `self`, ...)
    pub rel: String,
    /// Target URL, absolute or relative to the current page
    pub href: String,
}

/// Decode the whole body into `T`.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the body does not match `T`.
pub fn extract_result<T>(body: Value) -> Result<T>
where
    T: DeserializeOwned,
{
    serde_json::from_value(body)
        .map_err(|err| Error::Decode(format!("Failed to decode response body: {err}")))
}

/// Decode the array stored under `label` into `Vec<T>`.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the body is not an object, the field is absent, or an item
/// does not match `T`.
pub fn extract_into_slice<T>(body: &Value, label: &str) -> Result<Vec<T>>
where
    T: DeserializeOwned,
{
    let field = body
        .get(label)
        .ok_or_else(|| Error::Decode(format!("Response body has no `{label}` field")))?;

    if !field.is_array() {
        return Err(Error::Decode(format!("Field `{label}` is not an array")));
    }

    Vec::<T>::deserialize(field)
        .map_err(|err| Error::Decode(format!("Failed to decode `{label}`: {err}")))
}

/// Length of the array stored under `label`, without decoding its items.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the field is absent or not an array.
pub fn slice_len(body: &Value, label: &str) -> Result<usize> {
    body.get(label)
        .ok_or_else(|| Error::Decode(format!("Response body has no `{label}` field")))?
        .as_array()
        .map(Vec::len)
        .ok_or_else(|| Error::Decode(format!("Field `{label}` is not an array")))
}

/// Number of entries in the `results` array.
///
/// # Errors
///
/// See [`slice_len`].
pub fn count_results(body: &Value) -> Result<usize> {
    slice_len(body, RESULTS_LABEL)
}

/// Decode the `results` array into `Vec<T>`.
///
/// # Errors
///
/// See [`extract_into_slice`].
pub fn extract_results<T>(body: &Value) -> Result<Vec<T>>
where
    T: DeserializeOwned,
{
    extract_into_slice(body, RESULTS_LABEL)
}

/// Read the `count` field, if present.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the field is present but not a non-negative integer.
pub fn extract_count(body: &Value) -> Result<Option<u64>> {
    match body.get(COUNT_LABEL) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| Error::Decode(format!("Field `{COUNT_LABEL}` is not a count: {value}"))),
    }
}

/// Decode the `links` array; an absent field means no links.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the field is present but malformed.
pub fn extract_links(body: &Value) -> Result<Vec<Link>> {
    match body.get(LINKS_LABEL) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(_) => extract_into_slice(body, LINKS_LABEL),
    }
}

/// Return the href of the first `next` link.
#[must_use]
pub fn next_href(links: &[Link]) -> Option<&str> {
    links
        .iter()
        .find(|link| link.rel == NEXT_REL)
        .map(|link| link.href.as_str())
}

/// Deserialize an optional timestamp that may or may not carry a UTC offset.
///
/// The API emits both RFC 3339 (`2024-05-01T10:00:00+00:00`) and naive
/// (`2024-05-01T10:00:00.123456`) forms; naive values are read as UTC.
///
/// # Errors
///
/// Returns a deserialization error for strings in neither form.
pub fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| Some(naive.and_utc()))
        .map_err(|err| serde::de::Error::custom(format!("invalid timestamp `{raw}`: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: String,
    }

    #[test]
    fn extract_results_strips_envelope() {
        let body = json!({"count": 2, "results": [{"id": "a"}, {"id": "b"}]});
        let items: Vec<Item> = extract_results(&body).unwrap();
        assert_eq!(
            items,
            vec![Item { id: "a".into() }, Item { id: "b".into() }]
        );
    }

    #[test]
    fn missing_results_is_decode_error() {
        let body = json!({"count": 2});
        let err = extract_results::<Item>(&body).unwrap_err();
        assert!(matches!(err, Error::Decode(msg) if msg.contains("results")));
    }

    #[test]
    fn non_array_results_is_decode_error() {
        let body = json!({"results": {"id": "a"}});
        assert!(matches!(
            extract_results::<Item>(&body),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn mistyped_item_is_decode_error() {
        let body = json!({"results": [{"id": 5}]});
        assert!(matches!(
            extract_results::<Item>(&body),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn count_results_checks_shape_only() {
        assert_eq!(count_results(&json!({"results": [{"id": 5}, {}]})).unwrap(), 2);
        assert_eq!(count_results(&json!({"count": 4, "results": []})).unwrap(), 0);
        assert!(matches!(
            count_results(&json!({"count": 4})),
            Err(Error::Decode(_))
        ));
        assert!(matches!(
            count_results(&json!({"results": "a"})),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn extract_count_variants() {
        assert_eq!(extract_count(&json!({"count": 3})).unwrap(), Some(3));
        assert_eq!(extract_count(&json!({})).unwrap(), None);
        assert!(extract_count(&json!({"count": "three"})).is_err());
    }

    #[test]
    fn extract_links_and_next() {
        let body = json!({
            "results": [],
            "links": [
                {"rel": "self", "href": "/v1/networks/1/1?page=1"},
                {"rel": "next", "href": "/v1/networks/1/1?page=2"}
            ]
        });
        let links = extract_links(&body).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(next_href(&links), Some("/v1/networks/1/1?page=2"));
        assert!(extract_links(&json!({"results": []})).unwrap().is_empty());
        assert!(extract_links(&json!({"links": "nope"})).is_err());
    }

    #[derive(Debug, Deserialize)]
    struct Stamped {
        #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
        at: Option<DateTime<Utc>>,
    }

    #[test]
    fn timestamps_with_and_without_offset() {
        let with_offset: Stamped =
            serde_json::from_value(json!({"at": "2024-05-01T10:00:00+02:00"})).unwrap();
        let naive: Stamped =
            serde_json::from_value(json!({"at": "2024-05-01T08:00:00.000000"})).unwrap();
        assert_eq!(with_offset.at, naive.at);

        let missing: Stamped = serde_json::from_value(json!({})).unwrap();
        assert!(missing.at.is_none());
        let null: Stamped = serde_json::from_value(json!({"at": null})).unwrap();
        assert!(null.at.is_none());

        assert!(serde_json::from_value::<Stamped>(json!({"at": "yesterday"})).is_err());
    }

    #[test]
    fn extract_result_decodes_whole_body() {
        let item: Item = extract_result(json!({"id": "x"})).unwrap();
        assert_eq!(item.id, "x");
        assert!(extract_result::<Item>(json!([])).is_err());
    }
}
