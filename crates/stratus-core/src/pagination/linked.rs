//! Link-style pages: `{"results": [...], "links": [{"rel": "next", "href": ...}]}`.

use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use url::Url;

use super::{Page, PageResult};
use crate::decode::{count_results, extract_links, extract_results, next_href};
use crate::error::{Error, Result};

/// Page whose continuation is an explicit `next` link.
#[derive(Debug, Clone)]
pub struct LinkedPage<T> {
    result: PageResult,
    _item: PhantomData<fn() -> T>,
}

impl<T> LinkedPage<T> {
    /// Wrap a fetched page. Usable directly as a pager factory.
    #[must_use]
    pub fn new(result: PageResult) -> Self {
        Self {
            result,
            _item: PhantomData,
        }
    }
}

impl<T> Page for LinkedPage<T>
where
    T: DeserializeOwned,
{
    type Item = T;

    fn result(&self) -> &PageResult {
        &self.result
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(count_results(&self.result.body)? == 0)
    }

    fn next_page_url(&self) -> Result<Option<Url>> {
        let links = extract_links(&self.result.body)?;
        let Some(href) = next_href(&links) else {
            return Ok(None);
        };

        self.result
            .url
            .join(href)
            .map(Some)
            .map_err(|err| Error::Decode(format!("Invalid next link `{href}`: {err}")))
    }

    fn items(&self) -> Result<Vec<T>> {
        extract_results(&self.result.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Item {
        id: String,
    }

    fn page(body: serde_json::Value) -> LinkedPage<Item> {
        let url = Url::parse("https://api.example.com/v1/networks/1/1?page=1").unwrap();
        LinkedPage::new(PageResult::new(url, body))
    }

    #[test]
    fn relative_next_link_resolves_against_page_url() {
        let page = page(json!({
            "results": [{"id": "a"}],
            "links": [{"rel": "next", "href": "/v1/networks/1/1?page=2"}]
        }));
        assert_eq!(
            page.next_page_url().unwrap().unwrap().as_str(),
            "https://api.example.com/v1/networks/1/1?page=2"
        );
        assert_eq!(page.items().unwrap()[0].id, "a");
    }

    #[test]
    fn absolute_next_link_is_used_verbatim() {
        let page = page(json!({
            "results": [{"id": "a"}],
            "links": [{"rel": "next", "href": "https://other.example.com/p2"}]
        }));
        assert_eq!(
            page.next_page_url().unwrap().unwrap().as_str(),
            "https://other.example.com/p2"
        );
    }

    #[test]
    fn no_next_link_is_last_page() {
        let page = page(json!({
            "results": [{"id": "a"}],
            "links": [{"rel": "self", "href": "/v1/networks/1/1?page=1"}]
        }));
        assert!(page.next_page_url().unwrap().is_none());
        assert!(!page.is_empty().unwrap());
    }

    #[test]
    fn empty_results_is_empty_page() {
        let page = page(json!({"results": [], "links": []}));
        assert!(page.is_empty().unwrap());
    }

    #[test]
    fn malformed_links_is_decode_error() {
        let page = page(json!({"results": [], "links": [{"href": 3}]}));
        assert!(matches!(page.next_page_url(), Err(Error::Decode(_))));
    }
}
