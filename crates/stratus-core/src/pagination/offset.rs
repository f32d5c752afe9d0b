//! Offset-style pages: `{"count": N, "results": [...]}` addressed by `?offset=&limit=`.

use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use url::Url;

use super::{Page, PageResult};
use crate::decode::{count_results, extract_count, extract_results};
use crate::error::Result;
use crate::query::{numeric_query_param, replace_query_param};

/// Query parameter carrying the offset of the first item.
pub const OFFSET_PARAM: &str = "offset";

/// Query parameter carrying the page size.
pub const LIMIT_PARAM: &str = "limit";

/// Page whose continuation is the request offset advanced by the items returned.
#[derive(Debug, Clone)]
pub struct OffsetPage<T> {
    result: PageResult,
    _item: PhantomData<fn() -> T>,
}

impl<T> OffsetPage<T> {
    /// Wrap a fetched page. Usable directly as a pager factory.
    #[must_use]
    pub fn new(result: PageResult) -> Self {
        Self {
            result,
            _item: PhantomData,
        }
    }

    /// Offset this page was requested at (`0` when absent).
    #[must_use]
    pub fn offset(&self) -> u64 {
        numeric_query_param(&self.result.url, OFFSET_PARAM).unwrap_or(0)
    }

    /// Total count reported by the server, if any.
    ///
    /// # Errors
    ///
    /// Returns a decode error if `count` is present but malformed.
    pub fn total_count(&self) -> Result<Option<u64>> {
        extract_count(&self.result.body)
    }
}

impl<T> Page for OffsetPage<T>
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
        let returned = count_results(&self.result.body)? as u64;
        if returned == 0 {
            return Ok(None);
        }

        let offset = self.offset();
        let next_offset = offset + returned;

        match self.total_count()? {
            Some(total) if next_offset >= total => return Ok(None),
            Some(_) => {}
            // Without a count, a short page is the last one.
            None => {
                let limit = numeric_query_param(&self.result.url, LIMIT_PARAM);
                if limit.map_or(true, |limit| returned < limit) {
                    return Ok(None);
                }
            }
        }

        Ok(Some(replace_query_param(
            &self.result.url,
            OFFSET_PARAM,
            &next_offset.to_string(),
        )))
    }

    fn items(&self) -> Result<Vec<T>> {
        extract_results(&self.result.body)
    }
}
