//! Pagination engine shared by every list endpoint.
//!
//! A [`Pager`] walks a paginated collection one `GET` at a time, in the order the server
//! dictates. Each fetched body is handed to a caller-supplied factory that wraps it in a
//! typed [`Page`]; the page alone decides whether it is empty and where the next page
//! lives. Two page shapes are provided:
//!
//! - [`LinkedPage`] follows the `next` entry of a `links` array.
//! - [`OffsetPage`] advances an `offset` query parameter until `count` is reached.
//!
//! Pagers never prefetch and never retry; an error ends iteration and is returned to the
//! caller, who keeps whatever pages were already visited.

mod linked;
mod offset;

pub use linked::LinkedPage;
pub use offset::{OffsetPage, LIMIT_PARAM, OFFSET_PARAM};

use std::collections::HashSet;

use async_stream::try_stream;
use futures::Stream;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::client::ApiTransport;
use crate::error::{Error, Result};

/// Raw page as fetched: the request URL and its decoded JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    /// URL the page was fetched from
    pub url: Url,
    /// Decoded response body
    pub body: Value,
}

impl PageResult {
    /// Create a page result.
    #[must_use]
    pub const fn new(url: Url, body: Value) -> Self {
        Self { url, body }
    }
}

/// One decoded chunk of a paginated list.
pub trait Page: Send + Sized {
    /// Item type stored in the page's `results`.
    type Item;

    /// The raw fetched page.
    fn result(&self) -> &PageResult;

    /// Whether the decoded item slice is empty.
    ///
    /// Implementations count the `results` array rather than trusting an envelope count.
    ///
    /// # Errors
    ///
    /// Returns a decode error if the item slice is malformed.
    fn is_empty(&self) -> Result<bool>;

    /// URL of the following page, or `None` on the last page.
    ///
    /// # Errors
    ///
    /// Returns a decode error if the continuation data is malformed.
    fn next_page_url(&self) -> Result<Option<Url>>;

    /// Decode the page's items.
    ///
    /// # Errors
    ///
    /// Returns a decode error if the item slice is malformed.
    fn items(&self) -> Result<Vec<Self::Item>>;
}

/// Lifecycle of a [`Pager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerState {
    /// Constructed, nothing fetched yet
    Created,
    /// A page request is in flight
    Fetching,
    /// A page was handed to the caller and another may follow
    YieldedPage,
    /// The last page has been seen
    Exhausted,
    /// Iteration stopped on an error
    Errored,
}

impl PagerState {
    /// Whether the pager can make no further requests.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Exhausted | Self::Errored)
    }
}

type PageFactory<'a, P> = Box<dyn Fn(PageResult) -> P + Send + Sync + 'a>;

/// Iterator over a paginated endpoint.
///
/// Consumed by [`Pager::each_page`], [`Pager::all_pages`], [`Pager::all_items`] or
/// [`Pager::into_stream`]; it cannot be reused once exhausted.
pub struct Pager<'a, P> {
    transport: &'a dyn ApiTransport,
    next_url: Option<Url>,
    factory: PageFactory<'a, P>,
    state: PagerState,
    visited: HashSet<Url>,
}

impl<P> std::fmt::Debug for Pager<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pager")
            .field("next_url", &self.next_url.as_ref().map(Url::as_str))
            .field("state", &self.state)
            .field("visited", &self.visited.len())
            .finish_non_exhaustive()
    }
}

impl<'a, P> Pager<'a, P>
where
    P: Page,
{
    /// Create a pager starting at `initial_url`. Performs no I/O.
    #[must_use]
    pub fn new<F>(transport: &'a dyn ApiTransport, initial_url: Url, factory: F) -> Self
    where
        F: Fn(PageResult) -> P + Send + Sync + 'a,
    {
        Self {
            transport,
            next_url: Some(initial_url),
            factory: Box::new(factory),
            state: PagerState::Created,
            visited: HashSet::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> PagerState {
        self.state
    }

    /// Fetch the next non-empty page, or `None` once the collection is exhausted.
    ///
    /// # Errors
    ///
    /// Returns the transport or decode error that ended iteration. Subsequent calls
    /// return `Ok(None)`.
    pub async fn next_page(&mut self) -> Result<Option<P>> {
        if self.state.is_terminal() {
            return Ok(None);
        }
        let Some(url) = self.next_url.take() else {
            self.state = PagerState::Exhausted;
            return Ok(None);
        };

        self.state = PagerState::Fetching;
        debug!(url = %url, "Fetching page");
        self.visited.insert(url.clone());

        match self.fetch(url).await {
            Ok(Some((page, next))) => {
                self.next_url = next;
                self.state = PagerState::YieldedPage;
                Ok(Some(page))
            }
            Ok(None) => {
                self.state = PagerState::Exhausted;
                Ok(None)
            }
            Err(err) => {
                warn!(error = %err, "Pagination stopped on error");
                self.state = PagerState::Errored;
                Err(err)
            }
        }
    }

    async fn fetch(&self, url: Url) -> Result<Option<(P, Option<Url>)>> {
        let body = self.transport.get_json(&url).await?;
        let page = (self.factory)(PageResult::new(url.clone(), body));

        if page.is_empty()? {
            debug!(url = %url, "Empty page, pagination finished");
            return Ok(None);
        }

        let next = page.next_page_url()?;
        if let Some(next) = next.as_ref().filter(|next| self.visited.contains(*next)) {
            return Err(Error::Decode(format!(
                "Page `{url}` points back to already fetched page `{next}`"
            )));
        }
        Ok(Some((page, next)))
    }

    /// Visit pages in server order until the visitor returns `false`, a page is empty,
    /// the last page has been visited, or an error occurs.
    ///
    /// # Errors
    ///
    /// Returns the first transport, decode or visitor error.
    pub async fn each_page<V>(mut self, mut visitor: V) -> Result<()>
    where
        V: FnMut(P) -> Result<bool>,
    {
        while let Some(page) = self.next_page().await? {
            if !visitor(page)? {
                debug!("Visitor stopped pagination");
                break;
            }
        }
        Ok(())
    }

    /// Collect every page.
    ///
    /// # Errors
    ///
    /// See [`Pager::each_page`].
    pub async fn all_pages(self) -> Result<Vec<P>> {
        let mut pages = Vec::new();
        self.each_page(|page| {
            pages.push(page);
            Ok(true)
        })
        .await?;
        Ok(pages)
    }

    /// Collect every item of every page, in server order.
    ///
    /// # Errors
    ///
    /// See [`Pager::each_page`].
    pub async fn all_items(self) -> Result<Vec<P::Item>> {
        let mut items = Vec::new();
        self.each_page(|page| {
            items.extend(page.items()?);
            Ok(true)
        })
        .await?;
        Ok(items)
    }

    /// Turn the pager into a lazy stream of pages.
    ///
    /// Nothing is fetched until the stream is polled; the stream ends after the last page
    /// or after yielding the first error.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<P>> + 'a
    where
        P: 'a,
    {
        try_stream! {
            while let Some(page) = self.next_page().await? {
                yield page;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockApiTransport, ServiceClient};
    use futures::{pin_mut, StreamExt};
    use serde::Deserialize;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Clone, Deserialize, PartialEq)]
    struct Item {
        id: String,
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn expect_page(transport: &mut MockApiTransport, at: &'static str, body: Value) {
        transport
            .expect_get_json()
            .withf(move |u| u.as_str() == at)
            .times(1)
            .returning(move |_| Ok(body.clone()));
    }

    #[tokio::test]
    async fn single_page_without_links() {
        let mut transport = MockApiTransport::new();
        expect_page(
            &mut transport,
            "https://api.example.com/v1/things/1/1",
            json!({"count": 1, "results": [{"id": "abc"}]}),
        );

        let mut visits = 0;
        Pager::new(
            &transport,
            url("https://api.example.com/v1/things/1/1"),
            LinkedPage::<Item>::new,
        )
        .each_page(|page| {
            visits += 1;
            assert_eq!(page.items()?, vec![Item { id: "abc".into() }]);
            Ok(true)
        })
        .await
        .unwrap();
        assert_eq!(visits, 1);

        let mut transport = MockApiTransport::new();
        expect_page(
            &mut transport,
            "https://api.example.com/v1/things/1/1",
            json!({"count": 1, "results": [{"id": "abc"}]}),
        );
        let items = Pager::new(
            &transport,
            url("https://api.example.com/v1/things/1/1"),
            LinkedPage::<Item>::new,
        )
        .all_items()
        .await
        .unwrap();
        assert_eq!(items, vec![Item { id: "abc".into() }]);
    }

    #[tokio::test]
    async fn follows_next_links_in_order() {
        let mut transport = MockApiTransport::new();
        let mut seq = mockall::Sequence::new();
        transport
            .expect_get_json()
            .withf(|u| u.as_str() == "https://api.example.com/n")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(json!({
                    "results": [{"id": "a"}, {"id": "b"}],
                    "links": [{"rel": "next", "href": "/n?marker=b"}]
                }))
            });
        transport
            .expect_get_json()
            .withf(|u| u.as_str() == "https://api.example.com/n?marker=b")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(json!({"results": [{"id": "c"}], "links": []})));

        let items = Pager::new(
            &transport,
            url("https://api.example.com/n"),
            LinkedPage::<Item>::new,
        )
        .all_items()
        .await
        .unwrap();
        let ids: Vec<_> = items.into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn empty_page_halts_even_with_nonzero_count() {
        let mut transport = MockApiTransport::new();
        expect_page(
            &mut transport,
            "https://api.example.com/o?limit=2",
            json!({"count": 9, "results": []}),
        );

        let mut visits = 0;
        Pager::new(
            &transport,
            url("https://api.example.com/o?limit=2"),
            OffsetPage::<Item>::new,
        )
        .each_page(|_| {
            visits += 1;
            Ok(true)
        })
        .await
        .unwrap();
        assert_eq!(visits, 0);
    }

    #[tokio::test]
    async fn visitor_can_stop_early() {
        let mut transport = MockApiTransport::new();
        expect_page(
            &mut transport,
            "https://api.example.com/o?limit=1",
            json!({"count": 3, "results": [{"id": "a"}]}),
        );

        let mut seen = Vec::new();
        Pager::new(
            &transport,
            url("https://api.example.com/o?limit=1"),
            OffsetPage::<Item>::new,
        )
        .each_page(|page| {
            seen.extend(page.items()?);
            Ok(false)
        })
        .await
        .unwrap();
        assert_eq!(seen.len(), 1);
    }

    #[tokio::test]
    async fn decode_error_aborts_after_earlier_pages() {
        let mut transport = MockApiTransport::new();
        expect_page(
            &mut transport,
            "https://api.example.com/n",
            json!({
                "results": [{"id": "a"}],
                "links": [{"rel": "next", "href": "/n?page=2"}]
            }),
        );
        expect_page(
            &mut transport,
            "https://api.example.com/n?page=2",
            json!({"items": []}),
        );

        let mut seen = Vec::new();
        let err = Pager::new(
            &transport,
            url("https://api.example.com/n"),
            LinkedPage::<Item>::new,
        )
        .each_page(|page| {
            seen.extend(page.items()?);
            Ok(true)
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Decode(_)));
        assert_eq!(seen, vec![Item { id: "a".into() }]);
    }

    #[tokio::test]
    async fn self_referencing_next_link_is_rejected() {
        let mut transport = MockApiTransport::new();
        expect_page(
            &mut transport,
            "https://api.example.com/n",
            json!({
                "results": [{"id": "a"}],
                "links": [{"rel": "next", "href": "/n"}]
            }),
        );

        let mut pager = Pager::new(
            &transport,
            url("https://api.example.com/n"),
            LinkedPage::<Item>::new,
        );
        assert!(matches!(pager.next_page().await, Err(Error::Decode(_))));
        assert_eq!(pager.state(), PagerState::Errored);
        assert!(pager.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn link_cycle_is_rejected_before_refetching() {
        let mut transport = MockApiTransport::new();
        expect_page(
            &mut transport,
            "https://api.example.com/a",
            json!({
                "results": [{"id": "a"}],
                "links": [{"rel": "next", "href": "/b"}]
            }),
        );
        expect_page(
            &mut transport,
            "https://api.example.com/b",
            json!({
                "results": [{"id": "b"}],
                "links": [{"rel": "next", "href": "/a"}]
            }),
        );

        let mut pager = Pager::new(
            &transport,
            url("https://api.example.com/a"),
            LinkedPage::<Item>::new,
        );
        assert!(pager.next_page().await.unwrap().is_some());
        assert!(matches!(pager.next_page().await, Err(Error::Decode(_))));
        assert_eq!(pager.state(), PagerState::Errored);
        assert!(pager.next_page().await.unwrap().is_none());

        let mut transport = MockApiTransport::new();
        expect_page(
            &mut transport,
            "https://api.example.com/a",
            json!({
                "results": [{"id": "a"}],
                "links": [{"rel": "next", "href": "/b"}]
            }),
        );
        expect_page(
            &mut transport,
            "https://api.example.com/b",
            json!({
                "results": [{"id": "b"}],
                "links": [{"rel": "next", "href": "/a"}]
            }),
        );
        let err = Pager::new(
            &transport,
            url("https://api.example.com/a"),
            LinkedPage::<Item>::new,
        )
        .all_items()
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[tokio::test]
    async fn transport_error_is_propagated() {
        let mut transport = MockApiTransport::new();
        transport
            .expect_get_json()
            .times(1)
            .returning(|_| Err(Error::ServiceUnavailable("down".into())));

        let err = Pager::new(
            &transport,
            url("https://api.example.com/n"),
            LinkedPage::<Item>::new,
        )
        .all_pages()
        .await
        .unwrap_err();
        assert!(matches!(err, Error::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn state_transitions() {
        let mut transport = MockApiTransport::new();
        expect_page(
            &mut transport,
            "https://api.example.com/n",
            json!({"results": [{"id": "a"}]}),
        );

        let mut pager = Pager::new(
            &transport,
            url("https://api.example.com/n"),
            LinkedPage::<Item>::new,
        );
        assert_eq!(pager.state(), PagerState::Created);
        assert!(pager.next_page().await.unwrap().is_some());
        assert_eq!(pager.state(), PagerState::YieldedPage);
        assert!(pager.next_page().await.unwrap().is_none());
        assert_eq!(pager.state(), PagerState::Exhausted);
        assert!(pager.next_page().await.unwrap().is_none());
    }

    async fn mount_offset_pages(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v1/volumes/1/1"))
            .and(query_param("offset", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 3,
                "results": [{"id": "c"}]
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/volumes/1/1"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 3,
                "results": [{"id": "a"}, {"id": "b"}]
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn offset_pages_over_http() {
        let server = MockServer::start().await;
        mount_offset_pages(&server).await;

        let client = ServiceClient::new(server.uri()).unwrap();
        let start = client
            .base_url()
            .join("v1/volumes/1/1?limit=2&offset=0")
            .unwrap();

        let pages = Pager::new(&client, start, OffsetPage::<Item>::new)
            .all_pages()
            .await
            .unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].offset(), 2);

        // Offset 2 + 1 item reaches count 3: no third request.
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
    }

    #[tokio::test]
    async fn independent_pagers_yield_identical_sequences() {
        let server = MockServer::start().await;
        mount_offset_pages(&server).await;

        let client = ServiceClient::new(server.uri()).unwrap();
        let start = client
            .base_url()
            .join("v1/volumes/1/1?limit=2&offset=0")
            .unwrap();

        let first = Pager::new(&client, start.clone(), OffsetPage::<Item>::new)
            .all_items()
            .await
            .unwrap();
        let second = Pager::new(&client, start, OffsetPage::<Item>::new)
            .all_items()
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[tokio::test]
    async fn stream_is_lazy_and_ordered() {
        let server = MockServer::start().await;
        mount_offset_pages(&server).await;

        let client = ServiceClient::new(server.uri()).unwrap();
        let start = client
            .base_url()
            .join("v1/volumes/1/1?limit=2&offset=0")
            .unwrap();

        let stream = Pager::new(&client, start, OffsetPage::<Item>::new).into_stream();
        pin_mut!(stream);
        assert!(server.received_requests().await.unwrap().is_empty());

        let mut ids = Vec::new();
        while let Some(page) = stream.next().await {
            for item in page.unwrap().items().unwrap() {
                ids.push(item.id);
            }
        }
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
