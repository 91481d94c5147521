//! Cursor pagination.
//!
//! Cursors are opaque: they are passed back to the remote API exactly as
//! received and never parsed or built locally.

use std::future::Future;
use std::sync::Arc;

use futures_util::stream::{self, Stream, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::context::ApiContext;
use crate::error::{RbxError, Result};
use crate::http::ApiRequest;
use crate::session::Session;
use crate::util::non_empty;

/// Query parameter carrying the cursor token.
pub const CURSOR_PARAM: &str = "cursor";
pub const LIMIT_PARAM: &str = "limit";
pub const SORT_ORDER_PARAM: &str = "sortOrder";

/// One page of results in the order the remote API returned them.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` when this is the last page.
    pub next_cursor: Option<String>,
    /// Often always `None`; not every endpoint pages backwards.
    pub previous_cursor: Option<String>,
}

/// The standard list response: `{"data":[...],"nextPageCursor":..,"previousPageCursor":..}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEnvelope<R> {
    #[serde(default = "Vec::new")]
    pub data: Vec<R>,
    #[serde(default)]
    pub next_page_cursor: Option<String>,
    #[serde(default)]
    pub previous_page_cursor: Option<String>,
}

impl<T> Page<T> {
    /// Empty cursors are treated as absent.
    pub fn new(
        items: Vec<T>,
        next_cursor: Option<String>,
        previous_cursor: Option<String>,
    ) -> Self {
        Self {
            items,
            next_cursor: non_empty(next_cursor),
            previous_cursor: non_empty(previous_cursor),
        }
    }

    pub fn from_envelope(envelope: PageEnvelope<T>) -> Self {
        Self::new(
            envelope.data,
            envelope.next_page_cursor,
            envelope.previous_page_cursor,
        )
    }

    pub fn has_next(&self) -> bool {
        self.next_cursor.is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Convert the items, keeping the cursors.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
            previous_cursor: self.previous_cursor,
        }
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Page sizes the remote API accepts. Anything else is rejected locally.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FixedLimit {
    #[default]
    Ten,
    TwentyFive,
    Fifty,
    Hundred,
}

impl FixedLimit {
    pub fn value(self) -> u32 {
        match self {
            FixedLimit::Ten => 10,
            FixedLimit::TwentyFive => 25,
            FixedLimit::Fifty => 50,
            FixedLimit::Hundred => 100,
        }
    }
}

impl TryFrom<u32> for FixedLimit {
    type Error = RbxError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            10 => Ok(FixedLimit::Ten),
            25 => Ok(FixedLimit::TwentyFive),
            50 => Ok(FixedLimit::Fifty),
            100 => Ok(FixedLimit::Hundred),
            other => Err(RbxError::InvalidArgument(format!(
                "page size {other} is not one of 10, 25, 50, 100"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "Asc",
            SortOrder::Desc => "Desc",
        }
    }
}

/// Paging parameters for one request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CursorQuery {
    pub limit: FixedLimit,
    pub cursor: Option<String>,
    pub sort_order: Option<SortOrder>,
}

impl CursorQuery {
    pub fn new(limit: FixedLimit) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Validate a raw page size before anything is sent.
    pub fn with_limit(limit: u32) -> Result<Self> {
        Ok(Self::new(FixedLimit::try_from(limit)?))
    }

    pub fn cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = non_empty(cursor);
        self
    }

    pub fn sort_order(mut self, sort_order: SortOrder) -> Self {
        self.sort_order = Some(sort_order);
        self
    }

    pub fn apply(&self, mut request: ApiRequest) -> ApiRequest {
        request = request.query(LIMIT_PARAM, self.limit.value());
        if let Some(cursor) = &self.cursor {
            request = request.query(CURSOR_PARAM, cursor);
        }
        if let Some(sort_order) = self.sort_order {
            request = request.query(SORT_ORDER_PARAM, sort_order.as_str());
        }
        request
    }
}

/// Fetch one page from an endpoint returning the standard envelope.
pub async fn fetch_page<R: DeserializeOwned>(
    ctx: &ApiContext,
    session: Option<&Arc<Session>>,
    request: ApiRequest,
    query: &CursorQuery,
) -> Result<Page<R>> {
    let envelope: PageEnvelope<R> = ctx.send_json(session, query.apply(request)).await?;
    Ok(Page::from_envelope(envelope))
}

/// Walk an endpoint page by page, starting with no cursor.
///
/// `fetch` is called with the previous page's `next_cursor` until a page has
/// none. An error ends the stream.
pub fn stream_pages<T, F, Fut>(fetch: F) -> impl Stream<Item = Result<Page<T>>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    // `Some(cursor)` is the next call to make; `None` means the walk is over.
    stream::try_unfold((fetch, Some(None)), |(mut fetch, next)| async move {
        let Some(cursor) = next else {
            return Ok::<_, RbxError>(None);
        };
        let page = fetch(cursor).await?;
        let following = page.next_cursor.clone().map(Some);
        Ok(Some((page, (fetch, following))))
    })
}

/// Every item from every page, in order. The first failing page aborts the walk.
pub async fn collect_all<T, F, Fut>(fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    stream_pages(fetch)
        .try_fold(Vec::new(), |mut items, page| async move {
            items.extend(page.items);
            Ok::<_, RbxError>(items)
        })
        .await
}
