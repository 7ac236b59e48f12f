//! Lazy iteration over paginated collections.
//!
//! # Design
//! A `Collection` pulls one page at a time and hands out its entities in
//! order before touching the network again. At most one exchange is in
//! flight. The total number of entities yielded is capped by the lower of
//! `item_limit` and an explicit `limit`; once the cap is reached no further
//! page is requested, even if the server advertises one. Each page asks for
//! `min(page_size, remaining)` entities.
//!
//! A server that keeps returning `next_page` forever (a repeated offset, or
//! more pages than `max_pages`) fails the iteration with
//! `Error::Pagination`. Entities yielded before a failure stay valid.

use std::collections::{HashSet, VecDeque};

use futures::stream::{self, Stream};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::request::{check_status, decode, CollectionRequest};

/// Continuation pointer returned inside a collection envelope.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NextPage {
    pub offset: String,
    pub path: String,
    #[serde(default)]
    pub uri: Option<String>,
}

/// `{"data": [...], "sync": ..., "next_page": {...}}`
#[derive(Debug, Deserialize)]
pub struct CollectionEnvelope<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub sync: Option<String>,
    #[serde(default)]
    pub next_page: Option<NextPage>,
}

enum Cursor {
    Start,
    Next(NextPage),
    Done,
}

#[derive(Clone, Copy)]
struct Limits {
    cap: Option<usize>,
    page_size: usize,
    max_pages: usize,
}

/// Forward-only sequence of entities spanning several HTTP pages.
pub struct Collection<T> {
    template: CollectionRequest<T>,
    limits: Option<Limits>,
    buffer: VecDeque<T>,
    cursor: Cursor,
    yielded: usize,
    pages: usize,
    offsets: HashSet<String>,
}

impl<T: DeserializeOwned> CollectionRequest<T> {
    /// Start a lazy iteration. Nothing is sent until the first `next`.
    pub fn paginate(self) -> Collection<T> {
        Collection::new(self)
    }

    /// Fetch every entity up to the configured caps.
    pub async fn execute(self) -> Result<Vec<T>> {
        self.paginate().collect_all().await
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<T>> {
        self.paginate().into_stream()
    }
}

impl<T: DeserializeOwned> Collection<T> {
    fn new(mut template: CollectionRequest<T>) -> Self {
        // A caller-supplied query limit/offset is a cursor setting, not a
        // plain query parameter; move it where the page loop manages it.
        for key in ["limit", "offset"] {
            if let Some(value) = template.query.remove(key) {
                template.options.set(key, value);
            }
        }
        Self {
            template,
            limits: None,
            buffer: VecDeque::new(),
            cursor: Cursor::Start,
            yielded: 0,
            pages: 0,
            offsets: HashSet::new(),
        }
    }

    /// Entities handed out so far.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Pages fetched so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    /// Next entity, `Ok(None)` at the end of the collection or the cap.
    pub async fn next(&mut self) -> Result<Option<T>> {
        let limits = match self.limits {
            Some(limits) => limits,
            None => {
                let limits = self.resolve_limits()?;
                self.limits = Some(limits);
                limits
            }
        };

        loop {
            if limits.cap.is_some_and(|cap| self.yielded >= cap) {
                self.cursor = Cursor::Done;
                self.buffer.clear();
                return Ok(None);
            }
            if let Some(item) = self.buffer.pop_front() {
                self.yielded += 1;
                return Ok(Some(item));
            }
            match std::mem::replace(&mut self.cursor, Cursor::Done) {
                Cursor::Done => return Ok(None),
                cursor => {
                    if let Err(e) = self.fetch(cursor, limits).await {
                        self.cursor = Cursor::Done;
                        return Err(e);
                    }
                }
            }
        }
    }

    pub async fn collect_all(mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Adapt into a `Stream`. The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<T>> {
        stream::try_unfold(self, |mut collection| async move {
            Ok(collection.next().await?.map(|item| (item, collection)))
        })
    }

    fn resolve_limits(&self) -> Result<Limits> {
        let options = &self.template.options;
        let cap = match (options.item_limit()?, options.limit()?) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Ok(Limits {
            cap,
            page_size: options.page_size()?,
            max_pages: options.max_pages()?,
        })
    }

    #[instrument(skip_all, fields(path = %self.template.path, page = self.pages + 1))]
    async fn fetch(&mut self, cursor: Cursor, limits: Limits) -> Result<()> {
        if self.pages >= limits.max_pages {
            return Err(Error::Pagination(format!(
                "more than {} pages requested",
                limits.max_pages
            )));
        }

        let mut page = self.template.clone();
        let remaining = limits.cap.map(|cap| cap.saturating_sub(self.yielded));
        let limit = remaining.map_or(limits.page_size, |r| r.min(limits.page_size));
        page.options.set("limit", limit);

        if let Cursor::Next(next) = cursor {
            if !self.offsets.insert(next.offset.clone()) {
                return Err(Error::Pagination(format!(
                    "offset {} was already visited",
                    next.offset
                )));
            }
            page.path = strip_query(&next.path).to_string();
            page.options.set("offset", Value::String(next.offset));
        }

        let response = page.execute_raw().await?;
        self.pages += 1;
        check_status(&response)?;
        let envelope: CollectionEnvelope<T> = decode(&response.body)?;

        debug!(
            items = envelope.data.len(),
            has_next = envelope.next_page.is_some(),
            "fetched page"
        );

        self.buffer.extend(envelope.data);
        self.cursor = envelope.next_page.map_or(Cursor::Done, Cursor::Next);
        Ok(())
    }
}

impl<T> std::fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("path", &self.template.path)
            .field("buffered", &self.buffer.len())
            .field("yielded", &self.yielded)
            .field("pages", &self.pages)
            .finish_non_exhaustive()
    }
}

fn strip_query(path: &str) -> &str {
    path.split_once('?').map_or(path, |(p, _)| p)
}
