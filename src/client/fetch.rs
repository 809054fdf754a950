//! Paginated bulk fetching of items

use std::{
    ops::Range,
    time::{Duration, Instant},
};

use chrono::Utc;
use rand::Rng;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

use super::{
    api::FeverApi,
    config::{FetchConfig, FetchDirection, ItemQuery},
    error::Result,
};
use crate::{
    domain::{Item, MINIMUM_VALID_TIMESTAMP},
    id::ItemId,
};

/// Walks item pages with `since_id` or `max_id` until a page comes back
/// short, the item budget is reached or the time budget runs out.
#[derive(Debug)]
pub struct BulkFetch<'a> {
    api: &'a FeverApi,
    config: FetchConfig,
    start: Option<ItemId>,
}

/// Outcome of a bulk fetch
#[derive(Debug, Clone, Default)]
pub struct BulkFetchReport {
    pub items: Vec<Item>,
    pub pages: usize,
    pub elapsed: Duration,
    /// The time budget ran out before the walk finished
    pub timed_out: bool,
    /// Oldest plausible `created_on_time` seen
    pub earliest: Option<i64>,
    /// Newest `created_on_time` seen
    pub latest: Option<i64>,
}

impl BulkFetchReport {
    /// Seconds between the earliest and latest item
    pub fn span_secs(&self) -> Option<i64> {
        Some(self.latest? - self.earliest?)
    }

    fn track(&mut self, page: &[Item]) {
        for item in page {
            let created = item.created_on_time;
            if created >= MINIMUM_VALID_TIMESTAMP && self.earliest.map_or(true, |e| created < e) {
                self.earliest = Some(created);
            }
            if self.latest.map_or(true, |l| created > l) {
                self.latest = Some(created);
            }
        }
    }
}

impl<'a> BulkFetch<'a> {
    /// Start building a bulk fetch using the client's fetch configuration
    pub fn builder(api: &'a FeverApi) -> BulkFetchBuilder<'a> {
        BulkFetchBuilder {
            api,
            config: api.config().fetch.clone(),
            start: None,
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Run the walk to completion
    #[instrument(skip(self))]
    pub async fn run(self) -> Result<BulkFetchReport> {
        let started = Instant::now();
        let mut report = BulkFetchReport::default();
        let mut cursor = self.initial_cursor();

        info!(
            cursor = %cursor,
            direction = ?self.config.direction,
            max_items = ?self.config.max_items,
            timeout_secs = self.config.timeout.as_secs(),
            "Starting bulk item fetch"
        );

        loop {
            if self.config.max_items.is_some_and(|max| report.items.len() >= max) {
                debug!("Item cap reached before requesting a page");
                break;
            }

            let Some(remaining) = self.config.timeout.checked_sub(started.elapsed()) else {
                report.timed_out = true;
                break;
            };

            if report.pages > 0 {
                if let Some(delay) = self.page_delay() {
                    if delay >= remaining {
                        report.timed_out = true;
                        break;
                    }
                    sleep(delay).await;
                }
            }

            let remaining = self.config.timeout.saturating_sub(started.elapsed());
            let query = self.page_query(cursor);
            let page = match timeout(remaining, self.api.get_items(&query)).await {
                Ok(page) => page?,
                Err(_) => {
                    report.timed_out = true;
                    break;
                },
            };

            if page.is_empty() {
                debug!("Empty page, bulk fetch complete");
                break;
            }

            let page_len = page.len();
            let next = self.next_cursor(&page);
            report.pages += 1;
            report.track(&page);
            report.items.extend(page);

            debug!(
                page = report.pages,
                page_len,
                total = report.items.len(),
                earliest = ?report.earliest,
                latest = ?report.latest,
                "Fetched item page"
            );

            if let Some(max_items) = self.config.max_items {
                if report.items.len() >= max_items {
                    report.items.truncate(max_items);
                    debug!(max_items, "Reached requested item count");
                    break;
                }
            }

            if page_len < self.config.page_size as usize {
                break;
            }

            if !self.advances(cursor, next) {
                warn!(cursor = %cursor, next = %next, "Item cursor did not advance, stopping");
                break;
            }
            cursor = next;
        }

        report.elapsed = started.elapsed();
        if report.timed_out {
            warn!(
                timeout_secs = self.config.timeout.as_secs(),
                collected = report.items.len(),
                "Bulk fetch hit its time budget"
            );
        }
        info!(
            items = report.items.len(),
            pages = report.pages,
            elapsed_ms = report.elapsed.as_millis() as u64,
            span_days = ?report.span_secs().map(|s| s as f64 / 86_400.0),
            "Bulk item fetch finished"
        );

        Ok(report)
    }

    fn initial_cursor(&self) -> ItemId {
        match (self.start, self.config.direction) {
            (Some(start), _) => start,
            (None, FetchDirection::Forward) => ItemId::new(0),
            // ids are storage timestamps, so nothing sits above "now"
            (None, FetchDirection::Backward) => {
                ItemId::new(ItemId::from_datetime(Utc::now()).value() + 1)
            },
        }
    }

    fn page_query(&self, cursor: ItemId) -> ItemQuery {
        match self.config.direction {
            FetchDirection::Forward => ItemQuery::new().with_since_id(Some(cursor)),
            FetchDirection::Backward => ItemQuery::new().with_max_id(Some(cursor)),
        }
    }

    fn next_cursor(&self, page: &[Item]) -> ItemId {
        let ids = page.iter().map(|item| item.id);
        let next = match self.config.direction {
            FetchDirection::Forward => ids.max(),
            FetchDirection::Backward => ids.min(),
        };
        next.unwrap_or_default()
    }

    fn advances(&self, cursor: ItemId, next: ItemId) -> bool {
        match self.config.direction {
            FetchDirection::Forward => next > cursor,
            FetchDirection::Backward => next < cursor && next.value() > 0,
        }
    }

    fn page_delay(&self) -> Option<Duration> {
        self.config.page_delay.as_ref().map(random_delay)
    }
}

fn random_delay(range: &Range<Duration>) -> Duration {
    let (low, high) = (range.start.as_millis() as u64, range.end.as_millis() as u64);
    if low >= high {
        return range.start;
    }
    Duration::from_millis(rand::rng().random_range(low..high))
}

/// Builder for BulkFetch with fluent API
#[derive(Debug)]
pub struct BulkFetchBuilder<'a> {
    api: &'a FeverApi,
    config: FetchConfig,
    start: Option<ItemId>,
}

impl<'a> BulkFetchBuilder<'a> {
    /// Replace the whole fetch configuration
    pub fn config(mut self, config: FetchConfig) -> Self {
        self.config = config;
        self
    }

    /// Exclusive id to start from; defaults to the oldest or newest end
    pub fn start(mut self, start: Option<ItemId>) -> Self {
        self.start = start;
        self
    }

    pub fn direction(mut self, direction: FetchDirection) -> Self {
        self.config.direction = direction;
        self
    }

    pub fn max_items(mut self, max_items: Option<usize>) -> Self {
        self.config.max_items = max_items;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn page_delay(mut self, delay: Option<Range<Duration>>) -> Self {
        self.config.page_delay = delay;
        self
    }

    pub fn build(self) -> BulkFetch<'a> {
        BulkFetch { api: self.api, config: self.config, start: self.start }
    }
}
