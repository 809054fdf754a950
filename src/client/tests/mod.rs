//! Test utilities and common test fixtures for client modules

mod integration_tests;

use std::time::Duration;

use serde_json::json;

use crate::client::config::{ClientConfig, FetchConfig};

pub const TEST_USERNAME: &str = "alice";
pub const TEST_PASSWORD: &str = "secret";

/// First item id handed out by the fixtures, 2024-03-09T16:00:00Z
pub const BASE_ITEM_ID: u64 = 1_710_000_000_000_000;

/// JSON for a single item
pub fn item_json(id: u64, created_on_time: i64) -> serde_json::Value {
    json!({
        "id": id.to_string(),
        "feed_id": 3,
        "title": format!("Item {id}"),
        "author": "Jane Doe",
        "html": "<p>Hello <b>world</b></p>",
        "url": format!("https://blog.example.com/{id}"),
        "is_saved": 0,
        "is_read": 0,
        "created_on_time": created_on_time
    })
}

/// An authenticated `items` response holding the given ids
pub fn items_response(ids: impl IntoIterator<Item = u64>) -> serde_json::Value {
    let items: Vec<_> = ids
        .into_iter()
        .map(|id| item_json(id, 1_710_000_000 + (id % 1000) as i64))
        .collect();
    let total = items.len();

    json!({
        "api_version": 3,
        "auth": 1,
        "last_refreshed_on_time": 1_710_000_000,
        "items": items,
        "total_items": total
    })
}

/// `count` consecutive item ids starting right after `after`
pub fn id_range(after: u64, count: u64) -> impl Iterator<Item = u64> {
    (after + 1)..=(after + count)
}

pub fn feeds_response() -> serde_json::Value {
    json!({
        "api_version": 3,
        "auth": 1,
        "feeds": [
            {
                "id": 3, "favicon_id": 3, "title": "Example Blog",
                "url": "https://blog.example.com/feed.xml", "site_url": "https://blog.example.com",
                "is_spark": 0, "last_updated_on_time": 1_710_000_000
            },
            {
                "id": "4", "favicon_id": null, "title": "Loose Feed",
                "url": "https://loose.example.com/rss", "site_url": "https://loose.example.com",
                "is_spark": 0, "last_updated_on_time": "1710000100"
            }
        ],
        "feeds_groups": [ { "group_id": 1, "feed_ids": "3" } ]
    })
}

pub fn groups_response() -> serde_json::Value {
    json!({
        "api_version": 3,
        "auth": 1,
        "groups": [ { "id": 1, "title": "Tech" }, { "id": 2, "title": "News" } ],
        "feeds_groups": [ { "group_id": 1, "feed_ids": "3,5" } ]
    })
}

pub fn unread_ids_response(ids: &str) -> serde_json::Value {
    json!({ "api_version": 3, "auth": 1, "unread_item_ids": ids })
}

pub fn saved_ids_response(ids: &str) -> serde_json::Value {
    json!({ "api_version": 3, "auth": 1, "saved_item_ids": ids })
}

/// Envelope only, as returned by the bare `api` call and by writes
pub fn auth_response(auth: bool) -> serde_json::Value {
    json!({ "api_version": 3, "auth": i32::from(auth), "last_refreshed_on_time": 1_710_000_000 })
}

/// Mock HTTP server for testing
pub struct MockServer {
    pub server: wiremock::MockServer,
}

impl MockServer {
    /// Start a new mock server
    pub async fn start() -> Self {
        let server = wiremock::MockServer::start().await;
        Self { server }
    }

    /// Get the base URL of the mock server
    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    /// Create a test config pointing to this mock server, with short retry
    /// delays and no pause between pages
    pub fn test_config(&self) -> ClientConfig {
        ClientConfig::builder()
            .base_url(self.base_url())
            .username(TEST_USERNAME)
            .password(TEST_PASSWORD)
            .retry_delay(Duration::from_millis(10))
            .timeout(Duration::from_secs(5))
            .fetch(FetchConfig { page_delay: None, ..Default::default() })
            .build()
            .unwrap()
    }

    /// `api_key=...` as it appears in a form body or query string
    pub fn api_key_param(&self) -> String {
        format!("api_key={}", self.test_config().api_key())
    }
}

#[cfg(test)]
#[allow(clippy::module_inception)]
mod tests {
    use super::*;
    use crate::domain::{FeedsPayload, ItemsPayload};

    #[test]
    fn test_fixtures_decode() {
        let items: ItemsPayload = serde_json::from_value(items_response(id_range(0, 3))).unwrap();
        assert_eq!(items.items.len(), 3);
        assert_eq!(items.total_items, Some(3));

        let feeds: FeedsPayload = serde_json::from_value(feeds_response()).unwrap();
        assert_eq!(feeds.feeds.len(), 2);
        assert_eq!(feeds.feeds_groups.len(), 1);
    }

    #[test]
    fn test_id_range() {
        assert_eq!(id_range(10, 3).collect::<Vec<_>>(), vec![11, 12, 13]);
        assert_eq!(id_range(10, 0).count(), 0);
    }
}
