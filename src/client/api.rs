//! Core HTTP client for the Fever API

use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use compact_str::{format_compact, CompactString, ToCompactString};
use reqwest::{header::RETRY_AFTER, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use super::{
    config::{ClientConfig, HttpMethod, ItemMark, ItemQuery, FEVER_PAGE_SIZE},
    error::{ClientError, Result},
    fetch::{BulkFetch, BulkFetchReport},
};
use crate::{
    domain::{
        Envelope, Feed, FeedsPayload, Group, GroupsPayload, Item, ItemsPayload, NoPayload,
        SavedItemIdsPayload, UnreadItemIdsPayload,
    },
    id::{parse_id_list, FeedId, GroupId, ItemId},
};

/// HTTP client for a single Fever endpoint
#[derive(Debug, Clone)]
pub struct FeverApi {
    client: Client,
    config: ClientConfig,
    api_key: CompactString,
}

/// Fever calls, selected by a bare query parameter next to `api`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Envelope only, used to check credentials
    Api,
    Items,
    Feeds,
    Groups,
    UnreadItemIds,
    SavedItemIds,
    /// Writes carry `mark=...` as an argument rather than a selector
    Mark,
}

impl Endpoint {
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::Api => "api",
            Endpoint::Items => "items",
            Endpoint::Feeds => "feeds",
            Endpoint::Groups => "groups",
            Endpoint::UnreadItemIds => "unread_item_ids",
            Endpoint::SavedItemIds => "saved_item_ids",
            Endpoint::Mark => "mark",
        }
    }

    fn selector(&self) -> Option<&'static str> {
        match self {
            Endpoint::Api | Endpoint::Mark => None,
            other => Some(other.name()),
        }
    }
}

impl FeverApi {
    /// Create a new Fever API client without contacting the server
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let client = Self::build_http_client(&config)?;
        let api_key = config.api_key();

        Ok(Self { client, config, api_key })
    }

    /// Create a client and verify the credentials against the server
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let api = Self::new(config)?;
        api.check_auth().await?;
        Ok(api)
    }

    /// Verify that the server accepts the api key
    #[instrument(skip(self))]
    pub async fn check_auth(&self) -> Result<()> {
        let envelope: Envelope<NoPayload> = self.call(Endpoint::Api, &[]).await?;
        info!(api_version = envelope.api_version, "Fever authentication successful");
        Ok(())
    }

    /// Issue a call and decode its response.
    ///
    /// Session parameters are added here, retryable failures are retried
    /// with exponential backoff and a response with `auth` unset fails with
    /// [`ClientError::Authentication`].
    pub async fn call<T>(
        &self,
        endpoint: Endpoint,
        params: &[(&str, CompactString)],
    ) -> Result<Envelope<T>>
    where
        T: DeserializeOwned,
    {
        let max_retries = self.config.request.max_retries;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            match self.call_once(endpoint, params).await {
                Ok(envelope) => return Ok(envelope),
                Err(e) if e.is_retryable() && attempt <= max_retries => {
                    let delay = e.retry_after().unwrap_or_else(|| self.backoff(attempt));
                    warn!(
                        endpoint = endpoint.name(),
                        attempt,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Fever request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                },
                Err(e) if e.is_retryable() && attempt > 1 => {
                    return Err(ClientError::retries_exhausted(attempt, e));
                },
                Err(e) => return Err(e),
            }
        }
    }

    /// Get items
    #[instrument(skip(self, query), fields(since_id = ?query.since_id, max_id = ?query.max_id, with_ids = query.with_ids.len()))]
    pub async fn get_items(&self, query: &ItemQuery) -> Result<Vec<Item>> {
        if query.with_ids.len() <= FEVER_PAGE_SIZE as usize {
            return self.fetch_items(query).await;
        }

        // the server ignores ids past the first page worth
        let mut items = Vec::with_capacity(query.with_ids.len());
        for chunk in query.with_ids.chunks(FEVER_PAGE_SIZE as usize) {
            let chunk_query = query.clone().with_ids(chunk.iter().copied());
            items.extend(self.fetch_items(&chunk_query).await?);
        }

        debug!(item_count = items.len(), "Fetched items in chunks");
        Ok(items)
    }

    /// Get items stored after `since`
    pub async fn get_items_since(&self, since: DateTime<Utc>) -> Result<Vec<Item>> {
        let query = ItemQuery::new().with_since_id(Some(ItemId::from_datetime(since)));
        self.get_items(&query).await
    }

    /// Get all feeds with their group resolved
    #[instrument(skip(self))]
    pub async fn get_feeds(&self) -> Result<Vec<Feed>> {
        let envelope: Envelope<FeedsPayload> = self.call(Endpoint::Feeds, &[]).await?;
        let feeds = envelope.payload.into_feeds();
        debug!(feed_count = feeds.len(), "Successfully fetched feeds");
        Ok(feeds)
    }

    /// Get all groups with the feeds they contain
    #[instrument(skip(self))]
    pub async fn get_groups(&self) -> Result<Vec<Group>> {
        let envelope: Envelope<GroupsPayload> = self.call(Endpoint::Groups, &[]).await?;
        let groups = envelope.payload.into_groups();
        debug!(group_count = groups.len(), "Successfully fetched groups");
        Ok(groups)
    }

    #[instrument(skip(self))]
    pub async fn get_unread_item_ids(&self) -> Result<Vec<ItemId>> {
        let envelope: Envelope<UnreadItemIdsPayload> =
            self.call(Endpoint::UnreadItemIds, &[]).await?;
        Self::item_ids(Endpoint::UnreadItemIds, &envelope.payload.unread_item_ids)
    }

    #[instrument(skip(self))]
    pub async fn get_saved_item_ids(&self) -> Result<Vec<ItemId>> {
        let envelope: Envelope<SavedItemIdsPayload> =
            self.call(Endpoint::SavedItemIds, &[]).await?;
        Self::item_ids(Endpoint::SavedItemIds, &envelope.payload.saved_item_ids)
    }

    pub async fn get_unread_items(&self) -> Result<Vec<Item>> {
        let ids = self.get_unread_item_ids().await?;
        self.get_items_with_ids(ids).await
    }

    /// Get saved (starred) items
    pub async fn get_saved_items(&self) -> Result<Vec<Item>> {
        let ids = self.get_saved_item_ids().await?;
        self.get_items_with_ids(ids).await
    }

    /// Page through items until the configured item or time budget runs out
    pub async fn get_all_items(
        &self,
        max_items: Option<usize>,
        timeout: Duration,
    ) -> Result<BulkFetchReport> {
        BulkFetch::builder(self)
            .max_items(max_items)
            .timeout(timeout)
            .build()
            .run()
            .await
    }

    /// Mark an item read, unread, saved or unsaved
    #[instrument(skip(self), fields(id = %id, mark = mark.as_str()))]
    pub async fn mark_item(&self, id: ItemId, mark: ItemMark) -> Result<()> {
        let params = [
            ("mark", CompactString::const_new("item")),
            ("as", CompactString::const_new(mark.as_str())),
            ("id", id.to_compact_string()),
        ];
        let _: Envelope<NoPayload> = self.call(Endpoint::Mark, &params).await?;
        debug!("Item marked");
        Ok(())
    }

    /// Mark every item of a feed stored before `before` as read
    #[instrument(skip(self), fields(id = %id))]
    pub async fn mark_feed_read(&self, id: FeedId, before: DateTime<Utc>) -> Result<()> {
        self.mark_read_before("feed", id.to_compact_string(), before).await
    }

    /// Mark every item of a group stored before `before` as read
    #[instrument(skip(self), fields(id = %id))]
    pub async fn mark_group_read(&self, id: GroupId, before: DateTime<Utc>) -> Result<()> {
        self.mark_read_before("group", id.to_compact_string(), before).await
    }

    /// Get current configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // Private helper methods

    fn build_http_client(config: &ClientConfig) -> Result<Client> {
        Client::builder()
            .timeout(config.request.timeout)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .user_agent(concat!("fever-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientError::Http)
    }

    async fn fetch_items(&self, query: &ItemQuery) -> Result<Vec<Item>> {
        let envelope: Envelope<ItemsPayload> =
            self.call(Endpoint::Items, &query.to_params()).await?;
        let items: Vec<Item> = envelope.payload.items.into_iter().map(Item::from).collect();
        debug!(
            item_count = items.len(),
            total_items = ?envelope.payload.total_items,
            "Successfully fetched items"
        );
        Ok(items)
    }

    async fn get_items_with_ids(&self, ids: Vec<ItemId>) -> Result<Vec<Item>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.get_items(&ItemQuery::new().with_ids(ids)).await
    }

    async fn mark_read_before(
        &self,
        kind: &'static str,
        id: CompactString,
        before: DateTime<Utc>,
    ) -> Result<()> {
        let params = [
            ("mark", CompactString::const_new(kind)),
            ("as", CompactString::const_new("read")),
            ("id", id),
            ("before", before.timestamp().to_compact_string()),
        ];
        let _: Envelope<NoPayload> = self.call(Endpoint::Mark, &params).await?;
        debug!(kind, "Marked read");
        Ok(())
    }

    fn item_ids(endpoint: Endpoint, raw: &str) -> Result<Vec<ItemId>> {
        parse_id_list(raw).map_err(|e| {
            ClientError::api(200, format_compact!("malformed {} list: {e}", endpoint.name()))
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.config.request.retry_delay.saturating_mul(1 << exponent)
    }

    async fn call_once<T>(
        &self,
        endpoint: Endpoint,
        params: &[(&str, CompactString)],
    ) -> Result<Envelope<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .build_request(endpoint, params)
            .send()
            .await
            .map_err(ClientError::transport)?;
        self.handle_response(endpoint, response).await
    }

    /// Create request builder carrying the session parameters
    fn build_request(&self, endpoint: Endpoint, params: &[(&str, CompactString)]) -> RequestBuilder {
        let url = self.config.endpoint_url();

        let mut query: Vec<(&str, &str)> = vec![("api", "")];
        if let Some(selector) = endpoint.selector() {
            query.push((selector, ""));
        }

        let arguments = std::iter::once(("api_key", self.api_key.as_str()))
            .chain(params.iter().map(|(k, v)| (*k, v.as_str())));

        match self.config.request.method {
            HttpMethod::Post => {
                let form: Vec<(&str, &str)> = arguments.collect();
                self.client.post(url.as_str()).query(&query).form(&form)
            },
            HttpMethod::Get => {
                query.extend(arguments);
                self.client.get(url.as_str()).query(&query)
            },
        }
    }

    /// Handle HTTP response and deserialize JSON
    async fn handle_response<T>(&self, endpoint: Endpoint, response: Response) -> Result<Envelope<T>>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.map_err(ClientError::transport)?;

        // Log response if debug is enabled
        if self.config.debug.log_responses {
            self.log_response_to_file(endpoint, &body);
        }

        if !status.is_success() {
            return Self::handle_error_response(endpoint, status.as_u16(), retry_after, &body);
        }

        let head: Envelope<NoPayload> = serde_json::from_str(&body)
            .map_err(|e| ClientError::json_parse(endpoint.name(), e))?;
        if !head.auth {
            warn!(endpoint = endpoint.name(), "Fever server rejected the api key");
            return Err(ClientError::Authentication);
        }

        serde_json::from_str(&body).map_err(|e| ClientError::json_parse(endpoint.name(), e))
    }

    /// Map non-success responses to client errors
    fn handle_error_response<T>(
        endpoint: Endpoint,
        status: u16,
        retry_after: Option<Duration>,
        body: &str,
    ) -> Result<T> {
        match status {
            401 | 403 => Err(ClientError::Authentication),
            404 => Err(ClientError::not_found(format!("fever.php ({})", endpoint.name()))),
            429 => Err(ClientError::rate_limit(retry_after)),
            _ => {
                let message: CompactString = body.trim().chars().take(200).collect();
                Err(ClientError::api(status, message).with_retry_after(retry_after))
            },
        }
    }

    /// Log HTTP response to file for debugging
    fn log_response_to_file(&self, endpoint: Endpoint, body: &str) {
        if let Some(log_dir) = &self.config.debug.log_directory {
            if !log_dir.exists() {
                if let Err(e) = std::fs::create_dir_all(log_dir) {
                    warn!("Failed to create log directory: {}", e);
                    return;
                }
            }

            let filename = format!(
                "{}_{}.json",
                Local::now().format("%Y-%m-%d_%H-%M-%S%.3f"),
                endpoint.name()
            );

            let log_path = log_dir.join(filename);

            if let Err(e) = std::fs::write(&log_path, body) {
                warn!("Failed to write response log to {:?}: {}", log_path, e);
            } else {
                debug!("Response logged to {:?}", log_path);
            }
        }
    }
}
