//! Integration tests for the Fever client against a mock server

use std::time::Duration;

use chrono::{DateTime, Utc};
use wiremock::{
    matchers::{body_string_contains, method, path, query_param},
    Mock, ResponseTemplate,
};

use crate::{
    client::{
        api::FeverApi,
        config::{ClientConfig, FetchDirection, HttpMethod, ItemMark, ItemQuery},
        error::ClientError,
        fetch::BulkFetch,
    },
    id::{FeedId, GroupId, ItemId},
};

use super::{
    auth_response, feeds_response, groups_response, id_range, items_response,
    saved_ids_response, unread_ids_response, MockServer, BASE_ITEM_ID,
};

const FEVER_PATH: &str = "/api/fever.php";

#[tokio::test]
async fn test_check_auth_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .and(query_param("api", ""))
        .and(body_string_contains(mock_server.api_key_param()))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_response(true)))
        .expect(1)
        .mount(&mock_server.server)
        .await;

    let api = FeverApi::connect(mock_server.test_config()).await;
    assert!(api.is_ok());
}

#[tokio::test]
async fn test_check_auth_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_response(false)))
        .expect(1)
        .mount(&mock_server.server)
        .await;

    let result = FeverApi::connect(mock_server.test_config()).await;
    assert!(matches!(result, Err(ClientError::Authentication)));
}

#[tokio::test]
async fn test_unauthorized_status_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server.server)
        .await;

    let api = FeverApi::new(mock_server.test_config()).unwrap();
    let result = api.get_feeds().await;
    assert!(matches!(result, Err(ClientError::Authentication)));
}

#[tokio::test]
async fn test_get_items_since_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .and(query_param("items", ""))
        .and(body_string_contains(format!("since_id={BASE_ITEM_ID}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(items_response(id_range(BASE_ITEM_ID, 2))),
        )
        .expect(1)
        .mount(&mock_server.server)
        .await;

    let api = FeverApi::new(mock_server.test_config()).unwrap();
    let query = ItemQuery::new().with_since_id(Some(ItemId::new(BASE_ITEM_ID)));
    let items = api.get_items(&query).await.unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, ItemId::new(BASE_ITEM_ID + 1));
    assert_eq!(items[0].feed_id, FeedId::new(3));
    assert_eq!(items[0].readable(), "Hello world");
    assert!(!items[0].is_read);
}

#[tokio::test]
async fn test_get_items_since_date_converts_to_id() {
    let mock_server = MockServer::start().await;
    let since = DateTime::parse_from_rfc3339("2024-03-09T16:00:00Z")
        .unwrap()
        .with_timezone(&Utc);

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .and(query_param("items", ""))
        .and(body_string_contains("since_id=1710000000000000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(items_response([])))
        .expect(1)
        .mount(&mock_server.server)
        .await;

    let api = FeverApi::new(mock_server.test_config()).unwrap();
    let items = api.get_items_since(since).await.unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_get_items_with_many_ids_is_chunked() {
    let mock_server = MockServer::start().await;

    // 60 ids split into 50 + 10, "%2C" is the encoded comma
    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .and(query_param("items", ""))
        .and(body_string_contains("with_ids=1%2C2%2C"))
        .respond_with(ResponseTemplate::new(200).set_body_json(items_response(1..=50)))
        .expect(1)
        .mount(&mock_server.server)
        .await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .and(query_param("items", ""))
        .and(body_string_contains("with_ids=51%2C52%2C"))
        .respond_with(ResponseTemplate::new(200).set_body_json(items_response(51..=60)))
        .expect(1)
        .mount(&mock_server.server)
        .await;

    let api = FeverApi::new(mock_server.test_config()).unwrap();
    let query = ItemQuery::new().with_ids((1..=60).map(ItemId::new));
    let items = api.get_items(&query).await.unwrap();

    assert_eq!(items.len(), 60);
    assert_eq!(items[59].id, ItemId::new(60));
}

#[tokio::test]
async fn test_get_feeds_resolves_groups() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .and(query_param("feeds", ""))
        .respond_with(ResponseTemplate::new(200).set_body_json(feeds_response()))
        .mount(&mock_server.server)
        .await;

    let api = FeverApi::new(mock_server.test_config()).unwrap();
    let feeds = api.get_feeds().await.unwrap();

    assert_eq!(feeds.len(), 2);
    assert_eq!(feeds[0].title, "Example Blog");
    assert_eq!(feeds[0].group_id, Some(GroupId::new(1)));
    assert_eq!(feeds[1].id, FeedId::new(4));
    assert_eq!(feeds[1].group_id, None);
    assert_eq!(feeds[1].favicon_id, None);
    assert_eq!(feeds[1].last_updated_on_time, 1_710_000_100);
}

#[tokio::test]
async fn test_get_groups() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .and(query_param("groups", ""))
        .respond_with(ResponseTemplate::new(200).set_body_json(groups_response()))
        .mount(&mock_server.server)
        .await;

    let api = FeverApi::new(mock_server.test_config()).unwrap();
    let groups = api.get_groups().await.unwrap();

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].title, "Tech");
    assert_eq!(groups[0].feed_ids, vec![FeedId::new(3), FeedId::new(5)]);
    assert!(groups[1].feed_ids.is_empty());
}

#[tokio::test]
async fn test_get_unread_items_fetches_by_ids() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .and(query_param("unread_item_ids", ""))
        .respond_with(ResponseTemplate::new(200).set_body_json(unread_ids_response("7,8")))
        .expect(1)
        .mount(&mock_server.server)
        .await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .and(query_param("items", ""))
        .and(body_string_contains("with_ids=7%2C8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(items_response([7, 8])))
        .expect(1)
        .mount(&mock_server.server)
        .await;

    let api = FeverApi::new(mock_server.test_config()).unwrap();
    let items = api.get_unread_items().await.unwrap();

    let ids: Vec<_> = items.iter().map(|item| item.id).collect();
    assert_eq!(ids, vec![ItemId::new(7), ItemId::new(8)]);
}

#[tokio::test]
async fn test_get_saved_items_empty_skips_items_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .and(query_param("saved_item_ids", ""))
        .respond_with(ResponseTemplate::new(200).set_body_json(saved_ids_response("")))
        .expect(1)
        .mount(&mock_server.server)
        .await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .and(query_param("items", ""))
        .respond_with(ResponseTemplate::new(200).set_body_json(items_response([])))
        .expect(0)
        .mount(&mock_server.server)
        .await;

    let api = FeverApi::new(mock_server.test_config()).unwrap();
    let items = api.get_saved_items().await.unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_mark_item() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .and(query_param("api", ""))
        .and(body_string_contains("mark=item&as=saved&id=42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_response(true)))
        .expect(1)
        .mount(&mock_server.server)
        .await;

    let api = FeverApi::new(mock_server.test_config()).unwrap();
    let result = api.mark_item(ItemId::new(42), ItemMark::Saved).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_mark_feed_and_group_read_before() {
    let mock_server = MockServer::start().await;
    let before = DateTime::parse_from_rfc3339("2024-03-09T16:00:00Z")
        .unwrap()
        .with_timezone(&Utc);

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .and(body_string_contains("mark=feed&as=read&id=3&before=1710000000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_response(true)))
        .expect(1)
        .mount(&mock_server.server)
        .await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .and(body_string_contains("mark=group&as=read&id=1&before=1710000000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_response(true)))
        .expect(1)
        .mount(&mock_server.server)
        .await;

    let api = FeverApi::new(mock_server.test_config()).unwrap();
    api.mark_feed_read(FeedId::new(3), before).await.unwrap();
    api.mark_group_read(GroupId::new(1), before).await.unwrap();
}

#[tokio::test]
async fn test_retry_recovers_from_server_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server.server)
        .await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(feeds_response()))
        .expect(1)
        .mount(&mock_server.server)
        .await;

    let api = FeverApi::new(mock_server.test_config()).unwrap();
    let feeds = api.get_feeds().await.unwrap();
    assert_eq!(feeds.len(), 2);
}

#[tokio::test]
async fn test_retries_exhausted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(4)
        .mount(&mock_server.server)
        .await;

    let api = FeverApi::new(mock_server.test_config()).unwrap();
    let result = api.get_groups().await;

    match result {
        Err(ClientError::RetriesExhausted { attempts, source }) => {
            assert_eq!(attempts, 4);
            assert!(matches!(*source, ClientError::Api { status: 500, .. }));
        },
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rate_limit_honours_retry_after() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server.server)
        .await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(unread_ids_response("1,2,3")))
        .expect(1)
        .mount(&mock_server.server)
        .await;

    let api = FeverApi::new(mock_server.test_config()).unwrap();
    let ids = api.get_unread_item_ids().await.unwrap();
    assert_eq!(ids.len(), 3);
}

#[tokio::test]
async fn test_server_error_honours_retry_after() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server.server)
        .await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(saved_ids_response("7")))
        .expect(1)
        .mount(&mock_server.server)
        .await;

    let api = FeverApi::new(mock_server.test_config()).unwrap();
    let started = std::time::Instant::now();
    let ids = api.get_saved_item_ids().await.unwrap();

    assert_eq!(ids, vec![ItemId::new(7)]);
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_request_timeout_maps_to_timeout_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(feeds_response())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server.server)
        .await;

    let mut config = mock_server.test_config();
    config.request.timeout = Duration::from_millis(200);
    config.request.max_retries = 0;

    let api = FeverApi::new(config).unwrap();
    let result = api.get_feeds().await;
    assert!(matches!(result, Err(ClientError::Timeout)));
}

#[tokio::test]
async fn test_invalid_json_reports_endpoint() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .expect(1)
        .mount(&mock_server.server)
        .await;

    let api = FeverApi::new(mock_server.test_config()).unwrap();
    let result = api.get_feeds().await;
    assert!(matches!(result, Err(ClientError::JsonParse { endpoint, .. }) if endpoint == "feeds"));
}

#[tokio::test]
async fn test_get_method_sends_key_in_query() {
    let mock_server = MockServer::start().await;
    let api_key = mock_server.test_config().api_key();

    Mock::given(method("GET"))
        .and(path(FEVER_PATH))
        .and(query_param("groups", ""))
        .and(query_param("api_key", api_key.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(groups_response()))
        .expect(1)
        .mount(&mock_server.server)
        .await;

    let mut config = mock_server.test_config();
    config.request.method = HttpMethod::Get;
    let api = FeverApi::new(config).unwrap();

    let groups = api.get_groups().await.unwrap();
    assert_eq!(groups.len(), 2);
}

#[tokio::test]
async fn test_bulk_fetch_forward_stops_on_short_page() {
    let mock_server = MockServer::start().await;
    let second_cursor = BASE_ITEM_ID + 50;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .and(body_string_contains("since_id=0"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(items_response(id_range(BASE_ITEM_ID, 50))),
        )
        .expect(1)
        .mount(&mock_server.server)
        .await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .and(body_string_contains(format!("since_id={second_cursor}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(items_response(id_range(second_cursor, 10))),
        )
        .expect(1)
        .mount(&mock_server.server)
        .await;

    let api = FeverApi::new(mock_server.test_config()).unwrap();
    let report = api.get_all_items(None, Duration::from_secs(10)).await.unwrap();

    assert_eq!(report.items.len(), 60);
    assert_eq!(report.pages, 2);
    assert!(!report.timed_out);
    assert_eq!(report.items.last().unwrap().id, ItemId::new(second_cursor + 10));
    assert!(report.earliest.is_some());
}

#[tokio::test]
async fn test_bulk_fetch_truncates_to_max_items() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .and(query_param("items", ""))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(items_response(id_range(BASE_ITEM_ID, 50))),
        )
        .expect(1)
        .mount(&mock_server.server)
        .await;

    let api = FeverApi::new(mock_server.test_config()).unwrap();
    let report = api.get_all_items(Some(10), Duration::from_secs(10)).await.unwrap();

    assert_eq!(report.items.len(), 10);
    assert_eq!(report.pages, 1);
}

#[tokio::test]
async fn test_bulk_fetch_backward_pages_with_max_id() {
    let mock_server = MockServer::start().await;
    let start = BASE_ITEM_ID + 101;
    let second_cursor = BASE_ITEM_ID + 51;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .and(body_string_contains(format!("max_id={start}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(items_response((second_cursor..start).rev())),
        )
        .expect(1)
        .mount(&mock_server.server)
        .await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .and(body_string_contains(format!("max_id={second_cursor}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(items_response([])))
        .expect(1)
        .mount(&mock_server.server)
        .await;

    let api = FeverApi::new(mock_server.test_config()).unwrap();
    let report = BulkFetch::builder(&api)
        .direction(FetchDirection::Backward)
        .start(Some(ItemId::new(start)))
        .build()
        .run()
        .await
        .unwrap();

    assert_eq!(report.items.len(), 50);
    assert_eq!(report.pages, 1);
    assert_eq!(report.items[0].id, ItemId::new(start - 1));
}

#[tokio::test]
async fn test_bulk_fetch_zero_budget_times_out_without_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(items_response([])))
        .expect(0)
        .mount(&mock_server.server)
        .await;

    let api = FeverApi::new(mock_server.test_config()).unwrap();
    let report = api.get_all_items(None, Duration::ZERO).await.unwrap();

    assert!(report.timed_out);
    assert!(report.items.is_empty());
}

#[tokio::test]
async fn test_bulk_fetch_zero_cap_sends_no_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(items_response(id_range(0, 50))))
        .expect(0)
        .mount(&mock_server.server)
        .await;

    let api = FeverApi::new(mock_server.test_config()).unwrap();
    let report = api.get_all_items(Some(0), Duration::from_secs(5)).await.unwrap();

    assert_eq!(report.pages, 0);
    assert!(report.items.is_empty());
    assert!(!report.timed_out);
}

#[tokio::test]
async fn test_bulk_fetch_slow_server_hits_time_budget() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(FEVER_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(items_response(id_range(BASE_ITEM_ID, 50)))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server.server)
        .await;

    let api = FeverApi::new(mock_server.test_config()).unwrap();
    let report = api.get_all_items(None, Duration::from_millis(100)).await.unwrap();

    assert!(report.timed_out);
    assert_eq!(report.pages, 0);
}

#[tokio::test]
async fn test_config_validation_in_integration() {
    let result = FeverApi::new(ClientConfig::new("not-a-url", "alice", "secret"));
    assert!(result.is_err());

    let result = FeverApi::new(ClientConfig::new("https://rss.example.com", "alice", ""));
    assert!(result.is_err());

    let result = FeverApi::new(ClientConfig::new("https://rss.example.com", "alice", "secret"));
    assert!(result.is_ok());
}
