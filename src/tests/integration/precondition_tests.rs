//! Required-data precondition tests
//!
//! - Walking every page until the collection is complete
//! - Retrying failed steps after the backoff
//! - Ending on a missing `next` link
//! - Resuming from a persisted cursor
//! - Locale switches and reopened cursors

use std::sync::Arc;

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::core::api::{Item, Lang, World};
use crate::core::display::{FetchOutcome, FilterSet, SkipReason};
use crate::core::store::{MemoryStateStorage, StateStorage};
use crate::tests::common::*;

const ITEMS: &str = "/api/v1/items/";
const WORLDS: &str = "/api/v1/worlds/";

#[tokio::test]
async fn test_require_items_walks_every_page() {
    let server = start_server().await;

    Mock::given(method("GET"))
        .and(path(ITEMS))
        .and(query_param("offset", "0"))
        .and(query_param("limit", "2"))
        .and(query_param("lang", "english"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(
            3,
            Some(next_url(&server, ITEMS, "limit=2&offset=2&lang=english")),
            vec![item_json(1), item_json(2)],
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(ITEMS))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(
            3,
            None,
            vec![item_json(3)],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = test_context(&server).await;
    ctx.preconditions().require_items().await;

    let (keys, count, next, lang) = ctx
        .store()
        .read_slice::<Item, _>(|s| {
            (
                s.items.keys().copied().collect::<Vec<_>>(),
                s.count,
                s.next_url.clone(),
                s.lang,
            )
        })
        .await;
    assert_eq!(keys, vec![1, 2, 3]);
    assert_eq!(count, Some(3));
    assert_eq!(next, None);
    assert_eq!(lang, Some(Lang::English));
    assert!(ctx.preconditions().is_satisfied::<Item>().await);
}

#[tokio::test]
async fn test_require_retries_after_server_error() {
    let server = start_server().await;

    Mock::given(method("GET"))
        .and(path(WORLDS))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(WORLDS))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(
            2,
            None,
            vec![world_json(10), world_json(11)],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = test_context(&server).await;
    ctx.preconditions().require_worlds().await;

    assert_eq!(ctx.store().read_slice::<World, _>(|s| s.len()).await, 2);
    assert!(ctx.preconditions().is_satisfied::<World>().await);
}

#[tokio::test]
async fn test_require_ends_when_next_is_missing() {
    let server = start_server().await;

    // Backend over-reports the total.
    Mock::given(method("GET"))
        .and(path(WORLDS))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(
            5,
            None,
            vec![world_json(1), world_json(2)],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = test_context(&server).await;
    ctx.preconditions().require_worlds().await;

    let (len, count) = ctx
        .store()
        .read_slice::<World, _>(|s| (s.len(), s.count))
        .await;
    assert_eq!(len, 2);
    assert_eq!(count, Some(5));
}

#[tokio::test]
async fn test_concurrent_requires_share_one_loop() {
    let server = start_server().await;

    Mock::given(method("GET"))
        .and(path(WORLDS))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page_json(1, None, vec![world_json(1)]))
                .set_delay(std::time::Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ctx = test_context(&server).await;
    let preconditions = ctx.preconditions();
    tokio::join!(
        preconditions.require_worlds(),
        preconditions.require_worlds(),
        preconditions.require_worlds(),
    );

    assert_eq!(ctx.store().read_slice::<World, _>(|s| s.len()).await, 1);
}

#[tokio::test]
async fn test_continuation_resumes_from_persisted_cursor() {
    let server = MockServer::start().await;
    // Second session reuses the persisted definition.
    mount_schema(&server, Some(1)).await;

    Mock::given(method("GET"))
        .and(path(ITEMS))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(
            3,
            Some(next_url(&server, ITEMS, "limit=2&offset=2&lang=english")),
            vec![item_json(1), item_json(2)],
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(ITEMS))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(
            3,
            None,
            vec![item_json(3)],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let storage: Arc<dyn StateStorage> = Arc::new(MemoryStateStorage::new());

    // First session loads one page, then shuts down.
    {
        let ctx = context_with_storage(&server, Arc::clone(&storage)).await;
        let controller = ctx.controller::<Item>().await;
        assert_eq!(controller.mount().await, FetchOutcome::Fetched { has_more: true });
        controller.unmount().await;
        ctx.store().flush().await.unwrap();
    }

    // Second session picks up at offset 2.
    let ctx = context_with_storage(&server, storage).await;
    assert_eq!(ctx.store().read_slice::<Item, _>(|s| s.len()).await, 2);
    ctx.preconditions().require_items().await;

    let keys = ctx
        .store()
        .read_slice::<Item, _>(|s| s.items.keys().copied().collect::<Vec<_>>())
        .await;
    assert_eq!(keys, vec![1, 2, 3]);
}

fn german_item_json(game_id: u64) -> serde_json::Value {
    serde_json::json!({"game_id": game_id, "name": format!("Gegenstand {game_id}")})
}

async fn mount_item_pages(server: &MockServer, lang: &str, pages: [Vec<serde_json::Value>; 2]) {
    let [first, second] = pages;
    let count = (first.len() + second.len()) as u64;
    Mock::given(method("GET"))
        .and(path(ITEMS))
        .and(query_param("offset", "0"))
        .and(query_param("lang", lang))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(
            count,
            Some(next_url(server, ITEMS, &format!("limit=2&offset=2&lang={lang}"))),
            first,
        )))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(ITEMS))
        .and(query_param("offset", "2"))
        .and(query_param("lang", lang))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(count, None, second)))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_language_switch_reloads_every_page() {
    let server = start_server().await;
    mount_item_pages(
        &server,
        "english",
        [vec![item_json(1), item_json(2)], vec![item_json(3), item_json(4)]],
    )
    .await;
    mount_item_pages(
        &server,
        "german",
        [
            vec![german_item_json(1), german_item_json(2)],
            vec![german_item_json(3), german_item_json(4)],
        ],
    )
    .await;

    let ctx = test_context(&server).await;
    ctx.preconditions().require_items().await;
    assert!(ctx.preconditions().is_satisfied::<Item>().await);

    ctx.set_language(Lang::German).await;
    assert!(!ctx.preconditions().is_satisfied::<Item>().await);
    ctx.preconditions().require_items().await;

    let (len, count, next, lang, all_german) = ctx
        .store()
        .read_slice::<Item, _>(|s| {
            (
                s.len(),
                s.count,
                s.next_url.clone(),
                s.lang,
                s.items.values().all(|i| i.fields.contains_key("name")),
            )
        })
        .await;
    assert_eq!(len, 4);
    assert_eq!(count, Some(4));
    assert_eq!(next, None);
    assert_eq!(lang, Some(Lang::German));
    assert!(all_german);
}

#[tokio::test]
async fn test_refetched_first_page_reopens_precondition() {
    let server = start_server().await;

    Mock::given(method("GET"))
        .and(path(ITEMS))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(
            3,
            Some(next_url(&server, ITEMS, "limit=2&offset=2&lang=english")),
            vec![item_json(1), item_json(2)],
        )))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(ITEMS))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(
            3,
            None,
            vec![item_json(3)],
        )))
        .expect(2)
        .mount(&server)
        .await;

    let ctx = test_context(&server).await;
    ctx.preconditions().require_items().await;
    assert!(ctx.preconditions().is_satisfied::<Item>().await);

    let controller = ctx.controller::<Item>().await;
    assert_eq!(
        controller.mount().await,
        FetchOutcome::Skipped(SkipReason::AlreadyLoaded)
    );
    assert_eq!(
        controller.reset_state(FilterSet::new()).await,
        FetchOutcome::Fetched { has_more: true }
    );

    // every record is cached, but the cursor is open again
    assert_eq!(ctx.store().read_slice::<Item, _>(|s| s.len()).await, 3);
    assert!(!ctx.preconditions().is_satisfied::<Item>().await);

    ctx.preconditions().require_items().await;
    let next = ctx.store().read_slice::<Item, _>(|s| s.next_url.clone()).await;
    assert_eq!(next, None);
    assert!(ctx.preconditions().is_satisfied::<Item>().await);
}
