//! API client and provider tests
//!
//! - One client and one schema download under concurrent first use
//! - The definition hook persisting the downloaded schema
//! - Retrieve by key, including 404 handling

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::core::api::{ApiDefinition, ApiError, ClientProvider, Emoji, World};
use crate::tests::common::*;

#[tokio::test]
async fn test_concurrent_get_builds_one_client() {
    let server = MockServer::start().await;
    mount_schema(&server, Some(1)).await;

    let calls = Arc::new(AtomicUsize::new(0));
    let hook_calls = Arc::clone(&calls);
    let provider = Arc::new(ClientProvider::new(&api_config(&server)).on_definition_change(
        Arc::new(move |_definition: ApiDefinition| {
            hook_calls.fetch_add(1, Ordering::SeqCst);
            async {}.boxed()
        }),
    ));

    let clients = join_all((0..10).map(|_| {
        let provider = Arc::clone(&provider);
        tokio::spawn(async move { provider.get().await })
    }))
    .await;

    let clients: Vec<_> = clients
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();
    assert!(clients.iter().all(|c| Arc::ptr_eq(c, &clients[0])));
    assert_eq!(clients[0].version(), "v1-test");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_downloaded_definition_is_persisted() {
    let server = start_server().await;
    let ctx = test_context(&server).await;
    assert!(ctx.store().api_definition().await.is_none());

    let client = ctx.clients().get().await.unwrap();
    let stored = ctx.store().api_definition().await.unwrap();
    assert_eq!(stored.info.version, client.version());
    assert_eq!(stored.paths.len(), 18);
}

#[tokio::test]
async fn test_retrieve_world_by_id() {
    let server = start_server().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/worlds/42/"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(world_json(42)))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = test_context(&server).await;
    let client = ctx.clients().get().await.unwrap();
    let world: World = client.retrieve::<World>(&42).await.unwrap();
    assert_eq!(world.id, 42);
    assert_eq!(world.fields["display_name"], "World 42");
}

#[tokio::test]
async fn test_retrieve_missing_record_is_not_found() {
    let server = start_server().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/emojis/nope/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({"detail": "Not found."})))
        .mount(&server)
        .await;

    let ctx = test_context(&server).await;
    let client = ctx.clients().get().await.unwrap();
    let err = client.retrieve::<Emoji>(&"nope".to_string()).await.unwrap_err();

    assert!(err.is_not_found());
    match err {
        ApiError::NotFound { operation, key } => {
            assert_eq!(operation, "retrieveEmoji");
            assert_eq!(key, "nope");
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_page_is_json_error() {
    let server = start_server().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/worlds/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let ctx = test_context(&server).await;
    let client = ctx.clients().get().await.unwrap();
    let err = client
        .list::<World>(&crate::core::api::ListParams::new(2))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Json(_)));
}
