//! Test Fixtures
//!
//! A wiremock server that serves the schema document plus helpers for
//! building page bodies, configs and contexts pointed at it.

use std::sync::Arc;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::config::{ApiConfig, AppConfig, DisplayDefaults};
use crate::core::context::DataContext;
use crate::core::store::{MemoryStateStorage, StateStorage};

pub const SCHEMA_PATH: &str = "/api/v1/schema/";

/// Collection paths, in the order the schema lists them.
pub const COLLECTIONS: [(&str, &str, &str, &str); 9] = [
    ("/api/v1/worlds/", "listWorlds", "retrieveWorld", "id"),
    ("/api/v1/items/", "listItems", "retrieveItem", "game_id"),
    ("/api/v1/colors/", "listColors", "retrieveColor", "game_id"),
    ("/api/v1/metals/", "listMetals", "retrieveMetal", "game_id"),
    ("/api/v1/emojis/", "listEmojis", "retrieveEmoji", "name"),
    ("/api/v1/recipes/", "listRecipes", "retrieveRecipe", "id"),
    ("/api/v1/recipe-groups/", "listRecipeGroups", "retrieveRecipeGroup", "id"),
    ("/api/v1/skills/", "listSkills", "retrieveSkill", "id"),
    ("/api/v1/skill-groups/", "listSkillGroups", "retrieveSkillGroup", "id"),
];

// =============================================================================
// Schema
// =============================================================================

/// Schema document declaring every list and retrieve operation.
pub fn schema_json(server_url: &str) -> Value {
    let mut paths = serde_json::Map::new();
    for (collection, list_id, retrieve_id, param) in COLLECTIONS {
        paths.insert(
            collection.to_string(),
            json!({"get": {"operationId": list_id}}),
        );
        paths.insert(
            format!("{collection}{{{param}}}/"),
            json!({"get": {"operationId": retrieve_id}}),
        );
    }
    json!({
        "openapi": "3.0.2",
        "info": {"title": "Boundlexx API", "version": "v1-test"},
        "servers": [{"url": server_url}],
        "paths": paths,
    })
}

/// Start a server that serves the schema document.
pub async fn start_server() -> MockServer {
    let server = MockServer::start().await;
    mount_schema(&server, None).await;
    server
}

/// Mount the schema endpoint, optionally asserting how often it is hit.
pub async fn mount_schema(server: &MockServer, expected_calls: Option<u64>) {
    let mut mock = Mock::given(method("GET"))
        .and(path(SCHEMA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(schema_json(&server.uri())));
    if let Some(calls) = expected_calls {
        mock = mock.expect(calls);
    }
    mock.mount(server).await;
}

// =============================================================================
// Page bodies
// =============================================================================

pub fn world_json(id: u64) -> Value {
    json!({"id": id, "display_name": format!("World {id}"), "tier": 1})
}

pub fn item_json(game_id: u64) -> Value {
    json!({"game_id": game_id, "string_id": format!("ITEM_{game_id}"), "localization": []})
}

pub fn page_json(count: u64, next: Option<String>, results: Vec<Value>) -> Value {
    json!({
        "count": count,
        "next": next,
        "previous": null,
        "results": results,
    })
}

/// Absolute continuation URL on `server`.
pub fn next_url(server: &MockServer, collection: &str, query: &str) -> String {
    format!("{}{}?{}", server.uri(), collection, query)
}

// =============================================================================
// Configs and contexts
// =============================================================================

pub fn api_config(server: &MockServer) -> ApiConfig {
    ApiConfig {
        base_url: server.uri(),
        schema_url: format!("{}{}", server.uri(), SCHEMA_PATH),
        request_timeout_secs: Some(5),
    }
}

/// Config pointed at `server` with short timings.
pub fn test_config(server: &MockServer) -> AppConfig {
    AppConfig {
        api: api_config(server),
        display: DisplayDefaults {
            page_size: 2,
            search_debounce_ms: 50,
            retry_backoff_ms: 20,
        },
        ..AppConfig::default()
    }
}

/// Context over fresh in-memory storage.
pub async fn test_context(server: &MockServer) -> DataContext {
    context_with_storage(server, Arc::new(MemoryStateStorage::new())).await
}

pub async fn context_with_storage(server: &MockServer, storage: Arc<dyn StateStorage>) -> DataContext {
    DataContext::with_storage(test_config(server), storage)
        .await
        .expect("Failed to open test context")
}
