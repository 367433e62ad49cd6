//! Shared API client accessor.
//!
//! [`ClientProvider`] is constructed explicitly and handed to every display
//! controller and precondition loop. The first [`ClientProvider::get`]
//! builds the [`ApiClient`]; racing callers wait on the same
//! initialization and all receive the same `Arc`.
//!
//! ```text
//!   get() ──► OnceCell::get_or_try_init ──► cached definition?
//!                                             ├─ yes ─► ApiClient
//!                                             └─ no ──► fetch schema
//!                                                        ├─► on_definition_change(def)
//!                                                        └─► ApiClient
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::OnceCell;
use tracing::{info, instrument};

use super::client::ApiClient;
use super::error::Result;
use super::schema::ApiDefinition;
use crate::config::ApiConfig;

/// Async hook invoked with a freshly downloaded definition.
pub type DefinitionCallback = Arc<dyn Fn(ApiDefinition) -> BoxFuture<'static, ()> + Send + Sync>;

pub struct ClientProvider {
    schema_url: String,
    base_url: Option<String>,
    timeout: Option<Duration>,
    cached: Option<ApiDefinition>,
    on_change: Option<DefinitionCallback>,
    cell: OnceCell<Arc<ApiClient>>,
}

impl std::fmt::Debug for ClientProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientProvider")
            .field("schema_url", &self.schema_url)
            .field("base_url", &self.base_url)
            .field("has_cached_definition", &self.cached.is_some())
            .field("initialized", &self.cell.initialized())
            .finish()
    }
}

impl ClientProvider {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            schema_url: config.schema_url.clone(),
            base_url: Some(config.base_url.clone()).filter(|u| !u.is_empty()),
            timeout: config.request_timeout_secs.map(Duration::from_secs),
            cached: None,
            on_change: None,
            cell: OnceCell::new(),
        }
    }

    /// Use a previously persisted definition instead of downloading one.
    #[must_use]
    pub fn with_cached_definition(mut self, definition: Option<ApiDefinition>) -> Self {
        self.cached = definition;
        self
    }

    /// Register the definition-changed hook.
    #[must_use]
    pub fn on_definition_change(mut self, callback: DefinitionCallback) -> Self {
        self.on_change = Some(callback);
        self
    }

    /// Get the shared client, building it on first use.
    ///
    /// A failed build leaves the provider uninitialized, so the next call
    /// tries again.
    pub async fn get(&self) -> Result<Arc<ApiClient>> {
        self.cell
            .get_or_try_init(|| self.build())
            .await
            .map(Arc::clone)
    }

    /// The client, if it has already been built.
    pub fn get_if_ready(&self) -> Option<Arc<ApiClient>> {
        self.cell.get().cloned()
    }

    #[instrument(skip(self), fields(schema_url = %self.schema_url))]
    async fn build(&self) -> Result<Arc<ApiClient>> {
        let http = ApiClient::http_client(self.timeout)?;

        let definition = match &self.cached {
            Some(definition) => definition.clone(),
            None => {
                let definition = ApiDefinition::fetch(&http, &self.schema_url).await?;
                if let Some(callback) = &self.on_change {
                    callback(definition.clone()).await;
                }
                definition
            }
        };

        let client = ApiClient::from_definition(&definition, self.base_url.as_deref(), http)?;
        info!(
            version = client.version(),
            base_url = client.base_url(),
            "API client ready"
        );
        Ok(Arc::new(client))
    }
}
