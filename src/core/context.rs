//! Application data context.
//!
//! [`DataContext`] wires the store, the shared API client and the
//! precondition loops together. Construct one per process and hand out
//! clones of its `Arc`s; nothing in the crate is a global.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::AppConfig;
use crate::core::api::{
    ApiDefinition, ClientProvider, DefinitionCallback, Entity, EntityKind, Lang, Universe,
};
use crate::core::display::{DisplayConfig, DisplayController};
use crate::core::require::Preconditions;
use crate::core::store::{
    ExpiryPolicy, FileStateStorage, PersistedStore, Result, SliceName, StateStorage,
};

#[derive(Debug)]
pub struct DataContext {
    config: AppConfig,
    store: Arc<PersistedStore>,
    clients: Arc<ClientProvider>,
    preconditions: Preconditions,
    sweeper: Option<JoinHandle<()>>,
}

impl DataContext {
    /// Open the context over file storage in the configured data directory.
    pub async fn open(config: AppConfig) -> Result<Self> {
        let storage = Arc::new(FileStateStorage::new(config.data_dir()));
        Self::with_storage(config, storage).await
    }

    /// Open the context over any storage backend.
    pub async fn with_storage(config: AppConfig, storage: Arc<dyn StateStorage>) -> Result<Self> {
        let policy = ExpiryPolicy::from_config(&config.cache);
        let store = Arc::new(PersistedStore::open(storage, policy).await?);
        Ok(Self::from_store(config, store).await)
    }

    /// Build the context around an already opened store.
    pub async fn from_store(config: AppConfig, store: Arc<PersistedStore>) -> Self {
        let cached = store.api_definition().await;
        if cached.is_some() {
            info!("Using persisted API definition");
        }

        let clients = Arc::new(
            ClientProvider::new(&config.api)
                .with_cached_definition(cached)
                .on_definition_change(store_definition(Arc::clone(&store))),
        );
        let preconditions = Preconditions::new(
            Arc::clone(&clients),
            Arc::clone(&store),
            config.display.clone(),
        );
        let sweeper = (config.cache.sweep_interval_secs > 0).then(|| {
            store.spawn_expiry_sweep(Duration::from_secs(config.cache.sweep_interval_secs))
        });

        Self {
            config,
            store,
            clients,
            preconditions,
            sweeper,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<PersistedStore> {
        &self.store
    }

    pub fn clients(&self) -> &Arc<ClientProvider> {
        &self.clients
    }

    pub fn preconditions(&self) -> &Preconditions {
        &self.preconditions
    }

    /// Display configuration for `E` with the configured defaults and the
    /// current locale.
    pub async fn display_config<E: Entity>(&self) -> DisplayConfig<E> {
        DisplayConfig::from_defaults(&self.config.display).with_lang(self.store.language().await)
    }

    /// A controller for `E` using [`DataContext::display_config`].
    pub async fn controller<E: Entity>(&self) -> DisplayController<E> {
        let config = self.display_config::<E>().await;
        self.controller_with(config)
    }

    pub fn controller_with<E: Entity>(&self, config: DisplayConfig<E>) -> DisplayController<E> {
        DisplayController::new(config, Arc::clone(&self.clients), Arc::clone(&self.store))
    }

    pub async fn set_language(&self, lang: Lang) {
        self.store.set_language(lang).await;
    }

    pub async fn change_universe(&self, universe: Universe) -> bool {
        self.store.change_universe(universe).await
    }

    /// Per-slice `(name, records, count)` for entity slices.
    pub async fn summary(&self) -> Vec<(SliceName, usize, Option<u64>)> {
        self.store
            .read(|state| {
                EntityKind::ALL
                    .into_iter()
                    .map(|kind| {
                        let (records, count) = state.slice_progress(kind);
                        (SliceName::for_kind(kind), records, count)
                    })
                    .collect()
            })
            .await
    }
}

impl Drop for DataContext {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

/// Definition hook that writes a downloaded definition into the `api` slice.
fn store_definition(store: Arc<PersistedStore>) -> DefinitionCallback {
    Arc::new(move |definition: ApiDefinition| {
        let store = Arc::clone(&store);
        async move {
            store.set_api_definition(definition).await;
        }
        .boxed()
    })
}
