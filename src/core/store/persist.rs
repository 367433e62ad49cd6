//! Cache-expiry persistence.
//!
//! The whole [`RootState`] is written as one JSON object under
//! [`ROOT_KEY`]. Each slice object carries a `__persisted_at` epoch-seconds
//! stamp; on load, a slice older than its TTL is replaced by its initial
//! value before anything reads it.
//!
//! ```text
//! {
//!   "prefs":  { "language": "english", "universe": "live", "__persisted_at": 1700000000 },
//!   "worlds": { "items": {...}, "count": 3, "nextUrl": null, "__persisted_at": 1700000000 },
//!   ...
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use super::error::Result;
use super::keyed::{KeyedStore, StoreUpdate};
use super::state::{RootState, SliceName};
use super::storage::{MemoryStateStorage, StateStorage, ROOT_KEY};
use crate::config::CacheConfig;
use crate::core::api::schema::ApiDefinition;
use crate::core::api::types::{Entity, Lang, Universe};

/// Field added to every persisted slice.
pub const PERSISTED_AT_KEY: &str = "__persisted_at";

// ============================================================================
// ExpiryPolicy
// ============================================================================

/// Per-slice time-to-live. Slices without an entry never expire.
#[derive(Debug, Clone, Default)]
pub struct ExpiryPolicy {
    ttls: HashMap<SliceName, Duration>,
}

impl ExpiryPolicy {
    /// No slice ever expires.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        let catalog = Duration::from_secs(config.catalog_ttl_secs);
        let mut ttls = HashMap::new();
        ttls.insert(SliceName::Api, Duration::from_secs(config.api_ttl_secs));
        ttls.insert(SliceName::Worlds, Duration::from_secs(config.worlds_ttl_secs));
        for name in SliceName::ALL {
            if name.is_entity() && name != SliceName::Worlds {
                ttls.insert(name, catalog);
            }
        }
        Self { ttls }
    }

    #[must_use]
    pub fn with_ttl(mut self, name: SliceName, ttl: Duration) -> Self {
        self.ttls.insert(name, ttl);
        self
    }

    pub fn ttl(&self, name: SliceName) -> Option<Duration> {
        self.ttls.get(&name).copied()
    }

    /// Whether a slice stamped at `persisted_at` is stale at `now`.
    pub fn is_expired(&self, name: SliceName, persisted_at: i64, now: i64) -> bool {
        match self.ttl(name) {
            Some(ttl) => now.saturating_sub(persisted_at) > ttl.as_secs() as i64,
            None => false,
        }
    }
}

// ============================================================================
// Blob encoding
// ============================================================================

/// Result of decoding a persisted blob.
#[derive(Debug, Default)]
pub struct Rehydrated {
    pub state: RootState,
    /// Stamp of every slice that survived.
    pub stamps: HashMap<SliceName, i64>,
    /// Slices reset because they were stale, unstamped or undecodable.
    pub reset: Vec<SliceName>,
}

/// Decode a blob, resetting stale slices.
///
/// Fails only when the blob itself is not a JSON object; individual bad
/// slices are reset and reported in [`Rehydrated::reset`].
pub fn rehydrate(blob: &str, policy: &ExpiryPolicy, now: i64) -> Result<Rehydrated> {
    let mut root: Map<String, Value> = serde_json::from_str(blob)?;
    let mut out = Rehydrated::default();

    for name in SliceName::ALL {
        let Some(Value::Object(mut slice)) = root.remove(name.as_str()) else {
            continue;
        };

        let persisted_at = slice.remove(PERSISTED_AT_KEY).and_then(|v| v.as_i64());
        let stale = match persisted_at {
            Some(at) => policy.is_expired(name, at, now),
            None => policy.ttl(name).is_some(),
        };
        if stale {
            debug!(slice = name.as_str(), ?persisted_at, "Dropping expired slice");
            out.reset.push(name);
            continue;
        }

        match out.state.set_slice_from_value(name, Value::Object(slice)) {
            Ok(()) => {
                out.stamps.insert(name, persisted_at.unwrap_or(now));
            }
            Err(e) => {
                warn!(slice = name.as_str(), error = %e, "Discarding undecodable slice");
                out.reset.push(name);
            }
        }
    }

    Ok(out)
}

/// Encode the state, stamping each slice. Unstamped slices get `now`.
pub fn dehydrate(state: &RootState, stamps: &HashMap<SliceName, i64>, now: i64) -> Result<String> {
    let mut root = Map::new();
    for name in SliceName::ALL {
        let mut value = state.slice_to_value(name)?;
        if let Value::Object(slice) = &mut value {
            let at = stamps.get(&name).copied().unwrap_or(now);
            slice.insert(PERSISTED_AT_KEY.to_string(), Value::from(at));
        }
        root.insert(name.as_str().to_string(), value);
    }
    Ok(serde_json::to_string(&Value::Object(root))?)
}

// ============================================================================
// PersistedStore
// ============================================================================

#[derive(Debug, Default)]
struct Inner {
    root: RootState,
    stamps: HashMap<SliceName, i64>,
}

/// The application store: root state behind an async lock, persisted to a
/// [`StateStorage`] backend with per-slice expiry.
///
/// Every mutation goes through one write guard, so a merge is observed
/// whole or not at all.
pub struct PersistedStore {
    inner: RwLock<Inner>,
    storage: Arc<dyn StateStorage>,
    policy: ExpiryPolicy,
}

impl std::fmt::Debug for PersistedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedStore")
            .field("storage", &self.storage.name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl PersistedStore {
    /// Empty store over ephemeral memory storage.
    pub fn in_memory(policy: ExpiryPolicy) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            storage: Arc::new(MemoryStateStorage::new()),
            policy,
        }
    }

    /// Load and rehydrate the store from `storage`.
    ///
    /// A blob that is not valid JSON is discarded with a warning and the
    /// store starts empty; storage I/O errors are returned.
    #[instrument(skip(storage, policy), fields(storage = storage.name()))]
    pub async fn open(storage: Arc<dyn StateStorage>, policy: ExpiryPolicy) -> Result<Self> {
        Self::open_at(storage, policy, Utc::now().timestamp()).await
    }

    /// [`PersistedStore::open`] with an explicit clock.
    pub async fn open_at(
        storage: Arc<dyn StateStorage>,
        policy: ExpiryPolicy,
        now: i64,
    ) -> Result<Self> {
        let inner = match storage.load(ROOT_KEY).await? {
            Some(blob) => match rehydrate(&blob, &policy, now) {
                Ok(rehydrated) => {
                    if !rehydrated.reset.is_empty() {
                        info!(
                            reset = ?rehydrated.reset.iter().map(|n| n.as_str()).collect::<Vec<_>>(),
                            "Reset stale slices on load"
                        );
                    }
                    Inner {
                        root: rehydrated.state,
                        stamps: rehydrated.stamps,
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Persisted state is corrupt, starting empty");
                    Inner::default()
                }
            },
            None => Inner::default(),
        };

        Ok(Self {
            inner: RwLock::new(inner),
            storage,
            policy,
        })
    }

    pub fn policy(&self) -> &ExpiryPolicy {
        &self.policy
    }

    /// Run `f` against the current state under a read guard.
    pub async fn read<R>(&self, f: impl FnOnce(&RootState) -> R) -> R {
        let inner = self.inner.read().await;
        f(&inner.root)
    }

    /// Run `f` against one entity slice under a read guard.
    pub async fn read_slice<E: Entity, R>(&self, f: impl FnOnce(&KeyedStore<E::Key, E>) -> R) -> R {
        let inner = self.inner.read().await;
        f(E::slice(&inner.root))
    }

    /// Merge a batch into `E`'s slice.
    pub async fn update<E: Entity>(&self, update: StoreUpdate<E>) {
        let now = Utc::now().timestamp();
        let mut inner = self.inner.write().await;
        E::slice_mut(&mut inner.root).merge(update);
        inner.stamps.insert(SliceName::for_kind(E::KIND), now);
    }

    pub async fn language(&self) -> Lang {
        self.read(|state| state.prefs.language).await
    }

    pub async fn set_language(&self, language: Lang) {
        let now = Utc::now().timestamp();
        let mut inner = self.inner.write().await;
        inner.root.prefs.language = language;
        inner.stamps.insert(SliceName::Prefs, now);
    }

    pub async fn api_definition(&self) -> Option<ApiDefinition> {
        self.read(|state| state.api.def.clone()).await
    }

    pub async fn set_api_definition(&self, definition: ApiDefinition) {
        let now = Utc::now().timestamp();
        let mut inner = self.inner.write().await;
        inner.root.api.def = Some(definition);
        inner.stamps.insert(SliceName::Api, now);
    }

    /// Switch universe. Entity caches belong to one universe, so a change
    /// drops all of them. Returns whether anything changed.
    pub async fn change_universe(&self, universe: Universe) -> bool {
        let now = Utc::now().timestamp();
        let mut inner = self.inner.write().await;
        if inner.root.prefs.universe == universe {
            return false;
        }
        inner.root.prefs.universe = universe;
        inner.stamps.insert(SliceName::Prefs, now);
        for name in SliceName::ALL.into_iter().filter(SliceName::is_entity) {
            inner.root.reset_slice(name);
            inner.stamps.remove(&name);
        }
        info!(?universe, "Universe changed, entity caches cleared");
        true
    }

    /// Reset slices that have outlived their TTL since they were last
    /// written. Returns the slices that were reset.
    pub async fn expire_stale(&self, now: i64) -> Vec<SliceName> {
        let mut inner = self.inner.write().await;
        let stale: Vec<SliceName> = inner
            .stamps
            .iter()
            .filter(|(name, at)| self.policy.is_expired(**name, **at, now))
            .map(|(name, _)| *name)
            .collect();
        for name in &stale {
            inner.root.reset_slice(*name);
            inner.stamps.remove(name);
        }
        if !stale.is_empty() {
            debug!(count = stale.len(), "Expired stale slices");
        }
        stale
    }

    /// Run [`PersistedStore::expire_stale`] every `period` in a background
    /// task. The task ends on its own once the store is dropped.
    pub fn spawn_expiry_sweep(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let reset = store.expire_stale(Utc::now().timestamp()).await;
                if !reset.is_empty() {
                    info!(
                        reset = ?reset.iter().map(|n| n.as_str()).collect::<Vec<_>>(),
                        "Expiry sweep reset stale slices"
                    );
                }
            }
        })
    }

    /// Write the current state to storage.
    #[instrument(skip(self), fields(storage = self.storage.name()))]
    pub async fn flush(&self) -> Result<()> {
        let blob = {
            let inner = self.inner.read().await;
            dehydrate(&inner.root, &inner.stamps, Utc::now().timestamp())?
        };
        self.storage.save(ROOT_KEY, &blob).await
    }

    /// Drop every cached slice, in memory and in storage. Recovery action
    /// for corrupted state.
    #[instrument(skip(self))]
    pub async fn purge(&self) -> Result<()> {
        {
            let mut inner = self.inner.write().await;
            *inner = Inner::default();
        }
        self.storage.remove(ROOT_KEY).await?;
        info!("Purged persisted state");
        Ok(())
    }
}
