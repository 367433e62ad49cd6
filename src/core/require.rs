//! Required-data preconditions.
//!
//! Views that cross-reference other collections (a recipe needs its items,
//! a world its colors) wait on [`Preconditions`] until the collection they
//! need is fully cached. These loops retry forever with a fixed backoff.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::DisplayDefaults;
use crate::core::api::{
    ClientProvider, Color, Emoji, Entity, EntityKind, Item, Lang, Metal, RecipeGroup, Skill,
    SkillGroup, World,
};
use crate::core::display::{DisplayConfig, DisplayController, FetchOutcome};
use crate::core::store::PersistedStore;

/// Drives canonical fetch loops until entity collections are complete.
pub struct Preconditions {
    clients: Arc<ClientProvider>,
    store: Arc<PersistedStore>,
    defaults: DisplayDefaults,
    locks: HashMap<EntityKind, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for Preconditions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preconditions")
            .field("page_size", &self.defaults.page_size)
            .field("retry_backoff_ms", &self.defaults.retry_backoff_ms)
            .finish()
    }
}

impl Preconditions {
    pub fn new(clients: Arc<ClientProvider>, store: Arc<PersistedStore>, defaults: DisplayDefaults) -> Self {
        let locks = EntityKind::ALL
            .into_iter()
            .map(|kind| (kind, Arc::new(Mutex::new(()))))
            .collect();
        Self {
            clients,
            store,
            defaults,
            locks,
        }
    }

    pub fn retry_backoff(&self) -> Duration {
        self.defaults.retry_backoff()
    }

    /// Whether `E`'s collection is already complete for the current locale.
    pub async fn is_satisfied<E: Entity>(&self) -> bool {
        let lang = self.lang_for::<E>().await;
        self.store
            .read_slice::<E, _>(|store| store.is_complete_for(lang))
            .await
    }

    /// Resolve once every `E` record is cached.
    ///
    /// Starts over from the first page when pagination is unknown or was
    /// fetched for another locale, otherwise resumes from the stored cursor.
    /// Failed steps are retried after the backoff, without limit. A page
    /// with no `next` link ends the loop even if fewer records than the
    /// reported count arrived.
    #[instrument(skip(self), fields(kind = %E::KIND))]
    pub async fn require<E: Entity>(&self) {
        let lock = self.locks.get(&E::KIND).cloned().unwrap_or_default();
        let _guard = lock.lock().await;

        let lang = self.lang_for::<E>().await;
        let config = DisplayConfig::<E>::from_defaults(&self.defaults).with_lang(lang.unwrap_or_default());
        let controller = DisplayController::new(config, Arc::clone(&self.clients), Arc::clone(&self.store));
        controller.attach().await;

        let mut attempt: u32 = 0;
        loop {
            let (complete, resumable) = self
                .store
                .read_slice::<E, _>(|store| {
                    (
                        store.is_complete_for(lang),
                        store.count.is_some() && store.matches_lang(lang) && store.next_url.is_some(),
                    )
                })
                .await;
            if complete {
                break;
            }

            let step = if resumable {
                controller.try_load_more().await
            } else {
                controller.try_fetch(true).await
            };

            match step {
                Ok(FetchOutcome::Fetched { has_more: false }) => break,
                Ok(FetchOutcome::Fetched { has_more: true }) => {
                    attempt = 0;
                }
                Ok(other) => {
                    debug!(outcome = ?other, "Step did not fetch, waiting");
                    tokio::time::sleep(self.retry_backoff()).await;
                }
                Err(error) => {
                    attempt += 1;
                    warn!(attempt, error = %error, "Required data fetch failed, retrying");
                    tokio::time::sleep(self.retry_backoff()).await;
                }
            }
        }

        let (records, count) = self.store.read(|state| state.slice_progress(E::KIND)).await;
        info!(records, ?count, "Required data ready");
    }

    pub async fn require_worlds(&self) {
        self.require::<World>().await
    }

    pub async fn require_items(&self) {
        self.require::<Item>().await
    }

    pub async fn require_colors(&self) {
        self.require::<Color>().await
    }

    pub async fn require_metals(&self) {
        self.require::<Metal>().await
    }

    pub async fn require_emojis(&self) {
        self.require::<Emoji>().await
    }

    pub async fn require_skills(&self) {
        self.require::<Skill>().await
    }

    pub async fn require_skill_groups(&self) {
        self.require::<SkillGroup>().await
    }

    pub async fn require_recipe_groups(&self) {
        self.require::<RecipeGroup>().await
    }

    /// Every named precondition, concurrently.
    pub async fn require_all(&self) {
        tokio::join!(
            self.require_worlds(),
            self.require_items(),
            self.require_colors(),
            self.require_metals(),
            self.require_emojis(),
            self.require_skills(),
            self.require_skill_groups(),
            self.require_recipe_groups(),
        );
    }

    async fn lang_for<E: Entity>(&self) -> Option<Lang> {
        if E::KIND.is_localized() {
            Some(self.store.language().await)
        } else {
            None
        }
    }
}
