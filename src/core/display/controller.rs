//! Generic paginated display controller.
//!
//! One [`DisplayController`] drives one list view of one entity type:
//! initial and continuation fetches, debounced search, filter changes and
//! locale changes. It writes every fetched page into the shared
//! [`PersistedStore`] and keeps a padded [`DisplayBuffer`] for a
//! virtualized renderer.
//!
//! ```text
//!   Idle ──► LoadingInitial ──► HasMore ⇄ LoadingMore
//!                    │                        │
//!                    └────────► Complete ◄────┘
//! ```
//!
//! A view is *canonical* when no search text, server-side filter or static
//! extra parameter is active. Canonical fetches update the store's
//! pagination state and read their cursor from it, so a reload resumes
//! where the last session stopped. Every other fetch is an overlay: its
//! records are merged, its pagination is kept locally.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::filters::{
    apply_client_filters, has_client_filters, missing_required, parse_filters, server_filters,
    FilterDef, FilterPatch, FilterSet, QueryState,
};
use crate::config::{DisplayDefaults, DEFAULT_PAGE_SIZE};
use crate::core::api::{ApiError, ClientProvider, Entity, Lang, ListParams, Page};
use crate::core::store::display::{filled, map_store_to_items, placeholders, splice_page, DisplayBuffer};
use crate::core::store::{PersistedStore, StoreUpdate};

/// Load state of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    LoadingInitial,
    LoadingMore,
    HasMore,
    Complete,
}

/// Why a fetch did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Unmounted,
    InFlight,
    MissingRequiredFilter,
    AlreadyLoaded,
    NoCursor,
    Errored,
}

/// Result of a fetch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A page was fetched and applied.
    Fetched { has_more: bool },
    /// Guarded; nothing was requested.
    Skipped(SkipReason),
    /// The response arrived after the view was reset or unmounted.
    Discarded,
    /// The request failed; the error is in [`DisplayProps::error`].
    Failed,
}

/// Static configuration of one view.
pub struct DisplayConfig<E> {
    pub page_size: usize,
    /// Buffer length while the total is unknown.
    pub default_page_size: usize,
    pub lang: Lang,
    /// Parameters sent with every request.
    pub extra_params: FilterSet,
    pub filters: Vec<FilterDef<E>>,
    /// Location whose query string mirrors the active filters.
    pub location: Option<QueryState>,
    pub search_debounce: Duration,
}

impl<E> Clone for DisplayConfig<E> {
    fn clone(&self) -> Self {
        Self {
            page_size: self.page_size,
            default_page_size: self.default_page_size,
            lang: self.lang,
            extra_params: self.extra_params.clone(),
            filters: self.filters.clone(),
            location: self.location.clone(),
            search_debounce: self.search_debounce,
        }
    }
}

impl<E> std::fmt::Debug for DisplayConfig<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayConfig")
            .field("page_size", &self.page_size)
            .field("default_page_size", &self.default_page_size)
            .field("lang", &self.lang)
            .field("extra_params", &self.extra_params)
            .field("filters", &self.filters)
            .field("location", &self.location)
            .field("search_debounce", &self.search_debounce)
            .finish()
    }
}

impl<E> Default for DisplayConfig<E> {
    fn default() -> Self {
        Self::from_defaults(&DisplayDefaults::default())
    }
}

impl<E> DisplayConfig<E> {
    pub fn from_defaults(defaults: &DisplayDefaults) -> Self {
        let page_size = if defaults.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            defaults.page_size
        };
        Self {
            page_size,
            default_page_size: page_size,
            lang: Lang::default(),
            extra_params: FilterSet::new(),
            filters: Vec::new(),
            location: None,
            search_debounce: defaults.search_debounce(),
        }
    }

    #[must_use]
    pub fn with_lang(mut self, lang: Lang) -> Self {
        self.lang = lang;
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn with_extra_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_filter(mut self, def: FilterDef<E>) -> Self {
        self.filters.push(def);
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: QueryState) -> Self {
        self.location = Some(location);
        self
    }

    #[must_use]
    pub fn with_search_debounce(mut self, debounce: Duration) -> Self {
        self.search_debounce = debounce;
        self
    }
}

/// Render input for the view layer.
#[derive(Debug, Clone)]
pub struct DisplayProps<E> {
    pub results: DisplayBuffer<E>,
    pub loading: bool,
    pub error: Option<Arc<ApiError>>,
    pub filters: FilterSet,
    pub state: LoadState,
    pub searching: bool,
}

struct ViewState<E> {
    mounted: bool,
    in_flight: bool,
    /// Bumped on every reset; responses from an older generation are dropped.
    generation: u64,
    results: DisplayBuffer<E>,
    /// Records placed in `results` by this view (overlay and filtered views).
    placed: usize,
    state: LoadState,
    loading: bool,
    error: Option<Arc<ApiError>>,
    search: Option<String>,
    searching: bool,
    filters: FilterSet,
    lang: Lang,
    query: Option<QueryState>,
    /// Overlay pagination.
    cursor: Option<String>,
    total: Option<u64>,
}

struct Shared<E: Entity> {
    config: DisplayConfig<E>,
    clients: Arc<ClientProvider>,
    store: Arc<PersistedStore>,
    view: Mutex<ViewState<E>>,
    debounce: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to one view's controller. Clones share state.
pub struct DisplayController<E: Entity> {
    shared: Arc<Shared<E>>,
}

impl<E: Entity> Clone for DisplayController<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E: Entity> std::fmt::Debug for DisplayController<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayController")
            .field("kind", &E::KIND)
            .field("config", &self.shared.config)
            .finish()
    }
}

enum Step {
    Initial,
    More,
}

struct Plan {
    generation: u64,
    canonical: bool,
    initial: bool,
    offset: usize,
    lang: Option<Lang>,
    request: Request,
}

enum Request {
    List(ListParams),
    Next(String),
}

impl<E: Entity> DisplayController<E> {
    pub fn new(config: DisplayConfig<E>, clients: Arc<ClientProvider>, store: Arc<PersistedStore>) -> Self {
        let view = ViewState {
            mounted: false,
            in_flight: false,
            generation: 0,
            results: Vec::new(),
            placed: 0,
            state: LoadState::Idle,
            loading: false,
            error: None,
            search: None,
            searching: false,
            filters: FilterSet::new(),
            lang: config.lang,
            query: config.location.clone(),
            cursor: None,
            total: None,
        };
        Self {
            shared: Arc::new(Shared {
                config,
                clients,
                store,
                view: Mutex::new(view),
                debounce: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &DisplayConfig<E> {
        &self.shared.config
    }

    /// Mount the view: seed the buffer from the store when the view is
    /// canonical, then run an unforced initial fetch.
    pub async fn mount(&self) -> FetchOutcome {
        self.attach().await;
        self.fetch(false).await
    }

    /// Mark the view mounted and seed it, without fetching.
    pub(crate) async fn attach(&self) {
        let config = &self.shared.config;
        let mut view = self.shared.view.lock().await;
        view.mounted = true;
        view.generation += 1;
        view.in_flight = false;
        if let Some(filters) = view.query.as_ref().map(|q| parse_filters(q.url(), &config.filters)) {
            view.filters = filters;
        }

        if self.is_canonical(&view) {
            let lang = self.request_lang(&view);
            let default_len = config.default_page_size;
            let (buffer, state) = self
                .shared
                .store
                .read_slice::<E, _>(|store| {
                    if store.is_empty() || !store.matches_lang(lang) {
                        return (Vec::new(), LoadState::Idle);
                    }
                    let state = if store.is_complete() {
                        LoadState::Complete
                    } else if store.next_url.is_some() {
                        LoadState::HasMore
                    } else {
                        LoadState::Idle
                    };
                    (map_store_to_items(store, default_len), state)
                })
                .await;
            view.placed = filled(&buffer);
            view.results = buffer;
            view.state = state;
        }
    }

    /// Initial fetch: reset the buffer to placeholders and request the
    /// first page. Errors are kept in the view state.
    pub async fn fetch(&self, force: bool) -> FetchOutcome {
        let outcome = self.run(Step::Initial, force).await;
        self.settle(outcome).await
    }

    /// Continuation fetch against the current cursor.
    pub async fn load_more(&self) -> FetchOutcome {
        let outcome = self.run(Step::More, false).await;
        self.settle(outcome).await
    }

    /// Initial fetch that returns errors instead of storing them.
    pub(crate) async fn try_fetch(&self, force: bool) -> Result<FetchOutcome, Arc<ApiError>> {
        self.run(Step::Initial, force).await
    }

    /// Continuation fetch that returns errors instead of storing them.
    pub(crate) async fn try_load_more(&self) -> Result<FetchOutcome, Arc<ApiError>> {
        self.run(Step::More, false).await
    }

    /// Virtualization hook: the renderer needs page `page` (zero-based,
    /// `page_size` slots each). Loads more when that range still holds
    /// placeholders.
    pub async fn on_page_added(&self, page: usize) -> FetchOutcome {
        let needs_data = {
            let view = self.shared.view.lock().await;
            let start = page.saturating_mul(self.shared.config.page_size);
            let end = start
                .saturating_add(self.shared.config.page_size)
                .min(view.results.len());
            start >= view.results.len() || view.results[start..end].iter().any(Option::is_none)
        };
        if !needs_data {
            return FetchOutcome::Skipped(SkipReason::AlreadyLoaded);
        }
        self.load_more().await
    }

    /// Debounced search. Each call cancels the pending one; after the
    /// quiet period the results are cleared and a forced initial fetch
    /// runs with the new search text. Empty text clears the search.
    pub async fn on_search_change(&self, text: &str) {
        let search = Some(text.trim().to_string()).filter(|s| !s.is_empty());
        self.shared.view.lock().await.searching = true;

        let mut pending = self.shared.debounce.lock().await;
        if let Some(handle) = pending.take() {
            handle.abort();
        }

        let controller = self.clone();
        let delay = self.shared.config.search_debounce;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            controller.apply_search(search).await;
        }));
    }

    async fn apply_search(&self, search: Option<String>) {
        {
            let mut view = self.shared.view.lock().await;
            if !view.mounted {
                return;
            }
            debug!(kind = %E::KIND, search = ?search, "Applying search");
            view.search = search;
            Self::clear(&mut view);
        }
        self.fetch(true).await;
    }

    /// Merge `patch` into the active filters and the location query
    /// string. Returns the merged set; nothing is fetched until
    /// [`DisplayController::reset_state`] is called with it.
    pub async fn update_query_param(&self, patch: &FilterPatch) -> FilterSet {
        let mut guard = self.shared.view.lock().await;
        let view = &mut *guard;
        match view.query.as_mut() {
            Some(query) => {
                query.update_query_param(patch);
                parse_filters(query.url(), &self.shared.config.filters)
            }
            None => {
                let mut merged = view.filters.clone();
                for (key, value) in patch {
                    match value {
                        Some(value) => merged.insert(key.clone(), value.clone()),
                        None => merged.remove(key),
                    };
                }
                merged
            }
        }
    }

    /// Clear the view and force an initial fetch with `filters`.
    pub async fn reset_state(&self, filters: FilterSet) -> FetchOutcome {
        {
            let mut view = self.shared.view.lock().await;
            view.filters = filters;
            Self::clear(&mut view);
        }
        self.fetch(true).await
    }

    /// Switch locale and refetch.
    pub async fn set_lang(&self, lang: Lang) -> FetchOutcome {
        {
            let mut view = self.shared.view.lock().await;
            if view.lang == lang {
                return FetchOutcome::Skipped(SkipReason::AlreadyLoaded);
            }
            view.lang = lang;
            Self::clear(&mut view);
        }
        self.fetch(true).await
    }

    /// Manual retry after a failure: clear the error and mount again.
    pub async fn retry(&self) -> FetchOutcome {
        self.shared.view.lock().await.error = None;
        self.mount().await
    }

    /// Unmount: pending search is cancelled and in-flight results are
    /// discarded when they arrive.
    pub async fn unmount(&self) {
        if let Some(handle) = self.shared.debounce.lock().await.take() {
            handle.abort();
        }
        let mut view = self.shared.view.lock().await;
        view.mounted = false;
        view.searching = false;
        view.loading = false;
    }

    pub async fn snapshot(&self) -> DisplayProps<E> {
        let view = self.shared.view.lock().await;
        DisplayProps {
            results: view.results.clone(),
            loading: view.loading,
            error: view.error.clone(),
            filters: view.filters.clone(),
            state: view.state,
            searching: view.searching,
        }
    }

    /// Current location, if the view mirrors its filters into one.
    pub async fn location(&self) -> Option<QueryState> {
        self.shared.view.lock().await.query.clone()
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn clear(view: &mut ViewState<E>) {
        view.generation += 1;
        view.in_flight = false;
        view.results.clear();
        view.placed = 0;
        view.cursor = None;
        view.total = None;
        view.error = None;
        view.loading = true;
        view.state = LoadState::Idle;
    }

    fn request_lang(&self, view: &ViewState<E>) -> Option<Lang> {
        E::KIND.is_localized().then_some(view.lang)
    }

    fn server_filters(&self, view: &ViewState<E>) -> FilterSet {
        server_filters(&view.filters, &self.shared.config.filters)
    }

    fn is_canonical(&self, view: &ViewState<E>) -> bool {
        view.search.is_none()
            && self.shared.config.extra_params.is_empty()
            && self.server_filters(view).is_empty()
    }

    async fn settle(&self, outcome: Result<FetchOutcome, Arc<ApiError>>) -> FetchOutcome {
        match outcome {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(kind = %E::KIND, error = %error, "Fetch failed");
                self.shared.view.lock().await.error = Some(error);
                FetchOutcome::Failed
            }
        }
    }

    async fn run(&self, step: Step, force: bool) -> Result<FetchOutcome, Arc<ApiError>> {
        let plan = match self.plan(step, force).await {
            Ok(plan) => plan,
            Err(reason) => {
                debug!(kind = %E::KIND, ?reason, "Fetch skipped");
                return Ok(FetchOutcome::Skipped(reason));
            }
        };

        let response = self.request(&plan.request).await;
        self.apply(plan, response).await
    }

    /// Check guards and mark the view in flight.
    async fn plan(&self, step: Step, force: bool) -> Result<Plan, SkipReason> {
        let config = &self.shared.config;
        let mut view = self.shared.view.lock().await;

        if !view.mounted {
            return Err(SkipReason::Unmounted);
        }
        if view.in_flight {
            return Err(SkipReason::InFlight);
        }
        if let Some(name) = missing_required(&view.filters, &config.filters) {
            debug!(kind = %E::KIND, filter = name, "Required filter unset");
            view.loading = false;
            view.searching = false;
            return Err(SkipReason::MissingRequiredFilter);
        }

        let canonical = self.is_canonical(&view);
        let lang = self.request_lang(&view);
        let (cursor, known_total) = if canonical {
            self.shared
                .store
                .read_slice::<E, _>(|store| {
                    if store.matches_lang(lang) {
                        (store.next_url.clone(), store.count)
                    } else {
                        (None, None)
                    }
                })
                .await
        } else {
            (view.cursor.clone(), view.total)
        };

        let initial = matches!(step, Step::Initial);
        let (request, offset) = match step {
            Step::Initial => {
                let populated = view.results.first().is_some_and(Option::is_some);
                if !force && cursor.is_none() && populated {
                    return Err(SkipReason::AlreadyLoaded);
                }
                let mut filters = config.extra_params.clone();
                filters.extend(self.server_filters(&view));
                let params = ListParams::new(config.page_size)
                    .lang(lang)
                    .search(view.search.clone())
                    .filters(filters);

                let slots = known_total
                    .map(|n| n as usize)
                    .unwrap_or(config.default_page_size);
                view.results = placeholders(slots);
                view.placed = 0;
                view.state = LoadState::LoadingInitial;
                (Request::List(params), 0)
            }
            Step::More => {
                if view.error.is_some() {
                    return Err(SkipReason::Errored);
                }
                let Some(cursor) = cursor else {
                    return Err(SkipReason::NoCursor);
                };
                view.state = LoadState::LoadingMore;
                (Request::Next(cursor), view.placed)
            }
        };

        view.in_flight = true;
        view.loading = true;
        Ok(Plan {
            generation: view.generation,
            canonical,
            initial,
            offset,
            lang,
            request,
        })
    }

    async fn request(&self, request: &Request) -> Result<Page<E>, Arc<ApiError>> {
        let client = self.shared.clients.get().await.map_err(Arc::new)?;
        let page = match request {
            Request::List(params) => client.list::<E>(params).await,
            Request::Next(url) => client.list_next::<E>(url).await,
        };
        page.map_err(Arc::new)
    }

    async fn apply(
        &self,
        plan: Plan,
        response: Result<Page<E>, Arc<ApiError>>,
    ) -> Result<FetchOutcome, Arc<ApiError>> {
        let config = &self.shared.config;
        let mut view = self.shared.view.lock().await;

        if view.generation != plan.generation {
            return Ok(FetchOutcome::Discarded);
        }
        view.in_flight = false;
        if !view.mounted {
            return Ok(FetchOutcome::Discarded);
        }

        let page = match response {
            Ok(page) => page,
            Err(error) => {
                view.loading = false;
                view.searching = false;
                view.state = LoadState::Idle;
                return Err(error);
            }
        };

        let has_more = page.next.is_some();
        let total = page.count;
        let client_filtered = has_client_filters(&view.filters, &config.filters);
        let shown = if client_filtered {
            apply_client_filters(&page.results, &view.filters, &config.filters)
        } else {
            page.results.clone()
        };

        if plan.canonical {
            let fetched = page.results.len();
            self.shared
                .store
                .update::<E>(StoreUpdate::from_page(page, plan.lang))
                .await;
            debug!(kind = %E::KIND, fetched, total, has_more, "Merged canonical page");
        } else {
            view.cursor = page.next.clone();
            view.total = Some(total);
            self.shared
                .store
                .update::<E>(StoreUpdate::items_only(page.results))
                .await;
        }

        if plan.canonical && !client_filtered {
            view.results = self
                .shared
                .store
                .read_slice::<E, _>(|store| map_store_to_items(store, config.default_page_size))
                .await;
            view.placed = filled(&view.results);
        } else {
            let placed = shown.len();
            let slots = if client_filtered {
                let reserve = if has_more { config.page_size } else { 0 };
                plan.offset + placed + reserve
            } else {
                total as usize
            };
            if plan.initial {
                view.results = placeholders(slots);
            }
            splice_page(&mut view.results, plan.offset, shown, slots);
            view.placed = plan.offset + placed;
            if client_filtered {
                view.results.truncate(slots);
            }
        }

        view.loading = false;
        view.searching = false;
        view.state = if has_more {
            LoadState::HasMore
        } else {
            LoadState::Complete
        };
        if !has_more && plan.canonical {
            info!(kind = %E::KIND, total, "Collection fully loaded");
        }

        Ok(FetchOutcome::Fetched { has_more })
    }
}
