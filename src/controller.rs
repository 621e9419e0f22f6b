use crate::cache::LazySubResourceCache;
use crate::errors::AppResult;
use crate::filters::{FilterCriteria, FilterPatch, FilterState};
use crate::models::{Entity, Envelope, ListData, ListQuery, ViewMode};
use crate::pagination::PaginationState;
use crate::settings::ControllerSettings;
use crate::store::ViewStores;
use crate::transport::ResourceClient;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use uuid::Uuid;

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type PageHook = Arc<dyn Fn(Vec<String>) -> HookFuture + Send + Sync>;

enum ListApply {
    Applied(Vec<String>),
    Stale,
    /// The requested page is beyond the last one; carries the page to load instead.
    PastEnd(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The response was written to the store.
    Applied,
    /// A newer request was issued before this one landed; the response was dropped.
    Stale,
    /// Nothing was requested (controller disposed or nothing to do).
    Skipped,
}

/// What a screen renders from: the visible view, copied out of the controller.
#[derive(Debug, Clone)]
pub struct CollectionSnapshot<E> {
    pub view: ViewMode,
    pub items: Vec<E>,
    pub pagination: PaginationState,
    pub filters: Arc<FilterCriteria>,
    pub is_loading: bool,
    pub error: Option<String>,
}

pub(crate) struct ControllerState<E: Entity> {
    pub(crate) filters: FilterState,
    pub(crate) stores: ViewStores<E>,
    pub(crate) disposed: bool,
}

pub(crate) struct ControllerInner<E: Entity> {
    pub(crate) instance_id: String,
    pub(crate) resource: String,
    pub(crate) client: Arc<dyn ResourceClient<E>>,
    pub(crate) settings: ControllerSettings,
    pub(crate) state: Mutex<ControllerState<E>>,
    page_hooks: Mutex<Vec<PageHook>>,
}

/// Paginated, filterable view over one REST resource with an active and a
/// soft-deleted branch. Clones share the same state; call
/// [`ResourceController::dispose`] when the owning screen goes away.
pub struct ResourceController<E: Entity> {
    pub(crate) inner: Arc<ControllerInner<E>>,
}

impl<E: Entity> Clone for ResourceController<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Entity> ResourceController<E> {
    pub fn new(resource: &str, client: Arc<dyn ResourceClient<E>>, settings: ControllerSettings) -> Self {
        let settings = settings.normalized();
        let state = ControllerState {
            filters: FilterState::new(settings.default_filters(), settings.search_debounce()),
            stores: ViewStores::new(settings.page_size),
            disposed: false,
        };
        let instance_id = Uuid::new_v4().to_string();
        tracing::debug!(resource = %resource, instance_id = %instance_id, "collection controller created");
        Self {
            inner: Arc::new(ControllerInner {
                instance_id,
                resource: resource.to_string(),
                client,
                settings,
                state: Mutex::new(state),
                page_hooks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn resource(&self) -> &str {
        &self.inner.resource
    }

    pub fn instance_id(&self) -> &str {
        &self.inner.instance_id
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.inner.settings
    }

    /// Registers a sub-resource cache that is warmed for every page loaded.
    pub fn warm_on_page_load<T>(&self, cache: LazySubResourceCache<T>)
    where
        T: Clone + Send + Sync + 'static,
    {
        let hook: PageHook = Arc::new(move |parent_ids: Vec<String>| -> HookFuture {
            let cache = cache.clone();
            Box::pin(async move {
                let summary = cache.warm_batch(parent_ids).await;
                if !summary.failed.is_empty() {
                    tracing::warn!(failed = ?summary.failed, "some sub-resources could not be loaded");
                }
            })
        });
        self.inner
            .page_hooks
            .lock()
            .expect("controller page hooks lock")
            .push(hook);
    }

    pub fn view_mode(&self) -> ViewMode {
        self.lock().stores.mode()
    }

    pub fn filters(&self) -> Arc<FilterCriteria> {
        self.lock().filters.current()
    }

    pub fn filter_commit_count(&self) -> u64 {
        self.lock().filters.commit_count()
    }

    pub fn is_search_pending(&self) -> bool {
        self.lock().filters.debouncer().is_pending()
    }

    pub fn visible_items(&self) -> Vec<E> {
        self.lock().stores.visible().items().to_vec()
    }

    pub fn items(&self, view: ViewMode) -> Vec<E> {
        self.lock().stores.store(view).items().to_vec()
    }

    pub fn pagination(&self) -> PaginationState {
        self.lock().stores.visible().pagination()
    }

    pub fn pagination_for(&self, view: ViewMode) -> PaginationState {
        self.lock().stores.store(view).pagination()
    }

    pub fn snapshot(&self) -> CollectionSnapshot<E> {
        let state = self.lock();
        let store = state.stores.visible();
        CollectionSnapshot {
            view: store.view(),
            items: store.items().to_vec(),
            pagination: store.pagination(),
            filters: state.filters.current(),
            is_loading: store.is_loading(),
            error: store.last_error().map(ToString::to_string),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    /// Loads page `page` of the visible view.
    pub async fn fetch_page(&self, page: u32) -> AppResult<FetchOutcome> {
        let view = self.view_mode();
        self.fetch_view(view, page).await
    }

    /// Reloads the page currently shown.
    pub async fn refresh(&self) -> AppResult<FetchOutcome> {
        let (view, page) = {
            let state = self.lock();
            let store = state.stores.visible();
            (store.view(), store.pagination().current_page())
        };
        self.fetch_view(view, page).await
    }

    pub async fn next_page(&self) -> AppResult<FetchOutcome> {
        let pagination = self.pagination();
        if !pagination.has_next_page() {
            return Ok(FetchOutcome::Skipped);
        }
        self.fetch_page(pagination.current_page() + 1).await
    }

    pub async fn prev_page(&self) -> AppResult<FetchOutcome> {
        let pagination = self.pagination();
        if !pagination.has_prev_page() {
            return Ok(FetchOutcome::Skipped);
        }
        self.fetch_page(pagination.current_page() - 1).await
    }

    /// Changes the page size of both views and reloads the first page.
    pub async fn set_page_size(&self, limit: u32) -> AppResult<FetchOutcome> {
        let view = {
            let mut state = self.lock();
            if state.disposed {
                return Ok(FetchOutcome::Skipped);
            }
            let view = state.stores.mode();
            state.stores.store_mut(view).set_limit(limit);
            let other = state.stores.store_mut(view.other());
            other.set_limit(limit);
            other.mark_stale();
            other.invalidate_pending();
            view
        };
        self.fetch_view(view, 1).await
    }

    /// Switches the visible view. The target view is fetched only when it has
    /// never been loaded or its page predates the current filters.
    pub async fn set_view_mode(&self, mode: ViewMode) -> AppResult<FetchOutcome> {
        let page = {
            let mut state = self.lock();
            if state.disposed {
                return Ok(FetchOutcome::Skipped);
            }
            state.stores.set_mode(mode);
            let store = state.stores.store(mode);
            if store.is_stale() {
                Some(1)
            } else if !store.is_loaded() {
                Some(store.pagination().current_page())
            } else {
                None
            }
        };
        match page {
            Some(page) => self.fetch_view(mode, page).await,
            None => Ok(FetchOutcome::Skipped),
        }
    }

    /// Merges `patch` into the filters and reloads page 1 immediately.
    pub async fn update_filters(&self, patch: FilterPatch) -> AppResult<FetchOutcome> {
        let view = {
            let mut state = self.lock();
            if state.disposed {
                return Ok(FetchOutcome::Skipped);
            }
            state.filters.apply(&patch);
            Self::retire_other_view(&mut state);
            state.stores.mode()
        };
        self.fetch_view(view, 1).await
    }

    /// Restores the configured default filters and reloads page 1.
    pub async fn clear_filters(&self) -> AppResult<FetchOutcome> {
        let view = {
            let mut state = self.lock();
            if state.disposed {
                return Ok(FetchOutcome::Skipped);
            }
            state.filters.debouncer_mut().cancel();
            state.filters.reset();
            Self::retire_other_view(&mut state);
            state.stores.mode()
        };
        self.fetch_view(view, 1).await
    }

    /// Debounced search. Only the last text entered within the quiet period
    /// is committed. Must be called from within a tokio runtime.
    pub fn update_search(&self, text: impl Into<String>) {
        let text = text.into();
        let weak: Weak<ControllerInner<E>> = Arc::downgrade(&self.inner);
        let mut state = self.lock();
        if state.disposed {
            return;
        }
        state.filters.debouncer_mut().schedule(move |token| async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let controller = ResourceController { inner };
            controller.commit_search(token, text).await;
        });
    }

    /// Cancels pending work and stops accepting responses. Idempotent.
    pub fn dispose(&self) {
        let mut state = self.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.filters.debouncer_mut().cancel();
        state.stores.store_mut(ViewMode::Active).invalidate_pending();
        state.stores.store_mut(ViewMode::Deleted).invalidate_pending();
        tracing::debug!(
            resource = %self.inner.resource,
            instance_id = %self.inner.instance_id,
            "collection controller disposed"
        );
    }

    async fn commit_search(&self, token: u64, text: String) {
        let view = {
            let mut state = self.lock();
            if state.disposed || !state.filters.debouncer_mut().complete(token) {
                return;
            }
            state.filters.apply(&FilterPatch::search(text));
            Self::retire_other_view(&mut state);
            state.stores.mode()
        };
        if let Err(error) = self.fetch_view(view, 1).await {
            tracing::warn!(resource = %self.inner.resource, error = %error, "search fetch failed");
        }
    }

    pub(crate) async fn fetch_view(&self, view: ViewMode, page: u32) -> AppResult<FetchOutcome> {
        let mut page = page.max(1);
        loop {
            let (generation, query) = {
                let mut state = self.lock();
                if state.disposed {
                    return Ok(FetchOutcome::Skipped);
                }
                let filters = state.filters.current();
                let limit = state.stores.store(view).pagination().limit();
                let query = self.build_query(&filters, view, page, limit);
                let generation = state.stores.store_mut(view).begin_fetch();
                (generation, query)
            };

            tracing::debug!(
                resource = %self.inner.resource,
                view = view.as_str(),
                page = query.page,
                generation,
                "list request issued"
            );
            let response = self
                .inner
                .client
                .list(&self.inner.resource, &query)
                .await
                .and_then(Envelope::into_data);

            match self.apply_list_response(view, generation, &query, response)? {
                ListApply::Applied(parent_ids) => {
                    self.run_page_hooks(parent_ids).await;
                    return Ok(FetchOutcome::Applied);
                }
                ListApply::Stale => return Ok(FetchOutcome::Stale),
                ListApply::PastEnd(last_page) => {
                    tracing::debug!(
                        resource = %self.inner.resource,
                        view = view.as_str(),
                        requested = query.page,
                        last_page,
                        "requested page is past the end; reloading last page"
                    );
                    page = last_page;
                }
            }
        }
    }

    fn apply_list_response(
        &self,
        view: ViewMode,
        generation: u64,
        query: &ListQuery,
        response: AppResult<ListData<E>>,
    ) -> AppResult<ListApply> {
        let mut state = self.lock();
        let store = state.stores.store_mut(view);
        match response {
            Ok(data) => {
                if !store.is_current(generation) {
                    tracing::debug!(
                        resource = %self.inner.resource,
                        view = view.as_str(),
                        generation,
                        "discarding stale list response"
                    );
                    return Ok(ListApply::Stale);
                }
                let pagination = PaginationState::from_server(&data.pagination, query.limit);
                if data.pagination.total_pages != pagination.total_pages() {
                    tracing::debug!(
                        resource = %self.inner.resource,
                        reported = data.pagination.total_pages,
                        derived = pagination.total_pages(),
                        "server page count disagrees with total count"
                    );
                }
                // rows for a page that no longer exists never reach the store
                if query.page > pagination.last_page() {
                    return Ok(ListApply::PastEnd(pagination.last_page()));
                }
                let ids = data.items.iter().map(|item| item.id().to_string()).collect();
                store.accept(generation, data.items, pagination);
                Ok(ListApply::Applied(ids))
            }
            Err(error) => {
                if !store.fail(generation, error.message().to_string()) {
                    return Ok(ListApply::Stale);
                }
                tracing::warn!(
                    resource = %self.inner.resource,
                    view = view.as_str(),
                    error = %error,
                    "list request failed; keeping previous page"
                );
                Err(error)
            }
        }
    }

    async fn run_page_hooks(&self, parent_ids: Vec<String>) {
        if parent_ids.is_empty() {
            return;
        }
        let hooks = self
            .inner
            .page_hooks
            .lock()
            .expect("controller page hooks lock")
            .clone();
        for hook in hooks {
            hook(parent_ids.clone()).await;
        }
    }

    fn build_query(&self, filters: &FilterCriteria, view: ViewMode, page: u32, limit: u32) -> ListQuery {
        ListQuery {
            page,
            limit,
            sort_by: filters.sort_by.clone(),
            sort_order: filters.sort_order,
            search: filters.search_term().map(ToString::to_string),
            view,
            include_deleted: view == ViewMode::Active && self.inner.settings.include_deleted,
            filters: filters.fields.clone(),
        }
    }

    /// The hidden view's page was loaded under the old filters.
    fn retire_other_view(state: &mut ControllerState<E>) {
        let other = state.stores.mode().other();
        let store = state.stores.store_mut(other);
        store.mark_stale();
        store.invalidate_pending();
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ControllerState<E>> {
        self.inner.state.lock().expect("controller state lock")
    }
}
