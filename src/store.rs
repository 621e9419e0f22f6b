use crate::errors::{AppError, AppResult};
use crate::models::{merge_objects, Entity, ViewMode};
use crate::pagination::PaginationState;
use serde_json::Value;

/// One page of entities for a single view, with its fetch bookkeeping.
#[derive(Debug, Clone)]
pub struct CollectionStore<E: Entity> {
    view: ViewMode,
    items: Vec<E>,
    pagination: PaginationState,
    issued_generation: u64,
    loading: bool,
    loaded: bool,
    stale: bool,
    last_error: Option<String>,
}

impl<E: Entity> CollectionStore<E> {
    pub fn new(view: ViewMode, limit: u32) -> Self {
        Self {
            view,
            items: Vec::new(),
            pagination: PaginationState::new(limit),
            issued_generation: 0,
            loading: false,
            loaded: false,
            stale: false,
            last_error: None,
        }
    }

    pub fn view(&self) -> ViewMode {
        self.view
    }

    pub fn items(&self) -> &[E] {
        &self.items
    }

    pub fn pagination(&self) -> PaginationState {
        self.pagination
    }

    pub fn pagination_mut(&mut self) -> &mut PaginationState {
        &mut self.pagination
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// True when the cached page no longer matches the current filters.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.issued_generation
    }

    pub fn find(&self, id: &str) -> Option<&E> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Issues a new generation tag for an outgoing list request.
    pub fn begin_fetch(&mut self) -> u64 {
        self.issued_generation += 1;
        self.loading = true;
        self.issued_generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.issued_generation
    }

    /// Makes every outstanding request stale without issuing a new one.
    pub fn invalidate_pending(&mut self) {
        self.issued_generation += 1;
        self.loading = false;
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn replace(&mut self, entities: Vec<E>, pagination: PaginationState) {
        self.items = entities;
        self.pagination = pagination;
        self.loaded = true;
        self.stale = false;
        self.last_error = None;
    }

    /// Applies a list response if it belongs to the latest request.
    pub fn accept(&mut self, generation: u64, entities: Vec<E>, pagination: PaginationState) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.loading = false;
        self.replace(entities, pagination);
        true
    }

    /// Records a failed list request; previous items stay visible.
    pub fn fail(&mut self, generation: u64, message: String) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.loading = false;
        self.last_error = Some(message);
        true
    }

    /// Merges `partial` (a JSON object) into the entity with `id`.
    pub fn patch_by_id(&mut self, id: &str, partial: &Value) -> AppResult<bool> {
        let Some(slot) = self.items.iter_mut().find(|item| item.id() == id) else {
            return Ok(false);
        };
        let mut value = serde_json::to_value(&*slot)?;
        merge_objects(&mut value, partial)?;
        let patched: E = serde_json::from_value(value)?;
        if patched.id() != id {
            return Err(AppError::Internal(format!(
                "Patch for {} attempted to change the entity id to {}",
                id,
                patched.id()
            )));
        }
        *slot = patched;
        Ok(true)
    }

    /// Swaps in a fresh copy of an entity already on the page.
    pub fn replace_entity(&mut self, entity: E) -> bool {
        match self.items.iter_mut().find(|item| item.id() == entity.id()) {
            Some(slot) => {
                *slot = entity;
                true
            }
            None => false,
        }
    }

    pub fn remove_by_id(&mut self, id: &str) -> Option<E> {
        let index = self.items.iter().position(|item| item.id() == id)?;
        Some(self.items.remove(index))
    }

    pub fn set_deleted_flag(&mut self, id: &str, deleted: bool) -> bool {
        match self.items.iter_mut().find(|item| item.id() == id) {
            Some(item) => {
                item.set_deleted(deleted);
                true
            }
            None => false,
        }
    }

    pub fn set_limit(&mut self, limit: u32) {
        self.pagination = self.pagination.with_limit(limit);
    }
}

/// The active and soft-deleted stores plus the flag choosing the visible one.
#[derive(Debug, Clone)]
pub struct ViewStores<E: Entity> {
    mode: ViewMode,
    active: CollectionStore<E>,
    deleted: CollectionStore<E>,
}

impl<E: Entity> ViewStores<E> {
    pub fn new(limit: u32) -> Self {
        Self {
            mode: ViewMode::Active,
            active: CollectionStore::new(ViewMode::Active, limit),
            deleted: CollectionStore::new(ViewMode::Deleted, limit),
        }
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
    }

    pub fn visible(&self) -> &CollectionStore<E> {
        self.store(self.mode)
    }

    pub fn store(&self, mode: ViewMode) -> &CollectionStore<E> {
        match mode {
            ViewMode::Active => &self.active,
            ViewMode::Deleted => &self.deleted,
        }
    }

    pub fn store_mut(&mut self, mode: ViewMode) -> &mut CollectionStore<E> {
        match mode {
            ViewMode::Active => &mut self.active,
            ViewMode::Deleted => &mut self.deleted,
        }
    }

    /// Every view whose loaded page holds `id`.
    pub fn holding(&self, id: &str) -> Vec<ViewMode> {
        [ViewMode::Active, ViewMode::Deleted]
            .into_iter()
            .filter(|mode| self.store(*mode).contains(id))
            .collect()
    }
}
