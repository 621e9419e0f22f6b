use crate::cache::LazySubResourceCache;
use crate::controller::{ControllerState, ResourceController};
use crate::errors::{AppError, AppResult};
use crate::models::{merge_objects, Entity, Envelope, ViewMode};
use crate::transport::SubResourceClient;
use serde_json::Value;
use std::sync::Arc;

impl<E: Entity> ResourceController<E> {
    /// Creates an entity. The new row is not inserted locally; the active view
    /// reloads page 1 so ordering and totals come from the server.
    pub async fn create(&self, body: Value) -> AppResult<E> {
        let created = self
            .inner
            .client
            .create(&self.inner.resource, &body)
            .await
            .and_then(Envelope::into_data)
            .inspect_err(|error| self.log_failure("create", None, error))?;

        tracing::info!(resource = %self.inner.resource, id = %created.id(), "entity created");
        if let Err(error) = self.fetch_view(ViewMode::Active, 1).await {
            tracing::warn!(
                resource = %self.inner.resource,
                error = %error,
                "reload after create failed"
            );
        }
        Ok(created)
    }

    /// Updates an entity and patches the stored copy with the server's
    /// canonical version layered over `patch`.
    pub async fn update(&self, id: &str, patch: Value) -> AppResult<E> {
        if !patch.is_object() {
            return Err(AppError::Validation {
                message: "Update payload must be an object".to_string(),
                fields: Vec::new(),
            });
        }

        let canonical = self
            .inner
            .client
            .update(&self.inner.resource, id, &patch)
            .await
            .and_then(Envelope::into_data)
            .inspect_err(|error| self.log_failure("update", Some(id), error))?;

        let mut merged = patch;
        merge_objects(&mut merged, &serde_json::to_value(&canonical)?)?;

        let mut state = self.lock();
        if state.disposed {
            return Ok(canonical);
        }
        for view in [ViewMode::Active, ViewMode::Deleted] {
            let store = state.stores.store_mut(view);
            if let Err(error) = store.patch_by_id(id, &merged) {
                tracing::warn!(
                    resource = %self.inner.resource,
                    id = %id,
                    error = %error,
                    "merged patch did not fit entity; storing server copy"
                );
                store.replace_entity(canonical.clone());
            }
        }
        Ok(canonical)
    }

    /// Soft-deletes an entity. With deleted rows hidden the row leaves the
    /// active page; otherwise only its flag changes.
    pub async fn soft_delete(&self, id: &str) -> AppResult<()> {
        self.inner
            .client
            .soft_delete(&self.inner.resource, id)
            .await
            .and_then(Envelope::into_result)
            .inspect_err(|error| self.log_failure("soft_delete", Some(id), error))?;

        let drift = {
            let mut state = self.lock();
            if state.disposed {
                return Ok(());
            }
            state.stores.store_mut(ViewMode::Deleted).mark_stale();
            if self.inner.settings.include_deleted {
                state.stores.store_mut(ViewMode::Active).set_deleted_flag(id, true);
                None
            } else {
                remove_local(&mut state, ViewMode::Active, id)
            }
        };
        self.settle_drift(ViewMode::Active, drift).await;
        Ok(())
    }

    /// Restores a soft-deleted entity. It leaves the deleted page and shows up
    /// in the active view on that view's next fetch.
    pub async fn restore(&self, id: &str) -> AppResult<()> {
        self.inner
            .client
            .restore(&self.inner.resource, id)
            .await
            .and_then(Envelope::into_result)
            .inspect_err(|error| self.log_failure("restore", Some(id), error))?;

        let drift = {
            let mut state = self.lock();
            if state.disposed {
                return Ok(());
            }
            state.stores.store_mut(ViewMode::Active).mark_stale();
            if self.inner.settings.include_deleted {
                state.stores.store_mut(ViewMode::Active).set_deleted_flag(id, false);
            }
            remove_local(&mut state, ViewMode::Deleted, id)
        };
        self.settle_drift(ViewMode::Deleted, drift).await;
        Ok(())
    }

    /// Permanently deletes an entity. With deleted rows listed in the active
    /// view the same row can sit in both stores; it leaves every one of them.
    pub async fn permanent_delete(&self, id: &str) -> AppResult<()> {
        self.inner
            .client
            .permanent_delete(&self.inner.resource, id)
            .await
            .and_then(Envelope::into_result)
            .inspect_err(|error| self.log_failure("permanent_delete", Some(id), error))?;

        let drifts: Vec<(ViewMode, Option<u32>)> = {
            let mut state = self.lock();
            if state.disposed {
                return Ok(());
            }
            state
                .stores
                .holding(id)
                .into_iter()
                .map(|view| (view, remove_local(&mut state, view, id)))
                .collect()
        };
        tracing::info!(resource = %self.inner.resource, id = %id, "entity permanently deleted");
        for (view, drift) in drifts {
            self.settle_drift(view, drift).await;
        }
        Ok(())
    }

    /// Reads one entity and refreshes the stored copy when it is on a page.
    pub async fn get(&self, id: &str) -> AppResult<E> {
        let entity = self
            .inner
            .client
            .get(&self.inner.resource, id)
            .await
            .and_then(Envelope::into_data)
            .inspect_err(|error| self.log_failure("get", Some(id), error))?;

        let mut state = self.lock();
        if state.disposed {
            return Ok(entity);
        }
        for view in [ViewMode::Active, ViewMode::Deleted] {
            state.stores.store_mut(view).replace_entity(entity.clone());
        }
        Ok(entity)
    }

    /// Clamp-and-refetch when a local removal pushed the page past the end.
    async fn settle_drift(&self, view: ViewMode, drift: Option<u32>) {
        let Some(page) = drift else {
            return;
        };
        tracing::debug!(
            resource = %self.inner.resource,
            view = view.as_str(),
            page,
            "current page fell past the end; reloading last page"
        );
        if let Err(error) = self.fetch_view(view, page).await {
            tracing::warn!(resource = %self.inner.resource, error = %error, "reload after removal failed");
        }
    }

    fn log_failure(&self, operation: &str, id: Option<&str>, error: &AppError) {
        tracing::warn!(
            resource = %self.inner.resource,
            operation,
            id = id.unwrap_or("-"),
            error = %error,
            "mutation rejected"
        );
    }
}

/// Removes `id` from `view` and adjusts its totals. Returns the clamped page
/// to reload when the current page no longer exists.
fn remove_local<E: Entity>(state: &mut ControllerState<E>, view: ViewMode, id: &str) -> Option<u32> {
    let store = state.stores.store_mut(view);
    store.remove_by_id(id)?;
    if store.pagination_mut().record_removed(1) {
        Some(store.pagination_mut().clamp_current())
    } else {
        None
    }
}

/// Mutations on a parent-scoped sub-resource that keep its cache in step.
pub struct SubResourceMutations<T> {
    client: Arc<dyn SubResourceClient<T>>,
    cache: LazySubResourceCache<T>,
}

impl<T> SubResourceMutations<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(client: Arc<dyn SubResourceClient<T>>, cache: LazySubResourceCache<T>) -> Self {
        Self { client, cache }
    }

    pub fn cache(&self) -> &LazySubResourceCache<T> {
        &self.cache
    }

    pub async fn create(&self, parent_id: &str, body: &Value) -> AppResult<T> {
        let item = self
            .client
            .create_for_parent(parent_id, body)
            .await
            .and_then(Envelope::into_data)?;
        self.cache.invalidate(parent_id, Some(item.clone()));
        Ok(item)
    }

    pub async fn update(&self, parent_id: &str, id: &str, patch: &Value) -> AppResult<T> {
        let item = self.client.update(id, patch).await.and_then(Envelope::into_data)?;
        self.cache.invalidate(parent_id, Some(item.clone()));
        Ok(item)
    }

    pub async fn delete(&self, parent_id: &str, id: &str) -> AppResult<()> {
        self.client.delete(id).await.and_then(Envelope::into_result)?;
        self.cache.invalidate(parent_id, None);
        Ok(())
    }
}
