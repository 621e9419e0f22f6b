use crate::errors::AppResult;
use crate::models::{Entity, Envelope, ListData, ListQuery};
use async_trait::async_trait;
use serde_json::Value;

/// REST collaborator for one family of resources.
///
/// Returning `Err` means the request never completed (transport failure);
/// a server-side refusal comes back as an envelope with `success == false`.
#[async_trait]
pub trait ResourceClient<E: Entity>: Send + Sync {
    async fn list(&self, resource: &str, query: &ListQuery) -> AppResult<Envelope<ListData<E>>>;

    async fn get(&self, resource: &str, id: &str) -> AppResult<Envelope<E>>;

    async fn create(&self, resource: &str, body: &Value) -> AppResult<Envelope<E>>;

    async fn update(&self, resource: &str, id: &str, patch: &Value) -> AppResult<Envelope<E>>;

    async fn soft_delete(&self, resource: &str, id: &str) -> AppResult<Envelope<()>>;

    async fn restore(&self, resource: &str, id: &str) -> AppResult<Envelope<()>>;

    async fn permanent_delete(&self, resource: &str, id: &str) -> AppResult<Envelope<()>>;
}

/// Looks up the single sub-resource attached to a parent entity. A successful
/// envelope without data means the parent has none.
#[async_trait]
pub trait SubResourceSource<T>: Send + Sync {
    async fn fetch_by_parent(&self, parent_id: &str) -> AppResult<Envelope<T>>;
}

/// Mutations on a parent-scoped sub-resource.
#[async_trait]
pub trait SubResourceClient<T>: Send + Sync {
    async fn create_for_parent(&self, parent_id: &str, body: &Value) -> AppResult<Envelope<T>>;

    async fn update(&self, id: &str, patch: &Value) -> AppResult<Envelope<T>>;

    async fn delete(&self, id: &str) -> AppResult<Envelope<()>>;
}

/// Option lists for dropdowns, keyed by lookup name.
#[async_trait]
pub trait LookupSource<T>: Send + Sync {
    async fn fetch_options(&self, name: &str) -> AppResult<Envelope<Vec<T>>>;
}
