use crate::cache::keyed::{CacheEntry, ExpiryPolicy, FetchFuture, Fetcher, KeyedCache, WarmSummary};
use crate::errors::{AppError, AppResult};
use crate::transport::SubResourceSource;
use std::sync::Arc;

/// Lazily populated cache of the one sub-resource a parent may own (for
/// example the poll attached to an event). Entries never expire; they change
/// only through [`LazySubResourceCache::invalidate`] or an explicit forget.
pub struct LazySubResourceCache<T> {
    inner: Arc<KeyedCache<T>>,
}

impl<T> Clone for LazySubResourceCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> LazySubResourceCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(source: Arc<dyn SubResourceSource<T>>) -> Self {
        Self {
            inner: Arc::new(KeyedCache::new(ExpiryPolicy::Never, source_fetcher(source))),
        }
    }

    pub async fn get(&self, parent_id: &str) -> AppResult<Option<T>> {
        self.inner.get(parent_id).await
    }

    /// Resolves the sub-resource for a whole page of parents in parallel.
    pub async fn warm_batch<I>(&self, parent_ids: I) -> WarmSummary
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let summary = self.inner.warm_batch(parent_ids).await;
        tracing::debug!(
            fetched = summary.fetched,
            skipped = summary.skipped,
            failed = summary.failed.len(),
            "sub-resource batch warmed"
        );
        summary
    }

    pub fn invalidate(&self, parent_id: &str, payload: Option<T>) {
        self.inner.invalidate(parent_id, payload);
    }

    pub fn peek(&self, parent_id: &str) -> Option<CacheEntry<T>> {
        self.inner.peek(parent_id)
    }

    pub fn contains(&self, parent_id: &str) -> bool {
        self.inner.contains(parent_id)
    }

    pub fn forget(&self, parent_id: &str) -> bool {
        self.inner.forget(parent_id)
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

fn source_fetcher<T>(source: Arc<dyn SubResourceSource<T>>) -> Fetcher<T>
where
    T: Send + Sync + 'static,
{
    Arc::new(move |parent_id: String| -> FetchFuture<T> {
        let source = Arc::clone(&source);
        Box::pin(async move {
            match source.fetch_by_parent(&parent_id).await?.into_result() {
                Ok(payload) => Ok(payload),
                // the parent exists but has no sub-resource
                Err(AppError::NotFound(_)) => Ok(None),
                Err(error) => Err(error),
            }
        })
    })
}
