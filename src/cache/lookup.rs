use crate::cache::keyed::{ExpiryPolicy, FetchFuture, Fetcher, KeyedCache};
use crate::errors::AppResult;
use crate::settings::ControllerSettings;
use crate::transport::LookupSource;
use std::sync::Arc;
use tokio::time::Duration;

pub const DEFAULT_LOOKUP_TTL: Duration = Duration::from_secs(300);

/// Option lists for dropdowns ("clubs", "services", ...). Unlike the
/// sub-resource cache these expire after a fixed interval.
pub struct LookupCache<T> {
    inner: Arc<KeyedCache<Vec<T>>>,
    ttl: Duration,
}

impl<T> Clone for LookupCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            ttl: self.ttl,
        }
    }
}

impl<T> LookupCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(source: Arc<dyn LookupSource<T>>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(KeyedCache::new(ExpiryPolicy::After(ttl), lookup_fetcher(source))),
            ttl,
        }
    }

    /// Uses the TTL configured for the screen.
    pub fn from_settings(source: Arc<dyn LookupSource<T>>, settings: &ControllerSettings) -> Self {
        Self::new(source, settings.lookup_ttl())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn options(&self, name: &str) -> AppResult<Vec<T>> {
        Ok(self.inner.get(name).await?.unwrap_or_default())
    }

    pub fn cached(&self, name: &str) -> Option<Vec<T>> {
        self.inner.peek(name).and_then(|entry| entry.payload)
    }

    pub fn invalidate(&self, name: &str) -> bool {
        self.inner.forget(name)
    }

    pub fn clear(&self) {
        self.inner.clear();
    }
}

fn lookup_fetcher<T>(source: Arc<dyn LookupSource<T>>) -> Fetcher<Vec<T>>
where
    T: Send + Sync + 'static,
{
    Arc::new(move |name: String| -> FetchFuture<Vec<T>> {
        let source = Arc::clone(&source);
        Box::pin(async move { source.fetch_options(&name).await?.into_result() })
    })
}
