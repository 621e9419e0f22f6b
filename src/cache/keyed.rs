use crate::errors::{AppError, AppResult};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::time::{Duration, Instant};

pub type FetchFuture<T> = Pin<Box<dyn Future<Output = AppResult<Option<T>>> + Send>>;
pub type Fetcher<T> = Arc<dyn Fn(String) -> FetchFuture<T> + Send + Sync>;

/// How long a settled entry stays usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryPolicy {
    Never,
    After(Duration),
}

impl ExpiryPolicy {
    fn is_expired(self, stored_at: Instant) -> bool {
        match self {
            Self::Never => false,
            Self::After(ttl) => stored_at.elapsed() >= ttl,
        }
    }
}

/// Snapshot of one key. A settled entry with `payload == None` means the
/// fetch succeeded and confirmed there is nothing to show.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub parent_id: String,
    pub payload: Option<T>,
    pub is_loading: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarmSummary {
    pub fetched: usize,
    pub skipped: usize,
    pub failed: Vec<String>,
}

type Outcome<T> = Option<AppResult<Option<T>>>;

enum Slot<T> {
    Loading {
        ticket: u64,
        done: watch::Receiver<Outcome<T>>,
    },
    Ready {
        payload: Option<T>,
        stored_at: Instant,
    },
}

struct SlotTable<T> {
    slots: HashMap<String, Slot<T>>,
    next_ticket: u64,
}

struct Pending<T> {
    key: String,
    ticket: u64,
    done: watch::Receiver<Outcome<T>>,
}

enum Lookup<T> {
    Hit(Option<T>),
    Wait(Pending<T>),
    Miss,
}

/// Keyed cache with single-flight fetching. Every key is fetched by at most
/// one task at a time; later callers subscribe to the same completion.
pub struct KeyedCache<T> {
    policy: ExpiryPolicy,
    fetcher: Fetcher<T>,
    table: Mutex<SlotTable<T>>,
}

impl<T> KeyedCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(policy: ExpiryPolicy, fetcher: Fetcher<T>) -> Self {
        Self {
            policy,
            fetcher,
            table: Mutex::new(SlotTable {
                slots: HashMap::new(),
                next_ticket: 0,
            }),
        }
    }

    pub fn policy(&self) -> ExpiryPolicy {
        self.policy
    }

    pub async fn get(self: &Arc<Self>, key: &str) -> AppResult<Option<T>> {
        let pending = {
            let mut table = self.lock();
            match self.lookup(&table, key) {
                Lookup::Hit(payload) => return Ok(payload),
                Lookup::Wait(pending) => pending,
                Lookup::Miss => self.start_fetch(&mut table, key),
            }
        };
        self.wait(pending).await
    }

    /// Fetches every key that is not already present, concurrently, and waits
    /// for all of them. Duplicate keys in one batch are fetched once.
    pub async fn warm_batch<I>(self: &Arc<Self>, keys: I) -> WarmSummary
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let keys: Vec<String> = keys.into_iter().map(|key| key.as_ref().to_string()).collect();
        let mut summary = WarmSummary::default();
        let mut pending = Vec::new();
        {
            let mut table = self.lock();
            let mut seen = HashSet::new();
            for key in &keys {
                if !seen.insert(key.as_str()) {
                    continue;
                }
                if self.is_present(&table, key) {
                    summary.skipped += 1;
                    continue;
                }
                pending.push(self.start_fetch(&mut table, key));
            }
        }

        for waiter in pending {
            let key = waiter.key.clone();
            match self.wait(waiter).await {
                Ok(_) => summary.fetched += 1,
                Err(_) => summary.failed.push(key),
            }
        }
        summary
    }

    /// Overwrites the entry with a confirmed value. An in-flight fetch for the
    /// same key will not replace it when it lands.
    pub fn invalidate(&self, key: &str, payload: Option<T>) {
        let mut table = self.lock();
        table.slots.insert(
            key.to_string(),
            Slot::Ready {
                payload,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drops the entry so the next access fetches again.
    pub fn forget(&self, key: &str) -> bool {
        self.lock().slots.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().slots.clear();
    }

    pub fn contains(&self, key: &str) -> bool {
        let table = self.lock();
        self.is_present(&table, key)
    }

    pub fn len(&self) -> usize {
        let table = self.lock();
        table
            .slots
            .keys()
            .filter(|key| self.is_present(&table, key.as_str()))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn peek(&self, key: &str) -> Option<CacheEntry<T>> {
        let table = self.lock();
        match table.slots.get(key)? {
            Slot::Loading { .. } => Some(CacheEntry {
                parent_id: key.to_string(),
                payload: None,
                is_loading: true,
            }),
            Slot::Ready { payload, stored_at } if !self.policy.is_expired(*stored_at) => Some(CacheEntry {
                parent_id: key.to_string(),
                payload: payload.clone(),
                is_loading: false,
            }),
            Slot::Ready { .. } => None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotTable<T>> {
        self.table.lock().expect("keyed cache table lock")
    }

    fn lookup(&self, table: &SlotTable<T>, key: &str) -> Lookup<T> {
        match table.slots.get(key) {
            Some(Slot::Ready { payload, stored_at }) if !self.policy.is_expired(*stored_at) => {
                Lookup::Hit(payload.clone())
            }
            Some(Slot::Loading { ticket, done }) => Lookup::Wait(Pending {
                key: key.to_string(),
                ticket: *ticket,
                done: done.clone(),
            }),
            _ => Lookup::Miss,
        }
    }

    fn is_present(&self, table: &SlotTable<T>, key: &str) -> bool {
        match table.slots.get(key) {
            Some(Slot::Loading { .. }) => true,
            Some(Slot::Ready { stored_at, .. }) => !self.policy.is_expired(*stored_at),
            None => false,
        }
    }

    fn start_fetch(self: &Arc<Self>, table: &mut SlotTable<T>, key: &str) -> Pending<T> {
        table.next_ticket += 1;
        let ticket = table.next_ticket;
        let (sender, receiver) = watch::channel(None);
        table.slots.insert(
            key.to_string(),
            Slot::Loading {
                ticket,
                done: receiver.clone(),
            },
        );

        let cache = Arc::clone(self);
        let owned_key = key.to_string();
        let fetch = (self.fetcher)(owned_key.clone());
        tokio::spawn(async move {
            let result = fetch.await;
            let outcome = cache.settle(&owned_key, ticket, result);
            sender.send_replace(Some(outcome));
        });

        Pending {
            key: key.to_string(),
            ticket,
            done: receiver,
        }
    }

    fn settle(&self, key: &str, ticket: u64, result: AppResult<Option<T>>) -> AppResult<Option<T>> {
        let mut table = self.lock();
        let owns_slot = matches!(
            table.slots.get(key),
            Some(Slot::Loading { ticket: current, .. }) if *current == ticket
        );

        if owns_slot {
            match &result {
                Ok(payload) => {
                    table.slots.insert(
                        key.to_string(),
                        Slot::Ready {
                            payload: payload.clone(),
                            stored_at: Instant::now(),
                        },
                    );
                }
                Err(error) => {
                    tracing::warn!(key = %key, error = %error, "cache fetch failed; entry left unset");
                    table.slots.remove(key);
                }
            }
            return result;
        }

        match table.slots.get(key) {
            Some(Slot::Ready { payload, .. }) => {
                tracing::debug!(key = %key, "fetch landed after invalidation; keeping invalidated value");
                Ok(payload.clone())
            }
            _ => result,
        }
    }

    async fn wait(&self, pending: Pending<T>) -> AppResult<Option<T>> {
        let Pending { key, ticket, mut done } = pending;
        let outcome = match done.wait_for(|outcome| outcome.is_some()).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        };

        match outcome {
            Some(result) => result,
            None => {
                self.abandon(&key, ticket);
                Err(AppError::Internal(format!("Fetch for {} was abandoned", key)))
            }
        }
    }

    fn abandon(&self, key: &str, ticket: u64) {
        let mut table = self.lock();
        let owns_slot = matches!(
            table.slots.get(key),
            Some(Slot::Loading { ticket: current, .. }) if *current == ticket
        );
        if owns_slot {
            table.slots.remove(key);
        }
    }
}
