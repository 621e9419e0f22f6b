pub mod cache;
pub mod controller;
pub mod debounce;
pub mod errors;
pub mod filters;
pub mod models;
pub mod mutation;
pub mod pagination;
pub mod settings;
pub mod store;
pub mod transport;

pub use crate::cache::{CacheEntry, ExpiryPolicy, LazySubResourceCache, LookupCache, WarmSummary};
pub use crate::controller::{CollectionSnapshot, FetchOutcome, ResourceController};
pub use crate::errors::{AppError, AppResult, FieldError};
pub use crate::filters::{FilterCriteria, FilterPatch};
pub use crate::models::{
    Entity, Envelope, FilterValue, ListData, ListQuery, PaginationInfo, Record, SortOrder, ViewMode,
};
pub use crate::mutation::SubResourceMutations;
pub use crate::pagination::PaginationState;
pub use crate::settings::ControllerSettings;
pub use crate::transport::{LookupSource, ResourceClient, SubResourceClient, SubResourceSource};

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Installs a JSON subscriber writing to a daily-rolling file under
/// `log_dir`. `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing(log_dir: &Path) -> AppResult<()> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "collections.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| AppError::Internal(error.to_string()))
}
