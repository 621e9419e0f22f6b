pub mod keyed;
pub mod lookup;
pub mod sub_resource;

pub use keyed::{CacheEntry, ExpiryPolicy, WarmSummary};
pub use lookup::LookupCache;
pub use sub_resource::LazySubResourceCache;
