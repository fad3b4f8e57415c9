//! Read cache for backend queries.
//!
//! Reads go through [`QueryCache::fetch`], keyed by [`QueryKey`]. Writes name a
//! [`Mutation`], whose invalidation set is applied once the write succeeded.
//!
//! ```toml
//! [cache]
//! default_stale_seconds = 60
//! permission_stale_seconds = 300
//! max_entries = 256
//! ```

mod config;
mod invalidation;
mod keys;
pub(crate) mod lock;
mod store;

pub use config::CacheConfig;
pub use invalidation::Mutation;
pub use keys::{KeyPattern, QueryKey, QueryKind};
pub use store::QueryCache;
