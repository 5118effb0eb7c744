//! Storefront query cache.
//!
//! A keyed table of remote query results with invalidate-on-mutate,
//! lazy-refetch-on-read semantics:
//!
//! - Reads are served from the table while an entry is fresh.
//! - Successful mutations record a [`MutationEvent`]; the planner maps it to
//!   the entries to mark stale (and, for list creation, to re-fetch eagerly).
//! - Stale entries are re-fetched by the next reader.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! stale_time_ms = 30000   # optional; omitted means fresh until invalidated
//! gc_time_ms = 300000
//! ```

mod client;
mod config;
mod events;
mod keys;
mod lock;
mod planner;
mod store;
mod trigger;

pub use client::{QueryClient, QueryError, Subscription};
pub use config::CacheConfig;
pub use events::{Epoch, EpochCounter, MutationEvent, MutationKind};
pub use keys::{QueryFilter, QueryKey, QueryTag};
pub use planner::InvalidationPlan;
pub use store::{EntrySnapshot, QueryFn, QueryStore};
pub use trigger::MutationTrigger;
