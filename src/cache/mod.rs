//! Client-side query cache.
//!
//! [`CacheStore`] holds one JSON payload per [`QueryKey`] together with the
//! company copies embedded in it. [`QueryClient`] reads through the store
//! with stale-while-revalidate semantics.

pub mod embedded;
pub mod key;
pub mod query;
pub mod store;

pub use embedded::EmbeddedRef;
pub use key::{QueryKey, QueryKind};
pub use query::{Freshness, QueryClient};
pub use store::{CacheEntry, CacheStore, SubscriptionId};
