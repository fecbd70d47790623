//! Listener registry: watch key → ordered callbacks
//!
//! ```text
//! DashMap<WatchKey, Vec<Listener>>
//!   "teamA" -> [cb#1, cb#4]
//!   "*"     -> [cb#2]
//! ```
//!
//! - Empty buckets are removed atomically (`remove_if_mut`), so the map never
//!   holds a key without listeners.
//! - Dispatch clones the callbacks of a bucket and releases the shard lock
//!   before calling them. A callback may therefore subscribe or unsubscribe
//!   during the same dispatch pass without deadlocking; such changes take
//!   effect from the next pass.
//! - [`Subscription`] unregisters on `unsubscribe()` or on drop; both are
//!   idempotent.

mod listener_registry;


pub use listener_registry::*;
