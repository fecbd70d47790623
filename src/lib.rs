//! Cross-context data-change notification.
//!
//! Several isolated execution contexts share one key-value store. When one
//! of them changes a key, every other context (and the same one) learns about
//! it through the [`SyncTransport`], and consumers holding a [`DataBinding`]
//! re-fetch their data.
//!
//! - [`ListenerRegistry`]: watch key → callbacks, with wildcard dispatch
//! - [`SyncTransport`]: multi-lane delivery plus the periodic refresh ticker
//! - [`SyncFacade`]: lifecycle and presentation status around a transport
//! - [`DataBinding`]: a value that refreshes itself on change
//! - [`SyncDomain`] / [`SyncContext`]: the shared hub and store, and the
//!   contexts built on them

mod binding;
mod config;
mod context;
mod errors;
mod facade;
mod lanes;
mod message;
mod registry;
mod transport;
pub mod utils;

pub use binding::*;
pub use config::*;
pub use context::*;
pub use errors::*;
pub use facade::*;
pub use lanes::*;
pub use message::*;
pub use registry::*;
pub use transport::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
