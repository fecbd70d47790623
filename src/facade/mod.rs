//! Lifecycle and status wrapper around a [`SyncTransport`](crate::SyncTransport)
//!
//! Entering a [`SyncFacade`] starts the transport; leaving it (explicitly or
//! by dropping the facade) stops it. In between the facade keeps a small
//! presentation status: the last-sync timestamp and whether a sync happened
//! within the configured syncing window.

mod sync_facade;

#[cfg(test)]
mod sync_facade_test;

pub use sync_facade::*;
