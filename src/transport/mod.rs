//! Multi-lane sync transport
//!
//! # Architecture
//!
//! ```text
//! notify_update(key) / force_sync(key) / ticker
//!        │ broadcast(): stamp → post → local dispatch → last-sync
//!        ▼
//! ┌──────────────┐   ┌───────────────┐   ┌────────────────┐
//! │ ChannelPort  │   │ LocalEventBus │   │  SharedStore   │ (written by the
//! │   (lane a)   │   │   (lane c)    │   │   (lane b)     │  persistence layer)
//! └──────┬───────┘   └──────┬────────┘   └──────┬─────────┘
//!        │ other contexts   │ this context      │ other contexts
//!        ▼                  ▼                   ▼
//!               ListenerRegistry::dispatch(target)
//!                  key subscribers + wildcard subscribers
//! ```
//!
//! # Guarantees
//!
//! - At-least-once delivery: the same logical change may reach a subscriber
//!   over more than one lane. Subscribers must tolerate duplicates.
//! - Callbacks of one key run in registration order within a dispatch pass.
//!   Nothing is promised across lanes or across contexts.
//! - `start()` and `stop()` are idempotent. A started transport owns exactly
//!   one ticker, one port and one listener per lane.
//!
//! # Error Handling
//!
//! No lane failure surfaces to callers. A channel that cannot be opened is
//! skipped for the whole session (no retry); a failed post is logged and
//! dropped; a lagging receiver triggers a wildcard refresh instead.

mod sync_transport;


pub use sync_transport::*;
