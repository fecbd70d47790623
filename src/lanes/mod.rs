//! Delivery lanes
//!
//! Three independent paths carry a change notification. Any one of them is
//! enough for a subscriber to hear about a change, and several may carry the
//! same logical event, so delivery is at-least-once.
//!
//! ```text
//!            context A                                context B
//!  ┌───────────────────────────┐            ┌───────────────────────────┐
//!  │ notify_update("teamA")    │            │                           │
//!  │   ├─(c) LocalEventBus ──► registry     │                           │
//!  │   └─(a) ChannelPort ──────┼── hub ─────┼─► ChannelPort ─► registry │
//!  │ store.set("teamA", ..)    │            │                           │
//!  │   └─(b) SharedStore ──────┼── feed ────┼─► mutation task ► registry│
//!  └───────────────────────────┘            └───────────────────────────┘
//! ```
//!
//! - (a) [`ChannelHub`]: named inter-context broadcast channels. A port never
//!   receives its own posts.
//! - (b) [`SharedStore`]: the key-value store shared by all contexts. Its
//!   mutation feed carries only the mutated key and the writing context.
//! - (c) [`LocalEventBus`]: synchronous same-context events carrying the full
//!   message, so same-context subscribers fire even when lane (a) is missing.

mod channel;
mod local_events;
mod store;


pub use channel::*;
pub use local_events::*;
pub use store::*;
