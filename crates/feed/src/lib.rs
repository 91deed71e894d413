//! Message feed synchronization engine.
//!
//! Polls the backend at a fixed interval and keeps an ordered local
//! message list consistent with the server's full snapshots, while
//! accepting optimistic local sends. A 401 anywhere becomes a
//! session-expiry signal: the session store is cleared and the loop
//! halts.

mod engine;
mod state;

pub use engine::{FeedEvent, MessageFeed};
