//! Subscriber/publisher registry
//!
//! The registry holds the live peer set and is the only shared mutable
//! state in the broker. Both maps sit behind one async mutex; every
//! lookup, insertion and removal happens inside that lock, and nothing
//! else ever iterates them.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<PeerRegistry>
//!                 ┌──────────────────────────┐
//!                 │ Mutex<Peers {            │
//!                 │   subs: HashMap<key,     │
//!                 │     SubscriberHandle>,   │
//!                 │   pubs: HashMap<key,     │
//!                 │     PublisherHandle>,    │
//!                 │ }>                       │
//!                 └────────────┬─────────────┘
//!                              │ snapshot()
//!                              ▼
//!                       broadcast loop ──► sink.send() ──► UDP
//! ```
//!
//! The registry lock is never held across I/O. The broadcast loop takes a
//! snapshot of the subscriber set under the lock, then runs its write pass
//! through the per-entry sink locks ([`SubscriberHandle`]), so an
//! unsubscribe racing with a pass waits at worst on one in-flight write.

pub mod entry;
pub mod store;

pub use entry::{PublisherHandle, SubscriberHandle};
pub use store::PeerRegistry;
