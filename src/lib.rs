//! # plex
//!
//! A user-space UDP broker that replaces IP multicast: one ingress point
//! receives datagrams and fans them out, unmodified, to a dynamic set of
//! subscriber endpoints. Built for deployments where network-level
//! multicast is unavailable or undesirable (cloud environments, NAT'd
//! networks) but many consumers must see the same message stream.
//!
//! # Architecture
//!
//! ```text
//!  [publisher]──┐                                     ┌──►[subscriber]
//!  [publisher]──┼──► ingress pipe ──► broadcast ──────┼──►[subscriber]
//!  UDP listener─┘    (one reader)       loop          └──►[subscriber]
//!                                         │
//!                                    PeerRegistry
//!                               (subscribe/unsubscribe/
//!                                 evict on write error)
//! ```
//!
//! All inbound bytes are serialized through the single-reader ingress
//! pipe, so fan-out sees chunks in one deterministic order even with
//! concurrent publishers. Each dequeued chunk is delivered to every
//! then-current subscriber before the next chunk is dequeued; a failing
//! subscriber is evicted rather than allowed to break delivery to the
//! rest.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> plex::Result<()> {
//!     let broker = Arc::new(plex::Plex::new(1500)?);
//!
//!     let listener = Arc::clone(&broker);
//!     tokio::spawn(async move {
//!         let _ = listener.listen_udp(":18833").await;
//!     });
//!
//!     broker.subscribe_udp("10.0.0.2:18833").await?;
//!     tokio::signal::ctrl_c().await.ok();
//!     broker.close().await;
//!     Ok(())
//! }
//! ```

mod broadcast;

pub mod config;
pub mod error;
pub mod pipe;
pub mod plex;
pub mod registry;
pub mod transport;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{BrokerConfig, LogConfig};
pub use error::{PlexError, Result};
pub use plex::Plex;
pub use registry::PeerRegistry;
pub use transport::{PacketSink, PacketSource, UdpEndpoint};
