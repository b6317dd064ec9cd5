//! Shared wire types and typed HTTP clients for ethnotify.
//!
//! The `objects` module holds the JSON shapes exchanged with the node, the
//! ABI directory and the event bus. The `client` module (behind the `client`
//! feature) wraps those endpoints with `reqwest`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
pub mod signature;
