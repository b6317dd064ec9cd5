#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod abi;
pub mod config;
pub mod events;
pub mod node;
pub mod processors;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;
