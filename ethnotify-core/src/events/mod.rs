//! Types flowing through the poll loop and the channels that carry them.

pub mod channels;
pub mod types;

pub use channels::*;
pub use types::*;
