pub mod backoff;

pub use backoff::{Backoff, reconnect_delay};
