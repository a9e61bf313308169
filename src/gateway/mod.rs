pub mod frames;
pub mod hub;

pub use frames::{StreamFrame, SSE_KEEPALIVE};
pub use hub::{ConnectionState, StreamHub};
