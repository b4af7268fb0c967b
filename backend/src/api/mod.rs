//! API handlers.

pub mod message;
pub mod sse;
pub mod token;
