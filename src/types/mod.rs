//! Core types for turnkit.

pub mod message;
pub mod record;

pub use message::*;
pub use record::*;
