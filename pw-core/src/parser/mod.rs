//! Log parsing modules
//!
//! Contains the incremental tail reader and the pattern-driven message
//! parser.

mod message;
mod tail;

pub use message::{Message, MessageItem, MessageParser};
pub use tail::LogTail;
