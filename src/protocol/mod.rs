//! Wire protocol
//!
//! Command parsing and the broadcast/notification relay.

pub mod commands;
pub mod relay;

pub use commands::{Command, parse_command};
pub use relay::Notice;
