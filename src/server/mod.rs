//! Server core functionality
//!
//! This module contains the main server implementation, configuration,
//! and core infrastructure for the chat relay.

pub mod config;
pub mod core;

pub use config::ServerConfig;
pub use core::Server;
