//! Session management
//!
//! Per-connection session state and its control loop.

pub mod handler;
pub mod state;

pub use handler::handle_session;
pub use state::{ANONYMOUS_NAME, ANONYMOUS_TOKEN, MAX_NAME_LENGTH, Session, SessionId, display_name};
