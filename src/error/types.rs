//! Error types
//!
//! Defines domain-specific error types for each module of the chat server.

use std::fmt;
use std::io;

use crate::session::SessionId;

/// Session module errors
#[derive(Debug)]
pub enum SessionError {
    /// Peer closed the connection (zero-byte read). Normal teardown trigger.
    PeerClosed,
    Io(io::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::PeerClosed => write!(f, "Peer closed the connection"),
            SessionError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<io::Error> for SessionError {
    fn from(error: io::Error) -> Self {
        SessionError::Io(error)
    }
}

/// Relay module errors
#[derive(Debug)]
pub enum RelayError {
    /// A send to one recipient failed. Fatal for the sender's session only.
    SendFailed { peer: SessionId, source: io::Error },
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::SendFailed { peer, source } => {
                write!(f, "Send to peer {} failed: {}", peer, source)
            }
        }
    }
}

impl std::error::Error for RelayError {}

/// General chat server error that encompasses all error types
#[derive(Debug)]
pub enum ChatServerError {
    Session(SessionError),
    Relay(RelayError),
    Config(config::ConfigError),
    IoError(io::Error),
}

impl fmt::Display for ChatServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatServerError::Session(e) => write!(f, "Session error: {}", e),
            ChatServerError::Relay(e) => write!(f, "Relay error: {}", e),
            ChatServerError::Config(e) => write!(f, "Configuration error: {}", e),
            ChatServerError::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ChatServerError {}

impl From<SessionError> for ChatServerError {
    fn from(error: SessionError) -> Self {
        ChatServerError::Session(error)
    }
}

impl From<RelayError> for ChatServerError {
    fn from(error: RelayError) -> Self {
        ChatServerError::Relay(error)
    }
}

impl From<config::ConfigError> for ChatServerError {
    fn from(error: config::ConfigError) -> Self {
        ChatServerError::Config(error)
    }
}

impl From<io::Error> for ChatServerError {
    fn from(error: io::Error) -> Self {
        ChatServerError::IoError(error)
    }
}
