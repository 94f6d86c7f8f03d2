//! Module `session::state`
//!
//! Defines the `Session` struct representing one connected peer, along with
//! session id allocation and display-name normalization.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;

/// Maximum display name length in bytes (excluding any terminator).
pub const MAX_NAME_LENGTH: usize = 31;

/// Token a client sends to stay anonymous.
pub const ANONYMOUS_TOKEN: &str = "!anonim";

/// Display name assigned to anonymous clients.
pub const ANONYMOUS_NAME: &str = "ANONIM";

/// Opaque connection identifier, unique per connection and stable for its
/// lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocates the next session id from a process-wide counter.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        SessionId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One connected peer: its id, remote address, display name, and the
/// exclusively owned write half of the connection.
///
/// The read half stays with the session's handler task; the registry owns
/// the write half through this struct and is the only place that closes it.
pub struct Session {
    id: SessionId,
    addr: SocketAddr,
    name: String,
    writer: OwnedWriteHalf,
}

impl Session {
    pub fn new(id: SessionId, addr: SocketAddr, name: String, writer: OwnedWriteHalf) -> Self {
        Self {
            id,
            addr,
            name,
            writer,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Writes one newline-terminated line to the peer.
    pub async fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }

    /// Shuts down the server-side half of the connection. The peer observes
    /// EOF; the handler's read half is dropped when its task ends.
    pub async fn close(&mut self) {
        let _ = self.writer.shutdown().await;
    }
}

/// Normalizes a raw name payload into a display name: the exact anonymous
/// token maps to `ANONIM`, anything else is used verbatim, truncated to
/// `MAX_NAME_LENGTH` bytes on a character boundary.
pub fn display_name(raw: &str) -> String {
    if raw == ANONYMOUS_TOKEN {
        return ANONYMOUS_NAME.to_string();
    }
    if raw.len() <= MAX_NAME_LENGTH {
        return raw.to_string();
    }
    let mut end = MAX_NAME_LENGTH;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    raw[..end].to_string()
}
