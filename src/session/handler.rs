//! Session handler
//!
//! Per-connection control loop: naming handshake, command dispatch, and
//! lifecycle teardown. One task per accepted connection.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;

use crate::error::SessionError;
use crate::protocol::relay::{self, Notice};
use crate::protocol::{Command, parse_command};
use crate::registry::SharedRegistry;
use crate::server::config::ServerConfig;
use crate::session::state::{Session, SessionId, display_name};

/// Longest accepted input line, including the newline.
const MAX_LINE_LENGTH: usize = 1024;

/// One receive step of the session's read loop.
#[derive(Debug)]
enum LineRead {
    /// A complete line, trailing newline included.
    Line(String),
    /// The line exceeded [`MAX_LINE_LENGTH`]; its bytes were discarded up to
    /// the next newline, keeping the stream line-synchronized.
    TooLong,
    /// Peer closed the connection.
    Eof,
}

/// Drives one session from handshake to teardown.
///
/// Errors never leave this function: every failure is local to this
/// connection and at worst ends it.
pub async fn handle_session(
    stream: TcpStream,
    addr: SocketAddr,
    registry: SharedRegistry,
    config: Arc<ServerConfig>,
) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let id = SessionId::next();

    // Handshake: the first line is the name payload. On failure the session
    // never existed in the registry, so there is no leave notice.
    let name = match read_name(&mut reader).await {
        Ok(name) => name,
        Err(SessionError::PeerClosed) => {
            info!("Client {} disconnected before naming", addr);
            return;
        }
        Err(e) => {
            warn!("Name handshake with {} failed: {}", addr, e);
            return;
        }
    };
    info!("Name for {} [{}] - <{}>", addr, id, name);

    let resilient = config.resilient_broadcast;
    let joined = {
        let mut sessions = registry.lock().await;
        sessions.add(Session::new(id, addr, name.clone(), write_half));
        relay::notify(&mut sessions, id, &name, Notice::Join, resilient).await
    };

    match joined {
        Ok(()) => active_loop(&mut reader, addr, id, &name, &registry, resilient).await,
        Err(e) => warn!("Join notice for {} [{}] failed: {}", addr, id, e),
    }

    // Closing: the session completed handshake and registration, so announce
    // the leave, then remove (which closes the connection).
    let mut sessions = registry.lock().await;
    if let Err(e) = relay::notify(&mut sessions, id, &name, Notice::Left, resilient).await {
        warn!("Leave notice for {} [{}] failed: {}", addr, id, e);
    }
    sessions.remove(id).await;
}

/// Blocks on one receive for the name payload and normalizes it.
async fn read_name(reader: &mut BufReader<OwnedReadHalf>) -> Result<String, SessionError> {
    match read_limited_line(reader).await {
        Ok(LineRead::Line(line)) => Ok(display_name(line.trim_end_matches(['\r', '\n']))),
        Ok(LineRead::Eof) => Err(SessionError::PeerClosed),
        Ok(LineRead::TooLong) => Err(SessionError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            "name payload exceeds the line limit",
        ))),
        Err(e) => Err(SessionError::Io(e)),
    }
}

/// The active state: read lines and dispatch until the peer disconnects,
/// quits, or a send on its behalf fails.
async fn active_loop(
    reader: &mut BufReader<OwnedReadHalf>,
    addr: SocketAddr,
    id: SessionId,
    name: &str,
    registry: &SharedRegistry,
    resilient: bool,
) {
    loop {
        match read_limited_line(reader).await {
            Ok(LineRead::Eof) => {
                info!("Client {} <{}> disconnected", addr, name);
                return;
            }
            Ok(LineRead::TooLong) => {
                warn!("Dropping oversized line from {} <{}>", addr, name);
            }
            Ok(LineRead::Line(line)) => {
                let trimmed = line.trim_end_matches(['\r', '\n']);
                match parse_command(trimmed) {
                    Command::Quit => {
                        info!("Client {} <{}> requested disconnect", addr, name);
                        return;
                    }
                    Command::List => {
                        info!("Client {} requested a list of clients", addr);
                        let mut sessions = registry.lock().await;
                        if let Err(e) = relay::send_roster(&mut sessions, id).await {
                            warn!("Roster send to {} [{}] failed: {}", addr, id, e);
                            return;
                        }
                    }
                    Command::Message(text) => {
                        info!("Client <{}> {}: {}", name, addr, text);
                        let message = format!("<{}>: {}", name, text);
                        let mut sessions = registry.lock().await;
                        if let Err(e) =
                            relay::broadcast(&mut sessions, id, &message, resilient).await
                        {
                            warn!("Relay from {} <{}> failed: {}", addr, name, e);
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                // Transient receive errors are logged and the loop continues;
                // only a clean EOF or a failed send ends the session.
                warn!("Failed to read from {}: {}", addr, e);
            }
        }
    }
}

/// Reads one newline-terminated line, enforcing [`MAX_LINE_LENGTH`] while
/// consuming. A peer streaming bytes without a newline cannot grow the
/// buffer past the limit: once over it, accumulation stops and the rest of
/// the line is discarded up to the newline.
async fn read_limited_line<R>(reader: &mut R) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut overflow = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if buf.is_empty() && !overflow {
                return Ok(LineRead::Eof);
            }
            // Partial final line before EOF.
            break;
        }

        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                if !overflow {
                    buf.extend_from_slice(&available[..=pos]);
                }
                reader.consume(pos + 1);
                break;
            }
            None => {
                let len = available.len();
                if !overflow {
                    buf.extend_from_slice(available);
                    if buf.len() > MAX_LINE_LENGTH {
                        overflow = true;
                        buf.clear();
                    }
                }
                reader.consume(len);
            }
        }
    }

    if overflow || buf.len() > MAX_LINE_LENGTH {
        return Ok(LineRead::TooLong);
    }
    match String::from_utf8(buf) {
        Ok(line) => Ok(LineRead::Line(line)),
        Err(e) => Err(io::Error::new(io::ErrorKind::InvalidData, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn oversized_line_is_discarded_while_reading() {
        // Far beyond both the line limit and the reader's internal buffer,
        // so enforcement has to happen across multiple refills.
        let mut input = vec![b'x'; 64 * 1024];
        input.push(b'\n');
        input.extend_from_slice(b"hello\n");
        let mut reader = BufReader::new(input.as_slice());

        match read_limited_line(&mut reader).await.unwrap() {
            LineRead::TooLong => {}
            other => panic!("expected TooLong, got {:?}", other),
        }

        // The stream stays line-synchronized after the drop.
        match read_limited_line(&mut reader).await.unwrap() {
            LineRead::Line(line) => assert_eq!(line, "hello\n"),
            other => panic!("expected the next line, got {:?}", other),
        }
        match read_limited_line(&mut reader).await.unwrap() {
            LineRead::Eof => {}
            other => panic!("expected Eof, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn line_at_the_limit_is_accepted() {
        let mut input = vec![b'a'; MAX_LINE_LENGTH - 1];
        input.push(b'\n');
        let mut reader = BufReader::new(input.as_slice());

        match read_limited_line(&mut reader).await.unwrap() {
            LineRead::Line(line) => assert_eq!(line.len(), MAX_LINE_LENGTH),
            other => panic!("expected a full-length line, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn one_byte_over_the_limit_is_rejected() {
        let mut input = vec![b'a'; MAX_LINE_LENGTH];
        input.push(b'\n');
        let mut reader = BufReader::new(input.as_slice());

        match read_limited_line(&mut reader).await.unwrap() {
            LineRead::TooLong => {}
            other => panic!("expected TooLong, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn partial_final_line_is_returned_before_eof() {
        let mut reader = BufReader::new(&b"no newline"[..]);

        match read_limited_line(&mut reader).await.unwrap() {
            LineRead::Line(line) => assert_eq!(line, "no newline"),
            other => panic!("expected the partial line, got {:?}", other),
        }
        match read_limited_line(&mut reader).await.unwrap() {
            LineRead::Eof => {}
            other => panic!("expected Eof, got {:?}", other),
        }
    }
}
