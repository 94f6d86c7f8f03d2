//! Module `protocol::relay`
//!
//! Broadcast fan-out, join/leave notifications, and the roster line.
//!
//! All functions here run with the registry lock held by the caller's guard;
//! recipient sends happen under that lock, so a scan never races a remove.

use log::warn;

use crate::error::RelayError;
use crate::registry::ClientRegistry;
use crate::session::SessionId;

/// Join/leave notification kind.
#[derive(Debug, Clone, Copy)]
pub enum Notice {
    Join,
    Left,
}

impl Notice {
    fn format(self, name: &str) -> String {
        match self {
            Notice::Join => format!("<{}> joined the chat!", name),
            Notice::Left => format!("<{}> left the chat!", name),
        }
    }
}

/// Sends `message` to every session except `sender`.
///
/// In the default mode the first failed send aborts the remaining fan-out
/// and is reported to the caller, which treats it as fatal for the sender's
/// session only. With `resilient` set, every recipient is attempted and the
/// peers whose send failed are removed from the registry instead.
pub async fn broadcast(
    registry: &mut ClientRegistry,
    sender: SessionId,
    message: &str,
    resilient: bool,
) -> Result<(), RelayError> {
    if resilient {
        let mut dead = Vec::new();
        for session in registry.iter_except_mut(sender) {
            let peer = session.id();
            if let Err(e) = session.send_line(message).await {
                warn!("Broadcast send to peer {} failed: {}", peer, e);
                dead.push(peer);
            }
        }
        for peer in dead {
            registry.remove(peer).await;
        }
        Ok(())
    } else {
        for session in registry.iter_except_mut(sender) {
            let peer = session.id();
            if let Err(source) = session.send_line(message).await {
                warn!("Broadcast send to peer {} failed: {}", peer, source);
                return Err(RelayError::SendFailed { peer, source });
            }
        }
        Ok(())
    }
}

/// Formats a join/leave notice for `name` and broadcasts it to everyone
/// except `sender`.
pub async fn notify(
    registry: &mut ClientRegistry,
    sender: SessionId,
    name: &str,
    notice: Notice,
    resilient: bool,
) -> Result<(), RelayError> {
    broadcast(registry, sender, &notice.format(name), resilient).await
}

/// Sends the roster line to `requester` only.
pub async fn send_roster(
    registry: &mut ClientRegistry,
    requester: SessionId,
) -> Result<(), RelayError> {
    let line = format_roster(registry, requester);
    if let Some(session) = registry.find_mut(requester) {
        if let Err(source) = session.send_line(&line).await {
            return Err(RelayError::SendFailed {
                peer: requester,
                source,
            });
        }
    }
    Ok(())
}

/// Builds the roster line for `requester`: every other session's name in
/// angle brackets, comma separated, with the count of others up front.
fn format_roster(registry: &ClientRegistry, requester: SessionId) -> String {
    let names: Vec<String> = registry
        .iter_except(requester)
        .map(|session| format!("<{}>", session.name()))
        .collect();
    if names.is_empty() {
        return "No other clients online".to_string();
    }
    format!("Online ({} and YOU): {}", names.len(), names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::tcp::OwnedReadHalf;
    use tokio::net::{TcpListener, TcpStream};

    async fn test_session(name: &str) -> (Session, BufReader<OwnedReadHalf>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = TcpStream::connect(addr).await.unwrap();
        let (stream, remote) = listener.accept().await.unwrap();
        let (_, writer) = stream.into_split();
        let session = Session::new(SessionId::next(), remote, name.to_string(), writer);
        let (peer_reader, _peer_writer) = peer.into_split();
        // The peer's write half is dropped; only the server-to-peer
        // direction matters in these tests.
        (session, BufReader::new(peer_reader))
    }

    async fn recv_line(reader: &mut BufReader<OwnedReadHalf>) -> String {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        line.trim_end().to_string()
    }

    #[tokio::test]
    async fn broadcast_skips_the_sender() {
        let mut registry = ClientRegistry::new();
        let (alice, mut alice_rx) = test_session("alice").await;
        let (bob, mut bob_rx) = test_session("bob").await;
        let alice_id = alice.id();
        registry.add(alice);
        registry.add(bob);

        broadcast(&mut registry, alice_id, "<alice>: hi", false)
            .await
            .unwrap();
        assert_eq!(recv_line(&mut bob_rx).await, "<alice>: hi");

        // Close alice's write half; a pending line would still be readable,
        // so EOF here proves nothing was sent to the sender.
        registry.remove(alice_id).await;
        let mut line = String::new();
        let n = alice_rx.read_line(&mut line).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn broadcast_to_empty_registry_succeeds() {
        let mut registry = ClientRegistry::new();
        let (only, _rx) = test_session("solo").await;
        let id = only.id();
        registry.add(only);

        broadcast(&mut registry, id, "anyone there?", false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn strict_broadcast_reports_the_failed_peer() {
        let mut registry = ClientRegistry::new();
        let (mut dead, _rx) = test_session("dead").await;
        dead.close().await;
        let dead_id = dead.id();
        registry.add(dead);

        let sender = SessionId::next();
        let err = broadcast(&mut registry, sender, "hello", false)
            .await
            .unwrap_err();
        let RelayError::SendFailed { peer, .. } = err;
        assert_eq!(peer, dead_id);
        // Strict mode leaves removal to the failed peer's own handler.
        assert_eq!(registry.count(), 1);
    }

    #[tokio::test]
    async fn resilient_broadcast_prunes_only_dead_peers() {
        let mut registry = ClientRegistry::new();
        let (mut dead, _dead_rx) = test_session("dead").await;
        dead.close().await;
        let dead_id = dead.id();
        let (live, mut live_rx) = test_session("live").await;
        let live_id = live.id();
        registry.add(dead);
        registry.add(live);

        let sender = SessionId::next();
        broadcast(&mut registry, sender, "still here", true)
            .await
            .unwrap();

        assert_eq!(recv_line(&mut live_rx).await, "still here");
        assert!(registry.find(dead_id).is_none());
        assert!(registry.find(live_id).is_some());
    }

    #[test]
    fn notice_formatting() {
        assert_eq!(Notice::Join.format("alice"), "<alice> joined the chat!");
        assert_eq!(Notice::Left.format("ANONIM"), "<ANONIM> left the chat!");
    }

    #[tokio::test]
    async fn roster_lists_everyone_but_the_requester() {
        let mut registry = ClientRegistry::new();
        let (a, _ra) = test_session("A").await;
        let (b, _rb) = test_session("B").await;
        let (c, _rc) = test_session("C").await;
        let b_id = b.id();
        registry.add(a);
        registry.add(b);
        registry.add(c);

        let line = format_roster(&registry, b_id);
        assert!(line.starts_with("Online (2 and YOU): "));
        assert!(line.contains("<A>"));
        assert!(line.contains("<C>"));
        assert!(!line.contains("<B>"));
        assert!(!line.ends_with(','));
        assert!(!line.ends_with(", "));
    }

    #[tokio::test]
    async fn roster_alone_has_fixed_text() {
        let mut registry = ClientRegistry::new();
        let (only, _rx) = test_session("solo").await;
        let id = only.id();
        registry.add(only);

        assert_eq!(format_roster(&registry, id), "No other clients online");
    }

    #[tokio::test]
    async fn send_roster_reaches_only_the_requester() {
        let mut registry = ClientRegistry::new();
        let (a, mut a_rx) = test_session("A").await;
        let (b, mut b_rx) = test_session("B").await;
        let a_id = a.id();
        let b_id = b.id();
        registry.add(a);
        registry.add(b);

        send_roster(&mut registry, a_id).await.unwrap();
        assert_eq!(recv_line(&mut a_rx).await, "Online (1 and YOU): <B>");

        registry.remove(b_id).await;
        let mut line = String::new();
        let n = b_rx.read_line(&mut line).await.unwrap();
        assert_eq!(n, 0);
    }
}
