//! Server core
//!
//! Owns the listener and the shared registry; accepts connections and spawns
//! one session handler task per peer.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{error, info};
use tokio::net::TcpListener;

use crate::registry::{ClientRegistry, SharedRegistry};
use crate::server::config::ServerConfig;
use crate::session::handle_session;

pub struct Server {
    registry: SharedRegistry,
    listener: TcpListener,
    config: Arc<ServerConfig>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Self {
        let bind_addr = config.bind_addr();

        let listener = match TcpListener::bind(&bind_addr).await {
            Ok(listener) => {
                info!("Server bound to {}", bind_addr);
                listener
            }
            Err(e) => {
                error!("Failed to bind to {}: {}", bind_addr, e);
                panic!("Server startup failed on socket {}: {}", bind_addr, e);
            }
        };

        Self {
            registry: ClientRegistry::shared(),
            listener,
            config: Arc::new(config),
        }
    }

    /// The address the listener actually bound to. Useful when the
    /// configured port is 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn start(&self) {
        info!("Server is listening...");

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New connection: {}", addr);
                    let registry = Arc::clone(&self.registry);
                    let config = Arc::clone(&self.config);

                    // Spawn a task for each client so the accept loop never
                    // blocks on a session.
                    tokio::spawn(async move {
                        handle_session(stream, addr, registry, config).await;
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }

    /// Drains the registry, closing all sessions.
    pub async fn shutdown(&self) {
        info!("Shutting down: closing all sessions");
        self.registry.lock().await.drain().await;
    }
}
