//! Chat Relay Server - Entry Point
//!
//! A line-oriented TCP chat relay: every connected client's messages are
//! fanned out to all other clients, with `!list` and `!quit` commands.

use log::info;

use chat_relay_server::error::ChatServerError;
use chat_relay_server::{Server, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), ChatServerError> {
    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    env_logger::init();

    let config = ServerConfig::load()?;

    info!("Launching chat relay server...");

    let server = Server::new(config).await;

    tokio::select! {
        _ = server.start() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received");
            server.shutdown().await;
        }
    }

    Ok(())
}
