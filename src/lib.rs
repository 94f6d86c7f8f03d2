pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;

pub use server::{Server, ServerConfig};
