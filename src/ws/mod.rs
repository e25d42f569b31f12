//! WebSocket layer - connection handling, protocol, and client registry

pub mod handler;
pub mod protocol;
pub mod registry;

pub use handler::ws_handler;
pub use registry::ClientRegistry;
