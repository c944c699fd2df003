//! Realtime messaging over WebSocket

pub mod handler;
pub mod protocol;
pub mod registry;
pub mod session;

pub use handler::ws_index;
pub use protocol::{ClientEvent, ServerEvent};
pub use registry::ConnectionRegistry;
pub use session::RelaySession;
