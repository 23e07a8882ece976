//! WebSocket transport for the authority

pub mod handler;
pub mod session;

pub use handler::ws_handler;
pub use session::{AuthorityTask, Datagram, PeerEvent, PeerRegistry, ServerStats};
