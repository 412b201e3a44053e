//! The live tutorial WebSocket channel.

pub mod protocol;
pub mod session;
pub mod turn;

pub use session::ws_handler;
