pub mod session;
pub mod websocket;
