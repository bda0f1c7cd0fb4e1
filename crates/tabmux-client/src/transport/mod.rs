//! Socket connectors.
//!
//! Only WebSocket is supported: both endpoints speak text frames over
//! `ws://` or `wss://`.

pub mod websocket;

pub use websocket::WsConnector;
