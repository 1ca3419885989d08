//! Live reload.
//!
//! Each browser tab opens one WebSocket, tells the server which page it
//! shows and receives a reload message whenever that page's output is
//! rewritten.

mod client;
mod websocket;

pub(crate) use client::client_script;
pub(crate) use websocket::ws_handler;
