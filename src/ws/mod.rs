mod connection;
mod event;
mod frame_handler;
mod recv_loop;
mod websocket;

pub use connection::{Connection, ReadyState};
pub use event::Event;
pub use websocket::{ServerConn, WebSocket, WebSocketClient};
