//! One authenticated WebSocket session to Home Assistant.
//!
//! Commands and subscriptions share a single id counter. The receive loop
//! routes every `result`/`pong` to the caller waiting on that id and every
//! `event` to the handler registered under it. When the socket ends for any
//! reason the loop fails all waiters with `ConnectionClosed`; reconnecting is
//! the supervisor's job.

pub mod client;
pub(crate) mod handler;
pub(crate) mod handshake;
pub(crate) mod routing;

pub use client::{ConnectionState, TransportClient, TransportOptions};
pub use handler::{EventHandler, SubscriptionHandle};

use futures_util::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsSink = SplitSink<WsStream, Message>;
pub(crate) type WsSource = SplitStream<WsStream>;
