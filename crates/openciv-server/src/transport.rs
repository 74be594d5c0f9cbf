//! Transport abstraction.
//!
//! The session core never touches sockets. A [`Transport`] turns network
//! activity into [`TransportEvent`]s on `poll` and accepts typed outbound
//! messages on `send`. Two implementations exist: [`RenetTransport`] (UDP via
//! renet_netcode) and [`MemoryTransport`] for tests and embedding.

mod memory;
mod udp;

use std::net::SocketAddr;

use openciv_protocol::{ClientHandle, ClientMessage, ServerMessage, WireError};

pub use memory::{MemoryRemote, MemoryTransport};
pub use udp::{RenetTransport, TransportConfig, PROTOCOL_ID};

/// Something that happened on the network since the last poll.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    Connected(ClientHandle),
    Message(ClientHandle, ClientMessage),
    Disconnected(ClientHandle),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to bind socket to {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    #[error("Failed to determine bound address for {0}: {1}")]
    LocalAddrFailed(SocketAddr, std::io::Error),

    #[error("Failed to configure socket: {0}")]
    SocketConfig(std::io::Error),

    #[error("Failed to create transport: {0}")]
    TransportCreation(String),

    #[error("System clock is before the unix epoch")]
    Clock(#[from] std::time::SystemTimeError),

    #[error("{0} is not connected")]
    NotConnected(ClientHandle),

    #[error("Failed to encode message: {0}")]
    Wire(#[from] WireError),
}

pub trait Transport {
    /// Drain everything received since the previous call, in arrival order.
    fn poll(&mut self) -> Vec<TransportEvent>;

    /// Queue a message for one client.
    fn send(&mut self, client: ClientHandle, message: &ServerMessage) -> Result<(), TransportError>;

    /// Close one client's connection. A `Disconnected` event follows on a
    /// later poll.
    fn disconnect(&mut self, client: ClientHandle);

    /// Push queued outbound data to the network.
    fn flush(&mut self);

    /// Disconnect everyone before the process exits.
    fn close(&mut self) {}
}
