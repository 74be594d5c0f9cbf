//! UDP transport using renet_netcode.
//!
//! Handles socket binding, authentication, and frame routing.

use std::net::{SocketAddr, UdpSocket};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use openciv_protocol::{
    deserialize_client_message, serialize_server_message, ClientHandle, ServerMessage, WireFormat,
};
use renet::{ConnectionConfig, RenetServer, ServerEvent};
use renet_netcode::{NetcodeServerTransport, ServerAuthentication, ServerConfig};
use tracing::{error, info, warn};

use super::{Transport, TransportError, TransportEvent};
use crate::channels::{channel_for, channel_id, create_channel_configs};

/// Protocol ID for OpenCiv sessions (must match client)
pub const PROTOCOL_ID: u64 = 0x0CE_C1F_001;

pub struct TransportConfig {
    /// Public address for clients to connect
    pub public_address: SocketAddr,
    pub max_clients: usize,
    /// Optional private key for secure authentication (32 bytes).
    /// If None, uses unsecure authentication (for development)
    pub private_key: Option<[u8; 32]>,
    pub format: WireFormat,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            public_address: SocketAddr::from(([127, 0, 0, 1], 7777)),
            max_clients: 8,
            private_key: None,
            format: WireFormat::default(),
        }
    }
}

/// RenetServer plus its netcode socket layer.
pub struct RenetTransport {
    server: RenetServer,
    netcode: NetcodeServerTransport,
    format: WireFormat,
    last_update: Instant,
}

impl RenetTransport {
    pub fn bind(config: TransportConfig) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(config.public_address)
            .map_err(|e| TransportError::BindFailed(config.public_address, e))?;

        let bound_addr = socket
            .local_addr()
            .map_err(|e| TransportError::LocalAddrFailed(config.public_address, e))?;

        socket
            .set_nonblocking(true)
            .map_err(TransportError::SocketConfig)?;

        let current_time = SystemTime::now().duration_since(UNIX_EPOCH)?;

        let authentication = match config.private_key {
            Some(key) => ServerAuthentication::Secure { private_key: key },
            None => ServerAuthentication::Unsecure,
        };

        let server_config = ServerConfig {
            current_time,
            max_clients: config.max_clients,
            protocol_id: PROTOCOL_ID,
            public_addresses: vec![bound_addr],
            authentication,
        };

        let netcode = NetcodeServerTransport::new(server_config, socket)
            .map_err(|e| TransportError::TransportCreation(e.to_string()))?;

        let server = RenetServer::new(ConnectionConfig {
            available_bytes_per_tick: 60_000,
            server_channels_config: create_channel_configs(),
            client_channels_config: create_channel_configs(),
        });

        info!(
            "Transport bound to {} (max {} clients, protocol {:016x}, {:?})",
            bound_addr, config.max_clients, PROTOCOL_ID, config.format
        );

        Ok(Self {
            server,
            netcode,
            format: config.format,
            last_update: Instant::now(),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.netcode.addresses().first().copied()
    }
}

impl Transport for RenetTransport {
    fn poll(&mut self) -> Vec<TransportEvent> {
        let now = Instant::now();
        let delta = now - self.last_update;
        self.last_update = now;

        self.server.update(delta);
        if let Err(e) = self.netcode.update(delta, &mut self.server) {
            error!("Transport update error: {}", e);
        }

        let mut events = Vec::new();
        while let Some(event) = self.server.get_event() {
            match event {
                ServerEvent::ClientConnected { client_id } => {
                    info!("Client {} connected", client_id);
                    events.push(TransportEvent::Connected(ClientHandle(client_id)));
                }
                ServerEvent::ClientDisconnected { client_id, reason } => {
                    info!("Client {} disconnected: {:?}", client_id, reason);
                    events.push(TransportEvent::Disconnected(ClientHandle(client_id)));
                }
            }
        }

        for client_id in self.server.clients_id() {
            while let Some(data) = self.server.receive_message(client_id, channel_id::EVENTS) {
                match deserialize_client_message(self.format, &data) {
                    Ok(message) => {
                        events.push(TransportEvent::Message(ClientHandle(client_id), message))
                    }
                    Err(e) => warn!("Dropping undecodable frame from {}: {}", client_id, e),
                }
            }
        }
        events
    }

    fn send(&mut self, client: ClientHandle, message: &ServerMessage) -> Result<(), TransportError> {
        if !self.server.is_connected(client.raw()) {
            return Err(TransportError::NotConnected(client));
        }
        let data = serialize_server_message(self.format, message)?;
        self.server
            .send_message(client.raw(), channel_for(message), data);
        Ok(())
    }

    fn disconnect(&mut self, client: ClientHandle) {
        self.server.disconnect(client.raw());
    }

    fn flush(&mut self) {
        self.netcode.send_packets(&mut self.server);
    }

    fn close(&mut self) {
        self.netcode.disconnect_all(&mut self.server);
    }
}

// Note: For secure authentication, clients need a connect token generated
// by a separate authentication service. For development, use Unsecure mode.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_ephemeral_port() {
        let config = TransportConfig {
            public_address: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };

        match RenetTransport::bind(config) {
            Ok(mut transport) => {
                assert!(transport.local_addr().is_some());
                assert!(transport.poll().is_empty());
                let err = transport
                    .send(
                        ClientHandle(99),
                        &ServerMessage::SetScene {
                            scene: "lobby".into(),
                        },
                    )
                    .unwrap_err();
                assert!(matches!(err, TransportError::NotConnected(ClientHandle(99))));
            }
            Err(TransportError::BindFailed(_, err))
                if err.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                // Some sandboxed environments disallow socket binds.
            }
            Err(err) => panic!("transport error: {err:?}"),
        }
    }
}
