//! In-process transport.
//!
//! [`MemoryTransport`] is handed to the session; the paired [`MemoryRemote`]
//! plays the clients. Outbound messages go through the wire codec so frames
//! that would not survive the network fail here too.

use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};
use std::rc::Rc;

use openciv_protocol::{
    deserialize_server_message, serialize_server_message, ClientHandle, ClientMessage,
    ServerMessage, WireFormat,
};

use super::{Transport, TransportError, TransportEvent};

#[derive(Default)]
struct Shared {
    inbound: VecDeque<TransportEvent>,
    outbound: Vec<(ClientHandle, ServerMessage)>,
    connected: BTreeSet<ClientHandle>,
    kicked: Vec<ClientHandle>,
    flushes: usize,
}

pub struct MemoryTransport {
    shared: Rc<RefCell<Shared>>,
    format: WireFormat,
}

/// Client side of a [`MemoryTransport`].
#[derive(Clone)]
pub struct MemoryRemote {
    shared: Rc<RefCell<Shared>>,
}

impl MemoryTransport {
    pub fn new() -> (Self, MemoryRemote) {
        Self::with_format(WireFormat::default())
    }

    pub fn with_format(format: WireFormat) -> (Self, MemoryRemote) {
        let shared = Rc::new(RefCell::new(Shared::default()));
        (
            Self {
                shared: Rc::clone(&shared),
                format,
            },
            MemoryRemote { shared },
        )
    }
}

impl Transport for MemoryTransport {
    fn poll(&mut self) -> Vec<TransportEvent> {
        self.shared.borrow_mut().inbound.drain(..).collect()
    }

    fn send(&mut self, client: ClientHandle, message: &ServerMessage) -> Result<(), TransportError> {
        let mut shared = self.shared.borrow_mut();
        if !shared.connected.contains(&client) {
            return Err(TransportError::NotConnected(client));
        }
        let bytes = serialize_server_message(self.format, message)?;
        let decoded = deserialize_server_message(self.format, &bytes)?;
        shared.outbound.push((client, decoded));
        Ok(())
    }

    fn disconnect(&mut self, client: ClientHandle) {
        let mut shared = self.shared.borrow_mut();
        if shared.connected.remove(&client) {
            shared.kicked.push(client);
            shared.inbound.push_back(TransportEvent::Disconnected(client));
        }
    }

    fn flush(&mut self) {
        self.shared.borrow_mut().flushes += 1;
    }

    fn close(&mut self) {
        let mut shared = self.shared.borrow_mut();
        let clients: Vec<ClientHandle> = std::mem::take(&mut shared.connected).into_iter().collect();
        shared.kicked.extend(clients);
    }
}

impl MemoryRemote {
    /// Open a connection for `client`.
    pub fn connect(&self, client: ClientHandle) {
        let mut shared = self.shared.borrow_mut();
        shared.connected.insert(client);
        shared.inbound.push_back(TransportEvent::Connected(client));
    }

    /// Deliver a frame from `client`.
    pub fn send(&self, client: ClientHandle, message: ClientMessage) {
        self.shared
            .borrow_mut()
            .inbound
            .push_back(TransportEvent::Message(client, message));
    }

    /// Close `client`'s connection from the client side.
    pub fn close(&self, client: ClientHandle) {
        let mut shared = self.shared.borrow_mut();
        if shared.connected.remove(&client) {
            shared.inbound.push_back(TransportEvent::Disconnected(client));
        }
    }

    pub fn is_connected(&self, client: ClientHandle) -> bool {
        self.shared.borrow().connected.contains(&client)
    }

    /// Remove and return everything delivered to `client` so far.
    pub fn take_received(&self, client: ClientHandle) -> Vec<ServerMessage> {
        let mut shared = self.shared.borrow_mut();
        let (mine, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut shared.outbound)
            .into_iter()
            .partition(|(to, _)| *to == client);
        shared.outbound = rest;
        mine.into_iter().map(|(_, message)| message).collect()
    }

    /// Everything delivered to `client` so far, without consuming it.
    pub fn received(&self, client: ClientHandle) -> Vec<ServerMessage> {
        self.shared
            .borrow()
            .outbound
            .iter()
            .filter(|(to, _)| *to == client)
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Clients the server disconnected.
    pub fn kicked(&self) -> Vec<ClientHandle> {
        self.shared.borrow().kicked.clone()
    }

    pub fn flushes(&self) -> usize {
        self.shared.borrow().flushes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_polled_in_order() {
        let (mut transport, remote) = MemoryTransport::new();
        remote.connect(ClientHandle(1));
        remote.send(ClientHandle(1), ClientMessage::LoadedIn);
        remote.close(ClientHandle(1));

        assert_eq!(
            transport.poll(),
            vec![
                TransportEvent::Connected(ClientHandle(1)),
                TransportEvent::Message(ClientHandle(1), ClientMessage::LoadedIn),
                TransportEvent::Disconnected(ClientHandle(1)),
            ]
        );
        assert!(transport.poll().is_empty());
    }

    #[test]
    fn sends_only_reach_connected_clients() {
        let (mut transport, remote) = MemoryTransport::with_format(WireFormat::Json);
        let scene = ServerMessage::SetScene {
            scene: "lobby".into(),
        };
        assert!(matches!(
            transport.send(ClientHandle(1), &scene),
            Err(TransportError::NotConnected(_))
        ));

        remote.connect(ClientHandle(1));
        remote.connect(ClientHandle(2));
        transport.send(ClientHandle(1), &scene).unwrap();

        assert_eq!(remote.received(ClientHandle(1)), vec![scene.clone()]);
        assert_eq!(remote.take_received(ClientHandle(1)), vec![scene]);
        assert!(remote.take_received(ClientHandle(1)).is_empty());
        assert!(remote.received(ClientHandle(2)).is_empty());
    }

    #[test]
    fn server_disconnect_is_reported() {
        let (mut transport, remote) = MemoryTransport::new();
        remote.connect(ClientHandle(4));
        transport.poll();

        transport.disconnect(ClientHandle(4));
        assert!(!remote.is_connected(ClientHandle(4)));
        assert_eq!(remote.kicked(), vec![ClientHandle(4)]);
        assert_eq!(
            transport.poll(),
            vec![TransportEvent::Disconnected(ClientHandle(4))]
        );
    }
}
