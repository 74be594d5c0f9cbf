//! OpenCiv Session Server
//!
//! Authoritative server core for an OpenCiv match: an event bus that routes
//! client frames to listeners, a session registry that owns the roster and
//! runs one phase at a time, and the lobby and in-game phases. Networking is
//! behind the [`transport::Transport`] trait, with renet as the UDP backend.

pub mod catalog;
pub mod channels;
pub mod config;
pub mod event_bus;
pub mod game;
pub mod phase;
pub mod player;
pub mod random;
pub mod server;
pub mod transport;

pub use catalog::{CatalogError, CatalogSource, CivilizationCatalog};
pub use channels::*;
pub use config::ServerConfig;
pub use event_bus::{BusError, EventBus, ListenerError, ListenerId, Owner, Payload};
pub use game::{Game, GameError};
pub use phase::{InGamePhase, LobbyPhase, Phase, PhaseError, IN_GAME, LOBBY};
pub use player::{City, Player, PlayerError};
pub use random::{RandomSource, ScriptedRandom, StdRandom};
pub use server::{build_game, run};
pub use transport::{
    MemoryRemote, MemoryTransport, RenetTransport, Transport, TransportConfig, TransportError,
    TransportEvent, PROTOCOL_ID,
};
