//! Session phases.
//!
//! Exactly one phase is active at a time. A phase installs its bus listeners
//! in `enter` and must remove every one of them in `exit`; the registry checks
//! for leftovers after each exit.

mod in_game;
mod lobby;

use std::sync::Arc;

use openciv_protocol::ClientHandle;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::event_bus::{BusError, Event, ListenerError, ListenerId, Owner};
use crate::game::Game;

pub use in_game::InGamePhase;
pub use lobby::LobbyPhase;

pub const LOBBY: &str = "lobby";
pub const IN_GAME: &str = "in_game";

/// A mode of the session with its own listeners.
pub trait Phase {
    /// Registry key, stable for the life of the phase.
    fn name(&self) -> &'static str;

    fn enter(&mut self, game: &mut Game) -> Result<(), PhaseError>;

    fn exit(&mut self, game: &mut Game);
}

#[derive(Debug, Clone, Error)]
pub enum PhaseError {
    #[error("civilization catalog: {0}")]
    Catalog(#[source] Arc<CatalogError>),
    #[error(transparent)]
    Bus(#[from] BusError),
}

impl From<CatalogError> for PhaseError {
    fn from(err: CatalogError) -> Self {
        Self::Catalog(Arc::new(err))
    }
}

/// Tokens for the listeners one phase registered during its current entry.
pub(crate) struct PhaseListeners {
    phase: &'static str,
    ids: Vec<ListenerId>,
}

impl PhaseListeners {
    pub(crate) fn new(phase: &'static str) -> Self {
        Self {
            phase,
            ids: Vec::new(),
        }
    }

    pub(crate) fn on<F>(&mut self, game: &mut Game, event: &str, callback: F) -> Result<(), BusError>
    where
        F: Fn(&mut Game, &Event<'_>) -> Result<(), ListenerError> + 'static,
    {
        let id = game
            .bus_mut()
            .register(event, Some(Owner::Phase(self.phase)), false, callback)?;
        self.ids.push(id);
        Ok(())
    }

    pub(crate) fn release(&mut self, game: &mut Game) -> usize {
        game.bus_mut().unregister(self.ids.drain(..))
    }
}

/// Transport an event came from, required by every client-originated handler.
pub(crate) fn source_of(event: &Event<'_>) -> Result<ClientHandle, ListenerError> {
    event.source.ok_or_else(|| ListenerError::UnexpectedPayload {
        event: event.name.to_owned(),
    })
}

pub(crate) fn unexpected(event: &Event<'_>) -> ListenerError {
    ListenerError::UnexpectedPayload {
        event: event.name.to_owned(),
    }
}
