//! Server-side representative of one connected client.
//!
//! A `Player` is created by the active phase when a transport connects and
//! lives in the session roster until that transport closes. Each player
//! registers two global bus listeners (`loadedIn`, `resizeWindow`) owned by
//! `Owner::Player(handle)`; they ignore events from every other transport and
//! are released when the player is removed.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use openciv_protocol::message::event;
use openciv_protocol::{ClientHandle, CivilizationDescriptor, PlayerSummary, ServerMessage};
use tracing::debug;

use crate::event_bus::{BusError, Event, EventBus, ListenerError, Owner};
use crate::game::Game;
use crate::transport::Transport;

/// Single-slot hook fired for one player's inbound signal.
pub type PlayerCallback = Rc<dyn Fn(&mut Game, ClientHandle) -> Result<(), ListenerError>>;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PlayerError {
    #[error("{player} has no civilization")]
    NoCivilization { player: String },
    #[error("{player} has used every settlement name of {civilization}")]
    SettlementNamesExhausted { player: String, civilization: String },
    #[error("{player} already owns a city named {city}")]
    DuplicateCity { player: String, city: String },
}

/// A settlement owned by a player. Simulation detail lives elsewhere; the
/// session core only tracks ownership and naming.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct City {
    name: String,
}

impl City {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

pub struct Player {
    name: String,
    handle: ClientHandle,
    loaded_in: bool,
    requested_next_turn: bool,
    civilization: Option<Arc<CivilizationDescriptor>>,
    cities: Vec<City>,
    on_loaded_in: Option<PlayerCallback>,
    on_resize_window: Option<PlayerCallback>,
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .field("loaded_in", &self.loaded_in)
            .field("requested_next_turn", &self.requested_next_turn)
            .field(
                "civilization",
                &self.civilization.as_ref().map(|c| c.name.as_str()),
            )
            .field("cities", &self.cities)
            .finish_non_exhaustive()
    }
}

impl Player {
    pub fn new(name: impl Into<String>, handle: ClientHandle) -> Self {
        Self {
            name: name.into(),
            handle,
            loaded_in: false,
            requested_next_turn: false,
            civilization: None,
            cities: Vec::new(),
            on_loaded_in: None,
            on_resize_window: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> ClientHandle {
        self.handle
    }

    pub fn is_loaded_in(&self) -> bool {
        self.loaded_in
    }

    pub fn set_loaded_in(&mut self, loaded_in: bool) {
        self.loaded_in = loaded_in;
    }

    pub fn has_requested_next_turn(&self) -> bool {
        self.requested_next_turn
    }

    pub fn set_requested_next_turn(&mut self, requested: bool) {
        self.requested_next_turn = requested;
    }

    pub fn civilization(&self) -> Option<&Arc<CivilizationDescriptor>> {
        self.civilization.as_ref()
    }

    pub fn assign_civilization(&mut self, civilization: Arc<CivilizationDescriptor>) {
        self.civilization = Some(civilization);
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    /// Forget everything tied to the previous match: civilization, cities and
    /// readiness flags.
    pub fn reset_for_lobby(&mut self) {
        self.civilization = None;
        self.cities.clear();
        self.loaded_in = false;
        self.requested_next_turn = false;
    }

    /// First settlement name from the civilization's list that this player
    /// does not already own.
    pub fn next_available_settlement_name(&self) -> Result<String, PlayerError> {
        let civ = self
            .civilization
            .as_ref()
            .ok_or_else(|| PlayerError::NoCivilization {
                player: self.name.clone(),
            })?;
        civ.cities
            .iter()
            .find(|candidate| !self.cities.iter().any(|city| city.name == **candidate))
            .cloned()
            .ok_or_else(|| PlayerError::SettlementNamesExhausted {
                player: self.name.clone(),
                civilization: civ.name.clone(),
            })
    }

    /// Found a city under the next free settlement name.
    pub fn found_city(&mut self) -> Result<&City, PlayerError> {
        let name = self.next_available_settlement_name()?;
        self.cities.push(City::new(name));
        Ok(&self.cities[self.cities.len() - 1])
    }

    /// Add an existing city (captured, traded, restored).
    pub fn add_city(&mut self, city: City) -> Result<(), PlayerError> {
        if self.cities.iter().any(|owned| owned.name == city.name) {
            return Err(PlayerError::DuplicateCity {
                player: self.name.clone(),
                city: city.name,
            });
        }
        self.cities.push(city);
        Ok(())
    }

    /// Replace the `loadedIn` hook.
    pub fn on_loaded_in<F>(&mut self, callback: F)
    where
        F: Fn(&mut Game, ClientHandle) -> Result<(), ListenerError> + 'static,
    {
        self.on_loaded_in = Some(Rc::new(callback));
    }

    /// Replace the `resizeWindow` hook.
    pub fn on_resize_window<F>(&mut self, callback: F)
    where
        F: Fn(&mut Game, ClientHandle) -> Result<(), ListenerError> + 'static,
    {
        self.on_resize_window = Some(Rc::new(callback));
    }

    pub fn clear_callbacks(&mut self) {
        self.on_loaded_in = None;
        self.on_resize_window = None;
    }

    /// Fire-and-forget delivery. A dead transport is not this player's
    /// caller's problem; the close event will follow.
    pub fn send(&self, transport: &mut dyn Transport, message: &ServerMessage) {
        if let Err(err) = transport.send(self.handle, message) {
            debug!(player = %self.name, client = %self.handle, error = %err, "send failed");
        }
    }

    pub fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            name: self.name.clone(),
            civ_data: self.civilization.as_deref().cloned(),
            requested_next_turn: self.requested_next_turn,
        }
    }
}

/// Register the per-player listeners on the session bus. They are torn down
/// by owner, so no tokens are kept.
pub(crate) fn register_listeners(
    bus: &mut EventBus<Game>,
    handle: ClientHandle,
) -> Result<(), BusError> {
    let owner = Owner::Player(handle);
    bus.register(
        event::LOADED_IN,
        Some(owner.clone()),
        true,
        move |game: &mut Game, e: &Event<'_>| {
            if e.source != Some(handle) {
                return Ok(());
            }
            let player = game
                .find_player_by_handle_mut(handle)
                .ok_or(ListenerError::UnknownClient(handle))?;
            player.loaded_in = true;
            match player.on_loaded_in.clone() {
                Some(callback) => callback(game, handle),
                None => Ok(()),
            }
        },
    )?;
    bus.register(
        event::RESIZE_WINDOW,
        Some(owner),
        true,
        move |game: &mut Game, e: &Event<'_>| {
            if e.source != Some(handle) {
                return Ok(());
            }
            let player = game
                .find_player_by_handle_mut(handle)
                .ok_or(ListenerError::UnknownClient(handle))?;
            match player.on_resize_window.clone() {
                Some(callback) => callback(game, handle),
                None => Ok(()),
            }
        },
    )?;
    Ok(())
}
