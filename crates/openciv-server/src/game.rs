//! Session registry.
//!
//! `Game` owns everything one running session has: the event bus, the phase
//! catalog and the active phase, the player roster, the transport and the
//! random source. Phases and listeners reach all of it through `&mut Game`.

use std::collections::HashMap;

use openciv_protocol::message::event;
use openciv_protocol::{ClientHandle, ClientMessage, ServerMessage};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::event_bus::{self, events, BusError, BusHost, Event, EventBus, Owner, Payload};
use crate::phase::{source_of, unexpected, Phase, PhaseError, LOBBY};
use crate::player::{self, Player};
use crate::random::RandomSource;
use crate::transport::{Transport, TransportEvent};

#[derive(Debug, Clone, Error)]
pub enum GameError {
    #[error("phase `{0}` is already registered")]
    DuplicatePhase(&'static str),
    #[error("no phase named `{0}`")]
    UnknownPhase(String),
    #[error("player `{0}` is already in the session")]
    DuplicatePlayer(String),
    #[error("phase `{phase}` failed to enter: {source}")]
    PhaseEntry {
        phase: &'static str,
        #[source]
        source: PhaseError,
    },
    #[error(transparent)]
    Bus(#[from] BusError),
}

pub struct Game {
    bus: EventBus<Game>,
    phases: HashMap<&'static str, Box<dyn Phase>>,
    current: Option<&'static str>,
    /// Phase taken out of `phases` while one of its hooks runs.
    lent: Option<&'static str>,
    players: Vec<Player>,
    transport: Box<dyn Transport>,
    random: Box<dyn RandomSource>,
    name_counter: u32,
    transitioning: bool,
    queued: Option<&'static str>,
    fatal: Option<GameError>,
}

impl BusHost for Game {
    fn bus(&self) -> &EventBus<Self> {
        &self.bus
    }
}

impl Game {
    /// Empty session with the session-wide listeners installed and no phase
    /// active.
    pub fn new(
        transport: Box<dyn Transport>,
        random: Box<dyn RandomSource>,
    ) -> Result<Self, GameError> {
        let mut game = Self {
            bus: EventBus::new(),
            phases: HashMap::new(),
            current: None,
            lent: None,
            players: Vec::new(),
            transport,
            random,
            name_counter: 0,
            transitioning: false,
            queued: None,
            fatal: None,
        };
        game.install_session_listeners()?;
        Ok(game)
    }

    fn install_session_listeners(&mut self) -> Result<(), BusError> {
        self.bus.register(
            event::SET_STATE,
            Some(Owner::Session),
            true,
            |game: &mut Game, e: &Event<'_>| {
                let Payload::Message(ClientMessage::SetState { state }) = e.payload else {
                    return Err(unexpected(e));
                };
                info!(requested = %state, client = ?e.source, "state change requested");
                game.transition_to(state)?;
                Ok(())
            },
        )?;

        self.bus.register(
            event::CONNECTED_PLAYERS,
            Some(Owner::Session),
            true,
            |game: &mut Game, e: &Event<'_>| {
                let handle = source_of(e)?;
                let requesting_name = game
                    .find_player_by_handle(handle)
                    .map(|p| p.name().to_owned());
                let players = game.players.iter().map(Player::summary).collect();
                game.send_to(
                    handle,
                    &ServerMessage::ConnectedPlayers {
                        players,
                        requesting_name,
                    },
                );
                Ok(())
            },
        )?;

        self.bus.register(
            events::PLAYER_QUIT,
            Some(Owner::Session),
            true,
            |game: &mut Game, _: &Event<'_>| {
                if game.players.len() <= 1 && game.current != Some(LOBBY) {
                    info!(
                        remaining = game.players.len(),
                        "not enough players left; returning to the lobby"
                    );
                    game.transition_to(LOBBY)?;
                }
                Ok(())
            },
        )?;
        Ok(())
    }

    pub fn register_phase(&mut self, phase: Box<dyn Phase>) -> Result<(), GameError> {
        let name = phase.name();
        if self.phases.contains_key(name) {
            return Err(GameError::DuplicatePhase(name));
        }
        debug!(phase = name, "phase registered");
        self.phases.insert(name, phase);
        Ok(())
    }

    pub fn current_phase(&self) -> Option<&'static str> {
        self.current
    }

    /// Exit the active phase and enter `name`.
    ///
    /// An unknown name fails before anything is exited. A transition requested
    /// while another is running is queued and runs once the first completes.
    pub fn transition_to(&mut self, name: &str) -> Result<(), GameError> {
        let target = match self.phases.get_key_value(name) {
            Some((&target, _)) => target,
            None => match self.lent {
                Some(lent) if lent == name => lent,
                _ => return Err(GameError::UnknownPhase(name.to_owned())),
            },
        };
        if self.transitioning {
            debug!(phase = target, "transition queued");
            self.queued = Some(target);
            return Ok(());
        }

        self.transitioning = true;
        let mut result = self.run_transition(target);
        while result.is_ok() {
            match self.queued.take() {
                Some(next) => result = self.run_transition(next),
                None => break,
            }
        }
        self.queued = None;
        self.transitioning = false;
        result
    }

    fn run_transition(&mut self, target: &'static str) -> Result<(), GameError> {
        if let Some(current) = self.current.take() {
            self.with_phase(current, |phase, game| phase.exit(game))?;
            let leaked = self.bus.unregister_all(&Owner::Phase(current));
            if leaked > 0 {
                warn!(phase = current, leaked, "phase left listeners behind; released");
            }
            info!(from = current, to = target, "phase transition");
        }

        match self.with_phase(target, |phase, game| phase.enter(game))? {
            Ok(()) => {
                self.current = Some(target);
                info!(phase = target, "phase entered");
                Ok(())
            }
            Err(source) => {
                self.bus.unregister_all(&Owner::Phase(target));
                let err = GameError::PhaseEntry {
                    phase: target,
                    source,
                };
                error!(error = %err, "no phase is active");
                self.fatal = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Lend a phase out of the catalog for the duration of `f`.
    fn with_phase<R>(
        &mut self,
        name: &'static str,
        f: impl FnOnce(&mut dyn Phase, &mut Game) -> R,
    ) -> Result<R, GameError> {
        let mut phase = self
            .phases
            .remove(name)
            .ok_or_else(|| GameError::UnknownPhase(name.to_owned()))?;
        let outer = self.lent.replace(name);
        let result = f(phase.as_mut(), self);
        self.lent = outer;
        self.phases.insert(name, phase);
        Ok(result)
    }

    /// Failure that left the session without an active phase, if any.
    pub fn take_fatal(&mut self) -> Option<GameError> {
        self.fatal.take()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn players_mut(&mut self) -> &mut [Player] {
        &mut self.players
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn find_player_by_handle(&self, handle: ClientHandle) -> Option<&Player> {
        self.players.iter().find(|p| p.handle() == handle)
    }

    pub fn find_player_by_handle_mut(&mut self, handle: ClientHandle) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.handle() == handle)
    }

    pub fn find_player_by_name(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name() == name)
    }

    /// Next `Player<N>` name. Names still held by connected players are
    /// skipped.
    pub fn next_player_name(&mut self) -> String {
        loop {
            self.name_counter += 1;
            let name = format!("Player{}", self.name_counter);
            if self.find_player_by_name(&name).is_none() {
                return name;
            }
        }
    }

    pub fn reset_player_counter(&mut self) {
        self.name_counter = 0;
    }

    /// Add a player to the roster and attach its listeners.
    pub fn insert_player(&mut self, player: Player) -> Result<(), GameError> {
        if self
            .players
            .iter()
            .any(|p| p.name() == player.name() || p.handle() == player.handle())
        {
            return Err(GameError::DuplicatePlayer(player.name().to_owned()));
        }
        player::register_listeners(&mut self.bus, player.handle())?;
        self.players.push(player);
        Ok(())
    }

    /// Remove a player and every listener it owns.
    pub fn remove_player(&mut self, handle: ClientHandle) -> Option<Player> {
        let index = self.players.iter().position(|p| p.handle() == handle)?;
        let player = self.players.remove(index);
        let released = self.bus.unregister_all(&Owner::Player(handle));
        debug!(player = %player.name(), released, "player removed");
        Some(player)
    }

    pub fn random_mut(&mut self) -> &mut dyn RandomSource {
        self.random.as_mut()
    }

    pub fn bus_mut(&mut self) -> &mut EventBus<Game> {
        &mut self.bus
    }

    /// Send to any connected transport, player or not.
    pub fn send_to(&mut self, handle: ClientHandle, message: &ServerMessage) {
        match self.players.iter().find(|p| p.handle() == handle) {
            Some(player) => player.send(self.transport.as_mut(), message),
            None => {
                if let Err(err) = self.transport.send(handle, message) {
                    debug!(client = %handle, error = %err, "send failed");
                }
            }
        }
    }

    pub fn broadcast(&mut self, message: &ServerMessage) {
        let transport = self.transport.as_mut();
        for player in &self.players {
            player.send(transport, message);
        }
    }

    pub fn broadcast_except(&mut self, skip: ClientHandle, message: &ServerMessage) {
        let transport = self.transport.as_mut();
        for player in self.players.iter().filter(|p| p.handle() != skip) {
            player.send(transport, message);
        }
    }

    pub fn disconnect_client(&mut self, handle: ClientHandle) {
        self.transport.disconnect(handle);
    }

    pub fn publish(&mut self, name: &str, payload: &Payload, source: Option<ClientHandle>) -> usize {
        event_bus::publish(self, name, payload, source)
    }

    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected(handle) => {
                debug!(client = %handle, "connection");
                self.publish(events::CONNECTION, &Payload::Connection, Some(handle));
            }
            TransportEvent::Message(handle, message) => {
                let name = message.event_name();
                let fired = self.publish(name, &Payload::Message(message), Some(handle));
                if fired == 0 {
                    debug!(client = %handle, event = name, "no listener for event");
                }
            }
            TransportEvent::Disconnected(handle) => self.handle_disconnect(handle),
        }
    }

    /// Close path for one transport: drop the player, tell the others, then
    /// publish `playerQuit` internally.
    pub fn handle_disconnect(&mut self, handle: ClientHandle) {
        let Some(player) = self.remove_player(handle) else {
            debug!(client = %handle, "closed before joining");
            return;
        };
        let player_name = player.name().to_owned();
        info!(player = %player_name, client = %handle, "player quit");
        self.broadcast(&ServerMessage::PlayerQuit {
            player_name: player_name.clone(),
        });
        self.publish(
            events::PLAYER_QUIT,
            &Payload::PlayerQuit { player_name },
            Some(handle),
        );
    }

    /// Poll the transport once, dispatch everything received and flush.
    /// Returns the number of transport events handled.
    pub fn pump(&mut self) -> usize {
        let events = self.transport.poll();
        let count = events.len();
        for event in events {
            self.handle_transport_event(event);
        }
        self.transport.flush();
        count
    }

    /// Exit the active phase and drop every global listener.
    pub fn shutdown(&mut self) {
        if let Some(current) = self.current.take() {
            if let Err(err) = self.with_phase(current, |phase, game| phase.exit(game)) {
                warn!(error = %err, "active phase missing at shutdown");
            }
            self.bus.unregister_all(&Owner::Phase(current));
        }
        let handles: Vec<ClientHandle> = self.players.iter().map(Player::handle).collect();
        for handle in handles {
            self.bus.unregister_all(&Owner::Player(handle));
        }
        let cleared = self.bus.clear_global();
        self.transport.flush();
        self.transport.close();
        info!(cleared, "session shut down");
    }
}
