//! Running match.

use std::cell::Cell;
use std::rc::Rc;

use openciv_protocol::message::event;
use openciv_protocol::{ClientHandle, ServerMessage};
use tracing::{debug, info, warn};

use super::{source_of, Phase, PhaseError, PhaseListeners, IN_GAME};
use crate::event_bus::{events, ListenerError};
use crate::game::Game;

pub struct InGamePhase {
    listeners: PhaseListeners,
    turn: Rc<Cell<u32>>,
}

impl Default for InGamePhase {
    fn default() -> Self {
        Self::new()
    }
}

impl InGamePhase {
    pub fn new() -> Self {
        Self {
            listeners: PhaseListeners::new(IN_GAME),
            turn: Rc::new(Cell::new(1)),
        }
    }

    pub fn turn(&self) -> u32 {
        self.turn.get()
    }
}

impl Phase for InGamePhase {
    fn name(&self) -> &'static str {
        IN_GAME
    }

    fn enter(&mut self, game: &mut Game) -> Result<(), PhaseError> {
        self.turn.set(1);
        for player in game.players_mut() {
            player.set_loaded_in(false);
            player.set_requested_next_turn(false);
            player.on_loaded_in(found_capital);
        }

        self.listeners.on(game, events::CONNECTION, |game, e| {
            let handle = source_of(e)?;
            warn!(client = %handle, "connection during a match; rejecting");
            game.send_to(
                handle,
                &ServerMessage::message_box("gameInProgress", "Error: Game in progress!"),
            );
            game.disconnect_client(handle);
            Ok(())
        })?;

        let turn = Rc::clone(&self.turn);
        self.listeners.on(game, event::NEXT_TURN_REQUEST, move |game, e| {
            let handle = source_of(e)?;
            let player = game
                .find_player_by_handle_mut(handle)
                .ok_or(ListenerError::UnknownClient(handle))?;
            player.set_requested_next_turn(true);
            debug!(player = %player.name(), "turn ended");
            advance_if_all_requested(game, &turn);
            Ok(())
        })?;

        // A leaver may have been the last player the others were waiting on.
        let turn = Rc::clone(&self.turn);
        self.listeners.on(game, events::PLAYER_QUIT, move |game, _| {
            advance_if_all_requested(game, &turn);
            Ok(())
        })?;

        info!(players = game.player_count(), "match started");
        game.broadcast(&ServerMessage::SetScene {
            scene: IN_GAME.to_owned(),
        });
        Ok(())
    }

    fn exit(&mut self, game: &mut Game) {
        let released = self.listeners.release(game);
        for player in game.players_mut() {
            player.clear_callbacks();
        }
        debug!(released, turn = self.turn.get(), "match over");
    }
}

fn advance_if_all_requested(game: &mut Game, turn: &Cell<u32>) {
    let players = game.players();
    if players.is_empty() || !players.iter().all(|p| p.has_requested_next_turn()) {
        return;
    }
    let next = turn.get() + 1;
    turn.set(next);
    for player in game.players_mut() {
        player.set_requested_next_turn(false);
    }
    info!(turn = next, "turn advanced");
    game.broadcast(&ServerMessage::NextTurn { turn: next });
}

/// First `loadedIn` of a match founds the player's capital.
fn found_capital(game: &mut Game, handle: ClientHandle) -> Result<(), ListenerError> {
    let player = game
        .find_player_by_handle_mut(handle)
        .ok_or(ListenerError::UnknownClient(handle))?;
    if !player.cities().is_empty() {
        return Ok(());
    }
    let city_name = player.found_city()?.name().to_owned();
    let player_name = player.name().to_owned();
    info!(player = %player_name, city = %city_name, "capital founded");
    game.broadcast(&ServerMessage::CityFounded {
        player_name,
        city_name,
    });
    Ok(())
}
