//! Pre-game lobby: players join, browse civilizations and pick one.

use std::collections::HashSet;
use std::sync::Arc;

use openciv_protocol::message::event;
use openciv_protocol::{ClientMessage, ServerMessage};
use tracing::{debug, info, warn};

use super::{source_of, unexpected, Phase, PhaseError, PhaseListeners, LOBBY};
use crate::catalog::{CatalogSource, CivilizationCatalog};
use crate::event_bus::{events, Event, ListenerError, Payload};
use crate::game::Game;
use crate::player::Player;

pub struct LobbyPhase {
    source: CatalogSource,
    catalog: Option<Arc<CivilizationCatalog>>,
    listeners: PhaseListeners,
}

impl LobbyPhase {
    pub fn new(source: CatalogSource) -> Self {
        Self {
            source,
            catalog: None,
            listeners: PhaseListeners::new(LOBBY),
        }
    }

    /// Catalog loaded by the current entry, if the lobby is active.
    pub fn catalog(&self) -> Option<&CivilizationCatalog> {
        self.catalog.as_deref()
    }
}

impl Phase for LobbyPhase {
    fn name(&self) -> &'static str {
        LOBBY
    }

    fn enter(&mut self, game: &mut Game) -> Result<(), PhaseError> {
        game.reset_player_counter();
        for player in game.players_mut() {
            player.reset_for_lobby();
        }
        let catalog = Arc::new(CivilizationCatalog::load(&self.source)?);
        info!(civilizations = catalog.len(), "lobby open");

        let c = Arc::clone(&catalog);
        self.listeners
            .on(game, events::CONNECTION, move |game, e| admit(game, &c, e))?;

        let c = Arc::clone(&catalog);
        self.listeners.on(game, event::AVAILABLE_CIVS, move |game, e| {
            let handle = source_of(e)?;
            game.send_to(
                handle,
                &ServerMessage::AvailableCivs {
                    civs: c.summaries(),
                },
            );
            Ok(())
        })?;

        let c = Arc::clone(&catalog);
        self.listeners.on(game, event::CIV_INFO, move |game, e| {
            let handle = source_of(e)?;
            let Payload::Message(ClientMessage::CivInfo { name }) = e.payload else {
                return Err(unexpected(e));
            };
            let reply = match c.get(name) {
                Some(civ) => ServerMessage::civ_info(civ),
                None => ServerMessage::CivNotFound { name: name.clone() },
            };
            game.send_to(handle, &reply);
            Ok(())
        })?;

        let c = Arc::clone(&catalog);
        self.listeners
            .on(game, event::SELECT_CIV, move |game, e| select(game, &c, e))?;

        // Players still connected from a finished match are back in the lobby.
        game.broadcast(&ServerMessage::SetScene {
            scene: LOBBY.to_owned(),
        });

        self.catalog = Some(catalog);
        Ok(())
    }

    fn exit(&mut self, game: &mut Game) {
        if let Some(catalog) = self.catalog.take() {
            assign_remaining(game, &catalog);
        }
        let released = self.listeners.release(game);
        debug!(released, "lobby closed");
    }
}

fn admit(game: &mut Game, catalog: &CivilizationCatalog, e: &Event<'_>) -> Result<(), ListenerError> {
    let handle = source_of(e)?;
    if game.player_count() >= catalog.len() {
        warn!(client = %handle, capacity = catalog.len(), "lobby full; rejecting");
        game.send_to(
            handle,
            &ServerMessage::message_box("lobbyFull", "Error: Lobby is full!"),
        );
        game.disconnect_client(handle);
        return Ok(());
    }

    let name = game.next_player_name();
    game.insert_player(Player::new(name.clone(), handle))?;
    info!(player = %name, client = %handle, "joined the lobby");

    game.broadcast_except(
        handle,
        &ServerMessage::PlayerJoin {
            player_name: name,
        },
    );
    game.send_to(
        handle,
        &ServerMessage::SetScene {
            scene: LOBBY.to_owned(),
        },
    );
    Ok(())
}

fn select(game: &mut Game, catalog: &CivilizationCatalog, e: &Event<'_>) -> Result<(), ListenerError> {
    let handle = source_of(e)?;
    let Payload::Message(ClientMessage::SelectCiv { name }) = e.payload else {
        return Err(unexpected(e));
    };
    let player_name = game
        .find_player_by_handle(handle)
        .ok_or(ListenerError::UnknownClient(handle))?
        .name()
        .to_owned();

    let Some(civ) = catalog.get(name) else {
        game.send_to(handle, &ServerMessage::CivNotFound { name: name.clone() });
        return Ok(());
    };

    let held_by = game
        .players()
        .iter()
        .find(|p| {
            p.handle() != handle && p.civilization().is_some_and(|held| held.name == civ.name)
        })
        .map(|p| p.name().to_owned());
    if let Some(held_by) = held_by {
        debug!(player = %player_name, civilization = %civ.name, %held_by, "civilization taken");
        game.send_to(
            handle,
            &ServerMessage::CivUnavailable {
                name: civ.name.clone(),
                held_by,
            },
        );
        return Ok(());
    }

    if let Some(player) = game.find_player_by_handle_mut(handle) {
        player.assign_civilization(Arc::clone(civ));
    }
    info!(player = %player_name, civilization = %civ.name, "civilization selected");
    game.broadcast(&ServerMessage::SelectCiv {
        name: civ.name.clone(),
        player_name,
        civ_data: civ.as_ref().clone(),
    });
    Ok(())
}

/// Give every player without a civilization a random one nobody holds.
fn assign_remaining(game: &mut Game, catalog: &CivilizationCatalog) {
    for index in 0..game.player_count() {
        if game.players()[index].civilization().is_some() {
            continue;
        }
        let taken: HashSet<String> = game
            .players()
            .iter()
            .filter_map(|p| p.civilization().map(|civ| civ.name.clone()))
            .collect();
        let free: Vec<_> = catalog
            .iter()
            .filter(|civ| !taken.contains(&civ.name))
            .collect();
        if free.is_empty() {
            warn!(
                player = %game.players()[index].name(),
                "no civilization left to assign"
            );
            continue;
        }

        let pick = game.random_mut().index_up_to(free.len() - 1).min(free.len() - 1);
        let civ = Arc::clone(free[pick]);
        let player = &mut game.players_mut()[index];
        info!(player = %player.name(), civilization = %civ.name, "civilization assigned");
        player.assign_civilization(civ);
    }
}
