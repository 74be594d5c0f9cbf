//! Client/server message envelopes.
//!
//! Both directions are internally tagged on an `event` field so a frame is a
//! single map: `{"event": "selectCiv", "name": "Rome"}`.

use serde::{Deserialize, Serialize};

use crate::civilization::{CivSummary, CivilizationDescriptor, PlayerSummary};

/// Event names of client frames, as they appear in the `event` tag.
pub mod event {
    pub const LOADED_IN: &str = "loadedIn";
    pub const RESIZE_WINDOW: &str = "resizeWindow";
    pub const AVAILABLE_CIVS: &str = "availableCivs";
    pub const CIV_INFO: &str = "civInfo";
    pub const SELECT_CIV: &str = "selectCiv";
    pub const CONNECTED_PLAYERS: &str = "connectedPlayers";
    pub const SET_STATE: &str = "setState";
    pub const NEXT_TURN_REQUEST: &str = "nextTurnRequest";
}

/// Messages sent by a client to the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// The client finished loading the current scene.
    LoadedIn,
    /// The client's viewport changed size.
    ResizeWindow,
    /// List the civilizations that can be picked.
    AvailableCivs,
    /// Full description of one civilization.
    CivInfo { name: String },
    /// Pick a civilization for the sending player.
    SelectCiv { name: String },
    /// List every connected player.
    ConnectedPlayers,
    /// Switch the session to another phase.
    SetState { state: String },
    /// The sending player is done with the current turn.
    NextTurnRequest,
}

impl ClientMessage {
    /// Event name this message is dispatched under.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::LoadedIn => event::LOADED_IN,
            Self::ResizeWindow => event::RESIZE_WINDOW,
            Self::AvailableCivs => event::AVAILABLE_CIVS,
            Self::CivInfo { .. } => event::CIV_INFO,
            Self::SelectCiv { .. } => event::SELECT_CIV,
            Self::ConnectedPlayers => event::CONNECTED_PLAYERS,
            Self::SetState { .. } => event::SET_STATE,
            Self::NextTurnRequest => event::NEXT_TURN_REQUEST,
        }
    }
}

/// Messages sent by the server to a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Another player joined the lobby.
    PlayerJoin { player_name: String },
    /// Another player disconnected.
    PlayerQuit { player_name: String },
    /// Switch the client to a presentation scene.
    SetScene { scene: String },
    /// Picker entries (name and icon only).
    AvailableCivs { civs: Vec<CivSummary> },
    /// Descriptive text for one civilization.
    CivInfo {
        name: String,
        #[serde(rename = "icon_name")]
        icon_name: String,
        #[serde(rename = "start_bias_desc")]
        start_bias_desc: String,
        #[serde(rename = "unique_unit_descs")]
        unique_unit_descs: Vec<String>,
        #[serde(rename = "unique_building_descs")]
        unique_building_descs: Vec<String>,
        #[serde(rename = "ability_descs")]
        ability_descs: Vec<String>,
    },
    /// No civilization with this name exists.
    CivNotFound { name: String },
    /// The civilization is already held by another player.
    CivUnavailable { name: String, held_by: String },
    /// A player picked a civilization.
    SelectCiv {
        name: String,
        player_name: String,
        civ_data: CivilizationDescriptor,
    },
    /// Reply to `connectedPlayers`.
    ConnectedPlayers {
        players: Vec<PlayerSummary>,
        requesting_name: Option<String>,
    },
    /// Informational popup.
    MessageBox {
        message_name: String,
        message: String,
    },
    /// A player founded a city.
    CityFounded {
        player_name: String,
        city_name: String,
    },
    /// Every player ended their turn.
    NextTurn { turn: u32 },
}

impl ServerMessage {
    pub fn civ_info(civ: &CivilizationDescriptor) -> Self {
        Self::CivInfo {
            name: civ.name.clone(),
            icon_name: civ.icon_name.clone(),
            start_bias_desc: civ.start_bias_desc.clone(),
            unique_unit_descs: civ.unique_unit_descs.clone(),
            unique_building_descs: civ.unique_building_descs.clone(),
            ability_descs: civ.ability_descs.clone(),
        }
    }

    pub fn message_box(message_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MessageBox {
            message_name: message_name.into(),
            message: message.into(),
        }
    }
}
