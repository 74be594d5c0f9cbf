//! OpenCiv wire protocol.
//!
//! Message envelopes and civilization data shared by the session server and
//! its clients. Every frame is a tagged map keyed by `event`; the encoding is
//! MessagePack by default, JSON for browser clients.

pub mod civilization;
pub mod ids;
pub mod message;
pub mod wire;

pub use civilization::{CivSummary, CivilizationDescriptor, PlayerSummary};
pub use ids::ClientHandle;
pub use message::{ClientMessage, ServerMessage};
pub use wire::{
    deserialize_client_message, deserialize_server_message, serialize_client_message,
    serialize_server_message, WireError, WireFormat,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn rome() -> CivilizationDescriptor {
        CivilizationDescriptor {
            name: "Rome".into(),
            icon_name: "rome_icon".into(),
            start_bias_desc: "None".into(),
            unique_unit_descs: vec!["Legion".into()],
            unique_building_descs: vec!["Colosseum".into()],
            ability_descs: vec!["The Glory of Rome".into()],
            cities: vec!["Rome".into(), "Antium".into(), "Ostia".into()],
        }
    }

    #[test]
    fn json_envelope_uses_event_tag() {
        let bytes = br#"{"event":"selectCiv","name":"Rome"}"#;
        let msg = deserialize_client_message(WireFormat::Json, bytes).unwrap();
        assert_eq!(msg, ClientMessage::SelectCiv { name: "Rome".into() });
        assert_eq!(msg.event_name(), "selectCiv");

        let bytes = br#"{"event":"setState","state":"in_game"}"#;
        let msg = deserialize_client_message(WireFormat::Json, bytes).unwrap();
        assert_eq!(msg.event_name(), "setState");
    }

    #[test]
    fn unit_variants_decode_from_bare_tag() {
        let msg = deserialize_client_message(WireFormat::Json, br#"{"event":"loadedIn"}"#).unwrap();
        assert_eq!(msg, ClientMessage::LoadedIn);
    }

    #[test]
    fn unknown_event_is_a_decode_error() {
        let err = deserialize_client_message(WireFormat::Json, br#"{"event":"launchNukes"}"#)
            .unwrap_err();
        assert!(matches!(err, WireError::Json(_)));

        let err = deserialize_client_message(WireFormat::MessagePack, &[0xc1, 0x00]).unwrap_err();
        assert!(matches!(err, WireError::Decode(_)));
    }

    #[test]
    fn server_fields_are_camel_case() {
        let msg = ServerMessage::SelectCiv {
            name: "Rome".into(),
            player_name: "Player1".into(),
            civ_data: rome(),
        };
        let value: serde_json::Value =
            serde_json::from_slice(&serialize_server_message(WireFormat::Json, &msg).unwrap())
                .unwrap();
        assert_eq!(value["event"], "selectCiv");
        assert_eq!(value["playerName"], "Player1");
        assert_eq!(value["civData"]["icon_name"], "rome_icon");
    }

    #[test]
    fn civ_info_keeps_catalog_field_names() {
        let msg = ServerMessage::civ_info(&rome());
        let value: serde_json::Value =
            serde_json::from_slice(&serialize_server_message(WireFormat::Json, &msg).unwrap())
                .unwrap();
        assert_eq!(value["event"], "civInfo");
        assert_eq!(value["icon_name"], "rome_icon");
        assert_eq!(value["unique_unit_descs"][0], "Legion");
        // City lists stay server-side until the civ is selected.
        assert!(value.get("cities").is_none());
    }

    #[test]
    fn message_pack_preserves_tagged_maps() {
        let msg = ServerMessage::ConnectedPlayers {
            players: vec![PlayerSummary {
                name: "Player1".into(),
                civ_data: Some(rome()),
                requested_next_turn: false,
            }],
            requesting_name: Some("Player1".into()),
        };
        let bytes = serialize_server_message(WireFormat::MessagePack, &msg).unwrap();
        let decoded = deserialize_server_message(WireFormat::MessagePack, &bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn summary_projects_name_and_icon() {
        let summary = rome().summary();
        assert_eq!(
            summary,
            CivSummary {
                name: "Rome".into(),
                icon_name: "rome_icon".into()
            }
        );
    }
}
