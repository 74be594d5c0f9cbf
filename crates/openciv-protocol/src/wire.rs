use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ClientMessage, ServerMessage};

#[derive(Debug, Error)]
pub enum WireError {
    #[error("encode error: {0}")]
    Encode(#[from] encode::Error),
    #[error("decode error: {0}")]
    Decode(#[from] decode::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Frame encoding negotiated out of band (server config / client build).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// MessagePack with named fields, so the `event` tag survives.
    #[default]
    MessagePack,
    Json,
}

impl WireFormat {
    fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>, WireError> {
        Ok(match self {
            Self::MessagePack => encode::to_vec_named(value)?,
            Self::Json => serde_json::to_vec(value)?,
        })
    }

    fn decode<'a, T: Deserialize<'a>>(self, bytes: &'a [u8]) -> Result<T, WireError> {
        Ok(match self {
            Self::MessagePack => decode::from_slice(bytes)?,
            Self::Json => serde_json::from_slice(bytes)?,
        })
    }
}

pub fn serialize_client_message(
    format: WireFormat,
    msg: &ClientMessage,
) -> Result<Vec<u8>, WireError> {
    format.encode(msg)
}

pub fn deserialize_client_message(
    format: WireFormat,
    bytes: &[u8],
) -> Result<ClientMessage, WireError> {
    format.decode(bytes)
}

pub fn serialize_server_message(
    format: WireFormat,
    msg: &ServerMessage,
) -> Result<Vec<u8>, WireError> {
    format.encode(msg)
}

pub fn deserialize_server_message(
    format: WireFormat,
    bytes: &[u8],
) -> Result<ServerMessage, WireError> {
    format.decode(bytes)
}
