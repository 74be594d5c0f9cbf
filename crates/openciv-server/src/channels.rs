//! Renet channel configuration.
//!
//! Channel 0: ReliableOrdered - session events in both directions
//! Channel 1: ReliableUnordered - message boxes and other notices

use std::time::Duration;

use openciv_protocol::ServerMessage;
use renet::ChannelConfig;

pub mod channel_id {
    /// Client frames and server events; order matters.
    pub const EVENTS: u8 = 0;
    /// Popups that may overtake ordinary events.
    pub const NOTICES: u8 = 1;
}

const MAX_CHANNEL_MEMORY: usize = 5 * 1024 * 1024; // 5 MB

pub fn create_channel_configs() -> Vec<ChannelConfig> {
    vec![
        ChannelConfig {
            channel_id: channel_id::EVENTS,
            max_memory_usage_bytes: MAX_CHANNEL_MEMORY,
            send_type: renet::SendType::ReliableOrdered {
                resend_time: Duration::from_millis(300),
            },
        },
        ChannelConfig {
            channel_id: channel_id::NOTICES,
            max_memory_usage_bytes: MAX_CHANNEL_MEMORY / 4,
            send_type: renet::SendType::ReliableUnordered {
                resend_time: Duration::from_millis(300),
            },
        },
    ]
}

/// Channel a server message travels on.
pub fn channel_for(message: &ServerMessage) -> u8 {
    match message {
        ServerMessage::MessageBox { .. } => channel_id::NOTICES,
        _ => channel_id::EVENTS,
    }
}
