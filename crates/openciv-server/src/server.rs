//! Session wiring and the tick loop.

use anyhow::{Context, Result};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::game::{Game, GameError};
use crate::phase::{InGamePhase, LobbyPhase, LOBBY};
use crate::random::{RandomSource, StdRandom};
use crate::transport::{RenetTransport, Transport, TransportConfig, PROTOCOL_ID};

/// Build a session with both phases registered and the lobby active.
pub fn build_game(
    config: &ServerConfig,
    transport: Box<dyn Transport>,
    random: Box<dyn RandomSource>,
) -> Result<Game, GameError> {
    let mut game = Game::new(transport, random)?;
    game.register_phase(Box::new(LobbyPhase::new(config.catalog_source())))?;
    game.register_phase(Box::new(InGamePhase::new()))?;
    game.transition_to(LOBBY)?;
    Ok(game)
}

/// Bind the UDP transport and run the session until ctrl-c or a fatal
/// phase failure.
pub async fn run(config: ServerConfig) -> Result<()> {
    let transport = RenetTransport::bind(TransportConfig {
        public_address: config.bind_address,
        max_clients: config.max_clients,
        private_key: config.private_key_bytes()?,
        format: config.wire_format,
    })
    .context("Failed to create transport")?;

    info!("OpenCiv Server v{}", env!("CARGO_PKG_VERSION"));
    if let Some(addr) = transport.local_addr() {
        info!("Listening on {}", addr);
    }
    info!("Protocol ID: {:016x}", PROTOCOL_ID);

    let mut game = build_game(
        &config,
        Box::new(transport),
        Box::new(StdRandom::from_entropy()),
    )
    .context("Failed to open the lobby")?;

    let mut ticker = tokio::time::interval(config.tick_duration());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let outcome = loop {
        tokio::select! {
            _ = ticker.tick() => {
                game.pump();
                if let Some(err) = game.take_fatal() {
                    error!(error = %err, "session halted");
                    break Err(anyhow::Error::new(err).context("Session halted"));
                }
            }
            signal = &mut shutdown => {
                if let Err(err) = signal {
                    break Err(anyhow::Error::new(err).context("Failed to listen for ctrl-c"));
                }
                info!("Shutting down");
                break Ok(());
            }
        }
    };

    game.shutdown();
    outcome
}
