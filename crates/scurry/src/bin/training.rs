//! Headless training run: starts a client in training mode, plays the
//! built-in level by walking right, and logs every event until the game
//! finishes. Useful as a smoke test of the whole inbound/outbound path
//! without a server or a UI.

use std::sync::Arc;

use scurry::{Client, ClientMode};
use scurry_emulator::TRAINING_LEVEL;
use scurry_model::{MemoryStore, ModelEvent};
use scurry_protocol::MoveDirection;
use tracing_subscriber::EnvFilter;

/// Safety cap on moves; the built-in level is won in far fewer.
const MAX_STEPS: usize = 60;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let client = match Client::start(ClientMode::Training, Arc::new(MemoryStore::new())) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "failed to start client");
            return;
        }
    };

    client.model.invite(TRAINING_LEVEL);
    report(&client.events.drain());

    let mut won = None;
    'game: for step in 0..MAX_STEPS {
        client.model.request_move(MoveDirection::Right);
        for event in client.events.drain() {
            if let ModelEvent::GameFinished { winner } = event {
                won = Some(winner);
                tracing::info!(step, winner, "game finished");
                break 'game;
            }
            report(&[event]);
        }
    }

    match won {
        Some(true) => tracing::info!(
            progress = client.model.single_player_progress(),
            "training cleared"
        ),
        Some(false) => tracing::info!("training lost"),
        None => tracing::warn!("step cap reached before the game finished"),
    }
    client.close();
}

fn report(events: &[ModelEvent]) {
    for event in events {
        match event {
            ModelEvent::ScoreChanged { score1, score2 } => {
                tracing::info!(score1, score2, "score");
            }
            ModelEvent::LivesChanged { lives1, lives2, reset } => {
                tracing::info!(lives1, lives2, reset, "lives");
            }
            ModelEvent::RoundFinished { winner } => {
                tracing::info!(winner, "round finished");
            }
            other => tracing::debug!(?other, "event"),
        }
    }
}
