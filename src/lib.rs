//! Knife Arena Core - authoritative room simulation
//!
//! This crate owns the ground truth of a multiplayer knife arena match:
//! player positions, health, and projectile state for one room, advanced on
//! a fixed-timestep schedule with bounded catch-up and overload-adaptive
//! snapshot broadcasting.
//!
//! The embedding process supplies the rest: lobby/session management, the
//! transport that delivers [`game::RoomCommand`]s and drains the broadcast
//! stream, HTTP endpoints, and the host load measurement behind
//! [`load::LoadSignal`].

pub mod config;
pub mod game;
pub mod load;
pub mod protocol;
pub mod util;

pub use config::{ConfigError, SimConfig};
pub use game::{
    ConnectionId, RoomCommand, RoomHandle, RoomRegistry, RoomRunner, RoomSimulation,
};
pub use load::{LoadSample, LoadSignal, NoLoadSignal, SharedLoadSignal};
pub use protocol::{MoveAck, PlayerSnapshot, ProjectileSnapshot, ServerEvent, Team};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging for the embedding process
pub fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
