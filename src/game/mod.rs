//! Game simulation modules

pub mod combat;
pub mod entities;
pub mod geometry;
pub mod movement;
pub mod room;
pub mod schedule;
pub mod snapshot;

pub use entities::{ConnectionId, EntityStore, PlayerState, Projectile};
pub use room::{RoomHandle, RoomRegistry, RoomRunner, RoomSimulation};

use tokio::sync::oneshot;

use crate::protocol::{MoveAck, Team};

/// Commands delivered by the transport layer, per room, keyed by connection
/// handle. Invalid commands are silent no-ops; nothing here is fatal to the
/// room.
#[derive(Debug)]
pub enum RoomCommand {
    /// Roster mutation: a client joined the room
    AddPlayer {
        conn: ConnectionId,
        player_id: u32,
        team: Team,
    },
    /// Roster mutation: a client left or was dropped
    RemovePlayer { conn: ConnectionId },
    /// Reconnection: move a player to a fresh connection handle
    RekeyPlayer {
        old: ConnectionId,
        new: ConnectionId,
    },
    /// Pre-game team switch (gating is the session layer's concern)
    UpdateTeam { conn: ConnectionId, team: Team },
    /// Begin the match: spawn placement, initial snapshot, tick loop
    Start,
    /// Stop the room's scheduler; terminal
    Stop,
    /// Throw a projectile toward a ground target
    Throw {
        conn: ConnectionId,
        target_x: f32,
        target_z: f32,
        action_id: u64,
    },
    /// Command a move toward a ground target; the ack goes back to the
    /// requesting client only, never broadcast
    Move {
        conn: ConnectionId,
        target_x: f32,
        target_z: f32,
        action_id: u64,
        reply: oneshot::Sender<Option<MoveAck>>,
    },
    /// Legacy client-reported collision, server-validated
    CollisionReport {
        conn: ConnectionId,
        target_team: Team,
    },
}
