//! Wire types broadcast to room participants
//! The transport layer serializes these verbatim when relaying to clients

use serde::{Deserialize, Serialize};

/// Team identifier, fixed at the session-layer boundary
///
/// Teams are small integers assigned by the lobby; the core never re-derives
/// or coerces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Team(pub u8);

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Events broadcast from the room simulation to all participants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// A validated throw spawned a projectile; carries enough data for
    /// non-throwing clients to render it from tick zero
    #[serde(rename = "projectile.spawn")]
    ProjectileSpawn {
        id: u64,
        owner_team: Team,
        x: f32,
        z: f32,
        vx: f32,
        vz: f32,
        /// Client action id, echoed back for reconciliation
        action_id: u64,
        tick: u64,
        time: u64,
    },

    /// A projectile was retired (lifetime exceeded or hit resolved)
    #[serde(rename = "projectile.destroy")]
    ProjectileDestroy { id: u64, tick: u64 },

    /// A projectile struck a player
    #[serde(rename = "projectile.hit")]
    ProjectileHit {
        id: u64,
        target_team: Team,
        x: f32,
        z: f32,
        tick: u64,
    },

    /// Authoritative health change
    #[serde(rename = "health.update")]
    HealthUpdate {
        target_team: Team,
        health: u8,
        is_dead: bool,
        tick: u64,
        time: u64,
    },

    /// Periodic full state snapshot
    #[serde(rename = "state.snapshot")]
    Snapshot {
        tick: u64,
        time: u64,
        projectiles: Vec<ProjectileSnapshot>,
        players: Vec<PlayerSnapshot>,
    },

    /// Terminal event: one team has outlived all others
    #[serde(rename = "game.over")]
    GameOver {
        winning_team: Team,
        tick: u64,
        time: u64,
    },
}

/// Projectile state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub id: u64,
    pub owner_team: Team,
    pub x: f32,
    pub z: f32,
    pub vx: f32,
    pub vz: f32,
}

/// Player state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub player_id: u32,
    pub team: Team,
    pub x: f32,
    pub z: f32,
    pub health: u8,
    pub is_moving: bool,
    pub is_dead: bool,
}

/// Reply to a validated move request, returned to the requesting client only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveAck {
    /// Authoritative current position at accept time
    pub x: f32,
    pub z: f32,
    /// Clamped movement target
    pub target_x: f32,
    pub target_z: f32,
    pub action_id: u64,
}
