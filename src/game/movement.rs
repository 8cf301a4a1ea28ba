//! Player movement - command validation and per-tick integration

use tracing::debug;

use crate::game::entities::{ConnectionId, EntityStore};
use crate::game::geometry::Vec2;
use crate::protocol::MoveAck;

/// Movement speed in distance units per second
pub const PLAYER_SPEED: f32 = 2.5;

/// Distance below which a moving player snaps onto its target
pub const ARRIVE_EPSILON: f32 = 0.1;

/// Rectangular playable area on the arena plane
#[derive(Debug, Clone, Copy)]
pub struct MapBounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_z: f32,
    pub max_z: f32,
}

impl MapBounds {
    pub fn clamp(&self, p: Vec2) -> Vec2 {
        Vec2::new(p.x.clamp(self.min_x, self.max_x), p.z.clamp(self.min_z, self.max_z))
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.z >= self.min_z && p.z <= self.max_z
    }
}

pub const MAP_BOUNDS: MapBounds = MapBounds {
    min_x: -50.0,
    max_x: 50.0,
    min_z: -50.0,
    max_z: 50.0,
};

/// Movement system: advances players toward their commanded targets
pub struct MovementSystem;

impl MovementSystem {
    /// Advance every moving, non-dead player by one step of `dt` seconds.
    ///
    /// Players within snapping distance of their target (or reachable within
    /// this step) land exactly on it and stop, so repeated ticks never
    /// oscillate around the goal. Idempotent at dt = 0.
    pub fn advance(store: &mut EntityStore, dt: f32) {
        for player in store.players_mut() {
            if !player.moving || player.dead {
                continue;
            }

            let delta = player.target - player.pos;
            let distance = delta.length();

            if distance < ARRIVE_EPSILON {
                player.pos = player.target;
                player.moving = false;
                continue;
            }

            let step = PLAYER_SPEED * dt;
            if distance <= step {
                player.pos = player.target;
                player.moving = false;
            } else {
                // distance > 0 here, normalization cannot fail
                let dir = delta.scale(1.0 / distance);
                player.pos = player.pos + dir.scale(step);
            }
        }
    }

    /// Validate and record a move command.
    ///
    /// Out-of-bounds targets are clamped onto the map edge rather than
    /// rejected. The player's current position is untouched; only subsequent
    /// ticks move it. Returns `None` for unknown or dead players.
    pub fn request_move(
        store: &mut EntityStore,
        conn: ConnectionId,
        target_x: f32,
        target_z: f32,
        action_id: u64,
    ) -> Option<MoveAck> {
        let Some(player) = store.player_mut(conn) else {
            debug!(conn = %conn, "move rejected: unknown connection");
            return None;
        };

        if player.dead {
            debug!(conn = %conn, player_id = player.player_id, "move rejected: player is dead");
            return None;
        }

        let target = MAP_BOUNDS.clamp(Vec2::new(target_x, target_z));
        player.target = target;
        player.moving = true;

        debug!(
            team = %player.team,
            target_x = target.x,
            target_z = target.z,
            "player moving"
        );

        Some(MoveAck {
            x: player.pos.x,
            z: player.pos.z,
            target_x: target.x,
            target_z: target.z,
            action_id,
        })
    }
}
