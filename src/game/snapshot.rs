//! Snapshot building for periodic state broadcasts

use crate::game::entities::EntityStore;
use crate::protocol::{PlayerSnapshot, ProjectileSnapshot, ServerEvent};

/// Build a full-state snapshot event from the entity store.
///
/// Entries are ordered by stable ids so identical state always serializes
/// identically. Projectiles already resolved (hit or expired, awaiting
/// removal) are omitted; clients learned their fate from the hit/destroy
/// events.
pub fn build_snapshot(tick: u64, now_ms: u64, store: &EntityStore) -> ServerEvent {
    let projectiles: Vec<ProjectileSnapshot> = store
        .projectile_order()
        .into_iter()
        .filter_map(|id| store.projectile(id))
        .filter(|p| !p.resolved())
        .map(|p| ProjectileSnapshot {
            id: p.id,
            owner_team: p.owner_team,
            x: p.pos.x,
            z: p.pos.z,
            vx: p.vel.x,
            vz: p.vel.z,
        })
        .collect();

    let players: Vec<PlayerSnapshot> = store
        .player_order()
        .into_iter()
        .filter_map(|conn| store.player(conn))
        .map(|p| PlayerSnapshot {
            player_id: p.player_id,
            team: p.team,
            x: p.pos.x,
            z: p.pos.z,
            health: p.health,
            is_moving: p.moving,
            is_dead: p.dead,
        })
        .collect();

    ServerEvent::Snapshot {
        tick,
        time: now_ms,
        projectiles,
        players,
    }
}
