//! Combat system - projectile spawning, integration, and hit resolution

use tracing::debug;

use crate::game::entities::{ConnectionId, EntityStore, PlayerState, Projectile};
use crate::game::geometry::{segment_hits_circle, Vec2};
use crate::protocol::{ServerEvent, Team};

/// Projectile travel speed in distance units per second
pub const PROJECTILE_SPEED: f32 = 4.5864;

/// Minimum milliseconds between accepted throws per player
pub const THROW_COOLDOWN_MS: u64 = 2200;

/// Milliseconds a projectile survives before it is retired
pub const PROJECTILE_LIFETIME_MS: u64 = 5000;

/// Hit radius around a player's position
pub const COLLISION_RADIUS: f32 = 7.35;

/// Combat system: throws, projectile physics, and swept collision checks
pub struct CombatSystem;

impl CombatSystem {
    /// Validate a throw command and spawn the projectile.
    ///
    /// Rejections (unknown actor, dead actor, cooldown, zero-length
    /// direction) return `None` with no state change. On success the
    /// player's cooldown stamp resets and the returned `projectile.spawn`
    /// event must be broadcast so every client can render the projectile
    /// from its first tick.
    pub fn request_throw(
        store: &mut EntityStore,
        conn: ConnectionId,
        target_x: f32,
        target_z: f32,
        action_id: u64,
        now_ms: u64,
        tick: u64,
    ) -> Option<ServerEvent> {
        let Some(player) = store.player(conn) else {
            debug!(conn = %conn, "throw rejected: unknown connection");
            return None;
        };

        if player.dead {
            debug!(conn = %conn, player_id = player.player_id, "throw rejected: player is dead");
            return None;
        }

        if now_ms.saturating_sub(player.last_throw_ms) < THROW_COOLDOWN_MS {
            debug!(conn = %conn, player_id = player.player_id, "throw rejected: on cooldown");
            return None;
        }

        let origin = player.pos;
        let owner_team = player.team;

        let Some(dir) = (Vec2::new(target_x, target_z) - origin).normalized() else {
            debug!(conn = %conn, "throw rejected: degenerate direction");
            return None;
        };

        let id = store.allocate_projectile_id();
        let vel = dir.scale(PROJECTILE_SPEED);

        store.insert_projectile(Projectile {
            id,
            owner: conn,
            owner_team,
            pos: origin,
            prev_pos: origin,
            vel,
            spawn_ms: now_ms,
            action_id,
            has_hit: false,
            expired: false,
        });

        // Borrow is free again; reset the cooldown stamp
        if let Some(player) = store.player_mut(conn) {
            player.last_throw_ms = now_ms;
        }

        debug!(
            team = %owner_team,
            projectile = id,
            target_x,
            target_z,
            "projectile thrown"
        );

        Some(ServerEvent::ProjectileSpawn {
            id,
            owner_team,
            x: origin.x,
            z: origin.z,
            vx: vel.x,
            vz: vel.z,
            action_id,
            tick,
            time: now_ms,
        })
    }

    /// Advance projectile physics by one fixed step.
    ///
    /// Projectiles resolved on an earlier tick are deleted first. Survivors
    /// whose lifetime has elapsed are marked expired and emit
    /// `projectile.destroy`, but stay in the store through this tick's
    /// collision pass at their final position; everything else records its
    /// previous position and integrates.
    pub fn advance_projectiles(
        store: &mut EntityStore,
        dt: f32,
        now_ms: u64,
        tick: u64,
        events: &mut Vec<ServerEvent>,
    ) {
        for id in store.projectile_order() {
            let Some(projectile) = store.projectile(id) else {
                continue;
            };

            if projectile.resolved() {
                // Expired projectiles announced their destruction when they
                // were marked; hits announce it here, one pass later.
                let announced = projectile.expired;
                store.remove_projectile(id);
                if !announced {
                    events.push(ServerEvent::ProjectileDestroy { id, tick });
                }
                continue;
            }

            let projectile = store
                .projectile_mut(id)
                .unwrap_or_else(|| unreachable!("projectile {id} present above"));

            if now_ms.saturating_sub(projectile.spawn_ms) > PROJECTILE_LIFETIME_MS {
                projectile.expired = true;
                projectile.prev_pos = projectile.pos;
                events.push(ServerEvent::ProjectileDestroy { id, tick });
                continue;
            }

            projectile.prev_pos = projectile.pos;
            projectile.pos = projectile.pos + projectile.vel.scale(dt);
        }
    }

    /// Resolve projectile-player collisions for this tick.
    ///
    /// Each projectile that has not already hit sweeps the segment from its
    /// previous to its current position against every living player on an
    /// opposing team, in stable player-id order. Only the first qualifying
    /// hit resolves; same-team players are always skipped.
    pub fn resolve_collisions(
        store: &mut EntityStore,
        tick: u64,
        now_ms: u64,
        events: &mut Vec<ServerEvent>,
    ) {
        let scan_order = store.player_order();

        for id in store.projectile_order() {
            let Some(projectile) = store.projectile(id) else {
                continue;
            };
            if projectile.has_hit {
                continue;
            }

            let (seg_start, seg_end, owner_team) =
                (projectile.prev_pos, projectile.pos, projectile.owner_team);

            for &conn in &scan_order {
                let Some(player) = store.player(conn) else {
                    continue;
                };
                if player.dead || player.team == owner_team {
                    continue;
                }

                if !segment_hits_circle(seg_start, seg_end, player.pos, COLLISION_RADIUS) {
                    continue;
                }

                if let Some(projectile) = store.projectile_mut(id) {
                    projectile.has_hit = true;
                }

                let target = store
                    .player_mut(conn)
                    .unwrap_or_else(|| unreachable!("player {conn} present above"));
                let (health, is_dead) = apply_hit(target);
                let target_team = target.team;

                debug!(
                    projectile = id,
                    target_team = %target_team,
                    health,
                    is_dead,
                    "projectile hit"
                );

                events.push(ServerEvent::HealthUpdate {
                    target_team,
                    health,
                    is_dead,
                    tick,
                    time: now_ms,
                });
                events.push(ServerEvent::ProjectileHit {
                    id,
                    target_team,
                    x: seg_end.x,
                    z: seg_end.z,
                    tick,
                });

                break;
            }
        }
    }

    /// Legacy server-validated damage path: a client reports a collision
    /// against a team, the server picks one living player on that team and
    /// applies a single point of damage. Same-team reports are rejected.
    pub fn collision_report(
        store: &mut EntityStore,
        attacker: ConnectionId,
        target_team: Team,
        tick: u64,
        now_ms: u64,
    ) -> Option<ServerEvent> {
        let Some(attacker_state) = store.player(attacker) else {
            debug!(conn = %attacker, "collision report rejected: unknown attacker");
            return None;
        };

        if attacker_state.team == target_team {
            debug!(team = %target_team, "collision report rejected: same team");
            return None;
        }

        let target_conn = store.player_order().into_iter().find(|&conn| {
            store
                .player(conn)
                .map(|p| p.team == target_team && !p.dead)
                .unwrap_or(false)
        })?;

        let target = store.player_mut(target_conn)?;
        let (health, is_dead) = apply_hit(target);

        debug!(target_team = %target_team, health, is_dead, "reported collision applied");

        Some(ServerEvent::HealthUpdate {
            target_team,
            health,
            is_dead,
            tick,
            time: now_ms,
        })
    }
}

/// Apply one point of damage: health floors at 0, `dead` latches exactly once
fn apply_hit(player: &mut PlayerState) -> (u8, bool) {
    player.health = player.health.saturating_sub(1);
    if player.health == 0 && !player.dead {
        player.dead = true;
    }
    (player.health, player.dead)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::MAX_HEALTH;

    fn add_player_at(store: &mut EntityStore, player_id: u32, team: Team, pos: Vec2) -> ConnectionId {
        let conn = ConnectionId::new();
        store.add_player(conn, player_id, team);
        store.player_mut(conn).unwrap().pos = pos;
        conn
    }

    fn raw_projectile(id: u64, owner_team: Team, prev: Vec2, pos: Vec2) -> Projectile {
        Projectile {
            id,
            owner: ConnectionId::new(),
            owner_team,
            pos,
            prev_pos: prev,
            vel: Vec2::new(PROJECTILE_SPEED, 0.0),
            spawn_ms: 0,
            action_id: 0,
            has_hit: false,
            expired: false,
        }
    }

    #[test]
    fn throw_respects_cooldown_window() {
        let mut store = EntityStore::new();
        let conn = add_player_at(&mut store, 1, Team(1), Vec2::ZERO);

        let first = CombatSystem::request_throw(&mut store, conn, 5.0, 0.0, 1, 10_000, 1);
        assert!(first.is_some());
        assert_eq!(store.projectile_count(), 1);

        // Inside the window: rejected, nothing spawned
        let second = CombatSystem::request_throw(&mut store, conn, 5.0, 0.0, 2, 11_000, 2);
        assert!(second.is_none());
        assert_eq!(store.projectile_count(), 1);

        // Window elapsed: accepted again
        let third = CombatSystem::request_throw(&mut store, conn, 5.0, 0.0, 3, 12_200, 3);
        assert!(third.is_some());
        assert_eq!(store.projectile_count(), 2);
    }

    #[test]
    fn throw_toward_own_position_is_rejected() {
        let mut store = EntityStore::new();
        let conn = add_player_at(&mut store, 1, Team(1), Vec2::new(3.0, 3.0));
        assert!(CombatSystem::request_throw(&mut store, conn, 3.0, 3.0, 1, 5_000, 1).is_none());
        assert_eq!(store.projectile_count(), 0);
    }

    #[test]
    fn dead_and_unknown_throwers_are_rejected() {
        let mut store = EntityStore::new();
        let conn = add_player_at(&mut store, 1, Team(1), Vec2::ZERO);
        store.player_mut(conn).unwrap().dead = true;
        assert!(CombatSystem::request_throw(&mut store, conn, 5.0, 0.0, 1, 5_000, 1).is_none());
        let stranger = ConnectionId::new();
        assert!(CombatSystem::request_throw(&mut store, stranger, 5.0, 0.0, 1, 5_000, 1).is_none());
    }

    #[test]
    fn spawn_event_carries_normalized_velocity() {
        let mut store = EntityStore::new();
        let conn = add_player_at(&mut store, 1, Team(2), Vec2::ZERO);

        let event = CombatSystem::request_throw(&mut store, conn, 0.0, 9.0, 77, 5_000, 12).unwrap();
        match event {
            ServerEvent::ProjectileSpawn {
                id,
                owner_team,
                x,
                z,
                vx,
                vz,
                action_id,
                tick,
                time,
            } => {
                assert_eq!(id, 1);
                assert_eq!(owner_team, Team(2));
                assert_eq!((x, z), (0.0, 0.0));
                assert!(vx.abs() < 1e-6);
                assert!((vz - PROJECTILE_SPEED).abs() < 1e-4);
                assert_eq!(action_id, 77);
                assert_eq!(tick, 12);
                assert_eq!(time, 5_000);
            }
            other => panic!("expected spawn event, got {other:?}"),
        }
    }

    #[test]
    fn swept_hit_strikes_enemy_and_spares_friendly() {
        let mut store = EntityStore::new();
        let enemy = add_player_at(&mut store, 1, Team(2), Vec2::new(5.0, 5.0));
        let friendly = add_player_at(&mut store, 2, Team(1), Vec2::new(5.0, -5.0));

        store.insert_projectile(raw_projectile(1, Team(1), Vec2::ZERO, Vec2::new(10.0, 0.0)));

        let mut events = Vec::new();
        CombatSystem::resolve_collisions(&mut store, 10, 1_000, &mut events);

        let hits: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, ServerEvent::ProjectileHit { .. }))
            .collect();
        assert_eq!(hits.len(), 1);
        match hits[0] {
            ServerEvent::ProjectileHit { target_team, tick, .. } => {
                assert_eq!(*target_team, Team(2));
                assert_eq!(*tick, 10);
            }
            _ => unreachable!(),
        }

        assert_eq!(store.player(enemy).unwrap().health, MAX_HEALTH - 1);
        assert_eq!(store.player(friendly).unwrap().health, MAX_HEALTH);
        assert!(store.projectile(1).unwrap().has_hit);
    }

    #[test]
    fn resolved_projectile_never_double_decrements() {
        let mut store = EntityStore::new();
        let enemy = add_player_at(&mut store, 1, Team(2), Vec2::new(5.0, 5.0));
        store.insert_projectile(raw_projectile(1, Team(1), Vec2::ZERO, Vec2::new(10.0, 0.0)));

        let mut events = Vec::new();
        CombatSystem::resolve_collisions(&mut store, 1, 0, &mut events);
        CombatSystem::resolve_collisions(&mut store, 2, 16, &mut events);

        assert_eq!(store.player(enemy).unwrap().health, MAX_HEALTH - 1);
        let health_updates = events
            .iter()
            .filter(|e| matches!(e, ServerEvent::HealthUpdate { .. }))
            .count();
        assert_eq!(health_updates, 1);
    }

    #[test]
    fn one_projectile_hits_at_most_one_player_per_tick() {
        let mut store = EntityStore::new();
        let first = add_player_at(&mut store, 1, Team(2), Vec2::new(3.0, 1.0));
        let second = add_player_at(&mut store, 2, Team(2), Vec2::new(7.0, -1.0));
        store.insert_projectile(raw_projectile(1, Team(1), Vec2::ZERO, Vec2::new(10.0, 0.0)));

        let mut events = Vec::new();
        CombatSystem::resolve_collisions(&mut store, 1, 0, &mut events);

        // Stable scan order: lower player_id resolves the hit
        assert_eq!(store.player(first).unwrap().health, MAX_HEALTH - 1);
        assert_eq!(store.player(second).unwrap().health, MAX_HEALTH);
    }

    #[test]
    fn death_latches_once_and_health_floors_at_zero() {
        let mut store = EntityStore::new();
        let enemy = add_player_at(&mut store, 1, Team(2), Vec2::new(5.0, 0.0));
        store.player_mut(enemy).unwrap().health = 1;

        store.insert_projectile(raw_projectile(1, Team(1), Vec2::ZERO, Vec2::new(10.0, 0.0)));
        let mut events = Vec::new();
        CombatSystem::resolve_collisions(&mut store, 1, 0, &mut events);

        let player = store.player(enemy).unwrap();
        assert_eq!(player.health, 0);
        assert!(player.dead);
        match &events[0] {
            ServerEvent::HealthUpdate { health, is_dead, .. } => {
                assert_eq!(*health, 0);
                assert!(*is_dead);
            }
            other => panic!("expected health update, got {other:?}"),
        }

        // Dead players are skipped entirely; a fresh projectile passes through
        store.insert_projectile(raw_projectile(2, Team(1), Vec2::ZERO, Vec2::new(10.0, 0.0)));
        events.clear();
        CombatSystem::resolve_collisions(&mut store, 2, 16, &mut events);
        assert!(events.is_empty());
        assert_eq!(store.player(enemy).unwrap().health, 0);
        assert!(store.player(enemy).unwrap().dead);
    }

    #[test]
    fn expired_projectile_is_marked_then_removed_next_pass() {
        let mut store = EntityStore::new();
        store.insert_projectile(raw_projectile(1, Team(1), Vec2::ZERO, Vec2::new(2.0, 0.0)));

        let mut events = Vec::new();
        CombatSystem::advance_projectiles(&mut store, 1.0 / 60.0, PROJECTILE_LIFETIME_MS + 1, 5, &mut events);

        let projectile = store.projectile(1).unwrap();
        assert!(projectile.expired);
        // Pre-expiry position is frozen, not integrated
        assert_eq!(projectile.pos, Vec2::new(2.0, 0.0));
        assert_eq!(projectile.prev_pos, projectile.pos);
        assert!(matches!(events[0], ServerEvent::ProjectileDestroy { id: 1, tick: 5 }));

        // Next pass deletes without a second destroy event
        events.clear();
        CombatSystem::advance_projectiles(&mut store, 1.0 / 60.0, PROJECTILE_LIFETIME_MS + 20, 6, &mut events);
        assert!(store.projectile(1).is_none());
        assert!(events.is_empty());
    }

    #[test]
    fn expired_projectile_can_still_hit_on_its_final_tick() {
        let mut store = EntityStore::new();
        let enemy = add_player_at(&mut store, 1, Team(2), Vec2::new(3.0, 0.0));
        store.insert_projectile(raw_projectile(1, Team(1), Vec2::ZERO, Vec2::new(2.0, 0.0)));

        let mut events = Vec::new();
        CombatSystem::advance_projectiles(&mut store, 1.0 / 60.0, PROJECTILE_LIFETIME_MS + 1, 5, &mut events);
        assert!(store.projectile(1).unwrap().expired);

        CombatSystem::resolve_collisions(&mut store, 5, PROJECTILE_LIFETIME_MS + 1, &mut events);
        assert_eq!(store.player(enemy).unwrap().health, MAX_HEALTH - 1);
    }

    #[test]
    fn hit_projectile_is_removed_with_destroy_on_following_pass() {
        let mut store = EntityStore::new();
        add_player_at(&mut store, 1, Team(2), Vec2::new(5.0, 0.0));
        store.insert_projectile(raw_projectile(1, Team(1), Vec2::ZERO, Vec2::new(10.0, 0.0)));

        let mut events = Vec::new();
        CombatSystem::resolve_collisions(&mut store, 1, 0, &mut events);
        assert!(store.projectile(1).unwrap().has_hit);

        events.clear();
        CombatSystem::advance_projectiles(&mut store, 1.0 / 60.0, 16, 2, &mut events);
        assert!(store.projectile(1).is_none());
        assert!(matches!(events[0], ServerEvent::ProjectileDestroy { id: 1, tick: 2 }));
    }

    #[test]
    fn unresolved_projectile_integrates_and_tracks_prev() {
        let mut store = EntityStore::new();
        store.insert_projectile(raw_projectile(1, Team(1), Vec2::ZERO, Vec2::ZERO));

        let mut events = Vec::new();
        CombatSystem::advance_projectiles(&mut store, 0.5, 1_000, 1, &mut events);

        let projectile = store.projectile(1).unwrap();
        assert_eq!(projectile.prev_pos, Vec2::ZERO);
        assert!((projectile.pos.x - PROJECTILE_SPEED * 0.5).abs() < 1e-4);
        assert!(events.is_empty());
    }

    #[test]
    fn collision_report_damages_one_living_target() {
        let mut store = EntityStore::new();
        let attacker = add_player_at(&mut store, 1, Team(1), Vec2::ZERO);
        let dead_enemy = add_player_at(&mut store, 2, Team(2), Vec2::ZERO);
        let living_enemy = add_player_at(&mut store, 3, Team(2), Vec2::ZERO);
        store.player_mut(dead_enemy).unwrap().dead = true;

        let event = CombatSystem::collision_report(&mut store, attacker, Team(2), 9, 500).unwrap();
        match event {
            ServerEvent::HealthUpdate { target_team, health, .. } => {
                assert_eq!(target_team, Team(2));
                assert_eq!(health, MAX_HEALTH - 1);
            }
            other => panic!("expected health update, got {other:?}"),
        }
        assert_eq!(store.player(living_enemy).unwrap().health, MAX_HEALTH - 1);
    }

    #[test]
    fn collision_report_rejects_same_team_and_empty_targets() {
        let mut store = EntityStore::new();
        let attacker = add_player_at(&mut store, 1, Team(1), Vec2::ZERO);
        add_player_at(&mut store, 2, Team(1), Vec2::ZERO);

        assert!(CombatSystem::collision_report(&mut store, attacker, Team(1), 1, 0).is_none());
        assert!(CombatSystem::collision_report(&mut store, attacker, Team(3), 1, 0).is_none());
    }
}
