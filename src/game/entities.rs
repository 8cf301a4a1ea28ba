//! In-memory entity tables for one room: players and projectiles

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::game::geometry::Vec2;
use crate::protocol::Team;

/// Starting health for every player
pub const MAX_HEALTH: u8 = 5;

/// Transient connection handle assigned by the transport layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Authoritative player state
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub conn: ConnectionId,
    /// Stable lobby-assigned player id; survives reconnection
    pub player_id: u32,
    pub team: Team,
    pub health: u8,
    pub pos: Vec2,
    pub target: Vec2,
    pub moving: bool,
    pub dead: bool,
    /// Unix millis of the last accepted throw; 0 = never thrown
    pub last_throw_ms: u64,
}

impl PlayerState {
    pub fn new(conn: ConnectionId, player_id: u32, team: Team) -> Self {
        Self {
            conn,
            player_id,
            team,
            health: MAX_HEALTH,
            pos: Vec2::ZERO,
            target: Vec2::ZERO,
            moving: false,
            dead: false,
            last_throw_ms: 0,
        }
    }
}

/// Authoritative projectile state
#[derive(Debug, Clone)]
pub struct Projectile {
    /// Room-scoped monotonic id, never reused
    pub id: u64,
    pub owner: ConnectionId,
    /// Captured at spawn; team changes after the throw do not affect it
    pub owner_team: Team,
    pub pos: Vec2,
    /// Position at the previous integration step, for the swept hit test
    pub prev_pos: Vec2,
    pub vel: Vec2,
    pub spawn_ms: u64,
    /// Client action id tied to the throw, for client-side reconciliation
    pub action_id: u64,
    /// One-shot: set on the first resolved hit, never cleared
    pub has_hit: bool,
    /// Lifetime exceeded; awaiting removal on the next integration pass
    pub expired: bool,
}

impl Projectile {
    /// Hit or otherwise retired; removed on the following integration pass
    pub fn resolved(&self) -> bool {
        self.has_hit || self.expired
    }
}

/// Entity tables owned exclusively by one room's scheduling context
#[derive(Debug, Default)]
pub struct EntityStore {
    players: HashMap<ConnectionId, PlayerState>,
    projectiles: HashMap<u64, Projectile>,
    next_projectile_id: u64,
    /// Every team that has ever had a member in this room
    teams_seen: HashSet<Team>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a player with full health at the neutral origin
    pub fn add_player(&mut self, conn: ConnectionId, player_id: u32, team: Team) {
        self.teams_seen.insert(team);
        self.players.insert(conn, PlayerState::new(conn, player_id, team));
    }

    /// Remove a player; unknown handles are a silent no-op
    pub fn remove_player(&mut self, conn: ConnectionId) -> Option<PlayerState> {
        self.players.remove(&conn)
    }

    /// Re-key a player under a new connection handle, preserving all other
    /// fields. Used for reconnection. Returns false if the old handle is
    /// unknown.
    pub fn rekey_player(&mut self, old: ConnectionId, new: ConnectionId) -> bool {
        match self.players.remove(&old) {
            Some(mut player) => {
                player.conn = new;
                self.players.insert(new, player);
                true
            }
            None => false,
        }
    }

    /// Update a player's team assignment. Pre-game gating is the session
    /// layer's responsibility, not enforced here.
    pub fn update_team(&mut self, conn: ConnectionId, team: Team) {
        if let Some(player) = self.players.get_mut(&conn) {
            player.team = team;
            self.teams_seen.insert(team);
        }
    }

    pub fn player(&self, conn: ConnectionId) -> Option<&PlayerState> {
        self.players.get(&conn)
    }

    pub fn player_mut(&mut self, conn: ConnectionId) -> Option<&mut PlayerState> {
        self.players.get_mut(&conn)
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.values()
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut PlayerState> {
        self.players.values_mut()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Connection handles ordered by stable player id. Collision scans use
    /// this so hit resolution does not depend on hash iteration order.
    pub fn player_order(&self) -> Vec<ConnectionId> {
        let mut conns: Vec<_> = self.players.values().map(|p| (p.player_id, p.conn)).collect();
        conns.sort_unstable();
        conns.into_iter().map(|(_, conn)| conn).collect()
    }

    pub fn allocate_projectile_id(&mut self) -> u64 {
        self.next_projectile_id += 1;
        self.next_projectile_id
    }

    pub fn insert_projectile(&mut self, projectile: Projectile) {
        self.projectiles.insert(projectile.id, projectile);
    }

    pub fn remove_projectile(&mut self, id: u64) -> Option<Projectile> {
        self.projectiles.remove(&id)
    }

    pub fn projectile(&self, id: u64) -> Option<&Projectile> {
        self.projectiles.get(&id)
    }

    pub fn projectile_mut(&mut self, id: u64) -> Option<&mut Projectile> {
        self.projectiles.get_mut(&id)
    }

    pub fn projectiles(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.values()
    }

    pub fn projectile_count(&self) -> usize {
        self.projectiles.len()
    }

    /// Projectile ids in spawn order, for deterministic per-tick passes
    pub fn projectile_order(&self) -> Vec<u64> {
        let mut ids: Vec<_> = self.projectiles.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn teams_seen(&self) -> &HashSet<Team> {
        &self.teams_seen
    }
}
