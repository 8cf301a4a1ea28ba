//! Room state and the authoritative fixed-timestep scheduler

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::config::SimConfig;
use crate::game::combat::CombatSystem;
use crate::game::entities::EntityStore;
use crate::game::geometry::Vec2;
use crate::game::movement::MovementSystem;
use crate::game::schedule::{BroadcastSchedule, TickSchedule};
use crate::game::snapshot::build_snapshot;
use crate::game::RoomCommand;
use crate::load::{LoadSignal, OverloadController, RateTransition};
use crate::protocol::{ServerEvent, Team};
use crate::util::time::{unix_millis, LOAD_SAMPLE_SECS};

/// Deterministic spawn point for the n-th team present in the room.
/// Two-team rooms face each other across the arena center.
fn spawn_position(team_index: usize) -> Vec2 {
    match team_index {
        0 => Vec2::new(-20.0, 0.0),
        1 => Vec2::new(20.0, 0.0),
        _ => Vec2::ZERO,
    }
}

/// Authoritative state of one room's match
///
/// Owned exclusively by its scheduler task; every mutation is synchronous
/// and sequential within that context.
pub struct RoomSimulation {
    room_code: String,
    config: SimConfig,
    tick: u64,
    store: EntityStore,
    started: bool,
    game_over: bool,
}

impl RoomSimulation {
    pub fn new(room_code: impl Into<String>, config: SimConfig) -> Self {
        Self {
            room_code: room_code.into(),
            config,
            tick: 0,
            store: EntityStore::new(),
            started: false,
            game_over: false,
        }
    }

    pub fn room_code(&self) -> &str {
        &self.room_code
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Monotonic tick counter; never reset while the room exists
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn started(&self) -> bool {
        self.started
    }

    pub fn game_over(&self) -> bool {
        self.game_over
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut EntityStore {
        &mut self.store
    }

    /// Begin the match: place every player on its team's spawn point and
    /// return the initial snapshot to broadcast.
    pub fn start(&mut self, now_ms: u64) -> ServerEvent {
        // BTreeSet iteration gives ascending team order, so spawn
        // assignment is stable across restarts of the same roster
        let teams: Vec<Team> = self
            .store
            .players()
            .map(|p| p.team)
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        for player in self.store.players_mut() {
            let index = teams.iter().position(|t| *t == player.team).unwrap_or(0);
            player.pos = spawn_position(index);
            player.target = player.pos;
            player.moving = false;
        }

        self.started = true;
        info!(
            room = %self.room_code,
            players = self.store.player_count(),
            teams = teams.len(),
            "match started"
        );

        self.snapshot(now_ms)
    }

    /// One fixed-dt simulation tick:
    /// movement, projectiles, collisions, then the win check.
    /// `dt` is always `1 / tick_hz`, never wall-clock elapsed time.
    pub fn run_tick(&mut self, now_ms: u64, events: &mut Vec<ServerEvent>) {
        self.tick += 1;
        let dt = self.config.fixed_dt();

        MovementSystem::advance(&mut self.store, dt);
        CombatSystem::advance_projectiles(&mut self.store, dt, now_ms, self.tick, events);
        CombatSystem::resolve_collisions(&mut self.store, self.tick, now_ms, events);
        self.check_game_over(now_ms, events);
    }

    /// Evaluate the win condition: exactly one team with living players while
    /// every other team is eliminated. Rooms that never held two distinct
    /// teams cannot terminate this way.
    fn check_game_over(&mut self, now_ms: u64, events: &mut Vec<ServerEvent>) {
        if !self.started || self.game_over {
            return;
        }
        if self.store.teams_seen().len() < 2 {
            return;
        }

        let mut alive_teams = std::collections::BTreeSet::new();
        for player in self.store.players() {
            if !player.dead {
                alive_teams.insert(player.team);
            }
        }

        if alive_teams.len() == 1 {
            let winning_team = *alive_teams
                .iter()
                .next()
                .unwrap_or_else(|| unreachable!("one alive team checked above"));
            self.game_over = true;

            info!(room = %self.room_code, team = %winning_team, tick = self.tick, "game over");

            events.push(ServerEvent::GameOver {
                winning_team,
                tick: self.tick,
                time: now_ms,
            });
        }
    }

    /// Full-state snapshot at the current tick
    pub fn snapshot(&self, now_ms: u64) -> ServerEvent {
        build_snapshot(self.tick, now_ms, &self.store)
    }

    /// Apply a roster or gameplay command outside the tick boundary.
    /// `Start` and `Stop` are scheduler concerns and are handled by the
    /// runner, not here.
    pub fn apply_command(
        &mut self,
        command: RoomCommand,
        now_ms: u64,
        events: &mut Vec<ServerEvent>,
    ) {
        match command {
            RoomCommand::AddPlayer { conn, player_id, team } => {
                self.store.add_player(conn, player_id, team);
                info!(room = %self.room_code, player_id, team = %team, "player added");
            }
            RoomCommand::RemovePlayer { conn } => {
                if let Some(player) = self.store.remove_player(conn) {
                    info!(room = %self.room_code, player_id = player.player_id, "player removed");
                }
            }
            RoomCommand::RekeyPlayer { old, new } => {
                if self.store.rekey_player(old, new) {
                    debug!(room = %self.room_code, "player re-keyed for reconnection");
                }
            }
            RoomCommand::UpdateTeam { conn, team } => {
                self.store.update_team(conn, team);
            }
            RoomCommand::Throw { conn, target_x, target_z, action_id } => {
                if let Some(spawn) = CombatSystem::request_throw(
                    &mut self.store,
                    conn,
                    target_x,
                    target_z,
                    action_id,
                    now_ms,
                    self.tick,
                ) {
                    events.push(spawn);
                }
            }
            RoomCommand::Move { conn, target_x, target_z, action_id, reply } => {
                let ack =
                    MovementSystem::request_move(&mut self.store, conn, target_x, target_z, action_id);
                let _ = reply.send(ack);
            }
            RoomCommand::CollisionReport { conn, target_team } => {
                if let Some(update) = CombatSystem::collision_report(
                    &mut self.store,
                    conn,
                    target_team,
                    self.tick,
                    now_ms,
                ) {
                    events.push(update);
                }
            }
            RoomCommand::Start | RoomCommand::Stop => {
                debug!(room = %self.room_code, "lifecycle command reached the store; ignored");
            }
        }
    }
}

/// Handle to a running room
#[derive(Clone)]
pub struct RoomHandle {
    pub room_code: String,
    command_tx: mpsc::Sender<RoomCommand>,
    events_tx: broadcast::Sender<ServerEvent>,
    player_count: Arc<AtomicUsize>,
}

impl RoomHandle {
    /// Deliver a command to the room. Returns false once the room's
    /// scheduler has terminated.
    pub async fn send(&self, command: RoomCommand) -> bool {
        self.command_tx.send(command).await.is_ok()
    }

    /// Subscribe to the room's outbound event stream. The transport drains
    /// this at its own pace; the scheduler never waits for it.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events_tx.subscribe()
    }

    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }
}

/// The per-room scheduler task: owns the simulation, drives ticks and
/// broadcasts from two independent deadlines, and adapts the broadcast rate
/// to host load.
pub struct RoomRunner {
    sim: RoomSimulation,
    command_rx: mpsc::Receiver<RoomCommand>,
    events_tx: broadcast::Sender<ServerEvent>,
    player_count: Arc<AtomicUsize>,
    load: Arc<dyn LoadSignal>,
}

impl RoomRunner {
    pub fn new(sim: RoomSimulation, load: Arc<dyn LoadSignal>) -> (Self, RoomHandle) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (events_tx, _) = broadcast::channel(256);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = RoomHandle {
            room_code: sim.room_code().to_string(),
            command_tx,
            events_tx: events_tx.clone(),
            player_count: player_count.clone(),
        };

        let runner = Self {
            sim,
            command_rx,
            events_tx,
            player_count,
            load,
        };

        (runner, handle)
    }

    /// Run the room to completion: wait for `Start`, then drive the
    /// fixed-timestep loop until game over, `Stop`, or every handle is gone.
    pub async fn run(mut self) {
        info!(room = %self.sim.room_code(), "room task started");

        if !self.wait_for_start().await {
            info!(room = %self.sim.room_code(), "room closed before start");
            return;
        }

        self.run_scheduler().await;
        info!(room = %self.sim.room_code(), tick = self.sim.tick(), "room task stopped");
    }

    /// Waiting phase: roster commands only. Returns false on `Stop` or when
    /// the command channel closes.
    async fn wait_for_start(&mut self) -> bool {
        loop {
            match self.command_rx.recv().await {
                Some(RoomCommand::Start) => {
                    let snapshot = self.sim.start(unix_millis());
                    self.emit(snapshot);
                    return true;
                }
                Some(RoomCommand::Stop) | None => return false,
                Some(command) => self.apply(command),
            }
        }
    }

    async fn run_scheduler(&mut self) {
        let now = Instant::now();
        let mut ticks = TickSchedule::new(self.sim.config().tick_interval(), now);
        let mut broadcasts = BroadcastSchedule::new(self.sim.config().broadcast_interval(), now);
        let mut overload = OverloadController::new();
        let mut next_load_check = now + Duration::from_secs(LOAD_SAMPLE_SECS);

        // Throughput counters, reported at the load-sample cadence
        let mut ticks_run: u64 = 0;
        let mut snapshots_sent: u64 = 0;

        loop {
            let now = Instant::now();

            // Bounded catch-up: fixed-dt ticks, never wall-clock dt
            let due = ticks.due_ticks(now);
            if due.resynced {
                warn!(
                    room = %self.sim.room_code(),
                    tick = self.sim.tick(),
                    "stalled past catch-up cap; tick deadline resynced"
                );
            }

            let mut events = Vec::new();
            for _ in 0..due.ticks {
                self.sim.run_tick(unix_millis(), &mut events);
                ticks_run += 1;
                if self.sim.game_over() {
                    break;
                }
            }
            self.emit_all(events);

            if self.sim.game_over() {
                return;
            }

            // Broadcast drain: no cap, duplicates are just resent state
            for _ in 0..broadcasts.due_broadcasts(now) {
                let snapshot = self.sim.snapshot(unix_millis());
                self.emit(snapshot);
                snapshots_sent += 1;
            }

            if now >= next_load_check {
                match overload.observe(self.load.latest()) {
                    Some(RateTransition::Degrade) => {
                        broadcasts.degrade(now);
                        warn!(
                            room = %self.sim.room_code(),
                            interval_ms = broadcasts.interval().as_millis() as u64,
                            "host overloaded; broadcast rate halved"
                        );
                    }
                    Some(RateTransition::Restore) => {
                        broadcasts.restore(now);
                        info!(room = %self.sim.room_code(), "host recovered; broadcast rate restored");
                    }
                    None => {}
                }

                debug!(
                    room = %self.sim.room_code(),
                    ticks = ticks_run,
                    snapshots = snapshots_sent,
                    "room throughput"
                );
                ticks_run = 0;
                snapshots_sent = 0;
                next_load_check = now + Duration::from_secs(LOAD_SAMPLE_SECS);
            }

            // Sleep to the earlier deadline; commands interleave between
            // wake-ups without ever blocking the schedule.
            let deadline = ticks
                .next_deadline()
                .min(broadcasts.next_deadline())
                .min(next_load_check);

            if deadline.saturating_duration_since(Instant::now()) > Duration::from_millis(1) {
                tokio::select! {
                    _ = sleep_until(deadline) => {}
                    command = self.command_rx.recv() => match command {
                        Some(RoomCommand::Stop) | None => return,
                        Some(RoomCommand::Start) => {
                            debug!(room = %self.sim.room_code(), "start ignored; already running");
                        }
                        Some(command) => self.apply(command),
                    },
                }
            } else {
                tokio::task::yield_now().await;
            }
        }
    }

    fn apply(&mut self, command: RoomCommand) {
        let mut events = Vec::new();
        self.sim.apply_command(command, unix_millis(), &mut events);
        self.player_count
            .store(self.sim.store().player_count(), Ordering::Relaxed);
        self.emit_all(events);
    }

    /// Fire-and-forget broadcast; a room with no subscribers is fine
    fn emit(&self, event: ServerEvent) {
        let _ = self.events_tx.send(event);
    }

    fn emit_all(&self, events: Vec<ServerEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

/// Registry of all active rooms
pub struct RoomRegistry {
    rooms: DashMap<String, RoomHandle>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Create a room and spawn its scheduler task. Returns the existing
    /// handle if the code is already taken.
    pub fn create_room(
        &self,
        room_code: &str,
        config: SimConfig,
        load: Arc<dyn LoadSignal>,
    ) -> RoomHandle {
        if let Some(existing) = self.rooms.get(room_code) {
            return existing.value().clone();
        }

        let sim = RoomSimulation::new(room_code, config);
        let (runner, handle) = RoomRunner::new(sim, load);
        tokio::spawn(runner.run());

        self.rooms.insert(room_code.to_string(), handle.clone());
        handle
    }

    pub fn get(&self, room_code: &str) -> Option<RoomHandle> {
        self.rooms.get(room_code).map(|r| r.value().clone())
    }

    /// Drop a room's handle and stop its scheduler
    pub async fn remove(&self, room_code: &str) -> Option<RoomHandle> {
        let handle = self.rooms.remove(room_code).map(|(_, h)| h)?;
        handle.send(RoomCommand::Stop).await;
        Some(handle)
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms.iter().map(|r| r.value().player_count()).sum()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
