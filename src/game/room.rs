//! Room state and the per-room actor task.
//!
//! Every mutation of a room (joins, leaves, moves, resets, countdown
//! ticks, power-up respawns) flows through one command queue drained by
//! a single task, so concurrent events for the same room are serialized
//! while distinct rooms never block each other.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, Interval};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::store::RecordStore;
use crate::util::time::unix_millis;
use crate::ws::protocol::{GameStateView, PlayerView, PowerUpView, ServerMsg, WallView};

use super::countdown::Countdown;
use super::rules::{self, Direction, MoveOutcome, PenaltyOutcome};
use super::{RoomError, PENALTY_ZONES, POWERUP_RESPAWN, START_POSITION, WALL_MAX_HITS};

/// Upper bound on the wait for the winner's persisted username before
/// the broadcast falls back to the in-memory name
const WIN_PERSIST_TIMEOUT: Duration = Duration::from_millis(750);

const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// A racer in a room (authoritative)
#[derive(Debug, Clone)]
pub struct Player {
    pub id: Uuid,
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub position: u8,
    pub speed_boost: bool,
    pub penalty_time: u8,
}

impl Player {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            username: None,
            avatar: None,
            position: START_POSITION,
            speed_boost: false,
            penalty_time: 0,
        }
    }

    pub fn display_name(&self) -> String {
        self.username
            .clone()
            .unwrap_or_else(|| "Anonymous".to_string())
    }

    /// Back to the starting line with boost and penalty cleared
    pub fn reset(&mut self) {
        self.position = START_POSITION;
        self.speed_boost = false;
        self.penalty_time = 0;
    }

    fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            username: self.username.clone(),
            avatar: self.avatar.clone(),
            position: self.position,
            speed_boost: self.speed_boost,
            penalty_time: self.penalty_time,
        }
    }
}

/// A track obstacle requiring repeated hits to clear
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wall {
    pub position: u8,
    pub hits: u8,
    pub max_hits: u8,
}

/// The single collectible granting one double-step boost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerUp {
    pub position: u8,
}

/// Mutable track state owned by exactly one room
#[derive(Debug, Clone)]
pub struct GameState {
    pub walls: Vec<Wall>,
    pub power_up: Option<PowerUp>,
    pub penalty_zones: Vec<u8>,
    pub started: bool,
}

impl GameState {
    /// Fresh pre-game state: two walls at random positions, one per
    /// track half, fixed penalty zones, no power-up.
    pub fn generate(rng: &mut impl Rng) -> Self {
        Self {
            walls: vec![
                Wall {
                    position: rng.gen_range(1..=4),
                    hits: 0,
                    max_hits: WALL_MAX_HITS,
                },
                Wall {
                    position: rng.gen_range(6..=9),
                    hits: 0,
                    max_hits: WALL_MAX_HITS,
                },
            ],
            power_up: None,
            penalty_zones: PENALTY_ZONES.to_vec(),
            started: false,
        }
    }

    fn view(&self) -> GameStateView {
        GameStateView {
            walls: self
                .walls
                .iter()
                .map(|w| WallView {
                    position: w.position,
                    hits: w.hits,
                    max_hits: w.max_hits,
                })
                .collect(),
            power_up: self.power_up.map(|p| PowerUpView { position: p.position }),
            penalty_zones: self.penalty_zones.clone(),
            started: self.started,
        }
    }
}

/// Join confirmation payload for the caller
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_code: String,
    pub max_players: usize,
}

/// Commands processed by the room task
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        conn_id: Uuid,
        tx: mpsc::Sender<ServerMsg>,
        reply: oneshot::Sender<Result<RoomInfo, RoomError>>,
    },
    Leave {
        conn_id: Uuid,
    },
    Move {
        conn_id: Uuid,
        direction: Direction,
    },
    SetUserInfo {
        conn_id: Uuid,
        username: String,
        avatar: Option<String>,
    },
    Chat {
        conn_id: Uuid,
        message: String,
    },
    Reset,
}

/// Handle to a running room task
#[derive(Clone)]
pub struct RoomHandle {
    pub cmd_tx: mpsc::Sender<RoomCommand>,
    player_count: Arc<AtomicUsize>,
}

impl RoomHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }
}

/// A member of the room: authoritative player state plus the outbound
/// channel of their connection
struct Member {
    player: Player,
    tx: mpsc::Sender<ServerMsg>,
}

/// The authoritative room actor
pub struct GameRoom {
    code: String,
    max_players: usize,
    members: IndexMap<Uuid, Member>,
    state: GameState,
    countdown: Countdown,
    ticker: Option<Interval>,
    respawn_at: Option<Instant>,
    winner: Option<Uuid>,
    rng: ChaCha8Rng,
    records: Arc<dyn RecordStore>,
    cmd_rx: mpsc::Receiver<RoomCommand>,
    player_count: Arc<AtomicUsize>,
}

impl GameRoom {
    /// Create a room with its creator already seated at the start line
    pub fn new(
        code: String,
        max_players: usize,
        creator_id: Uuid,
        creator_tx: mpsc::Sender<ServerMsg>,
        records: Arc<dyn RecordStore>,
        seed: u64,
    ) -> (Self, RoomHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let player_count = Arc::new(AtomicUsize::new(1));

        let handle = RoomHandle {
            cmd_tx,
            player_count: player_count.clone(),
        };

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut members = IndexMap::new();
        members.insert(
            creator_id,
            Member {
                player: Player::new(creator_id),
                tx: creator_tx,
            },
        );

        let room = Self {
            code,
            max_players,
            members,
            state: GameState::generate(&mut rng),
            countdown: Countdown::new(),
            ticker: None,
            respawn_at: None,
            winner: None,
            rng,
            records,
            cmd_rx,
            player_count,
        };

        (room, handle)
    }

    /// Run the room until its last player leaves
    pub async fn run(mut self) {
        info!(room = %self.code, max_players = self.max_players, "Room opened");

        loop {
            let ticking = self.ticker.is_some();
            let respawn_armed = self.respawn_at.is_some();

            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                _ = next_tick(&mut self.ticker), if ticking => {
                    self.handle_countdown_tick();
                }
                _ = sleep_until_opt(self.respawn_at), if respawn_armed => {
                    self.respawn_at = None;
                    self.spawn_power_up();
                }
            }

            if self.members.is_empty() {
                break;
            }
        }

        info!(room = %self.code, "Room closed");
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join { conn_id, tx, reply } => self.handle_join(conn_id, tx, reply),
            RoomCommand::Leave { conn_id } => self.handle_leave(conn_id),
            RoomCommand::Move { conn_id, direction } => self.handle_move(conn_id, direction).await,
            RoomCommand::SetUserInfo {
                conn_id,
                username,
                avatar,
            } => self.handle_set_user_info(conn_id, username, avatar),
            RoomCommand::Chat { conn_id, message } => self.handle_chat(conn_id, message),
            RoomCommand::Reset => self.handle_reset(),
        }
    }

    fn handle_join(
        &mut self,
        conn_id: Uuid,
        tx: mpsc::Sender<ServerMsg>,
        reply: oneshot::Sender<Result<RoomInfo, RoomError>>,
    ) {
        if self.members.contains_key(&conn_id) {
            warn!(room = %self.code, conn_id = %conn_id, "Connection already in room");
            let _ = reply.send(Ok(self.info()));
            return;
        }
        if self.members.len() >= self.max_players {
            let _ = reply.send(Err(RoomError::Full));
            return;
        }
        if self.state.started {
            let _ = reply.send(Err(RoomError::AlreadyStarted));
            return;
        }

        self.members.insert(
            conn_id,
            Member {
                player: Player::new(conn_id),
                tx,
            },
        );
        self.update_player_count();
        let _ = reply.send(Ok(self.info()));

        self.broadcast(ServerMsg::PlayerJoined { id: conn_id });
        self.broadcast_snapshot();

        info!(
            room = %self.code,
            conn_id = %conn_id,
            player_count = self.members.len(),
            "Player joined room"
        );

        if self.members.len() == self.max_players {
            self.start_countdown();
        }
    }

    fn handle_leave(&mut self, conn_id: Uuid) {
        if self.members.shift_remove(&conn_id).is_none() {
            return;
        }
        self.update_player_count();
        info!(room = %self.code, conn_id = %conn_id, "Player left room");

        if self.members.is_empty() {
            // Room teardown; the run loop exits right after this
            self.countdown.cancel();
            self.ticker = None;
            return;
        }

        self.broadcast(ServerMsg::PlayerLeft { id: conn_id });

        // A room that loses a player while not full must not start
        if self.countdown.cancel() {
            self.ticker = None;
            self.broadcast(ServerMsg::CountdownStopped);
            info!(room = %self.code, "Countdown cancelled");
        }
    }

    async fn handle_move(&mut self, conn_id: Uuid, direction: Direction) {
        if !self.state.started || self.winner.is_some() {
            return;
        }
        let Some(member) = self.members.get_mut(&conn_id) else {
            return;
        };

        match rules::resolve_move(&mut member.player, &mut self.state, direction) {
            MoveOutcome::Ignored => {}
            MoveOutcome::WallHit { position, destroyed } => {
                debug!(
                    room = %self.code,
                    conn_id = %conn_id,
                    position,
                    destroyed,
                    "Move absorbed by wall"
                );
                self.broadcast_snapshot();
            }
            MoveOutcome::Moved { finished, .. } => {
                let picked = rules::check_power_up(&mut member.player, &mut self.state);
                let penalty = rules::check_penalty(&mut member.player, &self.state);

                if picked {
                    self.respawn_at = Some(Instant::now() + POWERUP_RESPAWN);
                    debug!(room = %self.code, conn_id = %conn_id, "Speed boost collected");
                }

                if penalty == PenaltyOutcome::Struck {
                    info!(room = %self.code, conn_id = %conn_id, "Penalty struck");
                    let decrement = self.records.add_wins(conn_id, -1);
                    tokio::spawn(async move {
                        if let Err(e) = decrement.await {
                            warn!(conn_id = %conn_id, error = %e, "Failed to apply penalty");
                        }
                    });
                }

                self.broadcast_snapshot();

                if finished {
                    self.declare_winner(conn_id).await;
                }
            }
        }
    }

    /// Declare the winner and bump their persisted win counter. The
    /// broadcast never waits on the store for longer than the timeout;
    /// on failure the in-memory name is used and the error only logged.
    async fn declare_winner(&mut self, conn_id: Uuid) {
        self.winner = Some(conn_id);

        let fallback = self
            .members
            .get(&conn_id)
            .map(|m| m.player.display_name())
            .unwrap_or_else(|| "Anonymous".to_string());

        let username = match tokio::time::timeout(
            WIN_PERSIST_TIMEOUT,
            self.records.add_wins(conn_id, 1),
        )
        .await
        {
            Ok(Ok(record)) => record.username,
            Ok(Err(e)) => {
                warn!(room = %self.code, conn_id = %conn_id, error = %e, "Failed to persist win");
                fallback
            }
            Err(_) => {
                warn!(room = %self.code, conn_id = %conn_id, "Win persistence timed out");
                fallback
            }
        };

        info!(room = %self.code, conn_id = %conn_id, username = %username, "Game over");
        self.broadcast(ServerMsg::GameOver {
            winner_id: conn_id,
            username,
        });
    }

    fn handle_set_user_info(&mut self, conn_id: Uuid, username: String, avatar: Option<String>) {
        let Some(member) = self.members.get_mut(&conn_id) else {
            return;
        };
        member.player.username = Some(username);
        member.player.avatar = avatar;
        self.broadcast_snapshot();
    }

    fn handle_chat(&self, conn_id: Uuid, message: String) {
        let Some(member) = self.members.get(&conn_id) else {
            return;
        };
        let username = member
            .player
            .username
            .clone()
            .unwrap_or_else(|| conn_id.to_string()[..8].to_string());

        self.broadcast(ServerMsg::NewMessage {
            username,
            avatar: member.player.avatar.clone(),
            message,
            timestamp: unix_millis(),
        });
    }

    fn handle_reset(&mut self) {
        for member in self.members.values_mut() {
            member.player.reset();
        }
        self.state = GameState::generate(&mut self.rng);
        self.winner = None;
        self.countdown.cancel();
        self.ticker = None;
        self.respawn_at = None;

        info!(room = %self.code, "Game reset");
        self.broadcast_snapshot();

        // A room that is still full goes straight into a fresh countdown
        if self.members.len() == self.max_players {
            self.start_countdown();
        }
    }

    fn start_countdown(&mut self) {
        if let Some(initial) = self.countdown.start() {
            self.broadcast(ServerMsg::Countdown {
                seconds_remaining: initial,
            });
            self.ticker = Some(interval_at(Instant::now() + COUNTDOWN_TICK, COUNTDOWN_TICK));
            info!(room = %self.code, "Countdown started");
        }
    }

    fn handle_countdown_tick(&mut self) {
        match self.countdown.tick() {
            Some(0) => {
                self.ticker = None;
                self.broadcast(ServerMsg::Countdown {
                    seconds_remaining: 0,
                });
                self.begin_game();
            }
            Some(remaining) => {
                self.broadcast(ServerMsg::Countdown {
                    seconds_remaining: remaining,
                });
            }
            None => {
                // Stale tick after a cancellation
                self.ticker = None;
            }
        }
    }

    fn begin_game(&mut self) {
        self.state.started = true;
        self.spawn_power_up();
        self.broadcast(ServerMsg::GameStarted);
        info!(room = %self.code, "Game started");
    }

    fn spawn_power_up(&mut self) {
        if self.state.power_up.is_some() {
            return;
        }
        match rules::pick_power_up_cell(&self.state, &mut self.rng) {
            Some(cell) => {
                self.state.power_up = Some(PowerUp { position: cell });
                debug!(room = %self.code, position = cell, "Power-up spawned");
                self.broadcast_snapshot();
            }
            None => {
                debug!(room = %self.code, "No free cell, skipping power-up respawn");
            }
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_code: self.code.clone(),
            max_players: self.max_players,
        }
    }

    fn update_player_count(&self) {
        self.player_count.store(self.members.len(), Ordering::Relaxed);
    }

    fn broadcast_snapshot(&self) {
        self.broadcast(ServerMsg::UpdatePlayers {
            players: self.members.values().map(|m| m.player.view()).collect(),
            game_state: self.state.view(),
        });
    }

    fn broadcast(&self, msg: ServerMsg) {
        for (conn_id, member) in &self.members {
            if let Err(e) = member.tx.try_send(msg.clone()) {
                debug!(
                    conn_id = %conn_id,
                    room = %self.code,
                    error = %e,
                    "Skipping broadcast to slow client"
                );
            }
        }
    }
}

/// Await the next countdown tick; pends forever while no timer is armed
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker.as_mut() {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Await the power-up respawn deadline; pends forever while unarmed
async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
