mod lifecycle;
mod pool;
mod reward;
mod room;
mod synthetic;

pub use pool::{Admission, JoinRejection, WaitingPool};
pub use reward::{apply_rewards, tally_votes};
pub use room::{DisconnectOutcome, VoteOutcome, VotingRoom};
pub use synthetic::generate_synthetic;

use crate::config::EngineConfig;
use crate::identity::IdentityResolver;
use crate::types::*;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Where a connection's events are routed
#[derive(Clone)]
pub enum Seat {
    Waiting,
    Voting {
        room: Arc<VotingRoom>,
        player_id: PlayerId,
    },
}

/// Result of an accepted join
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Waiting,
    /// The join filled the pool and a room was started
    Matched { room_id: RoomId },
    /// The connection already holds a seat; nothing changed
    AlreadySeated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectRoute {
    LeftPool,
    LeftRoom(DisconnectOutcome),
    NotSeated,
}

/// Snapshot for the status endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub waiting: usize,
    pub capacity: usize,
    pub accepting_joins: bool,
    pub live_rooms: usize,
    pub voting_seconds: u64,
    pub reward_per_vote: u32,
}

/// The matchmaking engine: one waiting pool plus the rooms spawned from it
#[derive(Clone)]
pub struct AppState {
    pub config: EngineConfig,
    pub identity: Arc<dyn IdentityResolver>,
    pool: Arc<Mutex<WaitingPool>>,
    seats: Arc<RwLock<HashMap<ConnId, Seat>>>,
    rooms: Arc<RwLock<HashMap<RoomId, Arc<VotingRoom>>>>,
}

impl AppState {
    pub fn new(config: EngineConfig, identity: Arc<dyn IdentityResolver>) -> Self {
        Self {
            pool: Arc::new(Mutex::new(WaitingPool::new(config.capacity))),
            seats: Arc::new(RwLock::new(HashMap::new())),
            rooms: Arc::new(RwLock::new(HashMap::new())),
            config,
            identity,
        }
    }

    /// Put a resolved participant into the waiting pool.
    /// If this fills the pool, a room is started before returning.
    pub async fn join(&self, participant: Participant) -> Result<JoinOutcome, JoinRejection> {
        let conn_id = participant.conn_id().map(str::to_string);

        let mut pool = self.pool.lock().await;
        if let Some(ref id) = conn_id {
            if self.seats.read().await.contains_key(id) {
                return Ok(JoinOutcome::AlreadySeated);
            }
        }

        match pool.try_join(participant)? {
            Admission::Waiting { first } => {
                if let Some(id) = conn_id {
                    self.seats.write().await.insert(id, Seat::Waiting);
                }
                if first {
                    self.arm_lobby_fill(&mut pool);
                }
                Ok(JoinOutcome::Waiting)
            }
            Admission::Full(snapshot) => {
                let room = self.spawn_room_locked(&mut pool, snapshot).await;
                Ok(JoinOutcome::Matched {
                    room_id: room.id.clone(),
                })
            }
        }
    }

    /// Route a vote from `conn_id` to its room. None if the connection isn't
    /// seated in a room.
    pub async fn vote(&self, conn_id: &str, target_cat_id: &str) -> Option<VoteOutcome> {
        let seat = self.seats.read().await.get(conn_id).cloned();
        let Some(Seat::Voting { room, player_id }) = seat else {
            return None;
        };

        let outcome = room.handle_vote(&player_id, target_cat_id).await;
        if outcome.finalized_room() {
            self.release_room(&room.id).await;
        }
        Some(outcome)
    }

    /// Route a closed connection to whichever container holds it
    pub async fn disconnect(&self, conn_id: &str) -> DisconnectRoute {
        // Holding the pool lock keeps the seat stable against a room being
        // carved out of the pool at the same time
        let mut pool = self.pool.lock().await;
        let seat = self.seats.write().await.remove(conn_id);

        match seat {
            None => DisconnectRoute::NotSeated,
            Some(Seat::Waiting) => {
                pool.leave(conn_id);
                DisconnectRoute::LeftPool
            }
            Some(Seat::Voting { room, player_id }) => {
                drop(pool);
                let outcome = room.handle_disconnect(&player_id).await;
                if outcome.finalized_room() {
                    self.release_room(&room.id).await;
                }
                DisconnectRoute::LeftRoom(outcome)
            }
        }
    }

    pub async fn is_seated(&self, conn_id: &str) -> bool {
        self.seats.read().await.contains_key(conn_id)
    }

    /// The room a connection is currently voting in
    pub async fn room_of(&self, conn_id: &str) -> Option<Arc<VotingRoom>> {
        match self.seats.read().await.get(conn_id) {
            Some(Seat::Voting { room, .. }) => Some(room.clone()),
            _ => None,
        }
    }

    pub async fn live_room(&self, room_id: &str) -> Option<Arc<VotingRoom>> {
        self.rooms.read().await.get(room_id).cloned()
    }

    pub async fn pool_roster(&self) -> Vec<PublicParticipant> {
        self.pool.lock().await.roster()
    }

    pub async fn status(&self) -> EngineStatus {
        let pool = self.pool.lock().await;
        let live_rooms = self.rooms.read().await.len();

        EngineStatus {
            waiting: pool.len(),
            capacity: pool.capacity(),
            accepting_joins: pool.is_accepting(),
            live_rooms,
            voting_seconds: self.config.voting_seconds,
            reward_per_vote: self.config.reward_per_vote,
        }
    }
}
