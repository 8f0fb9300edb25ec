//! Room lifecycle: carving rooms out of the pool, arming their timers and
//! releasing them once finalized.
//!
//! Lock order is pool -> seats -> rooms. A room's own mutex is never held
//! while one of these is being acquired.

use super::pool::WaitingPool;
use super::room::VotingRoom;
use super::synthetic::top_up;
use super::{AppState, Seat};
use crate::types::*;
use std::sync::Arc;

impl AppState {
    /// Start a room with the given roster, padding it with bots up to capacity
    pub async fn spawn_room(&self, participants: Vec<Participant>) -> Arc<VotingRoom> {
        let mut pool = self.pool.lock().await;
        self.spawn_room_locked(&mut pool, participants).await
    }

    pub(super) async fn spawn_room_locked(
        &self,
        pool: &mut WaitingPool,
        participants: Vec<Participant>,
    ) -> Arc<VotingRoom> {
        let participants = top_up(participants, self.config.capacity);
        let seated: Vec<(ConnId, PlayerId)> = participants
            .iter()
            .filter_map(|p| p.conn_id().map(|c| (c.to_string(), p.player_id.clone())))
            .collect();

        let room = Arc::new(VotingRoom::open(participants, &self.config));

        {
            let mut seats = self.seats.write().await;
            for (conn_id, player_id) in seated {
                seats.insert(
                    conn_id,
                    Seat::Voting {
                        room: room.clone(),
                        player_id,
                    },
                );
            }
        }
        self.rooms
            .write()
            .await
            .insert(room.id.clone(), room.clone());

        pool.set_accepting(!self.config.exclusive_rounds);

        if room.phase().await == RoomPhase::Finalized {
            self.release_room_locked(pool, &room.id).await;
        } else {
            self.arm_room_timer(&room).await;
        }

        room
    }

    async fn arm_room_timer(&self, room: &Arc<VotingRoom>) {
        let state = self.clone();
        let timed = room.clone();
        let window = self.config.voting_window();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if timed.handle_timeout().await {
                state.release_room(&timed.id).await;
            }
        });

        room.arm_timer(handle).await;
    }

    /// Forget a finalized room: its seats stop routing to it and it leaves the
    /// live-room table
    pub(super) async fn release_room(&self, room_id: &str) {
        let mut pool = self.pool.lock().await;
        self.release_room_locked(&mut pool, room_id).await;
    }

    async fn release_room_locked(&self, pool: &mut WaitingPool, room_id: &str) {
        self.seats.write().await.retain(|_, seat| match seat {
            Seat::Voting { room, .. } => room.id != room_id,
            Seat::Waiting => true,
        });

        let mut rooms = self.rooms.write().await;
        if rooms.remove(room_id).is_some() {
            tracing::info!("Room {} released ({} still live)", room_id, rooms.len());
        }

        if self.config.exclusive_rounds && rooms.is_empty() {
            pool.set_accepting(true);
        }
    }

    /// Arm the bot-fill timer for the lobby that just got its first member
    pub(super) fn arm_lobby_fill(&self, pool: &mut WaitingPool) {
        let Some(delay) = self.config.bot_fill_delay() else {
            return;
        };

        let state = self.clone();
        let epoch = pool.fill_epoch();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            state.fill_lobby(epoch).await;
        });
        pool.set_fill_timer(handle);
    }

    /// Fill the waiting lobby with bots and start a room, unless that lobby
    /// is already gone
    pub async fn fill_lobby(&self, epoch: u64) -> Option<Arc<VotingRoom>> {
        let mut pool = self.pool.lock().await;
        let snapshot = pool.drain_for_fill(epoch)?;
        tracing::info!(
            "Bot fill for lobby {} with {} waiting player(s)",
            epoch,
            snapshot.len()
        );
        Some(self.spawn_room_locked(&mut pool, snapshot).await)
    }
}
