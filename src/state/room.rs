//! The per-round voting state machine.
//!
//! A room owns a frozen roster for one round and moves from `Voting` to
//! `Finalized` exactly once. Everything that can end a round (the last vote,
//! the timer, a disconnect) goes through the room's mutex, and `finalize` is a
//! no-op once the phase is `Finalized`, so whichever trigger gets the lock
//! first wins and the others observe a closed round.

use super::reward::apply_rewards;
use crate::config::EngineConfig;
use crate::protocol::ServerMessage;
use crate::types::*;
use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Result of a vote, as seen by whoever submitted it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Vote stored, round still open
    Recorded,
    /// Vote stored and it was the last one missing; the round is now finalized
    Completed,
    Ignored(IgnoredVote),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// Round still open. `forced` is true if a vote was assigned for the leaver
    Pending { forced: bool },
    /// The leaver's vote was the last one missing; the round is now finalized
    Completed { forced: bool },
    /// Round already finalized or the player isn't seated here
    Ignored,
}

impl VoteOutcome {
    pub fn finalized_room(&self) -> bool {
        matches!(self, VoteOutcome::Completed)
    }
}

impl DisconnectOutcome {
    pub fn finalized_room(&self) -> bool {
        matches!(self, DisconnectOutcome::Completed { .. })
    }
}

pub struct VotingRoom {
    pub id: RoomId,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    voting_seconds: u64,
    reward_per_vote: u32,
    inner: Mutex<RoomInner>,
}

struct RoomInner {
    participants: Vec<Participant>,
    phase: RoomPhase,
    timer: Option<JoinHandle<()>>,
}

impl VotingRoom {
    /// Build a room and open voting: announce the round to every connected
    /// seat, then let each bot cast its vote.
    ///
    /// The timer is armed separately with [`VotingRoom::arm_timer`] because the
    /// task that fires it needs a handle to the room.
    pub fn open(participants: Vec<Participant>, config: &EngineConfig) -> Self {
        let started_at = Utc::now();
        let deadline = chrono::Duration::from_std(config.voting_window())
            .ok()
            .and_then(|window| started_at.checked_add_signed(window))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut inner = RoomInner {
            participants,
            phase: RoomPhase::Voting,
            timer: None,
        };

        let room_id = ulid::Ulid::new().to_string();
        tracing::info!(
            "Room {} opened with {} seats ({} bots), voting until {}",
            room_id,
            inner.participants.len(),
            inner.participants.iter().filter(|p| p.is_synthetic()).count(),
            deadline.to_rfc3339()
        );

        inner.broadcast(&ServerMessage::VotingPhase {
            participants: public_roster(&inner.participants),
            timer_seconds: config.voting_seconds,
        });

        let bots: Vec<usize> = inner
            .participants
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_synthetic())
            .map(|(i, _)| i)
            .collect();
        for idx in bots {
            let Some(target) = inner.random_target(idx) else {
                continue;
            };
            let voter = inner.participants[idx].player_id.clone();
            inner.record_vote(&room_id, &voter, &target, config.reward_per_vote);
        }

        Self {
            id: room_id,
            started_at,
            deadline,
            voting_seconds: config.voting_seconds,
            reward_per_vote: config.reward_per_vote,
            inner: Mutex::new(inner),
        }
    }

    pub fn voting_seconds(&self) -> u64 {
        self.voting_seconds
    }

    /// Hand the room its timeout task. If the round already ended, the task is
    /// cancelled right away.
    pub async fn arm_timer(&self, handle: JoinHandle<()>) {
        let mut inner = self.inner.lock().await;
        if inner.phase == RoomPhase::Finalized {
            handle.abort();
        } else {
            inner.timer = Some(handle);
        }
    }

    pub async fn phase(&self) -> RoomPhase {
        self.inner.lock().await.phase
    }

    pub async fn roster(&self) -> Vec<PublicParticipant> {
        public_roster(&self.inner.lock().await.participants)
    }

    /// Record `voter`'s vote for `target_cat_id`.
    /// Invalid votes (self, repeat, unknown cat, closed round) have no effect.
    pub async fn handle_vote(&self, voter: &str, target_cat_id: &str) -> VoteOutcome {
        let mut inner = self.inner.lock().await;
        inner.record_vote(&self.id, voter, target_cat_id, self.reward_per_vote)
    }

    /// Voting window elapsed: assign random votes to everyone who hasn't voted
    /// and finalize. Returns true if this call finalized the room.
    pub async fn handle_timeout(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.phase == RoomPhase::Finalized {
            return false;
        }

        let forced = inner.force_missing_votes();
        tracing::info!("Room {} timed out, forced {} vote(s)", self.id, forced);
        inner.finalize(&self.id, self.reward_per_vote, true)
    }

    /// A seated player went away. Their vote is forced if they hadn't cast one;
    /// the room keeps going unless that completed the vote set.
    pub async fn handle_disconnect(&self, player_id: &str) -> DisconnectOutcome {
        let mut inner = self.inner.lock().await;
        if inner.phase == RoomPhase::Finalized {
            return DisconnectOutcome::Ignored;
        }

        let Some(idx) = inner.index_of(player_id) else {
            return DisconnectOutcome::Ignored;
        };

        let forced = !inner.participants[idx].has_voted() && inner.force_vote(idx);
        tracing::info!(
            "Player {} left room {} (forced vote: {})",
            player_id,
            self.id,
            forced
        );

        if inner.all_voted() {
            inner.finalize(&self.id, self.reward_per_vote, false);
            DisconnectOutcome::Completed { forced }
        } else {
            inner.broadcast_update();
            DisconnectOutcome::Pending { forced }
        }
    }
}

impl RoomInner {
    fn index_of(&self, player_id: &str) -> Option<usize> {
        self.participants
            .iter()
            .position(|p| p.player_id == player_id)
    }

    fn all_voted(&self) -> bool {
        self.participants.iter().all(Participant::has_voted)
    }

    /// Uniformly random cat among the other seats
    fn random_target(&self, idx: usize) -> Option<CatId> {
        let own = &self.participants[idx].cat_id;
        let candidates: Vec<&CatId> = self
            .participants
            .iter()
            .map(|p| &p.cat_id)
            .filter(|cat| *cat != own)
            .collect();

        candidates.choose(&mut rand::rng()).map(|cat| (*cat).clone())
    }

    /// The single path every cast vote goes through (real and bot alike)
    fn record_vote(
        &mut self,
        room_id: &str,
        voter: &str,
        target: &str,
        reward_per_vote: u32,
    ) -> VoteOutcome {
        if self.phase == RoomPhase::Finalized {
            return VoteOutcome::Ignored(IgnoredVote::RoundClosed);
        }
        let Some(idx) = self.index_of(voter) else {
            return VoteOutcome::Ignored(IgnoredVote::UnknownVoter);
        };
        if !self.participants.iter().any(|p| p.cat_id == target) {
            return VoteOutcome::Ignored(IgnoredVote::UnknownTarget);
        }
        if let Err(reason) = self.participants[idx].cast_vote(target) {
            tracing::debug!(
                "Ignoring vote from {} for {} in room {}: {:?}",
                voter,
                target,
                room_id,
                reason
            );
            return VoteOutcome::Ignored(reason);
        }

        tracing::debug!("{} voted for {} in room {}", voter, target, room_id);

        if self.all_voted() {
            self.finalize(room_id, reward_per_vote, false);
            VoteOutcome::Completed
        } else {
            self.broadcast_update();
            VoteOutcome::Recorded
        }
    }

    fn force_vote(&mut self, idx: usize) -> bool {
        match self.random_target(idx) {
            Some(target) => self.participants[idx].cast_vote(&target).is_ok(),
            None => false,
        }
    }

    fn force_missing_votes(&mut self) -> usize {
        let missing: Vec<usize> = self
            .participants
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.has_voted())
            .map(|(i, _)| i)
            .collect();

        missing
            .into_iter()
            .filter(|&idx| self.force_vote(idx))
            .count()
    }

    /// Close the round. Returns false if it was already closed.
    fn finalize(&mut self, room_id: &str, reward_per_vote: u32, from_timer: bool) -> bool {
        if self.phase == RoomPhase::Finalized {
            return false;
        }
        self.phase = RoomPhase::Finalized;

        // The timer task must not abort itself while it is the caller
        if let Some(timer) = self.timer.take() {
            if !from_timer {
                timer.abort();
            }
        }

        apply_rewards(&mut self.participants, reward_per_vote);
        tracing::info!(
            "Room {} finalized: {}",
            room_id,
            self.participants
                .iter()
                .map(|p| format!("{}={}", p.player_id, p.votes_received))
                .collect::<Vec<_>>()
                .join(", ")
        );

        self.broadcast(&ServerMessage::Results {
            participants: public_roster(&self.participants),
        });
        true
    }

    fn broadcast_update(&self) {
        self.broadcast(&ServerMessage::VotingUpdate {
            participants: public_roster(&self.participants),
        });
    }

    fn broadcast(&self, msg: &ServerMessage) {
        for participant in &self.participants {
            participant.deliver(msg);
        }
    }
}
