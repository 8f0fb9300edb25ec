use crate::protocol::ServerMessage;
use crate::types::*;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

/// Why a join was refused. The connection is closed after telling the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum JoinRejection {
    #[error("waiting pool is full")]
    Full,
    #[error("a round is in progress")]
    InProgress,
    #[error("this cat is already waiting")]
    DuplicateCat,
    #[error("this player is already waiting")]
    AlreadyWaiting,
}

/// What happened to an accepted join
#[derive(Debug)]
pub enum Admission {
    /// Still waiting for more players
    Waiting {
        /// True if the pool was empty before this join
        first: bool,
    },
    /// This join filled the pool. The pool is now empty and closed until the
    /// caller opens it again; the snapshot is the new room's roster.
    Full(Vec<Participant>),
}

/// Players who are connected but not yet in a room, in join order
pub struct WaitingPool {
    members: Vec<Participant>,
    capacity: usize,
    accepting_joins: bool,
    /// Bumped whenever the current lobby ends (pool emptied or handed off),
    /// so a bot-fill timer armed for an earlier lobby can tell it is stale
    fill_epoch: u64,
    fill_timer: Option<JoinHandle<()>>,
}

impl WaitingPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            members: Vec::with_capacity(capacity),
            capacity,
            accepting_joins: true,
            fill_epoch: 0,
            fill_timer: None,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting_joins
    }

    pub fn fill_epoch(&self) -> u64 {
        self.fill_epoch
    }

    pub fn roster(&self) -> Vec<PublicParticipant> {
        public_roster(&self.members)
    }

    pub fn try_join(&mut self, participant: Participant) -> Result<Admission, JoinRejection> {
        if !self.accepting_joins {
            return Err(JoinRejection::InProgress);
        }
        if self.members.len() >= self.capacity {
            return Err(JoinRejection::Full);
        }
        if self
            .members
            .iter()
            .any(|p| p.player_id == participant.player_id)
        {
            return Err(JoinRejection::AlreadyWaiting);
        }
        if self.members.iter().any(|p| p.cat_id == participant.cat_id) {
            return Err(JoinRejection::DuplicateCat);
        }

        let first = self.members.is_empty();
        tracing::info!(
            "{} joined the waiting pool ({}/{})",
            participant.player_id,
            self.members.len() + 1,
            self.capacity
        );
        self.members.push(participant);
        self.notify_pool_update();

        if self.members.len() == self.capacity {
            self.accepting_joins = false;
            return Ok(Admission::Full(self.hand_off()));
        }

        Ok(Admission::Waiting { first })
    }

    /// Remove the member sitting on `conn_id` and tell the rest
    pub fn leave(&mut self, conn_id: &str) -> Option<Participant> {
        let idx = self
            .members
            .iter()
            .position(|p| p.conn_id() == Some(conn_id))?;
        let participant = self.members.remove(idx);

        tracing::info!(
            "{} left the waiting pool ({}/{})",
            participant.player_id,
            self.members.len(),
            self.capacity
        );

        if self.members.is_empty() {
            self.end_lobby();
        } else {
            self.notify_pool_update();
        }
        Some(participant)
    }

    /// Take everyone out for a bot-filled room if `epoch` is still the
    /// current lobby. The pool is closed until the caller opens it again.
    pub fn drain_for_fill(&mut self, epoch: u64) -> Option<Vec<Participant>> {
        if epoch != self.fill_epoch || self.members.is_empty() || !self.accepting_joins {
            return None;
        }
        // The fill timer is the caller; don't abort it
        self.fill_timer = None;
        self.accepting_joins = false;
        Some(self.hand_off())
    }

    pub fn set_fill_timer(&mut self, handle: JoinHandle<()>) {
        if let Some(old) = self.fill_timer.replace(handle) {
            old.abort();
        }
    }

    pub fn set_accepting(&mut self, accepting: bool) {
        self.accepting_joins = accepting;
    }

    /// Send the current membership to every connected member
    pub fn notify_pool_update(&self) {
        let msg = ServerMessage::ParticipantUpdate {
            participants: self.roster(),
            max_count: self.capacity,
        };
        for member in self.members.iter().filter(|p| !p.is_synthetic()) {
            member.deliver(&msg);
        }
    }

    fn hand_off(&mut self) -> Vec<Participant> {
        let snapshot = std::mem::take(&mut self.members);
        self.end_lobby();
        snapshot
    }

    fn end_lobby(&mut self) {
        self.fill_epoch += 1;
        if let Some(timer) = self.fill_timer.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Connection, Outbound};
    use crate::identity::Identity;
    use std::sync::Arc;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn member(n: u32) -> (Arc<Connection>, UnboundedReceiver<ServerMessage>, Participant) {
        let (conn, rx) = Connection::open();
        let channel: Arc<dyn Outbound> = conn.clone();
        let participant = Participant::real(
            format!("p{}", n),
            format!("c{}", n),
            Identity::placeholder("p", "c"),
            conn.id().to_string(),
            &channel,
        );
        (conn, rx, participant)
    }

    #[tokio::test]
    async fn test_join_notifies_members() {
        let mut pool = WaitingPool::new(3);
        let (_c1, mut rx1, p1) = member(1);
        let (_c2, mut rx2, p2) = member(2);

        assert!(matches!(
            pool.try_join(p1),
            Ok(Admission::Waiting { first: true })
        ));
        assert!(matches!(
            pool.try_join(p2),
            Ok(Admission::Waiting { first: false })
        ));

        // p1 saw both updates, p2 only its own
        let mut seen = Vec::new();
        while let Ok(msg) = rx1.try_recv() {
            seen.push(msg);
        }
        assert_eq!(seen.len(), 2);
        match rx2.try_recv() {
            Ok(ServerMessage::ParticipantUpdate {
                participants,
                max_count,
            }) => {
                assert_eq!(participants.len(), 2);
                assert_eq!(max_count, 3);
            }
            other => panic!("Expected ParticipantUpdate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reaching_capacity_hands_off_and_closes() {
        let mut pool = WaitingPool::new(2);
        let (_c1, _rx1, p1) = member(1);
        let (_c2, _rx2, p2) = member(2);
        let (_c3, _rx3, p3) = member(3);

        pool.try_join(p1).unwrap();
        let epoch = pool.fill_epoch();
        let snapshot = match pool.try_join(p2) {
            Ok(Admission::Full(snapshot)) => snapshot,
            other => panic!("Expected Full, got {:?}", other),
        };

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].player_id, "p1");
        assert!(pool.is_empty());
        assert_ne!(pool.fill_epoch(), epoch);
        assert_eq!(
            pool.try_join(p3.clone()).unwrap_err(),
            JoinRejection::InProgress
        );

        pool.set_accepting(true);
        assert!(pool.try_join(p3).is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_player_or_cat_rejected() {
        let mut pool = WaitingPool::new(4);
        let (_c1, _rx1, p1) = member(1);
        let (_c2, _rx2, mut same_cat) = member(2);
        same_cat.cat_id = "c1".to_string();
        let (_c3, _rx3, mut same_player) = member(3);
        same_player.player_id = "p1".to_string();

        pool.try_join(p1).unwrap();
        assert_eq!(
            pool.try_join(same_cat).unwrap_err(),
            JoinRejection::DuplicateCat
        );
        assert_eq!(
            pool.try_join(same_player).unwrap_err(),
            JoinRejection::AlreadyWaiting
        );
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn test_leave_notifies_remaining() {
        let mut pool = WaitingPool::new(3);
        let (c1, _rx1, p1) = member(1);
        let (_c2, mut rx2, p2) = member(2);
        pool.try_join(p1).unwrap();
        pool.try_join(p2).unwrap();
        while rx2.try_recv().is_ok() {}

        let removed = pool.leave(c1.id()).expect("member removed");
        assert_eq!(removed.player_id, "p1");
        assert!(pool.leave(c1.id()).is_none());

        match rx2.try_recv() {
            Ok(ServerMessage::ParticipantUpdate { participants, .. }) => {
                assert_eq!(participants.len(), 1);
                assert_eq!(participants[0].player_id, "p2");
            }
            other => panic!("Expected ParticipantUpdate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_emptying_pool_invalidates_fill() {
        let mut pool = WaitingPool::new(3);
        let (c1, _rx1, p1) = member(1);
        pool.try_join(p1).unwrap();
        let epoch = pool.fill_epoch();

        pool.leave(c1.id());
        assert!(pool.drain_for_fill(epoch).is_none());

        let (_c2, _rx2, p2) = member(2);
        pool.try_join(p2).unwrap();
        let current = pool.fill_epoch();
        let drained = pool.drain_for_fill(current).expect("current lobby drains");
        assert_eq!(drained.len(), 1);
        assert!(!pool.is_accepting());
    }
}
