use crate::channel::Outbound;
use crate::identity::Identity;
use crate::protocol::ServerMessage;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

/// Opaque ID types
pub type PlayerId = String;
pub type CatId = String;
pub type RoomId = String;
pub type ConnId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomPhase {
    Voting,
    Finalized,
}

/// Whether a seat belongs to a connected player or was filled by the engine.
///
/// Only real seats carry a channel, so a synthetic seat can never be messaged.
#[derive(Debug, Clone)]
pub enum ParticipantKind {
    Real {
        conn_id: ConnId,
        /// The socket layer owns the connection; we only observe it
        channel: Weak<dyn Outbound>,
    },
    Synthetic,
}

/// Why a vote had no effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredVote {
    SelfVote,
    AlreadyVoted,
    UnknownVoter,
    UnknownTarget,
    RoundClosed,
}

/// One seat in a waiting pool or voting room
#[derive(Debug, Clone)]
pub struct Participant {
    pub player_id: PlayerId,
    pub cat_id: CatId,
    pub display_name: String,
    pub avatar_name: String,
    pub kind: ParticipantKind,
    voted_for: Option<CatId>,
    pub votes_received: u32,
    pub reward: u32,
}

impl Participant {
    /// A connected player whose identity has already been resolved
    pub fn real(
        player_id: PlayerId,
        cat_id: CatId,
        identity: Identity,
        conn_id: ConnId,
        channel: &Arc<dyn Outbound>,
    ) -> Self {
        Self {
            player_id,
            cat_id,
            display_name: identity.display_name,
            avatar_name: identity.avatar_name,
            kind: ParticipantKind::Real {
                conn_id,
                channel: Arc::downgrade(channel),
            },
            voted_for: None,
            votes_received: 0,
            reward: 0,
        }
    }

    pub fn synthetic(player_id: PlayerId, cat_id: CatId, identity: Identity) -> Self {
        Self {
            player_id,
            cat_id,
            display_name: identity.display_name,
            avatar_name: identity.avatar_name,
            kind: ParticipantKind::Synthetic,
            voted_for: None,
            votes_received: 0,
            reward: 0,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self.kind, ParticipantKind::Synthetic)
    }

    pub fn conn_id(&self) -> Option<&str> {
        match &self.kind {
            ParticipantKind::Real { conn_id, .. } => Some(conn_id),
            ParticipantKind::Synthetic => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        match &self.kind {
            ParticipantKind::Real { channel, .. } => channel
                .upgrade()
                .map(|ch| ch.is_connected())
                .unwrap_or(false),
            ParticipantKind::Synthetic => false,
        }
    }

    pub fn voted_for(&self) -> Option<&str> {
        self.voted_for.as_deref()
    }

    pub fn has_voted(&self) -> bool {
        self.voted_for.is_some()
    }

    /// Record this seat's vote. First write wins; a vote for the own cat is refused.
    pub fn cast_vote(&mut self, target: &str) -> Result<(), IgnoredVote> {
        if target == self.cat_id {
            return Err(IgnoredVote::SelfVote);
        }
        if self.voted_for.is_some() {
            return Err(IgnoredVote::AlreadyVoted);
        }
        self.voted_for = Some(target.to_string());
        Ok(())
    }

    /// Send a message if this seat still has a live channel.
    /// Delivery problems are logged and otherwise ignored.
    pub fn deliver(&self, msg: &ServerMessage) {
        let ParticipantKind::Real { conn_id, channel } = &self.kind else {
            return;
        };

        match channel.upgrade() {
            Some(ch) if ch.is_connected() => {
                if let Err(e) = ch.send(msg.clone()) {
                    tracing::debug!("Dropped {} for {}: {}", msg.event_name(), conn_id, e);
                }
            }
            _ => {
                tracing::debug!(
                    "Skipping {} for {}: connection gone",
                    msg.event_name(),
                    conn_id
                );
            }
        }
    }

    pub fn to_public(&self) -> PublicParticipant {
        PublicParticipant {
            player_id: self.player_id.clone(),
            cat_id: self.cat_id.clone(),
            display_name: self.display_name.clone(),
            avatar_name: self.avatar_name.clone(),
            voted_for: self.voted_for.clone(),
            votes_received: self.votes_received,
            reward: self.reward,
        }
    }
}

/// The outward view of a participant (no seat kind, no channel)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicParticipant {
    pub player_id: PlayerId,
    pub cat_id: CatId,
    pub display_name: String,
    pub avatar_name: String,
    pub voted_for: Option<CatId>,
    pub votes_received: u32,
    pub reward: u32,
}

pub fn public_roster(participants: &[Participant]) -> Vec<PublicParticipant> {
    participants.iter().map(Participant::to_public).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Connection;

    fn identity() -> Identity {
        Identity {
            display_name: "Alice".to_string(),
            avatar_name: "Mittens".to_string(),
        }
    }

    #[test]
    fn test_self_vote_is_refused() {
        let mut p = Participant::synthetic("p1".into(), "cat-1".into(), identity());
        assert_eq!(p.cast_vote("cat-1"), Err(IgnoredVote::SelfVote));
        assert!(!p.has_voted());
    }

    #[test]
    fn test_first_vote_wins() {
        let mut p = Participant::synthetic("p1".into(), "cat-1".into(), identity());
        assert!(p.cast_vote("cat-2").is_ok());
        assert_eq!(p.cast_vote("cat-3"), Err(IgnoredVote::AlreadyVoted));
        assert_eq!(p.voted_for(), Some("cat-2"));
    }

    #[tokio::test]
    async fn test_deliver_stops_after_connection_dropped() {
        let (conn, mut rx) = Connection::open();
        let channel: Arc<dyn Outbound> = conn.clone();
        let p = Participant::real(
            "p1".into(),
            "cat-1".into(),
            identity(),
            conn.id().to_string(),
            &channel,
        );
        drop(channel);

        let msg = ServerMessage::VotingUpdate {
            participants: vec![p.to_public()],
        };
        p.deliver(&msg);
        assert!(p.is_connected());
        assert!(rx.try_recv().is_ok());

        drop(conn);
        assert!(!p.is_connected());
        p.deliver(&msg);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_public_view_is_camel_case_without_internals() {
        let p = Participant::synthetic("bot-1".into(), "cat-1".into(), identity());
        let json = serde_json::to_value(p.to_public()).unwrap();

        assert_eq!(json["playerId"], "bot-1");
        assert_eq!(json["catId"], "cat-1");
        assert_eq!(json["votesReceived"], 0);
        assert!(json.get("kind").is_none());
        assert!(json.get("isSynthetic").is_none());
    }
}
