use crate::state::JoinRejection;
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Join { player_id: PlayerId, cat_id: CatId },
    Vote { voted_cat_id: CatId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Waiting pool membership changed
    ParticipantUpdate {
        participants: Vec<PublicParticipant>,
        max_count: usize,
    },
    /// A room was just formed and voting is open
    VotingPhase {
        participants: Vec<PublicParticipant>,
        timer_seconds: u64,
    },
    /// A vote was recorded and the round is still open
    VotingUpdate {
        participants: Vec<PublicParticipant>,
    },
    /// Round finalized; votes and rewards are populated
    Results {
        participants: Vec<PublicParticipant>,
    },
    /// Join refused; the server closes the connection after this
    JoinRejected {
        reason: JoinRejection,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMessage {
    /// Wire name of the event (the `t` tag)
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMessage::ParticipantUpdate { .. } => "participant_update",
            ServerMessage::VotingPhase { .. } => "voting_phase",
            ServerMessage::VotingUpdate { .. } => "voting_update",
            ServerMessage::Results { .. } => "results",
            ServerMessage::JoinRejected { .. } => "join_rejected",
            ServerMessage::Error { .. } => "error",
        }
    }
}
