//! WebSocket message dispatch
//!
//! Entry points for messages coming off a player's socket, plus the cleanup
//! hook run when the socket goes away.

use crate::channel::{Connection, Outbound};
use crate::identity::resolve_or_placeholder;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{AppState, DisconnectRoute, JoinOutcome, VoteOutcome};
use crate::types::Participant;
use std::sync::Arc;

/// Handle a client message and return an optional direct response.
/// Room and pool broadcasts reach the client through its connection queue.
pub async fn handle_message(
    msg: ClientMessage,
    conn: &Arc<Connection>,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Join { player_id, cat_id } => {
            handle_join(state, conn, player_id, cat_id).await
        }
        ClientMessage::Vote { voted_cat_id } => handle_vote(state, conn, voted_cat_id).await,
    }
}

pub async fn handle_join(
    state: &Arc<AppState>,
    conn: &Arc<Connection>,
    player_id: String,
    cat_id: String,
) -> Option<ServerMessage> {
    tracing::info!("Join request: player={}, cat={}", player_id, cat_id);

    let player_id = player_id.trim().to_string();
    let cat_id = cat_id.trim().to_string();
    if player_id.is_empty() || cat_id.is_empty() {
        return Some(ServerMessage::Error {
            code: "INVALID_JOIN".to_string(),
            msg: "playerId and catId are required".to_string(),
        });
    }

    if state.is_seated(conn.id()).await {
        return Some(already_joined());
    }

    // Network lookup happens before the pool lock is taken
    let identity = resolve_or_placeholder(state.identity.as_ref(), &player_id, &cat_id).await;

    let channel: Arc<dyn Outbound> = conn.clone();
    let participant = Participant::real(
        player_id.clone(),
        cat_id,
        identity,
        conn.id().to_string(),
        &channel,
    );

    match state.join(participant).await {
        Ok(JoinOutcome::Waiting) => None,
        Ok(JoinOutcome::Matched { room_id }) => {
            tracing::info!("{} completed room {}", player_id, room_id);
            None
        }
        // Seated by a concurrent join on the same socket while we were resolving
        Ok(JoinOutcome::AlreadySeated) => Some(already_joined()),
        Err(reason) => {
            tracing::info!("Join rejected for {}: {}", player_id, reason);
            Some(ServerMessage::JoinRejected { reason })
        }
    }
}

fn already_joined() -> ServerMessage {
    ServerMessage::Error {
        code: "ALREADY_JOINED".to_string(),
        msg: "This connection has already joined".to_string(),
    }
}

pub async fn handle_vote(
    state: &Arc<AppState>,
    conn: &Arc<Connection>,
    voted_cat_id: String,
) -> Option<ServerMessage> {
    match state.vote(conn.id(), &voted_cat_id).await {
        Some(VoteOutcome::Recorded) | Some(VoteOutcome::Completed) => None,
        Some(VoteOutcome::Ignored(reason)) => {
            // Invalid votes just don't count; the client is not told
            tracing::debug!("Vote for {} ignored: {:?}", voted_cat_id, reason);
            None
        }
        None => Some(ServerMessage::Error {
            code: "NO_ACTIVE_ROOM".to_string(),
            msg: "Not in a voting room".to_string(),
        }),
    }
}

/// Socket closed: release the connection's seat wherever it is
pub async fn handle_disconnect(state: &Arc<AppState>, conn_id: &str) {
    match state.disconnect(conn_id).await {
        DisconnectRoute::LeftPool => tracing::info!("{} left the waiting pool", conn_id),
        DisconnectRoute::LeftRoom(outcome) => {
            tracing::info!("{} left its room: {:?}", conn_id, outcome)
        }
        DisconnectRoute::NotSeated => tracing::debug!("{} disconnected without a seat", conn_id),
    }
}
