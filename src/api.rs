//! HTTP endpoints next to the websocket: engine status and live room rosters.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::{AppState, EngineStatus};
use crate::types::{PublicParticipant, RoomPhase};
use crate::ws;

/// Roster of a room that is still voting
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub room_id: String,
    pub phase: RoomPhase,
    pub started_at: String,
    pub deadline: String,
    pub timer_seconds: u64,
    pub participants: Vec<PublicParticipant>,
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/status", get(status))
        .route("/api/rooms/{room_id}", get(room))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Waiting pool size and live room count.
///
/// GET /api/status
pub async fn status(State(state): State<Arc<AppState>>) -> Json<EngineStatus> {
    Json(state.status().await)
}

/// A live room's roster.
///
/// GET /api/rooms/{room_id}
///
/// Finalized rooms are released right away, so they answer 404.
pub async fn room(State(state): State<Arc<AppState>>, Path(room_id): Path<String>) -> Response {
    match state.live_room(&room_id).await {
        Some(room) => Json(RoomView {
            room_id: room.id.clone(),
            phase: room.phase().await,
            started_at: room.started_at.to_rfc3339(),
            deadline: room.deadline.to_rfc3339(),
            timer_seconds: room.voting_seconds(),
            participants: room.roster().await,
        })
        .into_response(),
        None => (StatusCode::NOT_FOUND, "Room not found").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::identity::StaticIdentityResolver;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> (Arc<AppState>, Router) {
        let state = Arc::new(AppState::new(
            EngineConfig::default(),
            Arc::new(StaticIdentityResolver::default()),
        ));
        (state.clone(), router(state))
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let (_state, app) = app();
        let response = app
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["waiting"], 0);
        assert_eq!(json["capacity"], 4);
        assert_eq!(json["liveRooms"], 0);
        assert_eq!(json["rewardPerVote"], 25);
    }

    #[tokio::test]
    async fn test_room_endpoint() {
        let (state, app) = app();
        let room = state
            .spawn_room(vec![crate::state::generate_synthetic()])
            .await;
        // Bot-only rooms finalize on open and are released immediately
        assert!(state.live_room(&room.id).await.is_none());

        let response = app
            .oneshot(
                Request::get(format!("/api/rooms/{}", room.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_live_room_roster() {
        use crate::channel::{Connection, Outbound};
        use crate::identity::Identity;
        use crate::types::Participant;

        let (state, app) = app();
        let (conn, _rx) = Connection::open();
        let channel: Arc<dyn Outbound> = conn.clone();
        let player = Participant::real(
            "p1".to_string(),
            "c1".to_string(),
            Identity::placeholder("p1", "c1"),
            conn.id().to_string(),
            &channel,
        );
        // Three bots vote on open; the real player keeps the room live
        let room = state.spawn_room(vec![player]).await;

        let response = app
            .oneshot(
                Request::get(format!("/api/rooms/{}", room.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["roomId"], room.id.as_str());
        assert_eq!(json["phase"], "VOTING");
        assert_eq!(json["timerSeconds"], 30);
        assert_eq!(json["participants"].as_array().map(Vec::len), Some(4));
    }
}
