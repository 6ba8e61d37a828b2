//! WebSocket relay of the score feed
//!
//! Clients receive every `FeedEvent` (score changes and settlement
//! notifications), optionally filtered to one tournament.

use super::handlers::AppState;
use crate::ingest::{FeedEvent, ScoreFeed};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WsSubscription {
    #[serde(default)]
    pub tournament_id: Option<String>,
}

impl WsSubscription {
    fn wants(&self, event: &FeedEvent) -> bool {
        let Some(wanted) = &self.tournament_id else {
            return true;
        };
        match event {
            FeedEvent::ScoreChanged(score) => &score.tournament_id == wanted,
            FeedEvent::Notifications { tournament_id, .. } => tournament_id == wanted,
        }
    }
}

/// GET /ws?tournament_id=...
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(subscription): Query<WsSubscription>,
) -> Response {
    let feed = state.feed.clone();
    ws.on_upgrade(move |socket| handle_connection(socket, feed, subscription))
}

async fn handle_connection(socket: WebSocket, feed: ScoreFeed, subscription: WsSubscription) {
    let client_id = NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed);
    info!("🔌 WebSocket client {} connected", client_id);

    let (mut sender, mut receiver) = socket.split();
    let mut rx = feed.subscribe();

    // Task to handle incoming messages from client
    let mut receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Ok(Message::Text(text)) => debug!("Client {} sent: {}", client_id, text),
                Ok(_) => {}
                Err(e) => {
                    warn!("WebSocket error from client {}: {}", client_id, e);
                    break;
                }
            }
        }
    });

    // Task to send events to client
    let mut send_task = tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Client {} lagged, {} events dropped", client_id, skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if !subscription.wants(&event) {
                continue;
            }
            let message = match serde_json::to_string(&event) {
                Ok(text) => Message::Text(text),
                Err(e) => {
                    error!("Failed to serialize feed event: {}", e);
                    continue;
                }
            };
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut receive_task => send_task.abort(),
        _ = &mut send_task => receive_task.abort(),
    }

    info!("🔌 WebSocket client {} disconnected", client_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ScoreEvent;
    use chrono::Utc;

    fn score_event(tournament_id: &str) -> FeedEvent {
        FeedEvent::ScoreChanged(ScoreEvent {
            tournament_id: tournament_id.to_string(),
            round_id: "r1".to_string(),
            player_id: "a".to_string(),
            hole: 3,
            strokes: 4,
            previous: None,
            updated_at: Utc::now(),
        })
    }

    #[test]
    fn test_subscription_filter() {
        let all = WsSubscription::default();
        assert!(all.wants(&score_event("t1")));

        let one = WsSubscription {
            tournament_id: Some("t1".to_string()),
        };
        assert!(one.wants(&score_event("t1")));
        assert!(!one.wants(&score_event("t2")));
    }

    #[test]
    fn test_feed_event_payload() {
        let json = serde_json::to_value(score_event("t1")).unwrap();
        assert_eq!(json["type"], "score_changed");
        assert_eq!(json["tournamentId"], "t1");
    }
}
