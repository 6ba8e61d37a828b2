//! Route Definitions

use super::{handlers::*, websocket::websocket_handler};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        // Score entry
        .route("/rounds/delegated", post(create_delegated_round_handler))
        .route("/rounds/:round_id/holes/:hole", put(put_score_handler))
        // Press lifecycle
        .route("/presses", post(create_press_handler))
        .route("/presses/:id", get(get_press_handler))
        .route("/presses/:id/accept", post(accept_press_handler))
        .route("/presses/:id/decline", post(decline_press_handler))
        .route("/presses/:id/measurement", post(measurement_handler))
        // Side games and settlement
        .route("/tournaments/:id", put(put_tournament_handler))
        .route("/tournaments/:id/rounds", post(join_handler))
        .route("/tournaments/:id/skins", get(skins_handler))
        .route("/tournaments/:id/snakes", get(snakes_handler))
        .route(
            "/tournaments/:id/holes/:hole/three-putts",
            post(three_putts_handler),
        )
        .route("/tournaments/:id/holes/:hole/settle", post(settle_handler))
        // Score feed
        .route("/ws", get(websocket_handler))
        .with_state(state)
}
