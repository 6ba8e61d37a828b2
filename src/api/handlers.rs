//! Request Handlers

use super::{
    errors::ApiError,
    middleware::{player_id, RequestId},
    models::*,
};
use crate::{
    errors::FairwayError,
    game_store,
    games::{
        skins::{distributed_total, outstanding_pot},
        types::{BetType, PressBet, Round, Tournament},
    },
    ingest::{Actor, HoleScoreIngestor, NotificationSink, ScoreFeed},
    settlement::SettlementCoordinator,
    storage::KvStore,
    wagers::{NewPress, PressBook},
};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Extension, Json,
};
use std::{sync::Arc, time::Duration};
use tracing::warn;

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn KvStore>,
    pub ingestor: Arc<HoleScoreIngestor>,
    pub coordinator: Arc<SettlementCoordinator>,
    pub presses: Arc<PressBook>,
    pub feed: ScoreFeed,
    pub sink: Arc<dyn NotificationSink>,
    /// How long a score write waits for its settlement summary
    pub await_settlement: Duration,
}

fn caller(headers: &HeaderMap, request_id: &RequestId) -> Result<String, ApiError> {
    player_id(headers).ok_or_else(|| ApiError::forbidden(&request_id.0, "missing x-player-id header"))
}

fn hole_param(hole: i64, request_id: &RequestId) -> Result<u8, ApiError> {
    u8::try_from(hole)
        .ok()
        .filter(|h| *h >= 1)
        .ok_or_else(|| ApiError::bad_request(&request_id.0, format!("Invalid hole {}", hole)))
}

/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Running".to_string(),
        feed_subscribers: state.feed.subscriber_count(),
    })
}

/// PUT /rounds/:round_id/holes/:hole
///
/// The write succeeds or fails on its own. Settlement is reported if it
/// finishes in time and is otherwise left to complete in the background.
pub async fn put_score_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path((round_id, hole)): Path<(String, i64)>,
    headers: HeaderMap,
    Json(body): Json<ScoreRequest>,
) -> Result<Json<ScoreResponse>, ApiError> {
    let caller = caller(&headers, &request_id)?;
    let actor = match body.acting_as {
        Some(player) if player != caller => Actor::acting_as(caller, player),
        _ => Actor::player(caller),
    };

    let receipt = state
        .ingestor
        .apply_score(&actor, &round_id, hole, body.strokes)
        .await
        .map_err(|e| ApiError::from_fairway(&request_id.0, e))?;

    let score = receipt.score.clone();
    let previous = receipt.previous;
    let settlement = receipt
        .settlement_within(state.await_settlement)
        .await
        .map(SettlementSummary::from);

    Ok(Json(ScoreResponse {
        ok: true,
        round_id: score.round_id,
        hole: score.hole,
        strokes: score.strokes,
        previous,
        settlement,
    }))
}

/// POST /rounds/delegated
pub async fn create_delegated_round_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<DelegatedRoundRequest>,
) -> Result<Json<Round>, ApiError> {
    let admin = caller(&headers, &request_id)?;
    state
        .ingestor
        .create_delegated_round(&admin, &body.tournament_id, &body.player_id)
        .map(Json)
        .map_err(|e| ApiError::from_fairway(&request_id.0, e))
}

/// POST /tournaments/:id/rounds
pub async fn join_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(tournament_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Round>, ApiError> {
    let player = caller(&headers, &request_id)?;
    state
        .ingestor
        .join(&tournament_id, &player)
        .map(Json)
        .map_err(|e| ApiError::from_fairway(&request_id.0, e))
}

/// POST /presses
pub async fn create_press_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreatePressRequest>,
) -> Result<Json<PressBet>, ApiError> {
    let initiator = caller(&headers, &request_id)?;
    let bet_type: BetType = body
        .bet_type
        .parse()
        .map_err(|e| ApiError::from_fairway(&request_id.0, FairwayError::Validation(e)))?;

    state
        .presses
        .create_press(NewPress {
            tournament_id: body.tournament_id,
            initiator_id: initiator,
            target_id: body.target_id,
            amount: body.amount,
            bet_type,
            win_condition: body.win_condition,
            start_hole: body.start_hole,
        })
        .map(Json)
        .map_err(|e| ApiError::from_fairway(&request_id.0, e))
}

/// GET /presses/:id
pub async fn get_press_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(bet_id): Path<String>,
) -> Result<Json<PressBet>, ApiError> {
    state
        .presses
        .get_press(&bet_id)
        .map(Json)
        .map_err(|e| ApiError::from_fairway(&request_id.0, e))
}

/// POST /presses/:id/accept
pub async fn accept_press_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(bet_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<PressBet>, ApiError> {
    let target = caller(&headers, &request_id)?;
    let accepted = state
        .presses
        .accept_press(&bet_id, &target)
        .map_err(|e| ApiError::from_fairway(&request_id.0, e))?;

    // Scores may already be in for the bet's holes
    match state.coordinator.settle_accepted(&accepted).await {
        Ok(result) => {
            if !result.notifications.is_empty() {
                state.sink.deliver(&accepted.tournament_id, &result.notifications).await;
            }
        }
        Err(e) => {
            warn!(bet_id = %bet_id, error = %e, "Settlement after accept failed, press stays active");
            return Ok(Json(accepted));
        }
    }
    state
        .presses
        .get_press(&bet_id)
        .map(Json)
        .map_err(|e| ApiError::from_fairway(&request_id.0, e))
}

/// POST /presses/:id/decline
pub async fn decline_press_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(bet_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<PressBet>, ApiError> {
    let target = caller(&headers, &request_id)?;
    state
        .presses
        .decline_press(&bet_id, &target)
        .map(Json)
        .map_err(|e| ApiError::from_fairway(&request_id.0, e))
}

/// POST /presses/:id/measurement
pub async fn measurement_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(bet_id): Path<String>,
    Json(body): Json<MeasurementRequest>,
) -> Result<Json<MeasurementResponse>, ApiError> {
    let outcome = state
        .presses
        .record_measurement(&bet_id, body.winner_id)
        .map_err(|e| ApiError::from_fairway(&request_id.0, e))?;
    state
        .sink
        .deliver(&outcome.bet.tournament_id, &outcome.notifications)
        .await;

    Ok(Json(MeasurementResponse {
        press: outcome.bet,
        notifications: outcome.notifications,
    }))
}

/// POST /tournaments/:id/holes/:hole/three-putts
pub async fn three_putts_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path((tournament_id, hole)): Path<(String, i64)>,
    headers: HeaderMap,
    Json(body): Json<ThreePuttRequest>,
) -> Result<Json<ThreePuttResponse>, ApiError> {
    let admin = caller(&headers, &request_id)?;
    let report = state
        .coordinator
        .attribute_three_putts(&admin, &tournament_id, hole, body.player_ids)
        .await
        .map_err(|e| ApiError::from_settlement(&request_id.0, e))?;
    if !report.notifications.is_empty() {
        state.sink.deliver(&tournament_id, &report.notifications).await;
    }

    Ok(Json(ThreePuttResponse {
        revision: report.revision,
        transitions: report.transitions,
        notifications: report.notifications,
    }))
}

/// POST /tournaments/:id/holes/:hole/settle
///
/// Manual re-run, e.g. after a settlement failure was logged.
pub async fn settle_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path((tournament_id, hole)): Path<(String, i64)>,
) -> Result<Json<SettlementSummary>, ApiError> {
    let hole = hole_param(hole, &request_id)?;
    let result = state
        .coordinator
        .settle_hole(&tournament_id, hole)
        .await
        .map_err(|e| ApiError::from_settlement(&request_id.0, e))?;
    if !result.notifications.is_empty() {
        state.sink.deliver(&tournament_id, &result.notifications).await;
    }
    Ok(Json(result.into()))
}

/// GET /tournaments/:id/skins
pub async fn skins_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(tournament_id): Path<String>,
) -> Result<Json<SkinsResponse>, ApiError> {
    let holes: Vec<_> = game_store::load_skin_chain(state.store.as_ref(), &tournament_id)
        .map_err(|e| ApiError::from_fairway(&request_id.0, e.into()))?
        .into_iter()
        .map(|v| v.record)
        .collect();

    Ok(Json(SkinsResponse {
        distributed: distributed_total(&holes),
        carried: outstanding_pot(&holes),
        tournament_id,
        holes,
    }))
}

/// GET /tournaments/:id/snakes
pub async fn snakes_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(tournament_id): Path<String>,
) -> Result<Json<SnakesResponse>, ApiError> {
    let snakes = game_store::load_snakes(state.store.as_ref(), &tournament_id)
        .map_err(|e| ApiError::from_fairway(&request_id.0, e.into()))?
        .into_iter()
        .map(|v| v.record)
        .collect();
    Ok(Json(SnakesResponse {
        tournament_id,
        snakes,
    }))
}

/// PUT /tournaments/:id
///
/// Seeds tournament rules; stands in for the external tournament service.
pub async fn put_tournament_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(tournament_id): Path<String>,
    Json(tournament): Json<Tournament>,
) -> Result<Json<Tournament>, ApiError> {
    if tournament.id != tournament_id {
        return Err(ApiError::bad_request(
            &request_id.0,
            format!("Body id {} does not match path {}", tournament.id, tournament_id),
        ));
    }
    tournament
        .validate_ids()
        .map_err(|e| ApiError::from_fairway(&request_id.0, e.into()))?;
    if tournament.rules.holes == 0 || tournament.rules.holes > crate::games::types::MAX_HOLES {
        return Err(ApiError::bad_request(
            &request_id.0,
            format!("A course has 1 to {} holes", crate::games::types::MAX_HOLES),
        ));
    }
    game_store::store_tournament(state.store.as_ref(), &tournament)
        .map_err(|e| ApiError::from_fairway(&request_id.0, e.into()))?;
    Ok(Json(tournament))
}
