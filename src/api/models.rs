//! API Request and Response Models

use crate::games::types::{
    GameNotification, PlayerId, PressBet, SettlementResult, SkinRecord, SnakeState,
};
use crate::games::snake::SnakeTransition;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub feed_subscribers: usize,
}

/// PUT /rounds/:round_id/holes/:hole
#[derive(Debug, Clone, Deserialize)]
pub struct ScoreRequest {
    pub strokes: i64,
    /// Player the caller is entering a score for (admins only)
    #[serde(default)]
    pub acting_as: Option<PlayerId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreResponse {
    pub ok: bool,
    pub round_id: String,
    pub hole: u8,
    pub strokes: u32,
    pub previous: Option<u32>,
    /// Present when settlement finished within the wait window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement: Option<SettlementSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementSummary {
    pub summary: String,
    #[serde(flatten)]
    pub result: SettlementResult,
}

impl From<SettlementResult> for SettlementSummary {
    fn from(result: SettlementResult) -> Self {
        Self {
            summary: result.summary_text(),
            result,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DelegatedRoundRequest {
    pub tournament_id: String,
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePressRequest {
    pub tournament_id: String,
    pub target_id: PlayerId,
    pub amount: Decimal,
    /// Parsed server-side so unknown types get a validation error
    pub bet_type: String,
    #[serde(default)]
    pub win_condition: String,
    pub start_hole: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeasurementRequest {
    /// `None` records a push
    #[serde(default)]
    pub winner_id: Option<PlayerId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeasurementResponse {
    pub press: PressBet,
    pub notifications: Vec<GameNotification>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreePuttRequest {
    /// In holed-out order; the last player takes the snake
    #[serde(default)]
    pub player_ids: Vec<PlayerId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreePuttResponse {
    pub revision: u64,
    pub transitions: Vec<SnakeTransition>,
    pub notifications: Vec<GameNotification>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkinsResponse {
    pub tournament_id: String,
    pub holes: Vec<SkinRecord>,
    pub distributed: Decimal,
    pub carried: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnakesResponse {
    pub tournament_id: String,
    pub snakes: Vec<SnakeState>,
}
