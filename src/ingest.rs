//! Score ingestion: the single entry point for stroke updates.
//!
//! A score write commits on its own. Settlement is spawned afterwards and its
//! outcome is handed back through a oneshot the caller may await or drop.

use crate::{
    clock::Clock,
    errors::{FairwayResult, SettlementError, ValidationError},
    game_store,
    games::types::{
        GameNotification, HoleScore, PlayerId, Round, RoundId, SettlementResult, Tournament,
        TournamentId,
    },
    settlement::SettlementCoordinator,
    storage::KvStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Who is writing a score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Actor {
    Player { player_id: PlayerId },
    /// An admin entering scores for a player who has not joined yet
    Delegated { admin_id: PlayerId, player_id: PlayerId },
}

impl Actor {
    pub fn player(player_id: impl Into<PlayerId>) -> Self {
        Actor::Player {
            player_id: player_id.into(),
        }
    }

    pub fn acting_as(admin_id: impl Into<PlayerId>, player_id: impl Into<PlayerId>) -> Self {
        Actor::Delegated {
            admin_id: admin_id.into(),
            player_id: player_id.into(),
        }
    }

    /// The player whose score is being written
    pub fn player_id(&self) -> &str {
        match self {
            Actor::Player { player_id } | Actor::Delegated { player_id, .. } => player_id.as_str(),
        }
    }

    pub fn authorize(&self, tournament: &Tournament, round: &Round) -> Result<(), ValidationError> {
        if round.player_id != self.player_id() {
            return Err(ValidationError::Unauthorized(format!(
                "round {} belongs to {}",
                round.id, round.player_id
            )));
        }
        if let Actor::Delegated { admin_id, .. } = self {
            if !tournament.is_admin(admin_id) {
                return Err(ValidationError::Unauthorized(format!(
                    "{} cannot enter scores for others in {}",
                    admin_id, tournament.id
                )));
            }
        }
        Ok(())
    }
}

/// Payload published after every committed score write
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEvent {
    pub tournament_id: TournamentId,
    pub round_id: RoundId,
    pub player_id: PlayerId,
    pub hole: u8,
    pub strokes: u32,
    pub previous: Option<u32>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    ScoreChanged(ScoreEvent),
    Notifications {
        tournament_id: TournamentId,
        notifications: Vec<GameNotification>,
    },
}

/// Fan-out of score changes to any number of subscribers
#[derive(Clone)]
pub struct ScoreFeed {
    tx: broadcast::Sender<FeedEvent>,
}

impl ScoreFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: FeedEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ScoreFeed {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Delivery of settlement notifications to players
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, tournament_id: &str, notifications: &[GameNotification]);
}

#[async_trait]
impl NotificationSink for ScoreFeed {
    async fn deliver(&self, tournament_id: &str, notifications: &[GameNotification]) {
        self.publish(FeedEvent::Notifications {
            tournament_id: tournament_id.to_string(),
            notifications: notifications.to_vec(),
        });
    }
}

/// Sink that only logs, for headless runs
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn deliver(&self, tournament_id: &str, notifications: &[GameNotification]) {
        for n in notifications {
            info!(tournament_id, recipient = %n.recipient_id, kind = ?n.kind, "{}", n.message);
        }
    }
}

/// Acknowledgement of a committed score write
#[derive(Debug)]
pub struct ScoreReceipt {
    pub score: HoleScore,
    pub previous: Option<u32>,
    settlement: oneshot::Receiver<Result<SettlementResult, SettlementError>>,
}

impl ScoreReceipt {
    /// Wait for the follow-up settlement run
    pub async fn settlement(self) -> Result<SettlementResult, SettlementError> {
        self.settlement.await.unwrap_or(Err(SettlementError::Dropped))
    }

    /// Settlement summary if it lands within `wait`
    pub async fn settlement_within(self, wait: Duration) -> Option<SettlementResult> {
        match tokio::time::timeout(wait, self.settlement()).await {
            Ok(Ok(result)) => Some(result),
            Ok(Err(_)) | Err(_) => None,
        }
    }
}

pub struct HoleScoreIngestor {
    store: Arc<dyn KvStore>,
    coordinator: Arc<SettlementCoordinator>,
    feed: ScoreFeed,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
}

impl HoleScoreIngestor {
    pub fn new(
        store: Arc<dyn KvStore>,
        coordinator: Arc<SettlementCoordinator>,
        feed: ScoreFeed,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            coordinator,
            feed,
            sink,
            clock,
        }
    }

    pub fn feed(&self) -> &ScoreFeed {
        &self.feed
    }

    /// Validate and upsert one score, then settle its hole in the background
    pub async fn apply_score(
        &self,
        actor: &Actor,
        round_id: &str,
        hole: i64,
        strokes: i64,
    ) -> FairwayResult<ScoreReceipt> {
        let store = self.store.as_ref();
        let round = game_store::load_round(store, round_id)?
            .ok_or_else(|| ValidationError::InvalidRound(round_id.to_string()))?;
        let tournament = game_store::load_tournament(store, &round.tournament_id)?
            .ok_or_else(|| ValidationError::UnknownTournament(round.tournament_id.clone()))?;
        actor.authorize(&tournament, &round)?;
        let hole = tournament.validate_hole(hole)?;
        let strokes = tournament.validate_strokes(strokes)?;

        let score = HoleScore {
            round_id: round.id.clone(),
            player_id: round.player_id.clone(),
            hole,
            strokes,
            updated_at: self.clock.now(),
        };
        let previous = game_store::upsert_hole_score(store, &score)?.map(|s| s.strokes);
        game_store::bump_score_revision(store, &tournament.id)?;
        debug!(round_id, hole, strokes, ?previous, "Score recorded");

        self.feed.publish(FeedEvent::ScoreChanged(ScoreEvent {
            tournament_id: tournament.id.clone(),
            round_id: round.id.clone(),
            player_id: round.player_id.clone(),
            hole,
            strokes,
            previous,
            updated_at: score.updated_at,
        }));

        let (tx, rx) = oneshot::channel();
        let coordinator = self.coordinator.clone();
        let sink = self.sink.clone();
        let tournament_id = tournament.id;
        tokio::spawn(async move {
            let result = coordinator.settle_hole(&tournament_id, hole).await;
            match &result {
                Ok(settled) if !settled.notifications.is_empty() => {
                    sink.deliver(&tournament_id, &settled.notifications).await;
                }
                Ok(_) => {}
                Err(e) => error!(
                    tournament_id = %tournament_id,
                    hole,
                    error = %e,
                    "❌ Settlement failed after score write; safe to retry"
                ),
            }
            let _ = tx.send(result);
        });

        Ok(ScoreReceipt {
            score,
            previous,
            settlement: rx,
        })
    }

    /// Open a round on behalf of a player who has not joined yet
    pub fn create_delegated_round(
        &self,
        admin_id: &str,
        tournament_id: &str,
        player_id: &str,
    ) -> FairwayResult<Round> {
        let tournament = self.tournament(tournament_id)?;
        if !tournament.is_admin(admin_id) {
            return Err(ValidationError::Unauthorized(format!(
                "{} is not an admin of {}",
                admin_id, tournament_id
            ))
            .into());
        }
        self.open_round(&tournament, admin_id, player_id)
    }

    /// Open (or return) a player's own round
    pub fn join(&self, tournament_id: &str, player_id: &str) -> FairwayResult<Round> {
        let tournament = self.tournament(tournament_id)?;
        self.open_round(&tournament, player_id, player_id)
    }

    fn tournament(&self, tournament_id: &str) -> FairwayResult<Tournament> {
        Ok(game_store::load_tournament(self.store.as_ref(), tournament_id)?
            .ok_or_else(|| ValidationError::UnknownTournament(tournament_id.to_string()))?)
    }

    fn open_round(
        &self,
        tournament: &Tournament,
        created_by: &str,
        player_id: &str,
    ) -> FairwayResult<Round> {
        if !tournament.is_entrant(player_id) {
            return Err(ValidationError::NotAnEntrant {
                tournament_id: tournament.id.clone(),
                player_id: player_id.to_string(),
            }
            .into());
        }
        let store = self.store.as_ref();
        if let Some(existing) = game_store::find_round_for_player(store, &tournament.id, player_id)? {
            return Ok(existing);
        }

        let round = Round {
            id: Uuid::new_v4().to_string(),
            tournament_id: tournament.id.clone(),
            player_id: player_id.to_string(),
            created_by: created_by.to_string(),
            created_at: self.clock.now(),
        };
        game_store::store_round(store, &round)?;
        info!(
            round_id = %round.id,
            tournament_id = %tournament.id,
            player_id,
            delegated = round.is_delegated(),
            "🏌️ Round opened"
        );
        Ok(round)
    }
}
