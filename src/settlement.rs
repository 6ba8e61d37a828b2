//! Hole settlement coordinator.
//!
//! Every run re-reads scores and settlement records from the store, computes
//! what they should be, and writes the difference in a single guarded commit.
//! Runs for the same (tournament, hole) are serialized; a version conflict
//! with a run for another hole is retried from a fresh read. Every commit also
//! re-checks the tournament's score revision, so a run never persists results
//! computed from a sheet that changed underneath it.

use crate::{
    clock::Clock,
    config::SettlementConfig,
    errors::{SettlementError, StorageResult, ValidationError},
    game_store,
    games::{
        notifications::{HoleOutcomes, NotificationComposer},
        press::{PressResolver, ResolutionKind},
        skins::SkinsEngine,
        snake::{SnakeTracker, SnakeTransition},
        teams::TeamAggregator,
        types::{
            GameNotification, PlayerId, PressBet, SettlementResult, SnakeCategory, SnakeState,
            ThreePuttAttribution, Tournament, TournamentId,
        },
    },
    storage::{GuardedWrite, KvStore},
    wagers,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Result of an admin three-putt submission
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttributionReport {
    pub tournament_id: TournamentId,
    pub hole: u8,
    pub revision: u64,
    pub transitions: Vec<SnakeTransition>,
    pub notifications: Vec<GameNotification>,
}

pub struct SettlementCoordinator {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
    hole_locks: DashMap<(TournamentId, u8), Arc<Mutex<()>>>,
}

impl SettlementCoordinator {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, config: &SettlementConfig) -> Self {
        Self {
            store,
            clock,
            max_attempts: config.max_conflict_retries.max(1),
            hole_locks: DashMap::new(),
        }
    }

    fn hole_lock(&self, tournament_id: &str, hole: u8) -> Arc<Mutex<()>> {
        self.hole_locks
            .entry((tournament_id.to_string(), hole))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Bring every settlement record touched by `hole` in line with current
    /// scores. Safe to call any number of times.
    pub async fn settle_hole(
        &self,
        tournament_id: &str,
        hole: u8,
    ) -> Result<SettlementResult, SettlementError> {
        let lock = self.hole_lock(tournament_id, hole);
        let _guard = lock.lock().await;

        self.with_retries(tournament_id, hole, || self.settle_once(tournament_id, hole))
            .await
    }

    /// Settle a freshly accepted press against whatever is already posted.
    /// Acceptance writes no score, so nothing else would trigger this run.
    pub async fn settle_accepted(&self, bet: &PressBet) -> Result<SettlementResult, SettlementError> {
        self.settle_hole(&bet.tournament_id, bet.start_hole).await
    }

    /// Record which players three-putted `hole` and move the snakes
    pub async fn attribute_three_putts(
        &self,
        admin_id: &str,
        tournament_id: &str,
        hole: i64,
        player_ids: Vec<PlayerId>,
    ) -> Result<AttributionReport, SettlementError> {
        let tournament = self.load_tournament(tournament_id)?;
        if !tournament.is_admin(admin_id) {
            return Err(ValidationError::Unauthorized(format!(
                "{} is not an admin of {}",
                admin_id, tournament_id
            ))
            .into());
        }
        let hole = tournament.validate_hole(hole)?;
        if let Some(stranger) = player_ids.iter().find(|p| !tournament.is_entrant(p)) {
            return Err(ValidationError::NotAnEntrant {
                tournament_id: tournament_id.to_string(),
                player_id: stranger.clone(),
            }
            .into());
        }

        let lock = self.hole_lock(tournament_id, hole);
        let _guard = lock.lock().await;

        let revision = self
            .with_retries(tournament_id, hole, || {
                self.record_attribution(&tournament, admin_id, hole, &player_ids)
            })
            .await?;
        let transitions = self
            .with_retries(tournament_id, hole, || self.apply_attribution(&tournament, hole))
            .await?;

        info!(
            tournament_id,
            hole,
            revision,
            three_putts = player_ids.len(),
            "🐍 Three-putts attributed"
        );

        let notifications = NotificationComposer::new(&tournament).compose(
            hole,
            &HoleOutcomes {
                snake_transitions: &transitions,
                ..Default::default()
            },
        );
        Ok(AttributionReport {
            tournament_id: tournament.id.clone(),
            hole,
            revision,
            transitions,
            notifications,
        })
    }

    async fn with_retries<T>(
        &self,
        tournament_id: &str,
        hole: u8,
        mut op: impl FnMut() -> Result<T, SettlementError>,
    ) -> Result<T, SettlementError> {
        for attempt in 1..=self.max_attempts {
            match op() {
                Err(SettlementError::Storage(e)) if e.is_conflict() => {
                    warn!(
                        tournament_id,
                        hole,
                        attempt,
                        error = %e,
                        "⚠️ Settlement conflict, retrying from a fresh read"
                    );
                    tokio::task::yield_now().await;
                }
                other => return other,
            }
        }
        Err(SettlementError::Contention {
            tournament_id: tournament_id.to_string(),
            hole,
            attempts: self.max_attempts,
        })
    }

    fn load_tournament(&self, tournament_id: &str) -> Result<Tournament, SettlementError> {
        game_store::load_tournament(self.store.as_ref(), tournament_id)?
            .ok_or_else(|| ValidationError::UnknownTournament(tournament_id.to_string()).into())
    }

    fn settle_once(&self, tournament_id: &str, hole: u8) -> Result<SettlementResult, SettlementError> {
        let store = self.store.as_ref();
        let tournament = self.load_tournament(tournament_id)?;
        tournament.validate_hole(hole as i64)?;
        let rules = &tournament.rules;
        let scores_seen = game_store::load_score_revision(store, tournament_id)?;
        let sheet = game_store::load_score_sheet(store, tournament_id)?;
        let now = self.clock.now();

        let mut result = SettlementResult::empty(tournament_id, hole);
        let mut writes: Vec<GuardedWrite> = Vec::new();

        // Presses: lazy expiry first, then resolution
        let presses = game_store::load_tournament_presses(store, tournament_id)?;
        let expired = wagers::expiry_writes(&presses, now)?;
        result.expired_count = expired.len() as u32;
        writes.extend(expired);

        let resolver = PressResolver::new(&tournament);
        let mut resolutions = Vec::new();
        for press in &presses {
            let Some(resolution) = resolver.resolve(&press.record, &sheet, hole, now) else {
                continue;
            };
            match resolution.kind {
                ResolutionKind::Won => result.resolved_count += 1,
                ResolutionKind::Pushed => result.pushed_count += 1,
                ResolutionKind::Adjusted { .. } => result.adjusted_count += 1,
            }
            writes.push(game_store::press_write(press, &resolution.bet)?);
            resolutions.push(resolution);
        }

        let mut team_result = None;
        if rules.game_type.is_team_based() && !tournament.teams.is_empty() {
            let aggregator = TeamAggregator::new(&tournament);
            let computed = aggregator.hole_scores(&sheet, hole);
            let team_ids: Vec<String> = tournament.teams.iter().map(|t| t.id.clone()).collect();
            let stored = game_store::load_team_scores(store, tournament_id, &team_ids, hole)?;
            let team_writes = aggregator.reconcile(&stored, &computed)?;
            if !team_writes.is_empty() {
                team_result = aggregator.hole_result(&computed);
                writes.extend(team_writes);
            }
        }

        let mut skin_changes = Vec::new();
        if rules.skins_enabled {
            let engine = SkinsEngine::new(&tournament);
            let computed = engine.compute_chain(&sheet);
            let stored = game_store::load_skin_chain(store, tournament_id)?;
            let plan = engine.reconcile(&stored, computed)?;
            skin_changes = plan.changes;
            writes.extend(plan.writes);
        }

        // Re-drive an attribution whose snake step never committed
        let (snake_transitions, snake_writes) = self.attribution_writes(&tournament, hole)?;
        writes.extend(snake_writes);

        if !writes.is_empty() {
            // A score that landed after the sheet was read invalidates this run
            writes.push(game_store::score_revision_guard(tournament_id, scores_seen));
            store.commit(&writes)?;
        }

        result.notifications = NotificationComposer::new(&tournament).compose(
            hole,
            &HoleOutcomes {
                team_result: team_result.as_ref(),
                skin_changes: &skin_changes,
                snake_transitions: &snake_transitions,
                press_resolutions: &resolutions,
            },
        );

        if writes.is_empty() {
            debug!(tournament_id, hole, "Settlement found nothing to change");
        } else {
            info!(
                tournament_id,
                hole,
                resolved = result.resolved_count,
                pushed = result.pushed_count,
                adjusted = result.adjusted_count,
                expired = result.expired_count,
                skin_changes = skin_changes.len(),
                "✅ Hole settled"
            );
        }
        Ok(result)
    }

    /// Persist the submitted list. The snakes move in a separate step.
    fn record_attribution(
        &self,
        tournament: &Tournament,
        admin_id: &str,
        hole: u8,
        player_ids: &[PlayerId],
    ) -> Result<u64, SettlementError> {
        let store = self.store.as_ref();
        let existing = game_store::load_attribution(store, &tournament.id, hole)?;
        let attribution = ThreePuttAttribution {
            tournament_id: tournament.id.clone(),
            hole,
            player_ids: player_ids.to_vec(),
            submitted_by: admin_id.to_string(),
            revision: existing.as_ref().map_or(1, |v| v.record.revision + 1),
            applied_revision: existing.as_ref().map_or(0, |v| v.record.applied_revision),
        };
        store.commit(&[GuardedWrite::put(
            game_store::putts_key(&tournament.id, hole),
            existing.as_ref().map(|v| v.version),
            &attribution,
        )?])?;
        Ok(attribution.revision)
    }

    fn apply_attribution(
        &self,
        tournament: &Tournament,
        hole: u8,
    ) -> Result<Vec<SnakeTransition>, SettlementError> {
        let (transitions, writes) = self.attribution_writes(tournament, hole)?;
        if !writes.is_empty() {
            self.store.commit(&writes)?;
        }
        Ok(transitions)
    }

    /// Snake moves for a recorded attribution that has not been applied yet,
    /// plus the write marking it applied
    fn attribution_writes(
        &self,
        tournament: &Tournament,
        hole: u8,
    ) -> StorageResult<(Vec<SnakeTransition>, Vec<GuardedWrite>)> {
        let Some(attribution) = game_store::load_attribution(self.store.as_ref(), &tournament.id, hole)?
        else {
            return Ok((Vec::new(), Vec::new()));
        };
        if attribution.record.is_applied() {
            return Ok((Vec::new(), Vec::new()));
        }

        let (transitions, mut writes) = if tournament.rules.snake_enabled {
            self.snake_writes(tournament, &attribution.record)?
        } else {
            (Vec::new(), Vec::new())
        };
        let mut applied = attribution.record;
        applied.applied_revision = applied.revision;
        writes.push(GuardedWrite::put(
            game_store::putts_key(&tournament.id, hole),
            Some(attribution.version),
            &applied,
        )?);
        Ok((transitions, writes))
    }

    fn snake_writes(
        &self,
        tournament: &Tournament,
        attribution: &ThreePuttAttribution,
    ) -> StorageResult<(Vec<SnakeTransition>, Vec<GuardedWrite>)> {
        let store = self.store.as_ref();
        let tracker = SnakeTracker::new(tournament);
        let mut transitions = Vec::new();
        let mut writes = Vec::new();

        for category in SnakeCategory::ALL {
            let stored = game_store::load_snake(store, &tournament.id, category)?;
            let state = stored.as_ref().map(|v| v.record.clone()).unwrap_or_else(|| {
                SnakeState::new(&tournament.id, category, tournament.rules.snake_value)
            });
            let (transition, next) = tracker.apply(&state, attribution.hole, &attribution.player_ids);
            if let Some(next) = next {
                writes.push(GuardedWrite::put(
                    game_store::snake_key(&tournament.id, category),
                    stored.as_ref().map(|v| v.version),
                    &next,
                )?);
            }
            transitions.push(transition);
        }
        Ok((transitions, writes))
    }
}
