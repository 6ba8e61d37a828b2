//! Press bet lifecycle: create, accept, decline, measure and expire.

use crate::{
    clock::Clock,
    errors::{FairwayResult, PressError, StorageResult, ValidationError},
    game_store,
    games::{
        notifications::measured_press_notifications,
        press,
        types::{BetType, GameNotification, PlayerId, PressBet, PressStatus, TournamentId},
    },
    storage::{GuardedWrite, KvStore, Versioned},
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Press proposal from the initiator
#[derive(Debug, Clone)]
pub struct NewPress {
    pub tournament_id: TournamentId,
    pub initiator_id: PlayerId,
    pub target_id: PlayerId,
    pub amount: Decimal,
    pub bet_type: BetType,
    pub win_condition: String,
    pub start_hole: i64,
}

/// A measured press decided by external shot data
#[derive(Debug, Clone)]
pub struct MeasuredOutcome {
    pub bet: PressBet,
    pub notifications: Vec<GameNotification>,
}

pub struct PressBook {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    window: chrono::Duration,
}

impl PressBook {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, window: chrono::Duration) -> Self {
        Self {
            store,
            clock,
            window,
        }
    }

    pub fn create_press(&self, request: NewPress) -> FairwayResult<PressBet> {
        let store = self.store.as_ref();
        let tournament = game_store::load_tournament(store, &request.tournament_id)?
            .ok_or_else(|| ValidationError::UnknownTournament(request.tournament_id.clone()))?;

        if request.initiator_id == request.target_id {
            return Err(ValidationError::SelfPress.into());
        }
        for player in [&request.initiator_id, &request.target_id] {
            if !tournament.is_entrant(player) {
                return Err(ValidationError::NotAnEntrant {
                    tournament_id: tournament.id.clone(),
                    player_id: player.clone(),
                }
                .into());
            }
        }
        if request.amount <= Decimal::ZERO {
            return Err(ValidationError::InvalidAmount(request.amount).into());
        }
        let start_hole = tournament.validate_hole(request.start_hole)?;

        let now = self.clock.now();
        let bet = PressBet {
            id: Uuid::new_v4().to_string(),
            tournament_id: tournament.id,
            initiator_id: request.initiator_id,
            target_id: request.target_id,
            amount: request.amount,
            bet_type: request.bet_type,
            win_condition: request.win_condition,
            start_hole,
            status: PressStatus::Pending,
            created_at: now,
            expires_at: now + self.window,
            winner_id: None,
            completed_at: None,
        };
        store.commit(&game_store::new_press_writes(&bet)?)?;

        info!(
            bet_id = %bet.id,
            tournament_id = %bet.tournament_id,
            bet_type = %bet.bet_type,
            "💰 Press created"
        );
        Ok(bet)
    }

    pub fn get_press(&self, bet_id: &str) -> FairwayResult<PressBet> {
        Ok(self.load(bet_id)?.record)
    }

    pub fn accept_press(&self, bet_id: &str, actor_id: &str) -> FairwayResult<PressBet> {
        self.answer(bet_id, actor_id, PressStatus::Active, "accept")
    }

    pub fn decline_press(&self, bet_id: &str, actor_id: &str) -> FairwayResult<PressBet> {
        self.answer(bet_id, actor_id, PressStatus::Declined, "decline")
    }

    fn answer(
        &self,
        bet_id: &str,
        actor_id: &str,
        next: PressStatus,
        action: &str,
    ) -> FairwayResult<PressBet> {
        let current = self.load(bet_id)?;
        let bet = &current.record;
        if bet.target_id != actor_id {
            return Err(PressError::NotTarget(bet_id.to_string()).into());
        }

        match bet.effective_status(self.clock.now()) {
            PressStatus::Pending => {
                let mut updated = bet.clone();
                updated.status = next;
                self.store
                    .commit(&[game_store::press_write(&current, &updated)?])?;
                info!(bet_id, status = %next, "Press answered");
                Ok(updated)
            }
            PressStatus::Expired => {
                if bet.status == PressStatus::Pending {
                    self.persist_expiry(&current)?;
                }
                Err(PressError::Expired(bet_id.to_string()).into())
            }
            status => Err(PressError::InvalidTransition {
                id: bet_id.to_string(),
                status: status.to_string(),
                action: action.to_string(),
            }
            .into()),
        }
    }

    /// Settle a closest-to-pin or longest-drive press. `winner_id = None` is a push.
    pub fn record_measurement(
        &self,
        bet_id: &str,
        winner_id: Option<PlayerId>,
    ) -> FairwayResult<MeasuredOutcome> {
        let current = self.load(bet_id)?;
        let bet = &current.record;
        if !bet.bet_type.is_measured() {
            return Err(PressError::NotMeasured(bet_id.to_string()).into());
        }
        let status = bet.effective_status(self.clock.now());
        if status != PressStatus::Active {
            return Err(PressError::InvalidTransition {
                id: bet_id.to_string(),
                status: status.to_string(),
                action: "record a measurement".to_string(),
            }
            .into());
        }
        if let Some(winner) = winner_id.as_deref().filter(|w| !bet.involves(w)) {
            return Err(ValidationError::NotAnEntrant {
                tournament_id: bet.tournament_id.clone(),
                player_id: winner.to_string(),
            }
            .into());
        }

        let done = press::complete(bet, winner_id, self.clock.now());
        self.store.commit(&[game_store::press_write(&current, &done)?])?;
        info!(bet_id, winner = ?done.winner_id, "📏 Measured press settled");

        Ok(MeasuredOutcome {
            notifications: measured_press_notifications(&done),
            bet: done,
        })
    }

    /// Mark every unanswered press past its deadline as expired
    pub fn sweep_expired(&self) -> FairwayResult<u32> {
        let now = self.clock.now();
        let mut expired = 0;
        for press in game_store::load_all_presses(self.store.as_ref())? {
            if press.record.status != PressStatus::Pending
                || press.record.effective_status(now) != PressStatus::Expired
            {
                continue;
            }
            match self.persist_expiry(&press) {
                Ok(()) => expired += 1,
                // Someone answered or expired it concurrently
                Err(e) if e.is_conflict() => {
                    debug!(bet_id = %press.record.id, "Press changed during sweep")
                }
                Err(e) => return Err(e.into()),
            }
        }
        if expired > 0 {
            info!(expired, "⏰ Expired unanswered presses");
        }
        Ok(expired)
    }

    pub fn spawn_expiry_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep_expired() {
                    error!("❌ Press expiry sweep failed: {}", e);
                }
            }
        })
    }

    fn load(&self, bet_id: &str) -> FairwayResult<Versioned<PressBet>> {
        game_store::load_press(self.store.as_ref(), bet_id)?
            .ok_or_else(|| PressError::NotFound(bet_id.to_string()).into())
    }

    fn persist_expiry(&self, current: &Versioned<PressBet>) -> StorageResult<()> {
        let mut expired = current.record.clone();
        expired.status = PressStatus::Expired;
        self.store
            .commit(&[game_store::press_write(current, &expired)?])
    }
}

/// Writes expiring every pending press in `presses` whose deadline passed
pub fn expiry_writes(
    presses: &[Versioned<PressBet>],
    now: chrono::DateTime<chrono::Utc>,
) -> StorageResult<Vec<GuardedWrite>> {
    presses
        .iter()
        .filter(|p| {
            p.record.status == PressStatus::Pending
                && p.record.effective_status(now) == PressStatus::Expired
        })
        .map(|p| {
            let mut expired = p.record.clone();
            expired.status = PressStatus::Expired;
            game_store::press_write(p, &expired)
        })
        .collect()
}
