//! Turns settlement outcomes into per-player notifications.

use crate::games::{
    press::{PressResolution, ResolutionKind},
    skins::{SkinAdjustment, SkinChange},
    snake::{SnakeOutcome, SnakeTransition},
    teams::TeamHoleResult,
    types::{GameNotification, NotificationKind, PlayerId, PressBet, Tournament},
};
use std::collections::HashSet;

/// Everything one settlement run changed
#[derive(Debug, Default)]
pub struct HoleOutcomes<'a> {
    pub team_result: Option<&'a TeamHoleResult>,
    pub skin_changes: &'a [SkinChange],
    pub snake_transitions: &'a [SnakeTransition],
    pub press_resolutions: &'a [PressResolution],
}

pub struct NotificationComposer<'a> {
    tournament: &'a Tournament,
}

/// Recipient, hole, kind and subject: at most one notification per key
type DedupKey = (PlayerId, Option<u8>, NotificationKind, String);

struct Outbox {
    seen: HashSet<DedupKey>,
    notifications: Vec<GameNotification>,
}

impl Outbox {
    fn push(&mut self, subject: &str, notification: GameNotification) {
        let key = (
            notification.recipient_id.clone(),
            notification.hole,
            notification.kind,
            subject.to_string(),
        );
        if self.seen.insert(key) {
            self.notifications.push(notification);
        }
    }
}

fn notify(
    kind: NotificationKind,
    recipient: &str,
    hole: u8,
    message: String,
    players_involved: Vec<PlayerId>,
    is_positive: bool,
) -> GameNotification {
    GameNotification {
        kind,
        recipient_id: recipient.to_string(),
        hole: Some(hole),
        message,
        players_involved,
        is_positive,
    }
}

impl<'a> NotificationComposer<'a> {
    pub fn new(tournament: &'a Tournament) -> Self {
        Self { tournament }
    }

    pub fn compose(&self, hole: u8, outcomes: &HoleOutcomes<'_>) -> Vec<GameNotification> {
        let mut outbox = Outbox {
            seen: HashSet::new(),
            notifications: Vec::new(),
        };

        if let Some(result) = outcomes.team_result {
            self.team(&mut outbox, hole, result);
        }
        for change in outcomes.skin_changes {
            self.skin(&mut outbox, change);
        }
        for transition in outcomes.snake_transitions {
            self.snake(&mut outbox, transition);
        }
        for resolution in outcomes.press_resolutions {
            press(&mut outbox, hole, resolution);
        }

        outbox.notifications
    }

    fn team(&self, outbox: &mut Outbox, hole: u8, result: &TeamHoleResult) {
        let subject = format!("team-hole-{}", hole);
        for team in &self.tournament.teams {
            let (message, positive) = match result {
                TeamHoleResult::Won {
                    team_id,
                    team_score,
                } if *team_id == team.id => (
                    format!("{} won hole {} with {}", team.name, hole, team_score),
                    true,
                ),
                TeamHoleResult::Won {
                    team_id,
                    team_score,
                } => (
                    format!("{} lost hole {} to a {} from {}", team.name, hole, team_score, team_id),
                    false,
                ),
                TeamHoleResult::Halved { team_score, .. } => (
                    format!("Hole {} halved at {}", hole, team_score),
                    false,
                ),
            };
            for member in &team.members {
                outbox.push(
                    &subject,
                    notify(
                        NotificationKind::Team,
                        member,
                        hole,
                        message.clone(),
                        team.members.clone(),
                        positive,
                    ),
                );
            }
        }
    }

    fn skin(&self, outbox: &mut Outbox, change: &SkinChange) {
        let hole = change.hole();
        let subject = format!("skin-{}", hole);
        match change {
            SkinChange::Awarded(record) => {
                if let Some(winner) = &record.winner_id {
                    outbox.push(
                        &subject,
                        notify(
                            NotificationKind::Skins,
                            winner,
                            hole,
                            format!("You won the hole {} skin ({})", hole, record.pot_amount),
                            vec![winner.clone()],
                            true,
                        ),
                    );
                }
            }
            SkinChange::CarriedOver(record) => {
                for player in &self.tournament.entrants {
                    outbox.push(
                        &subject,
                        notify(
                            NotificationKind::Skins,
                            player,
                            hole,
                            format!(
                                "Hole {} skin carries over, {} now riding",
                                hole, record.pot_amount
                            ),
                            self.tournament.entrants.clone(),
                            false,
                        ),
                    );
                }
            }
            SkinChange::Adjusted(adjustment) => {
                let previous = adjustment.previous.winner_id.as_ref();
                let current = adjustment.current.as_ref().and_then(|r| r.winner_id.as_ref());
                if previous == current {
                    self.skin_repriced(outbox, &subject, adjustment);
                    return;
                }
                let involved: Vec<PlayerId> = previous.into_iter().chain(current).cloned().collect();
                if let Some(lost) = previous {
                    outbox.push(
                        &subject,
                        notify(
                            NotificationKind::Skins,
                            lost,
                            hole,
                            format!("Score correction: the hole {} skin is no longer yours", hole),
                            involved.clone(),
                            false,
                        ),
                    );
                }
                if let (Some(gained), Some(record)) = (current, &adjustment.current) {
                    outbox.push(
                        &subject,
                        notify(
                            NotificationKind::Skins,
                            gained,
                            hole,
                            format!(
                                "Score correction: you won the hole {} skin ({})",
                                hole, record.pot_amount
                            ),
                            involved,
                            true,
                        ),
                    );
                }
            }
        }
    }

    /// Same winner, different pot: a correction earlier in the chain moved
    /// the carryover
    fn skin_repriced(&self, outbox: &mut Outbox, subject: &str, adjustment: &SkinAdjustment) {
        let Some(current) = &adjustment.current else {
            return;
        };
        let Some(winner) = &current.winner_id else {
            return;
        };
        let before = adjustment.previous.pot_amount;
        if before == current.pot_amount {
            return;
        }
        outbox.push(
            subject,
            notify(
                NotificationKind::Skins,
                winner,
                adjustment.hole,
                format!(
                    "Score correction: the hole {} skin is now worth {} (was {})",
                    adjustment.hole, current.pot_amount, before
                ),
                vec![winner.clone()],
                current.pot_amount > before,
            ),
        );
    }

    fn snake(&self, outbox: &mut Outbox, transition: &SnakeTransition) {
        let SnakeOutcome::Updated {
            previous_holder,
            holder,
            finalized,
        } = &transition.outcome
        else {
            return;
        };
        let hole = transition.hole;
        let label = transition.category.label();
        let subject = format!("snake-{}", transition.category);
        let involved: Vec<PlayerId> = previous_holder.iter().chain(holder.iter()).cloned().collect();

        if let Some(holder) = holder {
            let message = if *finalized {
                format!(
                    "You finished holding the {} and owe {}",
                    label, self.tournament.rules.snake_value
                )
            } else {
                format!("You three-putted hole {} and now hold the {}", hole, label)
            };
            outbox.push(
                &subject,
                notify(NotificationKind::Snake, holder, hole, message, involved.clone(), false),
            );
        }
        if let Some(previous) = previous_holder.as_ref().filter(|p| Some(*p) != holder.as_ref()) {
            outbox.push(
                &subject,
                notify(
                    NotificationKind::Snake,
                    previous,
                    hole,
                    format!("You passed the {}", label),
                    involved,
                    true,
                ),
            );
        }
    }
}

fn press(outbox: &mut Outbox, hole: u8, resolution: &PressResolution) {
    let bet = &resolution.bet;
    let subject = format!("press-{}", bet.id);
    let involved = vec![bet.initiator_id.clone(), bet.target_id.clone()];
    let correction = matches!(resolution.kind, ResolutionKind::Adjusted { .. });
    let prefix = if correction { "Score correction: " } else { "" };

    for player in [&bet.initiator_id, &bet.target_id] {
        let opponent = bet.opponent_of(player);
        let (message, positive) = match &bet.winner_id {
            None => (
                format!("{}your {} press with {} is a push", prefix, bet.bet_type, opponent),
                false,
            ),
            Some(winner) if winner == player => (
                format!(
                    "{}you won your {} press against {} ({})",
                    prefix, bet.bet_type, opponent, bet.amount
                ),
                true,
            ),
            Some(_) => (
                format!(
                    "{}you lost your {} press to {} ({})",
                    prefix, bet.bet_type, opponent, bet.amount
                ),
                false,
            ),
        };
        outbox.push(
            &subject,
            notify(
                NotificationKind::Press,
                player,
                hole,
                capitalize(&message),
                involved.clone(),
                positive,
            ),
        );
    }
}

/// Notifications for a measured bet decided outside a hole settlement
pub fn measured_press_notifications(bet: &PressBet) -> Vec<GameNotification> {
    let mut outbox = Outbox {
        seen: HashSet::new(),
        notifications: Vec::new(),
    };
    let resolution = PressResolution {
        bet: bet.clone(),
        kind: if bet.winner_id.is_some() {
            ResolutionKind::Won
        } else {
            ResolutionKind::Pushed
        },
    };
    press(&mut outbox, bet.start_hole, &resolution);
    outbox.notifications
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
