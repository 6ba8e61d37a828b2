//! Press bet resolution.
//!
//! Every bet type maps to exactly one [`BetRule`] through an exhaustive match,
//! so a new bet type does not compile until it has a rule.

use crate::games::{
    scorecard::ScoreSheet,
    types::{BetType, PlayerId, PressBet, PressStatus, Tournament, TournamentRules},
};
use chrono::{DateTime, Utc};
use std::ops::RangeInclusive;

/// What the current scores say about one bet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Not enough holes posted yet
    Pending,
    /// Waits on a measurement outside stroke counts
    Deferred,
    Won(PlayerId),
    Push,
}

impl Verdict {
    pub fn is_decided(&self) -> bool {
        matches!(self, Verdict::Won(_) | Verdict::Push)
    }

    fn winner(&self) -> Option<&PlayerId> {
        match self {
            Verdict::Won(p) => Some(p),
            _ => None,
        }
    }
}

pub trait BetRule: Send + Sync {
    /// Holes whose scores decide the bet
    fn holes(&self, bet: &PressBet, rules: &TournamentRules) -> RangeInclusive<u8>;

    fn evaluate(&self, bet: &PressBet, sheet: &ScoreSheet, rules: &TournamentRules) -> Verdict;
}

pub struct ThisHoleRule;

impl BetRule for ThisHoleRule {
    fn holes(&self, bet: &PressBet, _rules: &TournamentRules) -> RangeInclusive<u8> {
        bet.start_hole..=bet.start_hole
    }

    fn evaluate(&self, bet: &PressBet, sheet: &ScoreSheet, _rules: &TournamentRules) -> Verdict {
        let initiator = sheet.strokes(&bet.initiator_id, bet.start_hole);
        let target = sheet.strokes(&bet.target_id, bet.start_hole);
        match (initiator, target) {
            (Some(i), Some(t)) => compare(bet, i, t),
            _ => Verdict::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeAnchor {
    StartHole,
    FullRound,
}

/// Cumulative strokes over a hole range
pub struct StrokeRangeRule {
    pub anchor: RangeAnchor,
}

impl BetRule for StrokeRangeRule {
    fn holes(&self, bet: &PressBet, rules: &TournamentRules) -> RangeInclusive<u8> {
        match self.anchor {
            RangeAnchor::StartHole => bet.start_hole..=rules.holes,
            RangeAnchor::FullRound => 1..=rules.holes,
        }
    }

    fn evaluate(&self, bet: &PressBet, sheet: &ScoreSheet, rules: &TournamentRules) -> Verdict {
        let range = self.holes(bet, rules);
        let (i_total, i_missing) = sheet.total_over(&bet.initiator_id, range.clone());
        let (t_total, t_missing) = sheet.total_over(&bet.target_id, range);

        if i_missing == 0 && t_missing == 0 {
            return compare(bet, i_total, t_total);
        }

        let Some(cap) = rules.max_strokes_per_hole else {
            return Verdict::Pending;
        };
        if is_insurmountable((i_total, i_missing), (t_total, t_missing), cap) {
            Verdict::Won(bet.initiator_id.clone())
        } else if is_insurmountable((t_total, t_missing), (i_total, i_missing), cap) {
            Verdict::Won(bet.target_id.clone())
        } else {
            Verdict::Pending
        }
    }
}

/// True when the trailer's best finish (one stroke per unplayed hole) still
/// loses to the leader's worst finish (the cap on every unplayed hole).
pub fn is_insurmountable(leader: (u64, u32), trailer: (u64, u32), cap: u32) -> bool {
    let (lead_total, lead_missing) = leader;
    let (trail_total, trail_missing) = trailer;
    let trailer_best = trail_total + u64::from(trail_missing);
    let leader_worst = lead_total + u64::from(cap) * u64::from(lead_missing);
    trailer_best > leader_worst
}

/// Closest-to-pin and longest-drive, settled by `record_measurement`
pub struct MeasuredRule;

impl BetRule for MeasuredRule {
    fn holes(&self, bet: &PressBet, _rules: &TournamentRules) -> RangeInclusive<u8> {
        bet.start_hole..=bet.start_hole
    }

    fn evaluate(&self, _bet: &PressBet, _sheet: &ScoreSheet, _rules: &TournamentRules) -> Verdict {
        Verdict::Deferred
    }
}

static THIS_HOLE: ThisHoleRule = ThisHoleRule;
static FROM_START_HOLE: StrokeRangeRule = StrokeRangeRule {
    anchor: RangeAnchor::StartHole,
};
static FULL_ROUND: StrokeRangeRule = StrokeRangeRule {
    anchor: RangeAnchor::FullRound,
};
static MEASURED: MeasuredRule = MeasuredRule;

impl BetType {
    pub fn rule(&self) -> &'static dyn BetRule {
        match self {
            BetType::ThisHole => &THIS_HOLE,
            BetType::HeadToHead | BetType::RemainingHoles => &FROM_START_HOLE,
            BetType::TotalStrokes => &FULL_ROUND,
            BetType::ClosestToPin | BetType::LongestDrive => &MEASURED,
        }
    }
}

fn compare<T: Ord>(bet: &PressBet, initiator: T, target: T) -> Verdict {
    match initiator.cmp(&target) {
        std::cmp::Ordering::Less => Verdict::Won(bet.initiator_id.clone()),
        std::cmp::Ordering::Greater => Verdict::Won(bet.target_id.clone()),
        std::cmp::Ordering::Equal => Verdict::Push,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionKind {
    Won,
    Pushed,
    /// A completed bet whose outcome changed after a score correction
    Adjusted { previous_winner: Option<PlayerId> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PressResolution {
    /// The bet as it should be stored
    pub bet: PressBet,
    pub kind: ResolutionKind,
}

pub struct PressResolver<'a> {
    tournament: &'a Tournament,
}

impl<'a> PressResolver<'a> {
    pub fn new(tournament: &'a Tournament) -> Self {
        Self { tournament }
    }

    /// Evaluate one bet after `hole` changed.
    ///
    /// Active bets complete when their rule decides them. Completed
    /// stroke-driven bets whose range covers `hole` are re-checked and
    /// adjusted if the outcome moved. Everything else is left alone.
    pub fn resolve(
        &self,
        bet: &PressBet,
        sheet: &ScoreSheet,
        hole: u8,
        now: DateTime<Utc>,
    ) -> Option<PressResolution> {
        let rules = &self.tournament.rules;
        let rule = bet.bet_type.rule();

        match bet.effective_status(now) {
            PressStatus::Active => {
                let verdict = rule.evaluate(bet, sheet, rules);
                if !verdict.is_decided() {
                    return None;
                }
                let kind = match verdict {
                    Verdict::Push => ResolutionKind::Pushed,
                    _ => ResolutionKind::Won,
                };
                Some(PressResolution {
                    bet: complete(bet, verdict.winner().cloned(), now),
                    kind,
                })
            }
            PressStatus::Completed if !bet.bet_type.is_measured() => {
                if !rule.holes(bet, rules).contains(&hole) {
                    return None;
                }
                let verdict = rule.evaluate(bet, sheet, rules);
                if !verdict.is_decided() || verdict.winner() == bet.winner_id.as_ref() {
                    return None;
                }
                let mut updated = bet.clone();
                updated.winner_id = verdict.winner().cloned();
                Some(PressResolution {
                    bet: updated,
                    kind: ResolutionKind::Adjusted {
                        previous_winner: bet.winner_id.clone(),
                    },
                })
            }
            _ => None,
        }
    }
}

/// Completed copy of an active bet
pub fn complete(bet: &PressBet, winner_id: Option<PlayerId>, now: DateTime<Utc>) -> PressBet {
    let mut done = bet.clone();
    done.status = PressStatus::Completed;
    done.winner_id = winner_id;
    done.completed_at = Some(now);
    done
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn tournament(cap: Option<u32>) -> Tournament {
        Tournament {
            id: "t1".to_string(),
            name: "Press Cup".to_string(),
            rules: TournamentRules {
                holes: 9,
                max_strokes_per_hole: cap,
                ..Default::default()
            },
            entrants: vec!["a".to_string(), "b".to_string()],
            teams: vec![],
            admins: vec![],
        }
    }

    fn bet(bet_type: BetType, start_hole: u8) -> PressBet {
        let now = Utc::now();
        PressBet {
            id: "p1".to_string(),
            tournament_id: "t1".to_string(),
            initiator_id: "a".to_string(),
            target_id: "b".to_string(),
            amount: Decimal::from(10),
            bet_type,
            win_condition: "low score".to_string(),
            start_hole,
            status: PressStatus::Active,
            created_at: now,
            expires_at: now + Duration::minutes(5),
            winner_id: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_this_hole_lower_wins() {
        let t = tournament(None);
        let mut sheet = ScoreSheet::new();
        sheet.record("a", 7, 4);
        let b = bet(BetType::ThisHole, 7);
        assert_eq!(BetType::ThisHole.rule().evaluate(&b, &sheet, &t.rules), Verdict::Pending);

        sheet.record("b", 7, 5);
        let resolution = PressResolver::new(&t).resolve(&b, &sheet, 7, Utc::now()).unwrap();
        assert_eq!(resolution.kind, ResolutionKind::Won);
        assert_eq!(resolution.bet.status, PressStatus::Completed);
        assert_eq!(resolution.bet.winner_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_this_hole_push_has_no_winner() {
        let t = tournament(None);
        let mut sheet = ScoreSheet::new();
        sheet.record("a", 2, 4);
        sheet.record("b", 2, 4);
        let resolution = PressResolver::new(&t)
            .resolve(&bet(BetType::ThisHole, 2), &sheet, 2, Utc::now())
            .unwrap();
        assert_eq!(resolution.kind, ResolutionKind::Pushed);
        assert!(resolution.bet.is_push());
    }

    #[test]
    fn test_remaining_holes_waits_for_last_hole() {
        let t = tournament(None);
        let mut sheet = ScoreSheet::new();
        for hole in 5..=8 {
            sheet.record("a", hole, 3);
            sheet.record("b", hole, 6);
        }
        sheet.record("a", 9, 3);
        let b = bet(BetType::RemainingHoles, 5);
        // Without a stroke cap no lead is certain
        assert_eq!(BetType::RemainingHoles.rule().evaluate(&b, &sheet, &t.rules), Verdict::Pending);

        sheet.record("b", 9, 4);
        assert_eq!(
            BetType::RemainingHoles.rule().evaluate(&b, &sheet, &t.rules),
            Verdict::Won("a".to_string())
        );
    }

    #[test]
    fn test_total_strokes_covers_full_round() {
        let t = tournament(None);
        let mut sheet = ScoreSheet::new();
        for hole in 1..=9 {
            sheet.record("a", hole, 4);
            sheet.record("b", hole, 4);
        }
        sheet.record("a", 1, 6);
        let b = bet(BetType::TotalStrokes, 5);
        assert_eq!(
            BetType::TotalStrokes.rule().evaluate(&b, &sheet, &t.rules),
            Verdict::Won("b".to_string())
        );
        assert_eq!(BetType::TotalStrokes.rule().holes(&b, &t.rules), 1..=9);
    }

    #[test]
    fn test_insurmountable_lead_with_cap() {
        let t = tournament(Some(8));
        let mut sheet = ScoreSheet::new();
        for hole in 1..=8 {
            sheet.record("a", hole, 3);
            sheet.record("b", hole, 8);
        }
        let b = bet(BetType::HeadToHead, 1);
        // a: 24 + up to 8 more, b: 64 + at least 1 more
        assert_eq!(
            BetType::HeadToHead.rule().evaluate(&b, &sheet, &t.rules),
            Verdict::Won("a".to_string())
        );
    }

    #[test]
    fn test_lead_within_reach_stays_pending() {
        let t = tournament(Some(8));
        let mut sheet = ScoreSheet::new();
        for hole in 1..=8 {
            sheet.record("a", hole, 4);
            sheet.record("b", hole, 4);
        }
        sheet.record("a", 1, 6);
        let b = bet(BetType::HeadToHead, 1);
        assert_eq!(BetType::HeadToHead.rule().evaluate(&b, &sheet, &t.rules), Verdict::Pending);
    }

    #[test]
    fn test_insurmountable_is_symmetric() {
        assert!(is_insurmountable((20, 1), (30, 1), 8));
        assert!(!is_insurmountable((30, 1), (20, 1), 8));
        // Tie still possible: 20 + 8 = 28 vs 27 + 1 = 28
        assert!(!is_insurmountable((20, 1), (27, 1), 8));
    }

    #[test]
    fn test_measured_bets_are_deferred() {
        let t = tournament(None);
        let mut sheet = ScoreSheet::new();
        sheet.record("a", 3, 2);
        sheet.record("b", 3, 5);
        let b = bet(BetType::ClosestToPin, 3);
        assert_eq!(BetType::ClosestToPin.rule().evaluate(&b, &sheet, &t.rules), Verdict::Deferred);
        assert!(PressResolver::new(&t).resolve(&b, &sheet, 3, Utc::now()).is_none());
    }

    #[test]
    fn test_pending_and_expired_are_not_resolved() {
        let t = tournament(None);
        let mut sheet = ScoreSheet::new();
        sheet.record("a", 1, 3);
        sheet.record("b", 1, 4);
        let mut b = bet(BetType::ThisHole, 1);
        b.status = PressStatus::Pending;
        let resolver = PressResolver::new(&t);
        assert!(resolver.resolve(&b, &sheet, 1, Utc::now()).is_none());
        assert!(resolver
            .resolve(&b, &sheet, 1, Utc::now() + Duration::hours(1))
            .is_none());
    }

    #[test]
    fn test_correction_adjusts_completed_bet() {
        let t = tournament(None);
        let mut sheet = ScoreSheet::new();
        sheet.record("a", 4, 3);
        sheet.record("b", 4, 4);
        let resolver = PressResolver::new(&t);
        let done = resolver
            .resolve(&bet(BetType::ThisHole, 4), &sheet, 4, Utc::now())
            .unwrap()
            .bet;

        // Unchanged scores: nothing to do
        assert!(resolver.resolve(&done, &sheet, 4, Utc::now()).is_none());

        sheet.record("a", 4, 5);
        let adjusted = resolver.resolve(&done, &sheet, 4, Utc::now()).unwrap();
        assert_eq!(
            adjusted.kind,
            ResolutionKind::Adjusted {
                previous_winner: Some("a".to_string())
            }
        );
        assert_eq!(adjusted.bet.winner_id.as_deref(), Some("b"));
        assert_eq!(adjusted.bet.status, PressStatus::Completed);

        // Corrections on other holes leave it alone
        assert!(resolver.resolve(&done, &sheet, 5, Utc::now()).is_none());
    }
}
