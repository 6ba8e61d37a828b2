//! Three-putt snake tracking.

use crate::games::types::{PlayerId, SnakeCategory, SnakeState, Tournament};
use serde::{Deserialize, Serialize};

/// What one attribution did to one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum SnakeOutcome {
    Updated {
        previous_holder: Option<PlayerId>,
        holder: Option<PlayerId>,
        finalized: bool,
    },
    Unchanged,
    /// The hole is outside the category (front nine vs back nine)
    NotApplicable,
    /// The holder was already set on a later hole
    Stale,
    AlreadyFinal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnakeTransition {
    pub category: SnakeCategory,
    pub hole: u8,
    pub outcome: SnakeOutcome,
}

impl SnakeTransition {
    pub fn is_update(&self) -> bool {
        matches!(self.outcome, SnakeOutcome::Updated { .. })
    }
}

pub struct SnakeTracker<'a> {
    tournament: &'a Tournament,
}

impl<'a> SnakeTracker<'a> {
    pub fn new(tournament: &'a Tournament) -> Self {
        Self { tournament }
    }

    /// Apply a hole's three-putt list to one category.
    ///
    /// `three_putters` is in holed-out order; the last entry takes the snake.
    /// Returns the new state only when it differs from `state`.
    pub fn apply(
        &self,
        state: &SnakeState,
        hole: u8,
        three_putters: &[PlayerId],
    ) -> (SnakeTransition, Option<SnakeState>) {
        let category = state.category;
        let transition = |outcome| SnakeTransition {
            category,
            hole,
            outcome,
        };

        if !category.applies_to(hole) {
            return (transition(SnakeOutcome::NotApplicable), None);
        }
        if state.is_final {
            return (transition(SnakeOutcome::AlreadyFinal), None);
        }
        if hole < state.last_hole_updated {
            return (transition(SnakeOutcome::Stale), None);
        }

        let finalized = hole == category.boundary_hole(self.tournament.rules.holes);
        let mut next = state.clone();
        if let Some(last) = three_putters.last() {
            next.current_holder_id = Some(last.clone());
            next.last_hole_updated = hole;
        }
        if finalized {
            next.is_final = true;
            next.last_hole_updated = hole;
        }

        if next == *state {
            return (transition(SnakeOutcome::Unchanged), None);
        }

        let outcome = SnakeOutcome::Updated {
            previous_holder: state.current_holder_id.clone(),
            holder: next.current_holder_id.clone(),
            finalized,
        };
        (transition(outcome), Some(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::types::TournamentRules;
    use rust_decimal::Decimal;

    fn tournament() -> Tournament {
        Tournament {
            id: "t1".to_string(),
            name: "Snake Open".to_string(),
            rules: TournamentRules::default(),
            entrants: vec!["a".to_string(), "b".to_string()],
            teams: vec![],
            admins: vec!["admin".to_string()],
        }
    }

    fn players(ids: &[&str]) -> Vec<PlayerId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_last_three_putter_takes_snake() {
        let t = tournament();
        let tracker = SnakeTracker::new(&t);
        let state = SnakeState::new("t1", SnakeCategory::Front9, Decimal::ONE);

        let (transition, next) = tracker.apply(&state, 3, &players(&["a", "b"]));
        let next = next.unwrap();
        assert!(transition.is_update());
        assert_eq!(next.current_holder_id.as_deref(), Some("b"));
        assert_eq!(next.last_hole_updated, 3);
        assert!(!next.is_final);
    }

    #[test]
    fn test_no_three_putts_keeps_holder() {
        let t = tournament();
        let tracker = SnakeTracker::new(&t);
        let mut state = SnakeState::new("t1", SnakeCategory::Overall, Decimal::ONE);
        state.current_holder_id = Some("a".to_string());
        state.last_hole_updated = 2;

        let (transition, next) = tracker.apply(&state, 5, &[]);
        assert_eq!(transition.outcome, SnakeOutcome::Unchanged);
        assert!(next.is_none());
    }

    #[test]
    fn test_category_scope() {
        let t = tournament();
        let tracker = SnakeTracker::new(&t);
        let back = SnakeState::new("t1", SnakeCategory::Back9, Decimal::ONE);
        let (transition, _) = tracker.apply(&back, 4, &players(&["a"]));
        assert_eq!(transition.outcome, SnakeOutcome::NotApplicable);

        let front = SnakeState::new("t1", SnakeCategory::Front9, Decimal::ONE);
        let (transition, _) = tracker.apply(&front, 12, &players(&["a"]));
        assert_eq!(transition.outcome, SnakeOutcome::NotApplicable);
    }

    #[test]
    fn test_boundary_finalizes_even_without_three_putts() {
        let t = tournament();
        let tracker = SnakeTracker::new(&t);
        let mut state = SnakeState::new("t1", SnakeCategory::Front9, Decimal::ONE);
        state.current_holder_id = Some("a".to_string());
        state.last_hole_updated = 6;

        let (transition, next) = tracker.apply(&state, 9, &[]);
        let next = next.unwrap();
        assert!(next.is_final);
        assert_eq!(next.current_holder_id.as_deref(), Some("a"));
        assert!(matches!(
            transition.outcome,
            SnakeOutcome::Updated { finalized: true, .. }
        ));
    }

    #[test]
    fn test_back_nine_already_final() {
        let t = tournament();
        let tracker = SnakeTracker::new(&t);
        let state = SnakeState::new("t1", SnakeCategory::Back9, Decimal::ONE);

        let (_, finished) = tracker.apply(&state, 18, &players(&["b"]));
        let finished = finished.unwrap();
        assert!(finished.is_final);

        let (transition, next) = tracker.apply(&finished, 18, &players(&["a"]));
        assert_eq!(transition.outcome, SnakeOutcome::AlreadyFinal);
        assert!(next.is_none());
    }

    #[test]
    fn test_earlier_hole_is_stale() {
        let t = tournament();
        let tracker = SnakeTracker::new(&t);
        let mut state = SnakeState::new("t1", SnakeCategory::Overall, Decimal::ONE);
        state.current_holder_id = Some("a".to_string());
        state.last_hole_updated = 7;

        let (transition, next) = tracker.apply(&state, 5, &players(&["b"]));
        assert_eq!(transition.outcome, SnakeOutcome::Stale);
        assert!(next.is_none());
    }
}
