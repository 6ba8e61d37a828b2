//! End-to-end settlement scenarios over the in-memory store

use chrono::{Duration, Utc};
use fairway::{
    config::SettlementConfig,
    errors::{FairwayError, PressError},
    game_store,
    games::{
        skins::{distributed_total, outstanding_pot},
        types::{
            BetType, GameType, NotificationKind, PressStatus, SettlementResult, SkinRecord,
            Team, Tournament, TournamentRules,
        },
    },
    ingest::TracingSink,
    storage::{KvStore, MemoryStorage},
    Actor, HoleScoreIngestor, ManualClock, NewPress, PressBook, ScoreFeed, SettlementCoordinator,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

struct Course {
    store: Arc<dyn KvStore>,
    clock: ManualClock,
    coordinator: Arc<SettlementCoordinator>,
    ingestor: Arc<HoleScoreIngestor>,
    presses: PressBook,
    rounds: HashMap<String, String>,
}

impl Course {
    fn open(tournament: Tournament, max_conflict_retries: u32) -> Self {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStorage::new());
        let clock = ManualClock::new(Utc::now());
        let config = SettlementConfig {
            max_conflict_retries,
            ..Default::default()
        };
        game_store::store_tournament(store.as_ref(), &tournament).unwrap();

        let coordinator = Arc::new(SettlementCoordinator::new(
            store.clone(),
            Arc::new(clock.clone()),
            &config,
        ));
        let ingestor = Arc::new(HoleScoreIngestor::new(
            store.clone(),
            coordinator.clone(),
            ScoreFeed::default(),
            Arc::new(TracingSink),
            Arc::new(clock.clone()),
        ));
        let presses = PressBook::new(store.clone(), Arc::new(clock.clone()), Duration::minutes(5));

        let rounds = tournament
            .entrants
            .iter()
            .map(|p| (p.clone(), ingestor.join(&tournament.id, p).unwrap().id))
            .collect();

        Self {
            store,
            clock,
            coordinator,
            ingestor,
            presses,
            rounds,
        }
    }

    async fn score(&self, player: &str, hole: i64, strokes: i64) -> SettlementResult {
        self.ingestor
            .apply_score(&Actor::player(player), &self.rounds[player], hole, strokes)
            .await
            .unwrap()
            .settlement()
            .await
            .unwrap()
    }

    fn chain(&self, tournament_id: &str) -> Vec<SkinRecord> {
        game_store::load_skin_chain(self.store.as_ref(), tournament_id)
            .unwrap()
            .into_iter()
            .map(|v| v.record)
            .collect()
    }

    fn press(&self, initiator: &str, target: &str, bet_type: BetType, start_hole: i64) -> String {
        let bet = self
            .presses
            .create_press(NewPress {
                tournament_id: "open".to_string(),
                initiator_id: initiator.to_string(),
                target_id: target.to_string(),
                amount: Decimal::from(20),
                bet_type,
                win_condition: "low net".to_string(),
                start_hole,
            })
            .unwrap();
        bet.id
    }
}

fn tournament(players: &[&str], skin_value: i64) -> Tournament {
    Tournament {
        id: "open".to_string(),
        name: "Saturday Open".to_string(),
        rules: TournamentRules {
            skin_value: Decimal::from(skin_value),
            ..Default::default()
        },
        entrants: players.iter().map(|p| p.to_string()).collect(),
        teams: vec![],
        admins: vec!["pro".to_string()],
    }
}

#[tokio::test]
async fn test_hole_seven_press_resolves_when_field_completes() {
    let course = Course::open(tournament(&["a", "b"], 5), 3);
    let bet_id = course.press("a", "b", BetType::ThisHole, 7);
    course.presses.accept_press(&bet_id, "b").unwrap();

    let partial = course.score("a", 7, 4).await;
    assert_eq!(partial.resolved_count, 0);

    let settled = course.score("b", 7, 5).await;
    assert_eq!(settled.resolved_count, 1);
    assert_eq!(settled.summary_text(), "1 won");

    let bet = course.presses.get_press(&bet_id).unwrap();
    assert_eq!(bet.status, PressStatus::Completed);
    assert_eq!(bet.winner_id.as_deref(), Some("a"));

    let press_notes: Vec<_> = settled
        .notifications
        .iter()
        .filter(|n| n.kind == NotificationKind::Press)
        .collect();
    assert_eq!(press_notes.len(), 2);
    assert!(press_notes.iter().any(|n| n.recipient_id == "a" && n.is_positive));
    assert!(press_notes.iter().any(|n| n.recipient_id == "b" && !n.is_positive));
}

#[tokio::test]
async fn test_press_accepted_after_the_hole_is_in_settles_on_accept() {
    let course = Course::open(tournament(&["a", "b"], 5), 3);
    course.score("a", 4, 5).await;
    course.score("b", 4, 3).await;

    let bet_id = course.press("a", "b", BetType::ThisHole, 4);
    let accepted = course.presses.accept_press(&bet_id, "b").unwrap();
    assert_eq!(accepted.status, PressStatus::Active);

    let result = course.coordinator.settle_accepted(&accepted).await.unwrap();
    assert_eq!(result.resolved_count, 1);
    let bet = course.presses.get_press(&bet_id).unwrap();
    assert_eq!(bet.status, PressStatus::Completed);
    assert_eq!(bet.winner_id.as_deref(), Some("b"));
}

#[tokio::test]
async fn test_skins_carry_for_three_holes() {
    let course = Course::open(tournament(&["a", "b", "c"], 5), 3);

    for (hole, scores) in [(1, [3, 3, 4]), (2, [4, 4, 4]), (3, [3, 4, 5])] {
        for (player, strokes) in ["a", "b", "c"].iter().zip(scores) {
            course.score(player, hole, strokes).await;
        }
    }

    let chain = course.chain("open");
    assert_eq!(chain.len(), 3);
    assert!(chain[0].is_carried_over && chain[1].is_carried_over);
    assert_eq!(chain[2].winner_id.as_deref(), Some("a"));
    assert_eq!(chain[2].pot_amount, Decimal::from(15));
    assert_eq!(distributed_total(&chain), Decimal::from(15));
    assert_eq!(outstanding_pot(&chain), Decimal::ZERO);
}

#[tokio::test]
async fn test_score_correction_moves_the_pot() {
    let course = Course::open(tournament(&["a", "b"], 5), 3);
    course.score("a", 1, 3).await;
    course.score("b", 1, 4).await;
    course.score("a", 2, 4).await;
    course.score("b", 2, 4).await;

    let before = course.chain("open");
    assert_eq!(before[0].winner_id.as_deref(), Some("a"));
    let total_before = distributed_total(&before) + outstanding_pot(&before);

    // b's hole-one score was a 3 all along
    let corrected = course.score("b", 1, 3).await;
    let after = course.chain("open");
    assert!(after[0].is_carried_over);
    assert_eq!(after[1].pot_amount, Decimal::from(10));
    assert_eq!(distributed_total(&after), Decimal::ZERO);
    assert_eq!(distributed_total(&after) + outstanding_pot(&after), total_before);

    assert!(corrected
        .notifications
        .iter()
        .any(|n| n.kind == NotificationKind::Skins && n.recipient_id == "a" && !n.is_positive));
}

#[tokio::test]
async fn test_correction_that_shrinks_a_carried_pot_tells_the_winner() {
    let course = Course::open(tournament(&["a", "b"], 5), 3);
    course.score("a", 1, 4).await;
    course.score("b", 1, 4).await;
    course.score("a", 2, 3).await;
    course.score("b", 2, 4).await;
    assert_eq!(course.chain("open")[1].pot_amount, Decimal::from(10));

    // b actually made a 3 on hole one
    let corrected = course.score("b", 1, 3).await;
    let after = course.chain("open");
    assert_eq!(after[0].winner_id.as_deref(), Some("b"));
    assert_eq!(after[1].winner_id.as_deref(), Some("a"));
    assert_eq!(after[1].pot_amount, Decimal::from(5));

    let repriced = corrected
        .notifications
        .iter()
        .find(|n| n.kind == NotificationKind::Skins && n.recipient_id == "a" && n.hole == Some(2))
        .unwrap();
    assert!(!repriced.is_positive);
    assert!(corrected
        .notifications
        .iter()
        .any(|n| n.kind == NotificationKind::Skins && n.recipient_id == "b" && n.is_positive));
}

#[tokio::test]
async fn test_unanswered_press_expires_on_next_settlement() {
    let course = Course::open(tournament(&["a", "b"], 5), 3);
    let bet_id = course.press("a", "b", BetType::HeadToHead, 1);

    course.clock.advance(Duration::minutes(6));
    let result = course.score("a", 1, 4).await;
    assert_eq!(result.expired_count, 1);
    assert_eq!(course.presses.get_press(&bet_id).unwrap().status, PressStatus::Expired);

    let err = course.presses.accept_press(&bet_id, "b").unwrap_err();
    assert!(matches!(err, FairwayError::Press(PressError::Expired(_))));
}

#[tokio::test]
async fn test_push_settles_once() {
    let course = Course::open(tournament(&["a", "b"], 5), 3);
    let bet_id = course.press("a", "b", BetType::ThisHole, 2);
    course.presses.accept_press(&bet_id, "b").unwrap();

    course.score("a", 2, 5).await;
    let settled = course.score("b", 2, 5).await;
    assert_eq!(settled.pushed_count, 1);
    assert_eq!(settled.summary_text(), "1 pushed");

    let again = course.coordinator.settle_hole("open", 2).await.unwrap();
    assert_eq!(again.pushed_count, 0);
    assert!(course.presses.get_press(&bet_id).unwrap().is_push());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_settlements_award_one_skin() {
    let course = Course::open(tournament(&["a", "b"], 5), 3);
    let bet_id = course.press("a", "b", BetType::ThisHole, 1);
    course.presses.accept_press(&bet_id, "b").unwrap();
    course.score("a", 1, 3).await;
    // Write b's score without triggering a run so the races below all see it first
    game_store::upsert_hole_score(
        course.store.as_ref(),
        &fairway::games::types::HoleScore {
            round_id: course.rounds["b"].clone(),
            player_id: "b".to_string(),
            hole: 1,
            strokes: 4,
            updated_at: Utc::now(),
        },
    )
    .unwrap();

    let runs: Vec<_> = (0..8)
        .map(|_| {
            let coordinator = course.coordinator.clone();
            tokio::spawn(async move { coordinator.settle_hole("open", 1).await })
        })
        .collect();

    let mut resolved = 0;
    let mut skin_awards = 0;
    for run in runs {
        let result = run.await.unwrap().unwrap();
        resolved += result.resolved_count;
        skin_awards += result
            .notifications
            .iter()
            .filter(|n| n.kind == NotificationKind::Skins && n.is_positive)
            .count();
    }
    assert_eq!(resolved, 1);
    assert_eq!(skin_awards, 1);
    assert_eq!(course.chain("open").len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_score_entry_across_holes() {
    let course = Course::open(tournament(&["a", "b"], 2), 64);

    let mut receipts = Vec::new();
    for hole in 1..=6i64 {
        for (player, strokes) in [("a", 4), ("b", if hole % 2 == 0 { 4 } else { 5 })] {
            let ingestor = course.ingestor.clone();
            let round_id = course.rounds[player].clone();
            receipts.push(tokio::spawn(async move {
                ingestor
                    .apply_score(&Actor::player(player), &round_id, hole, strokes)
                    .await
                    .unwrap()
                    .settlement()
                    .await
            }));
        }
    }
    for receipt in receipts {
        receipt.await.unwrap().unwrap();
    }

    // Odd holes go to a, even holes halve and carry into the next one
    let chain = course.chain("open");
    assert_eq!(chain.len(), 6);
    for record in &chain {
        if record.hole_number % 2 == 1 {
            assert_eq!(record.winner_id.as_deref(), Some("a"));
        } else {
            assert!(record.is_carried_over);
        }
    }
    assert_eq!(chain[2].pot_amount, Decimal::from(4));
    assert_eq!(outstanding_pot(&chain), Decimal::from(2));

    let settled_again = course.coordinator.settle_hole("open", 6).await.unwrap();
    assert!(settled_again.notifications.is_empty());
}

#[tokio::test]
async fn test_best_ball_team_wins_hole() {
    let mut t = tournament(&["a", "b", "c", "d"], 5);
    t.rules.game_type = GameType::BestBall;
    t.rules.skins_enabled = false;
    t.teams = vec![
        Team {
            id: "eagles".to_string(),
            name: "Eagles".to_string(),
            members: vec!["a".to_string(), "b".to_string()],
        },
        Team {
            id: "hawks".to_string(),
            name: "Hawks".to_string(),
            members: vec!["c".to_string(), "d".to_string()],
        },
    ];
    let course = Course::open(t, 3);

    course.score("a", 1, 5).await;
    course.score("b", 1, 3).await;
    course.score("c", 1, 4).await;
    let settled = course.score("d", 1, 4).await;

    let team_notes: Vec<_> = settled
        .notifications
        .iter()
        .filter(|n| n.kind == NotificationKind::Team)
        .collect();
    assert_eq!(team_notes.len(), 4);
    assert!(team_notes
        .iter()
        .filter(|n| n.is_positive)
        .all(|n| n.recipient_id == "a" || n.recipient_id == "b"));

    let scores = game_store::load_team_scores(
        course.store.as_ref(),
        "open",
        &["eagles".to_string(), "hawks".to_string()],
        1,
    )
    .unwrap();
    let eagles = scores.iter().find(|s| s.record.team_id == "eagles").unwrap();
    assert_eq!(eagles.record.team_score, 3);
}

#[tokio::test]
async fn test_admin_scores_for_pending_player() {
    let course = Course::open(tournament(&["a", "guest"], 5), 3);
    let guest_round = game_store::find_round_for_player(course.store.as_ref(), "open", "guest")
        .unwrap()
        .unwrap();

    course.score("a", 1, 5).await;
    let settled = course
        .ingestor
        .apply_score(&Actor::acting_as("pro", "guest"), &guest_round.id, 1, 4)
        .await
        .unwrap()
        .settlement()
        .await
        .unwrap();

    assert!(settled
        .notifications
        .iter()
        .any(|n| n.kind == NotificationKind::Skins && n.recipient_id == "guest" && n.is_positive));
    assert_eq!(course.chain("open")[0].winner_id.as_deref(), Some("guest"));
}
