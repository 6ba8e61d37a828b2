//! Team best-ball aggregation.

use crate::{
    errors::StorageResult,
    game_store::team_score_key,
    games::{
        scorecard::ScoreSheet,
        types::{Team, TeamHoleScore, TeamId, Tournament},
    },
    storage::{GuardedWrite, Versioned},
};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum TeamHoleResult {
    Won { team_id: TeamId, team_score: u32 },
    Halved { team_ids: Vec<TeamId>, team_score: u32 },
}

pub struct TeamAggregator<'a> {
    tournament: &'a Tournament,
}

impl<'a> TeamAggregator<'a> {
    pub fn new(tournament: &'a Tournament) -> Self {
        Self { tournament }
    }

    /// Team score from the lowest `scores_counted` member scores.
    /// `None` until every member has posted.
    pub fn team_score(&self, team: &Team, sheet: &ScoreSheet, hole: u8) -> Option<TeamHoleScore> {
        let mut scores: Vec<u32> = sheet
            .complete_field(hole, &team.members)?
            .into_iter()
            .map(|(_, s)| s)
            .collect();
        scores.sort_unstable();
        scores.truncate(self.tournament.rules.scores_counted.max(1) as usize);

        Some(TeamHoleScore {
            tournament_id: self.tournament.id.clone(),
            team_id: team.id.clone(),
            hole,
            team_score: scores.iter().fold(0u32, |acc, s| acc.saturating_add(*s)),
            counted_scores: scores,
        })
    }

    pub fn hole_scores(&self, sheet: &ScoreSheet, hole: u8) -> Vec<TeamHoleScore> {
        self.tournament
            .teams
            .iter()
            .filter_map(|team| self.team_score(team, sheet, hole))
            .collect()
    }

    /// Hole winner, once every team has a score
    pub fn hole_result(&self, scores: &[TeamHoleScore]) -> Option<TeamHoleResult> {
        if scores.is_empty() || scores.len() < self.tournament.teams.len() {
            return None;
        }
        let low = scores.iter().map(|s| s.team_score).min()?;
        let leaders: Vec<TeamId> = scores
            .iter()
            .filter(|s| s.team_score == low)
            .map(|s| s.team_id.clone())
            .collect();

        Some(match <[TeamId; 1]>::try_from(leaders) {
            Ok([team_id]) => TeamHoleResult::Won {
                team_id,
                team_score: low,
            },
            Err(team_ids) => TeamHoleResult::Halved {
                team_ids,
                team_score: low,
            },
        })
    }

    /// Guarded writes for every team score that differs from storage
    pub fn reconcile(
        &self,
        stored: &[Versioned<TeamHoleScore>],
        computed: &[TeamHoleScore],
    ) -> StorageResult<Vec<GuardedWrite>> {
        let by_team: HashMap<&str, &Versioned<TeamHoleScore>> = stored
            .iter()
            .map(|v| (v.record.team_id.as_str(), v))
            .collect();

        let mut writes = Vec::new();
        for score in computed {
            let existing = by_team.get(score.team_id.as_str());
            if existing.is_some_and(|v| v.record == *score) {
                continue;
            }
            let key = team_score_key(&self.tournament.id, &score.team_id, score.hole);
            writes.push(GuardedWrite::put(key, existing.map(|v| v.version), score)?);
        }
        Ok(writes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::types::{GameType, TournamentRules};

    fn tournament(scores_counted: u8) -> Tournament {
        Tournament {
            id: "t1".to_string(),
            name: "Four-Ball".to_string(),
            rules: TournamentRules {
                game_type: GameType::BestBall,
                scores_counted,
                ..Default::default()
            },
            entrants: ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect(),
            teams: vec![
                Team {
                    id: "red".to_string(),
                    name: "Red".to_string(),
                    members: vec!["a".to_string(), "b".to_string()],
                },
                Team {
                    id: "blue".to_string(),
                    name: "Blue".to_string(),
                    members: vec!["c".to_string(), "d".to_string()],
                },
            ],
            admins: vec![],
        }
    }

    fn sheet(scores: [(&str, u32); 4]) -> ScoreSheet {
        let mut sheet = ScoreSheet::new();
        for (p, s) in scores {
            sheet.record(p, 1, s);
        }
        sheet
    }

    #[test]
    fn test_best_ball_takes_lowest() {
        let t = tournament(1);
        let agg = TeamAggregator::new(&t);
        let scores = agg.hole_scores(&sheet([("a", 5), ("b", 3), ("c", 4), ("d", 4)]), 1);

        assert_eq!(scores[0].team_score, 3);
        assert_eq!(scores[0].counted_scores, vec![3]);
        assert_eq!(
            agg.hole_result(&scores),
            Some(TeamHoleResult::Won {
                team_id: "red".to_string(),
                team_score: 3
            })
        );
    }

    #[test]
    fn test_two_scores_counted_can_halve() {
        let t = tournament(2);
        let agg = TeamAggregator::new(&t);
        let scores = agg.hole_scores(&sheet([("a", 5), ("b", 3), ("c", 4), ("d", 4)]), 1);

        assert_eq!(scores[0].team_score, 8);
        assert!(matches!(
            agg.hole_result(&scores),
            Some(TeamHoleResult::Halved { team_score: 8, .. })
        ));
    }

    #[test]
    fn test_incomplete_team_is_skipped() {
        let t = tournament(1);
        let agg = TeamAggregator::new(&t);
        let mut partial = ScoreSheet::new();
        partial.record("a", 1, 4);
        partial.record("c", 1, 4);
        partial.record("d", 1, 5);

        let scores = agg.hole_scores(&partial, 1);
        assert_eq!(scores.len(), 1);
        assert!(agg.hole_result(&scores).is_none());
    }

    #[test]
    fn test_reconcile_skips_unchanged() {
        let t = tournament(1);
        let agg = TeamAggregator::new(&t);
        let scores = agg.hole_scores(&sheet([("a", 5), ("b", 3), ("c", 4), ("d", 4)]), 1);
        let stored = vec![Versioned {
            version: 2,
            record: scores[0].clone(),
        }];

        let writes = agg.reconcile(&stored, &scores).unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].expected_version, None);
    }
}
