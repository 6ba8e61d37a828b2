use crate::errors::ValidationError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type PlayerId = String;
pub type TournamentId = String;
pub type RoundId = String;
pub type TeamId = String;
pub type BetId = String;

/// Largest course the engine scores
pub const MAX_HOLES: u8 = 18;
pub const FRONT_NINE_BOUNDARY: u8 = 9;
/// Most strokes any hole accepts, with or without a tournament cap
pub const STROKE_CEILING: u32 = 30;

/// Separates the segments of every storage key
pub const KEY_SEPARATOR: char = ':';

/// How individual scores roll up for the tournament
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GameType {
    #[default]
    Stroke,
    BestBall,
}

impl GameType {
    pub fn is_team_based(&self) -> bool {
        matches!(self, GameType::BestBall)
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameType::Stroke => write!(f, "stroke"),
            GameType::BestBall => write!(f, "best-ball"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub members: Vec<PlayerId>,
}

/// Per-tournament rules that drive settlement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TournamentRules {
    pub holes: u8,
    pub game_type: GameType,
    /// How many of a team's low scores count on each hole (1 = best ball)
    pub scores_counted: u8,
    pub skins_enabled: bool,
    pub skin_value: Decimal,
    pub snake_enabled: bool,
    pub snake_value: Decimal,
    /// Optional per-hole stroke cap; enables early press resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_strokes_per_hole: Option<u32>,
}

impl Default for TournamentRules {
    fn default() -> Self {
        Self {
            holes: MAX_HOLES,
            game_type: GameType::Stroke,
            scores_counted: 1,
            skins_enabled: true,
            skin_value: Decimal::ONE,
            snake_enabled: true,
            snake_value: Decimal::ONE,
            max_strokes_per_hole: None,
        }
    }
}

/// Tournament as seen by the settlement engine. Created and edited elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub rules: TournamentRules,
    /// Every player expected to post a score on every hole
    pub entrants: Vec<PlayerId>,
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub admins: Vec<PlayerId>,
}

impl Tournament {
    pub fn is_admin(&self, player_id: &str) -> bool {
        self.admins.iter().any(|a| a == player_id)
    }

    pub fn is_entrant(&self, player_id: &str) -> bool {
        self.entrants.iter().any(|p| p == player_id)
    }

    /// Tournament and team ids become storage key segments
    pub fn validate_ids(&self) -> Result<(), ValidationError> {
        let ids = std::iter::once(&self.id).chain(self.teams.iter().map(|t| &t.id));
        for id in ids {
            if id.is_empty() || id.contains(KEY_SEPARATOR) {
                return Err(ValidationError::InvalidId(id.clone()));
            }
        }
        Ok(())
    }

    /// Check a raw hole number against this course
    pub fn validate_hole(&self, hole: i64) -> Result<u8, ValidationError> {
        if hole < 1 || hole > self.rules.holes as i64 {
            return Err(ValidationError::InvalidHole {
                hole,
                max: self.rules.holes,
            });
        }
        Ok(hole as u8)
    }

    pub fn validate_strokes(&self, strokes: i64) -> Result<u32, ValidationError> {
        if strokes < 1 {
            return Err(ValidationError::InvalidStrokes {
                strokes,
                reason: "must be at least 1".to_string(),
            });
        }
        let cap = self
            .rules
            .max_strokes_per_hole
            .map_or(STROKE_CEILING, |c| c.min(STROKE_CEILING));
        if strokes > cap as i64 {
            return Err(ValidationError::InvalidStrokes {
                strokes,
                reason: format!("a hole is capped at {}", cap),
            });
        }
        Ok(strokes as u32)
    }
}

/// One player's scorecard within a tournament
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Round {
    pub id: RoundId,
    pub tournament_id: TournamentId,
    pub player_id: PlayerId,
    /// Differs from `player_id` when an admin opened the round on their behalf
    pub created_by: PlayerId,
    pub created_at: DateTime<Utc>,
}

impl Round {
    pub fn is_delegated(&self) -> bool {
        self.created_by != self.player_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HoleScore {
    pub round_id: RoundId,
    pub player_id: PlayerId,
    pub hole: u8,
    pub strokes: u32,
    pub updated_at: DateTime<Utc>,
}

/// Kinds of press wager
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum BetType {
    ClosestToPin,
    LongestDrive,
    ThisHole,
    RemainingHoles,
    TotalStrokes,
    HeadToHead,
}

impl BetType {
    pub const ALL: [BetType; 6] = [
        BetType::ClosestToPin,
        BetType::LongestDrive,
        BetType::ThisHole,
        BetType::RemainingHoles,
        BetType::TotalStrokes,
        BetType::HeadToHead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BetType::ClosestToPin => "closest-to-pin",
            BetType::LongestDrive => "longest-drive",
            BetType::ThisHole => "this-hole",
            BetType::RemainingHoles => "remaining-holes",
            BetType::TotalStrokes => "total-strokes",
            BetType::HeadToHead => "head-to-head",
        }
    }

    /// Decided by shot measurement rather than stroke counts
    pub fn is_measured(&self) -> bool {
        matches!(self, BetType::ClosestToPin | BetType::LongestDrive)
    }
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BetType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BetType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownBetType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PressStatus {
    Pending,
    Active,
    Declined,
    Expired,
    Completed,
}

impl fmt::Display for PressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PressStatus::Pending => "pending",
            PressStatus::Active => "active",
            PressStatus::Declined => "declined",
            PressStatus::Expired => "expired",
            PressStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Wager between two players
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PressBet {
    pub id: BetId,
    pub tournament_id: TournamentId,
    pub initiator_id: PlayerId,
    pub target_id: PlayerId,
    pub amount: Decimal,
    pub bet_type: BetType,
    pub win_condition: String,
    pub start_hole: u8,
    pub status: PressStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub winner_id: Option<PlayerId>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl PressBet {
    /// Status as of `now`: an unanswered press past its deadline reads as expired
    pub fn effective_status(&self, now: DateTime<Utc>) -> PressStatus {
        if self.status == PressStatus::Pending && now >= self.expires_at {
            PressStatus::Expired
        } else {
            self.status
        }
    }

    pub fn is_push(&self) -> bool {
        self.status == PressStatus::Completed && self.winner_id.is_none()
    }

    pub fn involves(&self, player_id: &str) -> bool {
        self.initiator_id == player_id || self.target_id == player_id
    }

    pub fn opponent_of(&self, player_id: &str) -> &str {
        if self.initiator_id == player_id {
            &self.target_id
        } else {
            &self.initiator_id
        }
    }
}

/// Skins outcome for one hole
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkinRecord {
    pub tournament_id: TournamentId,
    pub hole_number: u8,
    #[serde(default)]
    pub winner_id: Option<PlayerId>,
    #[serde(default)]
    pub winning_score: Option<u32>,
    pub pot_amount: Decimal,
    pub is_carried_over: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SnakeCategory {
    #[serde(rename = "front9")]
    Front9,
    #[serde(rename = "back9")]
    Back9,
    #[serde(rename = "overall")]
    Overall,
}

impl SnakeCategory {
    pub const ALL: [SnakeCategory; 3] = [
        SnakeCategory::Front9,
        SnakeCategory::Back9,
        SnakeCategory::Overall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SnakeCategory::Front9 => "front9",
            SnakeCategory::Back9 => "back9",
            SnakeCategory::Overall => "overall",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SnakeCategory::Front9 => "front-nine snake",
            SnakeCategory::Back9 => "back-nine snake",
            SnakeCategory::Overall => "overall snake",
        }
    }

    pub fn applies_to(&self, hole: u8) -> bool {
        match self {
            SnakeCategory::Front9 => hole <= FRONT_NINE_BOUNDARY,
            SnakeCategory::Back9 => hole > FRONT_NINE_BOUNDARY,
            SnakeCategory::Overall => true,
        }
    }

    /// Hole whose attribution closes the category
    pub fn boundary_hole(&self, course_holes: u8) -> u8 {
        match self {
            SnakeCategory::Front9 => FRONT_NINE_BOUNDARY,
            SnakeCategory::Back9 => MAX_HOLES,
            SnakeCategory::Overall => course_holes,
        }
    }
}

impl fmt::Display for SnakeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Penalty token for one snake category
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnakeState {
    pub tournament_id: TournamentId,
    pub category: SnakeCategory,
    #[serde(default)]
    pub current_holder_id: Option<PlayerId>,
    /// 0 until the first attribution lands
    pub last_hole_updated: u8,
    pub amount: Decimal,
    pub is_final: bool,
}

impl SnakeState {
    pub fn new(tournament_id: &str, category: SnakeCategory, amount: Decimal) -> Self {
        Self {
            tournament_id: tournament_id.to_string(),
            category,
            current_holder_id: None,
            last_hole_updated: 0,
            amount,
            is_final: false,
        }
    }
}

/// Admin-confirmed list of players who three-putted a hole, in holed-out order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreePuttAttribution {
    pub tournament_id: TournamentId,
    pub hole: u8,
    pub player_ids: Vec<PlayerId>,
    pub submitted_by: PlayerId,
    /// Bumped on every resubmission
    pub revision: u64,
    /// Last revision the snake tracker has consumed
    pub applied_revision: u64,
}

impl ThreePuttAttribution {
    pub fn is_applied(&self) -> bool {
        self.applied_revision >= self.revision
    }
}

/// Derived team score for one hole
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamHoleScore {
    pub tournament_id: TournamentId,
    pub team_id: TeamId,
    pub hole: u8,
    pub team_score: u32,
    /// The individual scores that counted, lowest first
    pub counted_scores: Vec<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Team,
    Skins,
    Snake,
    /// Emitted by the wolf side game, which lives outside this engine
    Wolf,
    Press,
}

/// Human-readable result event for one player
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameNotification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub recipient_id: PlayerId,
    #[serde(default)]
    pub hole: Option<u8>,
    pub message: String,
    pub players_involved: Vec<PlayerId>,
    pub is_positive: bool,
}

/// Outcome of one settlement run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResult {
    pub tournament_id: TournamentId,
    pub hole: u8,
    /// Presses decided with a winner
    pub resolved_count: u32,
    pub pushed_count: u32,
    /// Completed presses whose winner changed after a score correction
    pub adjusted_count: u32,
    pub expired_count: u32,
    pub notifications: Vec<GameNotification>,
}

impl SettlementResult {
    pub fn empty(tournament_id: &str, hole: u8) -> Self {
        Self {
            tournament_id: tournament_id.to_string(),
            hole,
            ..Default::default()
        }
    }

    /// Feedback line for the score entry screen, e.g. "2 won, 1 pushed"
    pub fn summary_text(&self) -> String {
        let mut parts = Vec::new();
        if self.resolved_count > 0 {
            parts.push(format!("{} won", self.resolved_count));
        }
        if self.pushed_count > 0 {
            parts.push(format!("{} pushed", self.pushed_count));
        }
        if self.adjusted_count > 0 {
            parts.push(format!("{} adjusted", self.adjusted_count));
        }
        if parts.is_empty() {
            "no bets resolved".to_string()
        } else {
            parts.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tournament() -> Tournament {
        Tournament {
            id: "t1".to_string(),
            name: "Club Championship".to_string(),
            rules: TournamentRules::default(),
            entrants: vec!["a".to_string(), "b".to_string()],
            teams: vec![],
            admins: vec!["admin".to_string()],
        }
    }

    #[test]
    fn test_bet_type_parsing() {
        assert_eq!("this-hole".parse::<BetType>().unwrap(), BetType::ThisHole);
        assert_eq!(
            "nassau".parse::<BetType>().unwrap_err(),
            ValidationError::UnknownBetType("nassau".to_string())
        );
        let json = serde_json::to_string(&BetType::ClosestToPin).unwrap();
        assert_eq!(json, "\"closest-to-pin\"");
    }

    #[test]
    fn test_ids_with_key_separator_are_rejected() {
        let mut t = tournament();
        assert!(t.validate_ids().is_ok());

        t.id = "club:x".to_string();
        assert_eq!(
            t.validate_ids().unwrap_err(),
            ValidationError::InvalidId("club:x".to_string())
        );

        t.id = "club".to_string();
        t.teams = vec![Team {
            id: "red:1".to_string(),
            name: "Red".to_string(),
            members: vec!["a".to_string()],
        }];
        assert!(t.validate_ids().is_err());

        t.teams.clear();
        t.id = String::new();
        assert!(t.validate_ids().is_err());
    }

    #[test]
    fn test_hole_and_stroke_validation() {
        let mut t = tournament();
        assert_eq!(t.validate_hole(18).unwrap(), 18);
        assert!(t.validate_hole(0).is_err());
        assert!(t.validate_hole(19).is_err());
        assert!(t.validate_strokes(0).is_err());
        assert_eq!(t.validate_strokes(7).unwrap(), 7);

        assert_eq!(t.validate_strokes(30).unwrap(), 30);
        assert!(t.validate_strokes(31).is_err());
        assert!(t.validate_strokes(u32::MAX as i64).is_err());

        t.rules.max_strokes_per_hole = Some(8);
        assert!(t.validate_strokes(9).is_err());

        t.rules.max_strokes_per_hole = Some(100);
        assert!(t.validate_strokes(31).is_err());
    }

    #[test]
    fn test_snake_categories() {
        assert!(SnakeCategory::Front9.applies_to(9));
        assert!(!SnakeCategory::Front9.applies_to(10));
        assert!(SnakeCategory::Back9.applies_to(10));
        assert!(SnakeCategory::Overall.applies_to(1));
        assert_eq!(SnakeCategory::Back9.boundary_hole(18), 18);
        assert_eq!(SnakeCategory::Front9.boundary_hole(18), 9);
    }

    #[test]
    fn test_summary_text() {
        let mut result = SettlementResult::empty("t1", 3);
        assert_eq!(result.summary_text(), "no bets resolved");
        result.resolved_count = 2;
        result.pushed_count = 1;
        assert_eq!(result.summary_text(), "2 won, 1 pushed");
    }

    #[test]
    fn test_notification_payload_shape() {
        let n = GameNotification {
            kind: NotificationKind::Press,
            recipient_id: "a".to_string(),
            hole: Some(7),
            message: "You won".to_string(),
            players_involved: vec!["a".to_string(), "b".to_string()],
            is_positive: true,
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "press");
        assert_eq!(json["isPositive"], true);
        assert_eq!(json["playersInvolved"][1], "b");
    }
}
