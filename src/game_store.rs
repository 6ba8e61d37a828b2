//! Persistent tournament, score and settlement records.
//!
//! Tournaments, rounds and hole scores are plain upserts. Every settlement
//! record (presses, skins, snakes, team scores, three-putt attributions) is
//! stored as `Versioned<T>` and only changes through a guarded commit.

use crate::{
    errors::{StorageError, StorageResult},
    games::{
        scorecard::ScoreSheet,
        types::{
            HoleScore, PressBet, Round, SkinRecord, SnakeCategory, SnakeState, TeamHoleScore,
            ThreePuttAttribution, Tournament,
        },
    },
    storage::{decode_versioned, GuardedWrite, KvStore, Versioned},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

const TOURNAMENT_PREFIX: &str = "tournament:";
const ROUND_PREFIX: &str = "round:";
const ROUND_INDEX_PREFIX: &str = "round:index:";
const SCORE_PREFIX: &str = "score:";
const SCORE_REVISION_PREFIX: &str = "score-revision:";
const PRESS_PREFIX: &str = "press:";
const PRESS_INDEX_PREFIX: &str = "press:index:";
const SKIN_PREFIX: &str = "skin:";
const SNAKE_PREFIX: &str = "snake:";
const TEAM_PREFIX: &str = "team:";
const PUTTS_PREFIX: &str = "putts:";

fn tournament_key(id: &str) -> Vec<u8> {
    format!("{}{}", TOURNAMENT_PREFIX, id).into_bytes()
}

fn round_key(round_id: &str) -> Vec<u8> {
    format!("{}{}", ROUND_PREFIX, round_id).into_bytes()
}

fn round_index_prefix(tournament_id: &str) -> String {
    format!("{}{}:", ROUND_INDEX_PREFIX, tournament_id)
}

fn score_key(round_id: &str, hole: u8) -> Vec<u8> {
    format!("{}{}:{:02}", SCORE_PREFIX, round_id, hole).into_bytes()
}

fn score_revision_key(tournament_id: &str) -> Vec<u8> {
    format!("{}{}", SCORE_REVISION_PREFIX, tournament_id).into_bytes()
}

pub fn press_key(bet_id: &str) -> Vec<u8> {
    format!("{}{}", PRESS_PREFIX, bet_id).into_bytes()
}

fn press_index_prefix(tournament_id: &str) -> String {
    format!("{}{}:", PRESS_INDEX_PREFIX, tournament_id)
}

pub fn skin_key(tournament_id: &str, hole: u8) -> Vec<u8> {
    format!("{}{}:{:02}", SKIN_PREFIX, tournament_id, hole).into_bytes()
}

pub fn snake_key(tournament_id: &str, category: SnakeCategory) -> Vec<u8> {
    format!("{}{}:{}", SNAKE_PREFIX, tournament_id, category.as_str()).into_bytes()
}

pub fn team_score_key(tournament_id: &str, team_id: &str, hole: u8) -> Vec<u8> {
    format!("{}{}:{}:{:02}", TEAM_PREFIX, tournament_id, team_id, hole).into_bytes()
}

pub fn putts_key(tournament_id: &str, hole: u8) -> Vec<u8> {
    format!("{}{}:{:02}", PUTTS_PREFIX, tournament_id, hole).into_bytes()
}

fn load_plain<T: DeserializeOwned>(store: &dyn KvStore, key: &[u8]) -> StorageResult<Option<T>> {
    let Some(bytes) = store.get(key)? else {
        return Ok(None);
    };
    let value = serde_json::from_slice(&bytes).map_err(|e| {
        StorageError::CorruptedData(format!(
            "Failed to decode {}: {}",
            String::from_utf8_lossy(key),
            e
        ))
    })?;
    Ok(Some(value))
}

fn put_plain<T: Serialize>(store: &dyn KvStore, key: &[u8], value: &T) -> StorageResult<()> {
    let bytes = serde_json::to_vec(value).map_err(|e| {
        StorageError::WriteFailed(format!(
            "Failed to encode {}: {}",
            String::from_utf8_lossy(key),
            e
        ))
    })?;
    store.put(key, &bytes)
}

fn load_versioned<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &[u8],
) -> StorageResult<Option<Versioned<T>>> {
    match store.get(key)? {
        Some(bytes) => Ok(Some(decode_versioned(key, &bytes)?)),
        None => Ok(None),
    }
}

fn scan_versioned<T: DeserializeOwned>(
    store: &dyn KvStore,
    prefix: &str,
) -> StorageResult<Vec<Versioned<T>>> {
    store
        .scan_prefix(prefix.as_bytes())?
        .into_iter()
        .map(|(key, value)| decode_versioned(&key, &value))
        .collect()
}

/// Trailing id segment of an index key
fn index_suffix(key: &[u8], prefix: &str) -> Option<String> {
    let key = std::str::from_utf8(key).ok()?;
    key.strip_prefix(prefix).map(str::to_string)
}

// ============================================================================
// Tournaments and rounds
// ============================================================================

pub fn store_tournament(store: &dyn KvStore, tournament: &Tournament) -> StorageResult<()> {
    put_plain(store, &tournament_key(&tournament.id), tournament)
}

pub fn load_tournament(store: &dyn KvStore, id: &str) -> StorageResult<Option<Tournament>> {
    load_plain(store, &tournament_key(id))
}

pub fn store_round(store: &dyn KvStore, round: &Round) -> StorageResult<()> {
    put_plain(store, &round_key(&round.id), round)?;
    let index = format!("{}{}", round_index_prefix(&round.tournament_id), round.id);
    store.put(index.as_bytes(), &[])
}

pub fn load_round(store: &dyn KvStore, round_id: &str) -> StorageResult<Option<Round>> {
    load_plain(store, &round_key(round_id))
}

pub fn load_rounds(store: &dyn KvStore, tournament_id: &str) -> StorageResult<Vec<Round>> {
    let prefix = round_index_prefix(tournament_id);
    let mut rounds = Vec::new();
    for (key, _) in store.scan_prefix(prefix.as_bytes())? {
        let Some(round_id) = index_suffix(&key, &prefix) else {
            continue;
        };
        match load_round(store, &round_id)? {
            Some(round) => rounds.push(round),
            None => tracing::warn!(
                tournament_id,
                round_id = %round_id,
                "Round index points at a missing round"
            ),
        }
    }
    Ok(rounds)
}

pub fn find_round_for_player(
    store: &dyn KvStore,
    tournament_id: &str,
    player_id: &str,
) -> StorageResult<Option<Round>> {
    Ok(load_rounds(store, tournament_id)?
        .into_iter()
        .find(|r| r.player_id == player_id))
}

// ============================================================================
// Hole scores
// ============================================================================

/// Upsert a score, returning the row it replaced
pub fn upsert_hole_score(store: &dyn KvStore, score: &HoleScore) -> StorageResult<Option<HoleScore>> {
    let key = score_key(&score.round_id, score.hole);
    let previous = load_plain(store, &key)?;
    put_plain(store, &key, score)?;
    Ok(previous)
}

pub fn load_round_scores(store: &dyn KvStore, round_id: &str) -> StorageResult<Vec<HoleScore>> {
    let prefix = format!("{}{}:", SCORE_PREFIX, round_id);
    store
        .scan_prefix(prefix.as_bytes())?
        .into_iter()
        .map(|(key, value)| {
            serde_json::from_slice(&value).map_err(|e| {
                StorageError::CorruptedData(format!(
                    "Failed to decode {}: {}",
                    String::from_utf8_lossy(&key),
                    e
                ))
            })
        })
        .collect()
}

/// Per-tournament counter bumped after every score write
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreRevision {
    pub tournament_id: String,
    pub revision: u64,
}

const MAX_REVISION_ATTEMPTS: u32 = 16;

/// Record that the tournament's scores changed. Returns the new revision.
pub fn bump_score_revision(store: &dyn KvStore, tournament_id: &str) -> StorageResult<u64> {
    let key = score_revision_key(tournament_id);
    let mut last_error = None;
    for _ in 0..MAX_REVISION_ATTEMPTS {
        let current: Option<Versioned<ScoreRevision>> = load_versioned(store, &key)?;
        let next = ScoreRevision {
            tournament_id: tournament_id.to_string(),
            revision: current.as_ref().map_or(1, |v| v.record.revision + 1),
        };
        let write = GuardedWrite::put(key.clone(), current.map(|v| v.version), &next)?;
        match store.commit(&[write]) {
            Ok(()) => return Ok(next.revision),
            Err(e) if e.is_conflict() => last_error = Some(e),
            Err(e) => return Err(e),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        StorageError::WriteFailed(format!("score revision for {} never settled", tournament_id))
    }))
}

/// Version of the score revision record, `None` before the first bump
pub fn load_score_revision(store: &dyn KvStore, tournament_id: &str) -> StorageResult<Option<u64>> {
    let current: Option<Versioned<ScoreRevision>> =
        load_versioned(store, &score_revision_key(tournament_id))?;
    Ok(current.map(|v| v.version))
}

/// Guard that fails a settlement commit if scores moved since `version` was read
pub fn score_revision_guard(tournament_id: &str, version: Option<u64>) -> GuardedWrite {
    GuardedWrite::check(score_revision_key(tournament_id), version)
}

/// Current truth for every round of the tournament
pub fn load_score_sheet(store: &dyn KvStore, tournament_id: &str) -> StorageResult<ScoreSheet> {
    let mut sheet = ScoreSheet::new();
    for round in load_rounds(store, tournament_id)? {
        for score in load_round_scores(store, &round.id)? {
            sheet.record(&round.player_id, score.hole, score.strokes);
        }
    }
    Ok(sheet)
}

// ============================================================================
// Press bets
// ============================================================================

pub fn load_press(store: &dyn KvStore, bet_id: &str) -> StorageResult<Option<Versioned<PressBet>>> {
    load_versioned(store, &press_key(bet_id))
}

pub fn load_tournament_presses(
    store: &dyn KvStore,
    tournament_id: &str,
) -> StorageResult<Vec<Versioned<PressBet>>> {
    let prefix = press_index_prefix(tournament_id);
    let mut presses = Vec::new();
    for (key, _) in store.scan_prefix(prefix.as_bytes())? {
        let Some(bet_id) = index_suffix(&key, &prefix) else {
            continue;
        };
        if let Some(press) = load_press(store, &bet_id)? {
            presses.push(press);
        }
    }
    Ok(presses)
}

/// Every press across tournaments, for the expiry sweep
pub fn load_all_presses(store: &dyn KvStore) -> StorageResult<Vec<Versioned<PressBet>>> {
    store
        .scan_prefix(PRESS_PREFIX.as_bytes())?
        .into_iter()
        .filter(|(key, _)| !key.starts_with(PRESS_INDEX_PREFIX.as_bytes()))
        .map(|(key, value)| decode_versioned(&key, &value))
        .collect()
}

/// Writes that create a new press and its tournament index entry
pub fn new_press_writes(bet: &PressBet) -> StorageResult<Vec<GuardedWrite>> {
    let index = format!("{}{}", press_index_prefix(&bet.tournament_id), bet.id);
    Ok(vec![
        GuardedWrite::put(press_key(&bet.id), None, bet)?,
        GuardedWrite::put(index.into_bytes(), None, &bet.id)?,
    ])
}

pub fn press_write(current: &Versioned<PressBet>, updated: &PressBet) -> StorageResult<GuardedWrite> {
    GuardedWrite::put(press_key(&updated.id), Some(current.version), updated)
}

// ============================================================================
// Skins
// ============================================================================

/// Persisted skins chain in hole order
pub fn load_skin_chain(store: &dyn KvStore, tournament_id: &str) -> StorageResult<Vec<Versioned<SkinRecord>>> {
    scan_versioned(store, &format!("{}{}:", SKIN_PREFIX, tournament_id))
}

// ============================================================================
// Snakes
// ============================================================================

pub fn load_snake(
    store: &dyn KvStore,
    tournament_id: &str,
    category: SnakeCategory,
) -> StorageResult<Option<Versioned<SnakeState>>> {
    load_versioned(store, &snake_key(tournament_id, category))
}

pub fn load_snakes(store: &dyn KvStore, tournament_id: &str) -> StorageResult<Vec<Versioned<SnakeState>>> {
    scan_versioned(store, &format!("{}{}:", SNAKE_PREFIX, tournament_id))
}

pub fn load_attribution(
    store: &dyn KvStore,
    tournament_id: &str,
    hole: u8,
) -> StorageResult<Option<Versioned<ThreePuttAttribution>>> {
    load_versioned(store, &putts_key(tournament_id, hole))
}

// ============================================================================
// Team scores
// ============================================================================

pub fn load_team_scores(
    store: &dyn KvStore,
    tournament_id: &str,
    team_ids: &[String],
    hole: u8,
) -> StorageResult<Vec<Versioned<TeamHoleScore>>> {
    let mut scores = Vec::new();
    for team_id in team_ids {
        if let Some(score) = load_versioned(store, &team_score_key(tournament_id, team_id, hole))? {
            scores.push(score);
        }
    }
    Ok(scores)
}
