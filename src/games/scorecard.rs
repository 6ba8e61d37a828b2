//! Read model over every posted score of a tournament.

use crate::games::types::PlayerId;
use std::collections::{BTreeMap, HashMap};

/// Strokes per player per hole, rebuilt from the store on every settlement run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreSheet {
    by_player: HashMap<PlayerId, BTreeMap<u8, u32>>,
}

impl ScoreSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite one score
    pub fn record(&mut self, player_id: &str, hole: u8, strokes: u32) {
        self.by_player
            .entry(player_id.to_string())
            .or_default()
            .insert(hole, strokes);
    }

    pub fn strokes(&self, player_id: &str, hole: u8) -> Option<u32> {
        self.by_player.get(player_id)?.get(&hole).copied()
    }

    /// Scores of `players` on `hole`, or `None` while anyone has yet to post
    pub fn complete_field(&self, hole: u8, players: &[PlayerId]) -> Option<Vec<(PlayerId, u32)>> {
        if players.is_empty() {
            return None;
        }
        players
            .iter()
            .map(|p| self.strokes(p, hole).map(|s| (p.clone(), s)))
            .collect()
    }

    /// Sum of posted strokes over `holes` plus how many of them are unplayed
    pub fn total_over(&self, player_id: &str, holes: impl Iterator<Item = u8>) -> (u64, u32) {
        let mut total = 0u64;
        let mut missing = 0;
        for hole in holes {
            match self.strokes(player_id, hole) {
                Some(s) => total += u64::from(s),
                None => missing += 1,
            }
        }
        (total, missing)
    }
}
