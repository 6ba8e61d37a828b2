//! Skins with carryover.
//!
//! The chain is always recomputed from hole 1 over current scores and then
//! reconciled against what is stored, so a correction on an early hole moves
//! every later pot with it.

use crate::{
    errors::StorageResult,
    game_store::skin_key,
    games::{
        scorecard::ScoreSheet,
        types::{SkinRecord, Tournament},
    },
    storage::{GuardedWrite, Versioned},
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// A stored skin that no longer matches current scores
#[derive(Debug, Clone, PartialEq)]
pub struct SkinAdjustment {
    pub hole: u8,
    pub previous: SkinRecord,
    /// `None` when the hole can no longer be decided
    pub current: Option<SkinRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkinChange {
    Awarded(SkinRecord),
    CarriedOver(SkinRecord),
    Adjusted(SkinAdjustment),
}

impl SkinChange {
    pub fn hole(&self) -> u8 {
        match self {
            SkinChange::Awarded(r) | SkinChange::CarriedOver(r) => r.hole_number,
            SkinChange::Adjusted(a) => a.hole,
        }
    }
}

/// Changes to apply plus the guarded writes that apply them
#[derive(Debug, Default)]
pub struct SkinsReconciliation {
    pub changes: Vec<SkinChange>,
    pub writes: Vec<GuardedWrite>,
}

pub struct SkinsEngine<'a> {
    tournament: &'a Tournament,
}

impl<'a> SkinsEngine<'a> {
    pub fn new(tournament: &'a Tournament) -> Self {
        Self { tournament }
    }

    /// Skin records for the longest prefix of holes with complete fields
    pub fn compute_chain(&self, sheet: &ScoreSheet) -> Vec<SkinRecord> {
        let base = self.tournament.rules.skin_value;
        let mut chain = Vec::new();
        let mut carried = 0u32;

        for hole in 1..=self.tournament.rules.holes {
            let Some(field) = sheet.complete_field(hole, &self.tournament.entrants) else {
                break;
            };
            let pot = base * Decimal::from(carried + 1);
            let low = field.iter().map(|(_, s)| *s).min().unwrap_or_default();
            let mut holders = field.iter().filter(|(_, s)| *s == low);
            let first = holders.next();

            let record = match (first, holders.next()) {
                (Some((winner, _)), None) => {
                    carried = 0;
                    SkinRecord {
                        tournament_id: self.tournament.id.clone(),
                        hole_number: hole,
                        winner_id: Some(winner.clone()),
                        winning_score: Some(low),
                        pot_amount: pot,
                        is_carried_over: false,
                    }
                }
                _ => {
                    carried += 1;
                    SkinRecord {
                        tournament_id: self.tournament.id.clone(),
                        hole_number: hole,
                        winner_id: None,
                        winning_score: None,
                        pot_amount: pot,
                        is_carried_over: true,
                    }
                }
            };
            chain.push(record);
        }
        chain
    }

    /// Diff `computed` against the stored chain
    pub fn reconcile(
        &self,
        stored: &[Versioned<SkinRecord>],
        computed: Vec<SkinRecord>,
    ) -> StorageResult<SkinsReconciliation> {
        let mut stored_by_hole: BTreeMap<u8, &Versioned<SkinRecord>> = stored
            .iter()
            .map(|v| (v.record.hole_number, v))
            .collect();
        let mut out = SkinsReconciliation::default();

        for record in computed {
            let hole = record.hole_number;
            let key = skin_key(&self.tournament.id, hole);
            match stored_by_hole.remove(&hole) {
                Some(existing) if existing.record == record => {}
                Some(existing) => {
                    out.writes
                        .push(GuardedWrite::put(key, Some(existing.version), &record)?);
                    out.changes.push(SkinChange::Adjusted(SkinAdjustment {
                        hole,
                        previous: existing.record.clone(),
                        current: Some(record),
                    }));
                }
                None => {
                    out.writes.push(GuardedWrite::put(key, None, &record)?);
                    out.changes.push(if record.is_carried_over {
                        SkinChange::CarriedOver(record)
                    } else {
                        SkinChange::Awarded(record)
                    });
                }
            }
        }

        // Stored holes past the recomputed chain are no longer decidable
        for (hole, existing) in stored_by_hole {
            out.writes.push(GuardedWrite::delete(
                skin_key(&self.tournament.id, hole),
                existing.version,
            ));
            out.changes.push(SkinChange::Adjusted(SkinAdjustment {
                hole,
                previous: existing.record.clone(),
                current: None,
            }));
        }

        Ok(out)
    }
}

/// Money already paid out across the chain
pub fn distributed_total(chain: &[SkinRecord]) -> Decimal {
    chain
        .iter()
        .filter(|r| !r.is_carried_over)
        .map(|r| r.pot_amount)
        .sum()
}

/// Pot riding on the next hole, zero when the last hole was won
pub fn outstanding_pot(chain: &[SkinRecord]) -> Decimal {
    match chain.last() {
        Some(last) if last.is_carried_over => last.pot_amount,
        _ => Decimal::ZERO,
    }
}
