//! Fairway - golf tournament settlement engine
//!
//! Every stroke score written through [`ingest::HoleScoreIngestor`] triggers a
//! settlement run for its hole: team best-ball, skins with carryover, the
//! three-putt snake and player-vs-player presses are recomputed from stored
//! scores and reconciled into versioned records. Runs are idempotent and safe
//! to repeat after a correction or a failure.

pub mod api;
pub mod clock;
pub mod config;
pub mod errors;
pub mod game_store;
pub mod games;
pub mod ingest;
pub mod settlement;
pub mod storage;
pub mod wagers;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigLoader, FairwayConfig};
pub use errors::{FairwayError, FairwayResult};
pub use ingest::{Actor, HoleScoreIngestor, ScoreFeed, ScoreReceipt};
pub use settlement::SettlementCoordinator;
pub use storage::{KvStore, MemoryStorage, RocksStorage};
pub use wagers::{NewPress, PressBook};
