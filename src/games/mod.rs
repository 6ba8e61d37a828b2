pub mod types;
pub mod scorecard;
pub mod skins;
pub mod snake;
pub mod teams;
pub mod press;
pub mod notifications;

pub use types::*;
pub use scorecard::ScoreSheet;
pub use skins::{SkinAdjustment, SkinChange, SkinsEngine};
pub use snake::{SnakeOutcome, SnakeTracker, SnakeTransition};
pub use teams::{TeamAggregator, TeamHoleResult};
pub use press::{BetRule, PressResolution, PressResolver, ResolutionKind, Verdict};
pub use notifications::{HoleOutcomes, NotificationComposer};
