//! Error types for the fairway settlement engine
//!
//! Validation failures are rejected at the ingest boundary, storage conflicts
//! are retried by the settlement coordinator, and everything else bubbles up
//! through `FairwayError`.

use rust_decimal::Decimal;

/// Root error type for all fairway operations
#[derive(Debug, thiserror::Error)]
pub enum FairwayError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Press error: {0}")]
    Press(#[from] PressError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Input rejected before it touches any stored state
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Unknown round: {0}")]
    InvalidRound(String),

    #[error("Invalid hole {hole}: must be between 1 and {max}")]
    InvalidHole { hole: i64, max: u8 },

    #[error("Invalid strokes {strokes}: {reason}")]
    InvalidStrokes { strokes: i64, reason: String },

    #[error("Unknown bet type: {0}")]
    UnknownBetType(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    #[error("A player cannot press themselves")]
    SelfPress,

    #[error("Unknown tournament: {0}")]
    UnknownTournament(String),

    #[error("Player {player_id} is not an entrant of tournament {tournament_id}")]
    NotAnEntrant { tournament_id: String, player_id: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid id {0:?}: must be non-empty and free of ':'")]
    InvalidId(String),
}

/// Press bet lifecycle errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PressError {
    #[error("Press not found: {0}")]
    NotFound(String),

    #[error("Press {0} expired before it was answered")]
    Expired(String),

    #[error("Press {id} cannot {action} while {status}")]
    InvalidTransition { id: String, status: String, action: String },

    #[error("Only the target of press {0} may answer it")]
    NotTarget(String),

    #[error("Press {0} is not resolved by external measurement")]
    NotMeasured(String),
}

/// Storage system errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    #[error("Database open failed: {0}")]
    DatabaseOpenFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),

    #[error("Version conflict on {key}: expected {expected:?}, found {actual:?}")]
    Conflict {
        key: String,
        expected: Option<u64>,
        actual: Option<u64>,
    },
}

impl StorageError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }
}

/// Settlement run failures. A failed settlement never invalidates the score
/// write that triggered it; it is safe to retry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettlementError {
    #[error("Settlement of tournament {tournament_id} hole {hole} still contended after {attempts} attempts")]
    Contention {
        tournament_id: String,
        hole: u8,
        attempts: u32,
    },

    #[error("Settlement storage failure: {0}")]
    Storage(StorageError),

    #[error("Settlement input rejected: {0}")]
    Validation(ValidationError),

    #[error("Settlement task dropped before reporting")]
    Dropped,
}

impl From<StorageError> for SettlementError {
    fn from(e: StorageError) -> Self {
        SettlementError::Storage(e)
    }
}

impl From<ValidationError> for SettlementError {
    fn from(e: ValidationError) -> Self {
        SettlementError::Validation(e)
    }
}

/// Configuration and validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue { field: String, value: String, reason: String },

    #[error("Missing required field: {0}")]
    MissingRequired(String),
}

// External error conversions
impl From<rocksdb::Error> for StorageError {
    fn from(e: rocksdb::Error) -> Self {
        StorageError::WriteFailed(e.to_string())
    }
}

impl From<rocksdb::Error> for FairwayError {
    fn from(e: rocksdb::Error) -> Self {
        FairwayError::Storage(e.into())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::CorruptedData(e.to_string())
    }
}

impl From<std::io::Error> for FairwayError {
    fn from(e: std::io::Error) -> Self {
        FairwayError::Configuration(ConfigurationError::LoadFailed(e.to_string()))
    }
}

// Convenience type aliases for Results
pub type FairwayResult<T> = Result<T, FairwayError>;
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let err: FairwayError = ValidationError::InvalidHole { hole: 19, max: 18 }.into();

        assert!(err.to_string().contains("Validation error"));
        assert!(err.to_string().contains("19"));
    }

    #[test]
    fn test_conflict_details() {
        let err = StorageError::Conflict {
            key: "skin:t1:03".to_string(),
            expected: Some(2),
            actual: Some(3),
        };

        assert!(err.is_conflict());
        assert!(err.to_string().contains("skin:t1:03"));
        assert!(!StorageError::ReadFailed("x".into()).is_conflict());
    }

    #[test]
    fn test_error_source() {
        let err: FairwayError = PressError::Expired("p1".to_string()).into();
        assert!(err.source().is_some());
    }

    #[test]
    fn test_settlement_error_conversion() {
        let err: SettlementError = StorageError::WriteFailed("disk".into()).into();
        match err {
            SettlementError::Storage(_) => {}
            _ => panic!("Expected storage error"),
        }
    }
}
